//! Metrics definitions for the map store.

use shared::metrics_defs::{MetricDef, MetricType};

pub const URL_MAP_CACHE_HIT: MetricDef = MetricDef {
    name: "url_map_cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of resolutions served from the cache",
};

pub const URL_MAP_CACHE_MISS: MetricDef = MetricDef {
    name: "url_map_cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of resolutions that fell through to the store",
};

pub const URL_MAP_NOT_FOUND: MetricDef = MetricDef {
    name: "url_map.not_found",
    metric_type: MetricType::Counter,
    description: "Number of resolutions that matched no url map",
};

pub const REPAIR_COLLAPSED: MetricDef = MetricDef {
    name: "redirect_repair.collapsed",
    metric_type: MetricType::Counter,
    description: "Number of two-hop redirect chains collapsed",
};

pub const REPAIR_FAILED: MetricDef = MetricDef {
    name: "redirect_repair.failed",
    metric_type: MetricType::Counter,
    description: "Number of rows the repair job failed to rewrite",
};

pub const ALL_METRICS: &[MetricDef] = &[
    URL_MAP_CACHE_HIT,
    URL_MAP_CACHE_MISS,
    URL_MAP_NOT_FOUND,
    REPAIR_COLLAPSED,
    REPAIR_FAILED,
];
