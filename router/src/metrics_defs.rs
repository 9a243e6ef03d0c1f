//! Metrics definitions for the router.

use shared::metrics_defs::{MetricDef, MetricType};

pub const ROUTE_RENDERED: MetricDef = MetricDef {
    name: "route.rendered",
    metric_type: MetricType::Counter,
    description: "Number of requests delegated to the renderer",
};

pub const ROUTE_REDIRECTED: MetricDef = MetricDef {
    name: "route.redirected",
    metric_type: MetricType::Counter,
    description: "Number of requests answered with a redirect",
};

pub const ROUTE_STATUS_ONLY: MetricDef = MetricDef {
    name: "route.status_only",
    metric_type: MetricType::Counter,
    description: "Number of requests answered by status code alone or a status handler",
};

pub const ROUTE_NOT_FOUND: MetricDef = MetricDef {
    name: "route.not_found",
    metric_type: MetricType::Counter,
    description: "Number of requests that resolved to no url map",
};

pub const ALL_METRICS: &[MetricDef] = &[
    ROUTE_RENDERED,
    ROUTE_REDIRECTED,
    ROUTE_STATUS_ONLY,
    ROUTE_NOT_FOUND,
];
