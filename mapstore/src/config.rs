use std::collections::BTreeSet;

use serde::Deserialize;

use crate::cache::CacheTtl;

fn default_cache_prefix() -> String {
    "urlographer:".to_string()
}

/// Knobs for the map store: cache keying and lifetime, the path suffixes
/// treated as index aliases, and the set of views content maps may reference.
#[derive(Clone, Debug, Deserialize)]
pub struct MapstoreConfig {
    /// Prepended to every cache key.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Lifetime of url-map and sitemap cache entries.
    #[serde(default)]
    pub cache_ttl: CacheTtl,

    /// Path suffixes equivalent to their parent directory path, e.g.
    /// `index.html` so `/foo/index.html` answers for `/foo/`.
    #[serde(default)]
    pub index_aliases: Vec<String>,

    /// View names a content map may resolve to. Usually injected by the host
    /// rather than listed in config.
    #[serde(default)]
    pub registered_views: BTreeSet<String>,
}

impl Default for MapstoreConfig {
    fn default() -> Self {
        MapstoreConfig {
            cache_prefix: default_cache_prefix(),
            cache_ttl: CacheTtl::default(),
            index_aliases: Vec::new(),
            registered_views: BTreeSet::new(),
        }
    }
}
