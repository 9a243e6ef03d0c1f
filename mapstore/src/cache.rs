//! Shared cache for hydrated url maps and derived projections.
//!
//! The cache is an explicitly injected capability, never a process global, so
//! tests can substitute their own instance with deterministic contents. It is
//! a best-effort, eventually-consistent view of the store; the store stays the
//! source of truth and concurrent writers to the same key race last-write-wins.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use serde::Deserialize;

use crate::entities::ResolvedUrlMap;

const DEFAULT_CAPACITY: u64 = 10_000;

/// Per-entry lifetime. Replaces the conventional `0` sentinel whose meaning
/// varies by cache backend: here "use the provider default" and "never
/// expire" are distinct, named variants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "CacheTtlRepr")]
pub enum CacheTtl {
    /// Expire after the provider's configured default lifetime.
    #[default]
    Default,
    /// Never expire.
    Never,
    /// Expire after this many seconds.
    Secs(u64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CacheTtlRepr {
    Secs(u64),
    Word(String),
}

impl TryFrom<CacheTtlRepr> for CacheTtl {
    type Error = String;

    fn try_from(repr: CacheTtlRepr) -> Result<Self, Self::Error> {
        match repr {
            CacheTtlRepr::Secs(secs) => Ok(CacheTtl::Secs(secs)),
            CacheTtlRepr::Word(word) => match word.as_str() {
                "default" => Ok(CacheTtl::Default),
                "never" => Ok(CacheTtl::Never),
                other => Err(format!(
                    "unknown cache timeout {other:?} (expected \"default\", \"never\", or seconds)"
                )),
            },
        }
    }
}

/// Lifetime of the "voided" placeholder written when a content map save
/// invalidates the url maps referencing it.
pub const VOIDED_TTL: CacheTtl = CacheTtl::Secs(5);

/// What a url-map cache key holds.
///
/// `Voided` is the empty placeholder a content-map save leaves behind; the
/// resolver treats it exactly like an absent key and goes back to the store.
#[derive(Clone, Debug)]
pub enum Slot {
    Filled(Arc<ResolvedUrlMap>),
    Voided,
}

pub trait Cache<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;
    fn set(&self, key: &str, value: V, ttl: CacheTtl);
    fn delete(&self, key: &str);
}

#[derive(Clone)]
struct Entry<V> {
    value: V,
    ttl: CacheTtl,
}

struct PerEntryExpiry {
    default_ttl: Option<Duration>,
}

impl PerEntryExpiry {
    fn lifetime<V>(&self, entry: &Entry<V>) -> Option<Duration> {
        match entry.ttl {
            CacheTtl::Default => self.default_ttl,
            CacheTtl::Never => None,
            CacheTtl::Secs(secs) => Some(Duration::from_secs(secs)),
        }
    }
}

impl<V> Expiry<String, Entry<V>> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        self.lifetime(entry)
    }

    // An overwrite carries its own ttl; the remaining lifetime of the
    // previous entry must not leak into the new one.
    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        self.lifetime(entry)
    }
}

/// In-process cache provider backed by moka, honoring per-entry [`CacheTtl`].
pub struct MemoryCache<V> {
    cache: moka::sync::Cache<String, Entry<V>>,
}

impl<V> MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// `default_ttl` is what [`CacheTtl::Default`] resolves to; `None` means
    /// entries using the default never expire.
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, default_ttl)
    }

    pub fn with_capacity(max_capacity: u64, default_ttl: Option<Duration>) -> Self {
        let cache = moka::sync::Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryExpiry { default_ttl })
            .build();
        MemoryCache { cache }
    }
}

impl<V> Cache<V> for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &str) -> Option<V> {
        self.cache.get(key).map(|entry| entry.value)
    }

    fn set(&self, key: &str, value: V, ttl: CacheTtl) {
        self.cache.insert(key.to_string(), Entry { value, ttl });
    }

    fn delete(&self, key: &str) {
        self.cache.invalidate(key);
    }
}
