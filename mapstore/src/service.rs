//! The single mutation path for the url map graph.
//!
//! Every save and delete goes through [`MapService`]: validation runs
//! explicitly before the store write, and the corresponding cache entry is
//! refreshed or dropped synchronously before returning to the caller. There
//! is no asynchronous invalidation queue.

use std::sync::Arc;

use thiserror::Error;

use crate::cache::{Cache, Slot, VOIDED_TTL};
use crate::config::MapstoreConfig;
use crate::entities::{ContentMap, Site, UrlMap, UrlMapId};
use crate::fingerprint::fingerprint;
use crate::store::{Store, StoreError};
use crate::validate::{ValidationError, validate_content_map, validate_url_map};

#[derive(Debug, Error)]
pub enum MapError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct MapService {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) cache: Arc<dyn Cache<Slot>>,
    pub(crate) config: MapstoreConfig,
}

impl MapService {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache<Slot>>,
        config: MapstoreConfig,
    ) -> Self {
        MapService {
            store,
            cache,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn config(&self) -> &MapstoreConfig {
        &self.config
    }

    pub fn cache_key(&self, fingerprint: &str) -> String {
        format!("{}{}", self.config.cache_prefix, fingerprint)
    }

    pub async fn site_by_domain(&self, domain: &str) -> Result<Option<Site>, StoreError> {
        self.store.site_by_domain(domain).await
    }

    /// Validates and persists a url map, then refreshes its cache entry with
    /// the fully hydrated record.
    ///
    /// If the path ends with a configured index alias, the cache entry for
    /// the suffix-stripped path is invalidated as well, so `/foo/index.html`
    /// and `/foo/` never disagree.
    pub async fn save_url_map(&self, mut map: UrlMap) -> Result<UrlMap, MapError> {
        map.fingerprint = fingerprint(map.site, &map.path);
        validate_url_map(&map)?;
        if let Some(holder) = self.store.url_map_by_fingerprint(&map.fingerprint).await?
            && holder.id != map.id
        {
            return Err(ValidationError::DuplicateFingerprint.into());
        }

        let saved = self.store.put_url_map(map).await?;

        let resolved = self.hydrate(saved.clone()).await?;
        self.cache.set(
            &self.cache_key(&saved.fingerprint),
            Slot::Filled(Arc::new(resolved)),
            self.config.cache_ttl,
        );

        for alias in &self.config.index_aliases {
            if let Some(stripped) = saved.path.strip_suffix(alias.as_str())
                && stripped.ends_with('/')
            {
                let key = self.cache_key(&fingerprint(saved.site, stripped));
                self.cache.delete(&key);
            }
        }

        tracing::debug!(site = ?saved.site, path = %saved.path, "saved url map");
        Ok(saved)
    }

    /// Removes the row and its cache entry.
    pub async fn delete_url_map(&self, id: UrlMapId) -> Result<(), MapError> {
        let map = self.store.url_map(id).await?;
        self.store.delete_url_map(id).await?;
        self.cache.delete(&self.cache_key(&map.fingerprint));
        tracing::debug!(site = ?map.site, path = %map.path, "deleted url map");
        Ok(())
    }

    /// Validates and persists a content map, then voids the cache entry of
    /// every url map referencing it so stale content associations cannot be
    /// served.
    pub async fn save_content_map(&self, map: ContentMap) -> Result<ContentMap, MapError> {
        validate_content_map(&map, &self.config.registered_views)?;
        let saved = self.store.put_content_map(map).await?;
        if let Some(id) = saved.id {
            for referrer in self.store.url_maps_referencing_content_map(id).await? {
                self.cache.set(
                    &self.cache_key(&referrer.fingerprint),
                    Slot::Voided,
                    VOIDED_TTL,
                );
            }
        }
        Ok(saved)
    }
}
