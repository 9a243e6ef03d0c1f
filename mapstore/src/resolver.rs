//! Cache-coherent lookup from (site, path) to a hydrated url map.

use std::sync::Arc;

use thiserror::Error;

use crate::cache::Slot;
use crate::entities::{RedirectTarget, ResolvedUrlMap, SiteId, UrlMap};
use crate::fingerprint::fingerprint;
use crate::metrics_defs::{URL_MAP_CACHE_HIT, URL_MAP_CACHE_MISS, URL_MAP_NOT_FOUND};
use crate::service::MapService;
use crate::store::{Store, StoreError};
use shared::counter;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no url map matches the requested path")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MapService {
    /// Resolves a canonical path against the cache, falling back to the
    /// store on a miss and repopulating the cache with the hydrated record.
    ///
    /// Negative results are never cached: a mapping created right after a
    /// miss must be visible to the next lookup. When the path ends with `/`
    /// and index aliases are configured, each `path + alias` candidate is
    /// tried before giving up, so `/` answers for `/index.html`.
    ///
    /// Concurrent callers may race to repopulate the same key after an
    /// invalidation; last writer wins, which is fine for a derived entry.
    pub async fn resolve(
        &self,
        site: SiteId,
        path: &str,
        force_cache_invalidation: bool,
    ) -> Result<Arc<ResolvedUrlMap>, ResolveError> {
        let mut result = self
            .resolve_exact(site, path, force_cache_invalidation)
            .await;

        if matches!(result, Err(ResolveError::NotFound)) && path.ends_with('/') {
            for alias in &self.config.index_aliases {
                let candidate = format!("{path}{alias}");
                match self
                    .resolve_exact(site, &candidate, force_cache_invalidation)
                    .await
                {
                    Err(ResolveError::NotFound) => continue,
                    other => {
                        result = other;
                        break;
                    }
                }
            }
        }

        if matches!(result, Err(ResolveError::NotFound)) {
            counter!(URL_MAP_NOT_FOUND).increment(1);
        }
        result
    }

    async fn resolve_exact(
        &self,
        site: SiteId,
        path: &str,
        force_cache_invalidation: bool,
    ) -> Result<Arc<ResolvedUrlMap>, ResolveError> {
        let digest = fingerprint(site, path);
        let key = self.cache_key(&digest);

        if !force_cache_invalidation {
            if let Some(Slot::Filled(hit)) = self.cache.get(&key) {
                counter!(URL_MAP_CACHE_HIT).increment(1);
                return Ok(hit);
            }
            counter!(URL_MAP_CACHE_MISS).increment(1);
        }

        let record = self
            .store
            .url_map_by_fingerprint(&digest)
            .await?
            .ok_or(ResolveError::NotFound)?;
        let resolved = Arc::new(self.hydrate(record).await?);
        self.cache
            .set(&key, Slot::Filled(resolved.clone()), self.config.cache_ttl);
        Ok(resolved)
    }

    /// Eagerly attaches the site, content map, and redirect target so the
    /// cached record is self-contained.
    ///
    /// Records reference their neighbors by id and are loaded independently,
    /// so a neighbor deleted out from under a row hydrates as `None` rather
    /// than failing the whole lookup. The site is required.
    pub(crate) async fn hydrate(&self, record: UrlMap) -> Result<ResolvedUrlMap, StoreError> {
        let site = self.store.site(record.site).await?;

        let content_map = match record.content_map {
            Some(id) => match self.store.content_map(id).await {
                Ok(content_map) => Some(content_map),
                Err(StoreError::NotFound) => None,
                Err(error) => return Err(error),
            },
            None => None,
        };

        let redirect = match record.redirect {
            Some(id) => match self.store.url_map(id).await {
                Ok(target) => {
                    let target_site = self.store.site(target.site).await?;
                    Some(RedirectTarget {
                        record: target,
                        site: target_site,
                    })
                }
                Err(StoreError::NotFound) => None,
                Err(error) => return Err(error),
            },
            None => None,
        };

        Ok(ResolvedUrlMap {
            record,
            site,
            content_map,
            redirect,
        })
    }
}
