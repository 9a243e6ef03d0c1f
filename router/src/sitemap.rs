//! The on-sitemap projection of a site's url maps.
//!
//! Rendering the XML is the host's concern; this component only produces the
//! entries, cached under the site's own key so the periodic refresh job and
//! request-time consumers share one copy.

use std::sync::Arc;
use std::time::SystemTime;

use mapstore::{Cache, MapService, Site, StoreError};

#[derive(Clone, Debug, PartialEq)]
pub struct SitemapEntry {
    /// Absolute URL of the entry.
    pub location: String,
    pub lastmod: SystemTime,
}

pub struct SitemapProjector {
    maps: Arc<MapService>,
    cache: Arc<dyn Cache<Arc<[SitemapEntry]>>>,
}

impl SitemapProjector {
    pub fn new(maps: Arc<MapService>, cache: Arc<dyn Cache<Arc<[SitemapEntry]>>>) -> Self {
        SitemapProjector { maps, cache }
    }

    fn cache_key(&self, site: &Site) -> String {
        format!("{}{}_sitemap", self.maps.config().cache_prefix, site.domain)
    }

    /// The renderable (status 200), on-sitemap url maps of a site, as
    /// absolute URLs in stable path order.
    pub async fn entries(
        &self,
        site: &Site,
        force_cache_invalidation: bool,
    ) -> Result<Arc<[SitemapEntry]>, StoreError> {
        let key = self.cache_key(site);
        if !force_cache_invalidation
            && let Some(hit) = self.cache.get(&key)
        {
            return Ok(hit);
        }

        let rows = self.maps.store().sitemap_entries(site.id).await?;
        let entries: Arc<[SitemapEntry]> = rows
            .iter()
            .map(|map| SitemapEntry {
                location: format!("{}://{}{}", map.protocol(), site.domain, map.path),
                lastmod: map.modified,
            })
            .collect();
        self.cache
            .set(&key, entries.clone(), self.maps.config().cache_ttl);
        Ok(entries)
    }
}
