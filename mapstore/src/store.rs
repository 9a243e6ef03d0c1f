//! Persistence seam for the url map graph.
//!
//! The [`Store`] trait is what the service layer writes through; the
//! fingerprint uniqueness constraint enforced by every implementation is the
//! correctness backstop for concurrent writers (a second writer creating a
//! colliding fingerprint fails, it does not silently overwrite). Each put and
//! delete is atomic per row; no cross-row ordering is guaranteed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

use crate::entities::{ContentMap, ContentMapId, Site, SiteId, UrlMap, UrlMapId};
use crate::snapshot::StoreSnapshot;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("url map with fingerprint {0} already exists")]
    DuplicateFingerprint(String),

    #[error("reference to a missing record: {0}")]
    MissingReference(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn site(&self, id: SiteId) -> Result<Site>;
    async fn site_by_domain(&self, domain: &str) -> Result<Option<Site>>;
    async fn put_site(&self, site: Site) -> Result<Site>;

    async fn content_map(&self, id: ContentMapId) -> Result<ContentMap>;
    /// Inserts (id unset) or updates (id set) a content map.
    async fn put_content_map(&self, map: ContentMap) -> Result<ContentMap>;

    async fn url_map(&self, id: UrlMapId) -> Result<UrlMap>;
    async fn url_map_by_fingerprint(&self, fingerprint: &str) -> Result<Option<UrlMap>>;
    /// Inserts (id unset) or updates (id set) a url map, enforcing the
    /// fingerprint uniqueness constraint.
    async fn put_url_map(&self, map: UrlMap) -> Result<UrlMap>;
    async fn delete_url_map(&self, id: UrlMapId) -> Result<()>;

    async fn url_maps_referencing_content_map(&self, id: ContentMapId) -> Result<Vec<UrlMap>>;

    /// Url maps whose redirect target is itself a redirect (3xx) whose own
    /// redirect target is a terminal (200 or 410): the heads of exactly
    /// two-hop chains.
    async fn two_hop_redirects(&self) -> Result<Vec<UrlMap>>;

    /// Renderable (status 200) url maps flagged for the sitemap.
    async fn sitemap_entries(&self, site: SiteId) -> Result<Vec<UrlMap>>;
}

#[derive(Default)]
struct MemoryStoreInner {
    sites: HashMap<SiteId, Site>,
    content_maps: HashMap<ContentMapId, ContentMap>,
    url_maps: HashMap<UrlMapId, UrlMap>,
    by_fingerprint: HashMap<String, UrlMapId>,
    next_url_map_id: u64,
    next_content_map_id: u64,
}

/// In-memory [`Store`]. Mutations take the write lock for their whole
/// duration, so each row write is atomic and readers never observe a
/// half-updated record.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
    lookups: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Number of fingerprint lookups served so far. Lets tests assert that a
    /// cache hit did not touch the store.
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut inner = MemoryStoreInner::default();
        for site in snapshot.sites {
            inner.sites.insert(site.id, site);
        }
        for map in snapshot.content_maps {
            if let Some(id) = map.id {
                inner.next_content_map_id = inner.next_content_map_id.max(id.0);
                inner.content_maps.insert(id, map);
            }
        }
        for map in snapshot.url_maps {
            if let Some(id) = map.id {
                inner.next_url_map_id = inner.next_url_map_id.max(id.0);
                inner.by_fingerprint.insert(map.fingerprint.clone(), id);
                inner.url_maps.insert(id, map);
            }
        }
        MemoryStore {
            inner: RwLock::new(inner),
            lookups: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.read();
        let mut sites: Vec<Site> = inner.sites.values().cloned().collect();
        sites.sort_by_key(|site| site.id);
        let mut content_maps: Vec<ContentMap> = inner.content_maps.values().cloned().collect();
        content_maps.sort_by_key(|map| map.id);
        let mut url_maps: Vec<UrlMap> = inner.url_maps.values().cloned().collect();
        url_maps.sort_by_key(|map| map.id);
        StoreSnapshot {
            sites,
            content_maps,
            url_maps,
        }
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.read();
        inner.sites.is_empty() && inner.content_maps.is_empty() && inner.url_maps.is_empty()
    }

    pub fn url_map_count(&self) -> usize {
        self.inner.read().url_maps.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn site(&self, id: SiteId) -> Result<Site> {
        self.inner
            .read()
            .sites
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn site_by_domain(&self, domain: &str) -> Result<Option<Site>> {
        Ok(self
            .inner
            .read()
            .sites
            .values()
            .find(|site| site.domain == domain)
            .cloned())
    }

    async fn put_site(&self, site: Site) -> Result<Site> {
        self.inner.write().sites.insert(site.id, site.clone());
        Ok(site)
    }

    async fn content_map(&self, id: ContentMapId) -> Result<ContentMap> {
        self.inner
            .read()
            .content_maps
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn put_content_map(&self, mut map: ContentMap) -> Result<ContentMap> {
        let mut inner = self.inner.write();
        let now = SystemTime::now();
        match map.id {
            Some(id) => {
                if !inner.content_maps.contains_key(&id) {
                    return Err(StoreError::NotFound);
                }
                map.modified = now;
            }
            None => {
                inner.next_content_map_id += 1;
                map.id = Some(ContentMapId(inner.next_content_map_id));
                map.created = now;
                map.modified = now;
            }
        }
        if let Some(id) = map.id {
            inner.content_maps.insert(id, map.clone());
        }
        Ok(map)
    }

    async fn url_map(&self, id: UrlMapId) -> Result<UrlMap> {
        self.inner
            .read()
            .url_maps
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn url_map_by_fingerprint(&self, fingerprint: &str) -> Result<Option<UrlMap>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.read();
        Ok(inner
            .by_fingerprint
            .get(fingerprint)
            .and_then(|id| inner.url_maps.get(id))
            .cloned())
    }

    async fn put_url_map(&self, mut map: UrlMap) -> Result<UrlMap> {
        let mut inner = self.inner.write();

        if !inner.sites.contains_key(&map.site) {
            return Err(StoreError::MissingReference(format!("site {:?}", map.site)));
        }
        if let Some(content_map) = map.content_map
            && !inner.content_maps.contains_key(&content_map)
        {
            return Err(StoreError::MissingReference(format!(
                "content map {:?}",
                content_map
            )));
        }
        if let Some(redirect) = map.redirect
            && !inner.url_maps.contains_key(&redirect)
        {
            return Err(StoreError::MissingReference(format!(
                "url map {:?}",
                redirect
            )));
        }

        // uniqueness backstop: a colliding fingerprint held by another row
        // fails the write instead of overwriting it
        if let Some(holder) = inner.by_fingerprint.get(&map.fingerprint)
            && Some(*holder) != map.id
        {
            return Err(StoreError::DuplicateFingerprint(map.fingerprint));
        }

        let now = SystemTime::now();
        match map.id {
            Some(id) => {
                let Some(previous) = inner.url_maps.get(&id) else {
                    return Err(StoreError::NotFound);
                };
                let stale_fingerprint = previous.fingerprint.clone();
                if stale_fingerprint != map.fingerprint {
                    inner.by_fingerprint.remove(&stale_fingerprint);
                }
                map.modified = now;
            }
            None => {
                inner.next_url_map_id += 1;
                map.id = Some(UrlMapId(inner.next_url_map_id));
                map.created = now;
                map.modified = now;
            }
        }
        if let Some(id) = map.id {
            inner.by_fingerprint.insert(map.fingerprint.clone(), id);
            inner.url_maps.insert(id, map.clone());
        }
        Ok(map)
    }

    async fn delete_url_map(&self, id: UrlMapId) -> Result<()> {
        let mut inner = self.inner.write();
        let Some(map) = inner.url_maps.remove(&id) else {
            return Err(StoreError::NotFound);
        };
        inner.by_fingerprint.remove(&map.fingerprint);
        Ok(())
    }

    async fn url_maps_referencing_content_map(&self, id: ContentMapId) -> Result<Vec<UrlMap>> {
        Ok(self
            .inner
            .read()
            .url_maps
            .values()
            .filter(|map| map.content_map == Some(id))
            .cloned()
            .collect())
    }

    async fn two_hop_redirects(&self) -> Result<Vec<UrlMap>> {
        let inner = self.inner.read();
        let mut heads: Vec<UrlMap> = inner
            .url_maps
            .values()
            .filter(|map| {
                let Some(middle) = map.redirect.and_then(|id| inner.url_maps.get(&id)) else {
                    return false;
                };
                if !middle.is_redirect() {
                    return false;
                }
                middle
                    .redirect
                    .and_then(|id| inner.url_maps.get(&id))
                    .is_some_and(|terminal| terminal.is_terminal())
            })
            .cloned()
            .collect();
        heads.sort_by_key(|map| map.id);
        Ok(heads)
    }

    async fn sitemap_entries(&self, site: SiteId) -> Result<Vec<UrlMap>> {
        let inner = self.inner.read();
        let mut entries: Vec<UrlMap> = inner
            .url_maps
            .values()
            .filter(|map| map.site == site && map.status_code == 200 && map.on_sitemap)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;

    fn url_map(site: SiteId, path: &str, status_code: u16) -> UrlMap {
        let mut map = UrlMap::new(site, path);
        map.status_code = status_code;
        map.fingerprint = fingerprint(site, path);
        map
    }

    async fn store_with_site() -> MemoryStore {
        let store = MemoryStore::new();
        store.put_site(Site::new(1, "example.com")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_put_assigns_id_and_timestamps() {
        let store = store_with_site().await;
        let saved = store
            .put_url_map(url_map(SiteId(1), "/test_path", 204))
            .await
            .unwrap();
        assert_eq!(saved.id, Some(UrlMapId(1)));
        assert_eq!(saved.created, saved.modified);
    }

    #[tokio::test]
    async fn test_duplicate_fingerprint_rejected() {
        let store = store_with_site().await;
        store
            .put_url_map(url_map(SiteId(1), "/test_path", 204))
            .await
            .unwrap();
        let err = store
            .put_url_map(url_map(SiteId(1), "/test_path", 204))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateFingerprint(_)));
    }

    #[tokio::test]
    async fn test_update_own_row_keeps_fingerprint() {
        let store = store_with_site().await;
        let mut saved = store
            .put_url_map(url_map(SiteId(1), "/test_path", 204))
            .await
            .unwrap();
        saved.status_code = 410;
        let updated = store.put_url_map(saved).await.unwrap();
        assert_eq!(updated.status_code, 410);
    }

    #[tokio::test]
    async fn test_repointed_path_drops_stale_fingerprint() {
        let store = store_with_site().await;
        let mut saved = store
            .put_url_map(url_map(SiteId(1), "/old", 204))
            .await
            .unwrap();
        let old_fingerprint = saved.fingerprint.clone();
        saved.path = "/new".to_string();
        saved.fingerprint = fingerprint(SiteId(1), "/new");
        store.put_url_map(saved).await.unwrap();
        assert_eq!(
            store.url_map_by_fingerprint(&old_fingerprint).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_missing_site_rejected() {
        let store = MemoryStore::new();
        let err = store
            .put_url_map(url_map(SiteId(9), "/test_path", 204))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingReference(_)));
    }

    #[tokio::test]
    async fn test_lookup_counter() {
        let store = store_with_site().await;
        assert_eq!(store.lookup_count(), 0);
        store.url_map_by_fingerprint("missing").await.unwrap();
        assert_eq!(store.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_two_hop_detection() {
        let store = store_with_site().await;
        let a = store
            .put_url_map(url_map(SiteId(1), "/a/", 410))
            .await
            .unwrap();
        let mut c = url_map(SiteId(1), "/c/", 301);
        c.redirect = a.id;
        let c = store.put_url_map(c).await.unwrap();
        let mut d = url_map(SiteId(1), "/d/", 301);
        d.redirect = c.id;
        let d = store.put_url_map(d).await.unwrap();

        let heads = store.two_hop_redirects().await.unwrap();
        assert_eq!(heads.len(), 1);
        assert_eq!(heads[0].id, d.id);
    }

    #[tokio::test]
    async fn test_sitemap_entries_filter() {
        let store = store_with_site().await;
        let content_map = store
            .put_content_map(ContentMap::new("page"))
            .await
            .unwrap();
        let mut on_map = url_map(SiteId(1), "/on/", 200);
        on_map.content_map = content_map.id;
        store.put_url_map(on_map).await.unwrap();
        let mut off_map = url_map(SiteId(1), "/off/", 200);
        off_map.content_map = content_map.id;
        off_map.on_sitemap = false;
        store.put_url_map(off_map).await.unwrap();
        store.put_url_map(url_map(SiteId(1), "/gone/", 410)).await.unwrap();

        let entries = store.sitemap_entries(SiteId(1)).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "/on/");
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let store = store_with_site().await;
        store
            .put_url_map(url_map(SiteId(1), "/test_path", 204))
            .await
            .unwrap();
        let restored = MemoryStore::from_snapshot(store.snapshot());
        let found = restored
            .url_map_by_fingerprint(&fingerprint(SiteId(1), "/test_path"))
            .await
            .unwrap();
        assert!(found.is_some());
        // ids keep advancing past the restored rows
        let next = restored
            .put_url_map(url_map(SiteId(1), "/other", 204))
            .await
            .unwrap();
        assert_eq!(next.id, Some(UrlMapId(2)));
    }
}
