//! Builders shared by the test suites of this crate and its consumers.

use std::sync::Arc;

use crate::cache::{MemoryCache, Slot};
use crate::config::MapstoreConfig;
use crate::entities::{Site, SiteId};
use crate::service::MapService;
use crate::store::{MemoryStore, Store};

pub fn test_site_id() -> SiteId {
    SiteId(1)
}

pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache<Slot>>,
    pub service: Arc<MapService>,
}

/// A service over a fresh in-memory store holding one site (`example.com`)
/// and one registered view (`page`).
pub async fn test_env() -> TestEnv {
    let mut config = MapstoreConfig::default();
    config.registered_views.insert("page".to_string());
    test_env_with_config(config).await
}

pub async fn test_env_with_config(config: MapstoreConfig) -> TestEnv {
    let store = Arc::new(MemoryStore::new());
    store
        .put_site(Site::new(test_site_id().0, "example.com"))
        .await
        .expect("seeding the test site cannot fail");
    let cache = Arc::new(MemoryCache::new(None));
    let service = Arc::new(MapService::new(store.clone(), cache.clone(), config));
    TestEnv {
        store,
        cache,
        service,
    }
}
