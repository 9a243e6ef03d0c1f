pub mod audit;
pub mod cache;
pub mod config;
pub mod entities;
pub mod fingerprint;
pub mod metrics_defs;
pub mod repair;
pub mod resolver;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod validate;

pub mod testutils;

pub use cache::{Cache, CacheTtl, MemoryCache, Slot};
pub use config::MapstoreConfig;
pub use entities::{
    ContentMap, ContentMapId, Options, RedirectTarget, ResolvedUrlMap, Site, SiteId, UrlMap,
    UrlMapId,
};
pub use resolver::ResolveError;
pub use service::{MapError, MapService};
pub use store::{MemoryStore, Store, StoreError};
pub use validate::ValidationError;
