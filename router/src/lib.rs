pub mod canonicalize;
pub mod errors;
pub mod handlers;
pub mod metrics_defs;
pub mod renderer;
pub mod router;
pub mod sitemap;

pub mod testutils;

pub use canonicalize::{canonicalize_path, force_cache_invalidation, redirect_url_with_query_string};
pub use errors::{RouteError, RouteResponse};
pub use handlers::{
    Handler, HandlerFn, HandlerRegistry, HandlerRegistryBuilder, RegistryError, StatusHandler,
};
pub use renderer::Renderer;
pub use router::{RequestContext, Router, empty_body, full_body};
pub use sitemap::{SitemapEntry, SitemapProjector};
