//! Seam to the host's content rendering.

use async_trait::async_trait;
use http::request::Parts;

use crate::errors::{Result, RouteResponse};
use mapstore::Options;

/// Renders the view a content map names, with its options as keyword
/// arguments. Owned by the host environment; the router only delegates.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, view: &str, options: &Options, request: &Parts)
    -> Result<RouteResponse>;
}
