//! The built-in render targets: static view bodies with `{key}` placeholders
//! filled from content map options, and named status pages.

use async_trait::async_trait;
use http::request::Parts;
use hyper::Response;
use indexmap::IndexMap;

use mapstore::{Options, ResolvedUrlMap};
use router::{Renderer, RouteError, RouteResponse, StatusHandler, full_body};

/// Serves the body configured for each view, substituting `{key}`
/// placeholders with the content map's options.
pub struct StaticSiteRenderer {
    views: IndexMap<String, String>,
}

impl StaticSiteRenderer {
    pub fn new(views: IndexMap<String, String>) -> Self {
        StaticSiteRenderer { views }
    }
}

#[async_trait]
impl Renderer for StaticSiteRenderer {
    async fn render(
        &self,
        view: &str,
        options: &Options,
        _request: &Parts,
    ) -> Result<RouteResponse, RouteError> {
        let template = self
            .views
            .get(view)
            .ok_or_else(|| RouteError::Render(format!("view {view:?} is not registered")))?;
        let mut body = template.clone();
        for (key, value) in options {
            let rendered = match value.as_str() {
                Some(text) => text.to_string(),
                None => value.to_string(),
            };
            body = body.replace(&format!("{{{key}}}"), &rendered);
        }
        Ok(Response::new(full_body(body)))
    }
}

/// A status page configured in `status_pages`, served with the url map's own
/// status code.
pub struct StaticStatusPage {
    body: String,
}

impl StaticStatusPage {
    pub fn new<B>(body: B) -> Self
    where
        B: Into<String>,
    {
        StaticStatusPage { body: body.into() }
    }
}

impl StatusHandler for StaticStatusPage {
    fn handle(
        &self,
        _request: &Parts,
        url_map: &ResolvedUrlMap,
    ) -> Result<RouteResponse, RouteError> {
        Ok(Response::builder()
            .status(url_map.record.status_code)
            .body(full_body(self.body.clone()))?)
    }
}
