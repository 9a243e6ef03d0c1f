//! Fakes and builders shared by the test suites of this crate and its
//! consumers.

use std::convert::Infallible;

use async_trait::async_trait;
use http::header::HOST;
use http::request::Parts;
use http_body_util::{BodyExt, Empty, combinators::BoxBody};
use hyper::body::Bytes;
use hyper::Request;

use crate::errors::{Result, RouteError, RouteResponse};
use crate::renderer::Renderer;
use crate::router::{RequestContext, full_body};
use mapstore::{Options, ResolvedUrlMap, Site, SiteId, UrlMap};

/// Renderer fake echoing the view name and its options.
pub struct EchoRenderer;

#[async_trait]
impl Renderer for EchoRenderer {
    async fn render(
        &self,
        view: &str,
        options: &Options,
        _request: &Parts,
    ) -> Result<RouteResponse> {
        let options = serde_json::to_string(options)
            .map_err(|error| RouteError::Render(error.to_string()))?;
        Ok(hyper::Response::new(full_body(format!(
            "view={view} options={options}"
        ))))
    }
}

pub fn test_request(
    path_and_query: &str,
    host: Option<&str>,
    secure: bool,
) -> Request<BoxBody<Bytes, Infallible>> {
    let mut builder = Request::builder().uri(path_and_query);
    if let Some(host) = host {
        builder = builder.header(HOST, host);
    }
    let mut request = builder
        .body(Empty::<Bytes>::new().map_err(|never| match never {}).boxed())
        .expect("test request is well-formed");
    request.extensions_mut().insert(RequestContext { secure });
    request
}

pub fn test_parts() -> Parts {
    let (parts, _body) = test_request("/page", Some("example.com"), false).into_parts();
    parts
}

/// A minimal hydrated url map for handler tests.
pub fn resolved_map(status_code: u16) -> ResolvedUrlMap {
    let mut record = UrlMap::new(SiteId(1), "/page");
    record.status_code = status_code;
    record.force_secure = false;
    ResolvedUrlMap {
        record,
        site: Site::new(1, "example.com"),
        content_map: None,
        redirect: None,
    }
}
