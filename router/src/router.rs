//! The routing state machine: canonicalize, resolve, then answer according
//! to the resolved url map's status code.

use std::sync::Arc;

use http::header::{HOST, LOCATION};
use http::request::Parts;
use http_body_util::{BodyExt, Empty, Full, combinators::BoxBody};
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};

use crate::canonicalize::{
    canonicalize_path, force_cache_invalidation, redirect_url_with_query_string,
};
use crate::errors::{Result, RouteError, RouteResponse};
use crate::handlers::HandlerRegistry;
use crate::metrics_defs::{ROUTE_NOT_FOUND, ROUTE_REDIRECTED, ROUTE_RENDERED, ROUTE_STATUS_ONLY};
use crate::renderer::Renderer;
use mapstore::{MapService, ResolveError};
use shared::counter;

/// Connection facts only the server loop knows; inserted into the request
/// extensions before routing.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestContext {
    pub secure: bool,
}

pub fn full_body<C>(content: C) -> BoxBody<Bytes, RouteError>
where
    C: Into<Bytes>,
{
    Full::new(content.into()).map_err(|e| match e {}).boxed()
}

pub fn empty_body() -> BoxBody<Bytes, RouteError> {
    Empty::<Bytes>::new().map_err(|e| match e {}).boxed()
}

/// Router that answers requests from the url map graph.
pub struct Router {
    maps: Arc<MapService>,
    renderer: Arc<dyn Renderer>,
    handlers: HandlerRegistry,
}

impl Router {
    pub fn new(
        maps: Arc<MapService>,
        renderer: Arc<dyn Renderer>,
        handlers: HandlerRegistry,
    ) -> Self {
        Router {
            maps,
            renderer,
            handlers,
        }
    }

    /// Routes one request.
    ///
    /// The hydrated url map is attached to the response extensions as
    /// `Arc<ResolvedUrlMap>` so downstream collaborators can introspect the
    /// outcome without a second lookup. A `Cache-Control: no-cache` request
    /// header bypasses the resolver cache for this request only.
    /// [`RouteError::NotFound`] is returned for unmatched paths and explicit
    /// 404 maps; turning that into a 404 page is the host's concern.
    pub async fn route<B>(&self, req: Request<B>) -> Result<RouteResponse>
    where
        B: hyper::body::Body + Send + 'static,
    {
        let (parts, _body) = req.into_parts();
        let secure = parts
            .extensions
            .get::<RequestContext>()
            .map(|ctx| ctx.secure)
            .unwrap_or(false);

        let Some(host) = request_host(&parts) else {
            tracing::warn!(uri = %parts.uri, "request without a host");
            counter!(ROUTE_NOT_FOUND).increment(1);
            return Err(RouteError::NotFound);
        };
        let Some(site) = self.maps.site_by_domain(&host).await? else {
            tracing::debug!(host = %host, "no site for host");
            counter!(ROUTE_NOT_FOUND).increment(1);
            return Err(RouteError::NotFound);
        };

        let raw_path = parts.uri.path().to_string();
        let path = canonicalize_path(&raw_path);
        let force = force_cache_invalidation(&parts.headers);

        let resolved = match self.maps.resolve(site.id, &path, force).await {
            Ok(resolved) => resolved,
            Err(ResolveError::NotFound) => {
                counter!(ROUTE_NOT_FOUND).increment(1);
                return Err(RouteError::NotFound);
            }
            Err(ResolveError::Store(error)) => return Err(error.into()),
        };

        let query = parts.uri.query().map(str::to_string);
        let mut response = self
            .respond(&parts, &resolved, &raw_path, &path, query.as_deref(), secure)
            .await?;
        response.extensions_mut().insert(resolved);
        Ok(response)
    }

    async fn respond(
        &self,
        parts: &Parts,
        resolved: &mapstore::ResolvedUrlMap,
        raw_path: &str,
        path: &str,
        query: Option<&str>,
        secure: bool,
    ) -> Result<RouteResponse> {
        // casing and slash differences funnel through one redirect step
        // before the status code is even considered
        if raw_path != path {
            let target = format!(
                "{}://{}{}",
                resolved.record.protocol(),
                resolved.site.domain,
                path
            );
            counter!(ROUTE_REDIRECTED).increment(1);
            return redirect(
                StatusCode::MOVED_PERMANENTLY,
                &redirect_url_with_query_string(&target, query),
            );
        }

        match resolved.record.status_code {
            200 => {
                if resolved.record.force_secure && !secure {
                    counter!(ROUTE_REDIRECTED).increment(1);
                    return redirect(
                        StatusCode::MOVED_PERMANENTLY,
                        &redirect_url_with_query_string(&resolved.absolute_url(), query),
                    );
                }
                let content_map = resolved.content_map.as_ref().ok_or_else(|| {
                    RouteError::Configuration("status 200 url map has no content map".to_string())
                })?;
                counter!(ROUTE_RENDERED).increment(1);
                self.renderer
                    .render(&content_map.view, &content_map.options, parts)
                    .await
            }
            status @ (301 | 302) => {
                let target = resolved.redirect.as_ref().ok_or_else(|| {
                    RouteError::Configuration(format!(
                        "status {status} url map has no redirect target"
                    ))
                })?;
                counter!(ROUTE_REDIRECTED).increment(1);
                redirect(
                    status_code(status)?,
                    &redirect_url_with_query_string(&target.absolute_url(), query),
                )
            }
            404 => {
                counter!(ROUTE_NOT_FOUND).increment(1);
                Err(RouteError::NotFound)
            }
            status => {
                counter!(ROUTE_STATUS_ONLY).increment(1);
                match self.handlers.dispatch(status, parts, resolved) {
                    Some(result) => result,
                    None => Ok(Response::builder()
                        .status(status_code(status)?)
                        .body(empty_body())?),
                }
            }
        }
    }
}

fn status_code(status: u16) -> Result<StatusCode> {
    StatusCode::from_u16(status)
        .map_err(|_| RouteError::Configuration(format!("invalid status code {status}")))
}

fn redirect(status: StatusCode, location: &str) -> Result<RouteResponse> {
    Ok(Response::builder()
        .status(status)
        .header(LOCATION, location)
        .body(empty_body())?)
}

fn request_host(parts: &Parts) -> Option<String> {
    let host = match parts.uri.host() {
        Some(host) => host.to_string(),
        None => parts.headers.get(HOST)?.to_str().ok()?.to_string(),
    };
    // Strip port if present for comparison
    let host = host.split(':').next().unwrap_or(&host);
    Some(host.to_ascii_lowercase())
}
