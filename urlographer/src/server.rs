//! Hyper server loop wiring requests into the router, plus the sitemap
//! endpoint the host owns.

use std::convert::Infallible;
use std::sync::Arc;

use http::header::{CONTENT_TYPE, HOST};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpListener;

use crate::config::Listener;
use mapstore::MapService;
use router::{
    RequestContext, RouteError, RouteResponse, Router, SitemapProjector, force_cache_invalidation,
    full_body,
};

const SITEMAP_PATH: &str = "/sitemap.xml";

pub struct App {
    pub router: Router,
    pub projector: SitemapProjector,
    pub maps: Arc<MapService>,
    pub trust_forwarded_proto: bool,
}

pub async fn serve(listener: &Listener, app: Arc<App>) -> Result<(), std::io::Error> {
    let tcp = TcpListener::bind((listener.host.as_str(), listener.port)).await?;
    tracing::info!(host = %listener.host, port = listener.port, "listening");

    loop {
        let (stream, peer) = tcp.accept().await?;
        let io = TokioIo::new(stream);
        let app = app.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| handle(app.clone(), req));
            if let Err(err) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                .serve_connection(io, service)
                .await
            {
                tracing::warn!(peer = %peer, error = ?err, "error serving connection");
            }
        });
    }
}

async fn handle(app: Arc<App>, mut req: Request<Incoming>) -> Result<RouteResponse, Infallible> {
    let secure = app.trust_forwarded_proto
        && req
            .headers()
            .get("x-forwarded-proto")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.eq_ignore_ascii_case("https"));
    req.extensions_mut().insert(RequestContext { secure });

    if req.uri().path() == SITEMAP_PATH {
        return Ok(sitemap(&app, &req).await);
    }

    let response = match app.router.route(req).await {
        Ok(response) => response,
        Err(RouteError::NotFound) => plain(StatusCode::NOT_FOUND, "not found\n"),
        Err(error @ RouteError::Configuration(_)) => {
            tracing::error!(error = %error, "request hit a configuration error");
            plain(StatusCode::INTERNAL_SERVER_ERROR, "internal error\n")
        }
        Err(error) => {
            tracing::error!(error = %error, "routing failed");
            plain(StatusCode::INTERNAL_SERVER_ERROR, "internal error\n")
        }
    };
    Ok(response)
}

async fn sitemap(app: &App, req: &Request<Incoming>) -> RouteResponse {
    let Some(host) = req
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(':').next().unwrap_or(value).to_ascii_lowercase())
    else {
        return plain(StatusCode::NOT_FOUND, "not found\n");
    };
    let site = match app.maps.site_by_domain(&host).await {
        Ok(Some(site)) => site,
        Ok(None) => return plain(StatusCode::NOT_FOUND, "not found\n"),
        Err(error) => {
            tracing::error!(error = %error, "sitemap site lookup failed");
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "internal error\n");
        }
    };

    let force = force_cache_invalidation(req.headers());
    match app.projector.entries(&site, force).await {
        Ok(entries) => {
            let mut xml = String::from(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                 <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
            );
            for entry in entries.iter() {
                xml.push_str("  <url><loc>");
                xml.push_str(&entry.location);
                xml.push_str("</loc></url>\n");
            }
            xml.push_str("</urlset>\n");

            let mut response = Response::new(full_body(xml));
            response.headers_mut().insert(
                CONTENT_TYPE,
                http::HeaderValue::from_static("application/xml"),
            );
            response
        }
        Err(error) => {
            tracing::error!(error = %error, "sitemap projection failed");
            plain(StatusCode::INTERNAL_SERVER_ERROR, "internal error\n")
        }
    }
}

fn plain(status: StatusCode, body: &'static str) -> RouteResponse {
    let mut response = Response::new(full_body(body));
    *response.status_mut() = status;
    response
}
