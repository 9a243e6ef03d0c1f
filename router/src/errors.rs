use http_body_util::combinators::BoxBody;
use hyper::Response;
use hyper::body::Bytes;
use thiserror::Error;

use mapstore::StoreError;

/// Result type alias for router operations
pub type Result<T, E = RouteError> = std::result::Result<T, E>;

/// Response type produced by every routing outcome.
pub type RouteResponse = Response<BoxBody<Bytes, RouteError>>;

/// Errors that can occur while routing a request
#[derive(Debug, Error)]
pub enum RouteError {
    /// No url map matches, or the matched map is an explicit not-found.
    /// Mapped to the host's 404 handling; never cached.
    #[error("no url map matches the requested path")]
    NotFound,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("render error: {0}")]
    Render(String),

    #[error("failed to build response: {0}")]
    Http(#[from] http::Error),
}
