//! Per-status-code response handlers.
//!
//! A handler can be registered in one of three shapes: a direct function, a
//! textual name resolved through the registry, or a handler object. Anything
//! else is unrepresentable, and name resolution happens when the registry is
//! built so a bad entry fails configuration load, not a live request.

use std::collections::HashMap;
use std::sync::Arc;

use http::request::Parts;
use thiserror::Error;

use crate::errors::{Result, RouteResponse};
use mapstore::ResolvedUrlMap;

pub type HandlerFn = Arc<dyn Fn(&Parts, &ResolvedUrlMap) -> Result<RouteResponse> + Send + Sync>;

/// A stateful handler object with a single invocation method.
pub trait StatusHandler: Send + Sync {
    fn handle(&self, request: &Parts, url_map: &ResolvedUrlMap) -> Result<RouteResponse>;
}

/// The closed set of shapes a configured handler may take.
#[derive(Clone)]
pub enum Handler {
    Func(HandlerFn),
    /// Resolved against the named-handler registry at build time.
    Named(String),
    Object(Arc<dyn StatusHandler>),
}

/// Status codes the routing state machine owns outright; a configured
/// handler for one of these could never run.
const RESERVED_STATUSES: &[u16] = &[200, 301, 302, 404];

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("status handler for {status} references unknown name {name:?}")]
    UnknownName { status: u16, name: String },

    #[error("{0} is not a valid status code for a handler")]
    InvalidStatus(u16),

    #[error("status {0} is handled by the router itself")]
    ReservedStatus(u16),
}

enum BoundHandler {
    Func(HandlerFn),
    Object(Arc<dyn StatusHandler>),
}

/// Validated mapping from status code to handler.
#[derive(Default)]
pub struct HandlerRegistry {
    by_status: HashMap<u16, BoundHandler>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("statuses", &self.by_status.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    /// Invokes the handler for this status, if one is configured.
    pub fn dispatch(
        &self,
        status: u16,
        request: &Parts,
        url_map: &ResolvedUrlMap,
    ) -> Option<Result<RouteResponse>> {
        match self.by_status.get(&status)? {
            BoundHandler::Func(func) => Some(func(request, url_map)),
            BoundHandler::Object(object) => Some(object.handle(request, url_map)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_status.is_empty()
    }
}

#[derive(Default)]
pub struct HandlerRegistryBuilder {
    named: HashMap<String, Arc<dyn StatusHandler>>,
    by_status: HashMap<u16, Handler>,
}

impl HandlerRegistryBuilder {
    /// Makes a handler object addressable by name from configuration.
    pub fn register_named<N>(mut self, name: N, handler: Arc<dyn StatusHandler>) -> Self
    where
        N: Into<String>,
    {
        self.named.insert(name.into(), handler);
        self
    }

    pub fn handler(mut self, status: u16, handler: Handler) -> Self {
        self.by_status.insert(status, handler);
        self
    }

    /// Resolves every named entry and rejects unusable status codes. This is
    /// the configuration-load boundary: nothing past it can fail dispatch.
    pub fn build(self) -> std::result::Result<HandlerRegistry, RegistryError> {
        let mut by_status = HashMap::new();
        for (status, handler) in self.by_status {
            if !(100..1000).contains(&status) {
                return Err(RegistryError::InvalidStatus(status));
            }
            if RESERVED_STATUSES.contains(&status) {
                return Err(RegistryError::ReservedStatus(status));
            }
            let bound = match handler {
                Handler::Func(func) => BoundHandler::Func(func),
                Handler::Object(object) => BoundHandler::Object(object),
                Handler::Named(name) => match self.named.get(&name) {
                    Some(object) => BoundHandler::Object(object.clone()),
                    None => return Err(RegistryError::UnknownName { status, name }),
                },
            };
            by_status.insert(status, bound);
        }
        Ok(HandlerRegistry { by_status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::full_body;
    use crate::testutils::{resolved_map, test_parts};
    use hyper::StatusCode;

    struct PaymentRequired;

    impl StatusHandler for PaymentRequired {
        fn handle(&self, _request: &Parts, _url_map: &ResolvedUrlMap) -> Result<RouteResponse> {
            Ok(hyper::Response::builder()
                .status(StatusCode::PAYMENT_REQUIRED)
                .body(full_body("payment required"))?)
        }
    }

    fn func_handler() -> Handler {
        Handler::Func(Arc::new(|_request, url_map| {
            Ok(hyper::Response::builder()
                .status(url_map.record.status_code)
                .body(full_body("modified content"))?)
        }))
    }

    #[test]
    fn test_dispatch_func() {
        let registry = HandlerRegistry::builder()
            .handler(206, func_handler())
            .build()
            .unwrap();
        let map = resolved_map(206);
        let response = registry
            .dispatch(206, &test_parts(), &map)
            .expect("handler configured")
            .unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    }

    #[test]
    fn test_dispatch_object_by_name() {
        let registry = HandlerRegistry::builder()
            .register_named("payment_required", Arc::new(PaymentRequired))
            .handler(402, Handler::Named("payment_required".to_string()))
            .build()
            .unwrap();
        let map = resolved_map(402);
        let response = registry
            .dispatch(402, &test_parts(), &map)
            .expect("handler configured")
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn test_unknown_name_fails_build() {
        let err = HandlerRegistry::builder()
            .handler(403, Handler::Named("missing".to_string()))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::UnknownName { status: 403, .. }
        ));
    }

    #[test]
    fn test_reserved_status_fails_build() {
        for status in [200, 301, 302, 404] {
            let err = HandlerRegistry::builder()
                .handler(status, func_handler())
                .build()
                .unwrap_err();
            assert!(matches!(err, RegistryError::ReservedStatus(_)));
        }
    }

    #[test]
    fn test_unconfigured_status_is_none() {
        let registry = HandlerRegistry::builder().build().unwrap();
        assert!(registry.is_empty());
        let map = resolved_map(410);
        assert!(registry.dispatch(410, &test_parts(), &map).is_none());
    }
}
