//! Matchit routing configuration.

use std::sync::Arc;

use hyper::{body::Bytes, Request, Response};
use matchit::Router as MatchitRouter;
use percent_encoding::percent_decode_str;

use crate::config::MockServerConfig;
use crate::handlers;
use crate::store::Registry;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database registry
    pub registry: Arc<Registry>,
    /// Server configuration
    pub config: Arc<MockServerConfig>,
}

/// HTTP request router.
pub struct Router {
    inner: MatchitRouter<RouteHandler>,
    state: AppState,
}

impl Router {
    /// Creates a new router with the JSON-RPC routes.
    pub fn new(registry: Arc<Registry>, config: Arc<MockServerConfig>) -> Self {
        let mut router = MatchitRouter::new();

        // Server-level methods
        router
            .insert("/", RouteHandler::Server)
            .expect("Failed to insert / route");

        // Database-level methods
        router
            .insert("/{database}", RouteHandler::Database)
            .expect("Failed to insert /{database} route");
        router
            .insert("/{database}/", RouteHandler::Database)
            .expect("Failed to insert /{database}/ route");

        Self {
            inner: router,
            state: AppState { registry, config },
        }
    }

    /// Returns the shared state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Routes an incoming request to the appropriate handler.
    ///
    /// # Arguments
    /// * `req` - HTTP request
    ///
    /// # Returns
    /// `Result<Response<Bytes>, RouterError>` containing the response or an error.
    pub async fn route(
        &self,
        req: Request<hyper::body::Incoming>,
    ) -> Result<Response<Bytes>, RouterError> {
        let path = req.uri().path().to_string();

        match self.inner.at(&path) {
            Ok(matched) => {
                if req.method() != hyper::Method::POST {
                    return Err(RouterError::MethodNotAllowed);
                }
                let database = match matched.value {
                    RouteHandler::Server => None,
                    RouteHandler::Database => matched
                        .params
                        .get("database")
                        .map(|raw| percent_decode_str(raw).decode_utf8_lossy().into_owned()),
                };
                handlers::rpc(req, database, self.state.clone()).await
            }
            Err(_) => Err(RouterError::NotFound(format!("No route found for {}", path))),
        }
    }
}

/// Route handler kind.
enum RouteHandler {
    Server,
    Database,
}

/// Router error type.
#[derive(Debug)]
pub enum RouterError {
    MethodNotAllowed,
    InternalError(String),
    Timeout,
    BadRequest(String),
    NotFound(String),
    Unauthorized(String),
}

impl std::fmt::Display for RouterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouterError::MethodNotAllowed => write!(f, "Method Not Allowed"),
            RouterError::InternalError(msg) => write!(f, "Internal Error: {}", msg),
            RouterError::Timeout => write!(f, "Request Timeout"),
            RouterError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            RouterError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            RouterError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
        }
    }
}

impl std::error::Error for RouterError {}

impl From<RouterError> for Response<Bytes> {
    fn from(err: RouterError) -> Self {
        let (status, message) = match &err {
            RouterError::MethodNotAllowed => (405, "Method Not Allowed"),
            RouterError::InternalError(msg) => (500, msg.as_str()),
            RouterError::Timeout => (408, "Request Timeout"),
            RouterError::BadRequest(msg) => (400, msg.as_str()),
            RouterError::NotFound(msg) => (404, msg.as_str()),
            RouterError::Unauthorized(msg) => (401, msg.as_str()),
        };

        let error_response = handlers::error_response(status, message.to_string(), None);
        let body = serde_json::to_vec(&error_response).unwrap_or_else(|e| {
            format!(
                "{{\"success\":false,\"error\":{{\"code\":\"500\",\"message\":\"Failed to serialize error: {}\"}}}}",
                e
            )
            .into_bytes()
        });

        let mut response = Response::new(Bytes::from(body));
        *response.status_mut() =
            hyper::StatusCode::from_u16(status).unwrap_or(hyper::StatusCode::INTERNAL_SERVER_ERROR);
        response.headers_mut().insert(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static("application/json"),
        );
        response
    }
}
