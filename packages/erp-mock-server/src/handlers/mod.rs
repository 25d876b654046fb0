//! JSON-RPC endpoint: envelope decoding, authentication and dispatch.

pub mod common_handlers;
pub mod model_handlers;
pub mod request_utils;
pub mod response;

use hyper::header::AUTHORIZATION;
use hyper::{body::Bytes, Request, Response};
use serde_json::Value;

use crate::error::ServerError;
use crate::router::{AppState, RouterError};

use self::request_utils::{
    build_response, parse_authorization, read_request_body_with_timeout, RpcCall,
};
use self::response::{fault_reply, success_reply};

pub use self::response::error_response;

/// Executes one JSON-RPC call.
///
/// # Endpoint
/// `POST /` for server-level methods, `POST /{database}/` for everything else.
///
/// # Request Body
/// ```json
/// {"id": 1, "method": "model.res.user.read", "params": [[1], ["name"], {}]}
/// ```
///
/// # Response
/// - **200 OK**: `{"id": 1, "result": ...}` or `{"id": 1, "error": [kind, [message]]}`
///
/// # Errors
/// - **400 Bad Request**: Body is not a JSON-RPC call
/// - **401 Unauthorized**: Missing, malformed or expired session
/// - **408 Request Timeout**: Body not received in time
pub async fn rpc(
    req: Request<hyper::body::Incoming>,
    database: Option<String>,
    state: AppState,
) -> Result<Response<Bytes>, RouterError> {
    let identity = req
        .headers()
        .get(AUTHORIZATION)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| RouterError::Unauthorized("Invalid authorization header".to_string()))
                .and_then(parse_authorization)
        })
        .transpose()?;

    let body_bytes = read_request_body_with_timeout(req, state.config.request_timeout_ms).await?;
    let call: RpcCall = serde_json::from_slice(&body_bytes)
        .map_err(|e| RouterError::BadRequest(format!("Failed to parse JSON-RPC call: {}", e)))?;
    tracing::debug!(
        "{} on {} (id {})",
        call.method,
        database.as_deref().unwrap_or("<server>"),
        call.id
    );

    let outcome = dispatch(
        &call.method,
        &call.params,
        database.as_deref(),
        identity.as_ref(),
        &state,
    )?;
    let reply = match outcome {
        Ok(result) => success_reply(call.id, result),
        Err(fault) => {
            tracing::warn!("{} failed: {}", call.method, fault);
            fault_reply(call.id, &fault)
        }
    };

    let json = serde_json::to_vec(&reply)
        .map_err(|e| RouterError::InternalError(format!("Failed to serialize reply: {}", e)))?;
    build_response(200, json)
}

/// Routes a call to the common or model handlers.
///
/// The outer error rejects the HTTP request; the inner one is a fault
/// reported in the reply.
fn dispatch(
    method: &str,
    params: &[Value],
    database: Option<&str>,
    identity: Option<&request_utils::SessionIdentity>,
    state: &AppState,
) -> Result<Result<Value, ServerError>, RouterError> {
    if method.starts_with("common.") {
        return common_handlers::common(method, params, database, identity, state);
    }

    let Some(path) = method.strip_prefix("model.") else {
        return Ok(Err(ServerError::MethodNotFound(method.to_string())));
    };
    let Some((model, model_method)) = path.rsplit_once('.') else {
        return Ok(Err(ServerError::MethodNotFound(method.to_string())));
    };
    let (database, _identity) = common_handlers::require_session(database, identity, state)?;
    Ok(model_handlers::execute(
        database,
        model,
        model_method,
        params,
        state,
    ))
}
