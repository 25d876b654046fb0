//! Request utilities for the JSON-RPC endpoint.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http_body_util::BodyExt;
use hyper::{body::Bytes, Request, Response};
use serde::Deserialize;
use serde_json::Value;
use tokio::time;

use crate::error::ServerError;
use crate::router::RouterError;

/// Incoming JSON-RPC call.
#[derive(Debug, Deserialize)]
pub struct RpcCall {
    /// Request id, echoed back
    #[serde(default)]
    pub id: Value,
    /// Dotted method name
    pub method: String,
    /// Positional arguments
    #[serde(default)]
    pub params: Vec<Value>,
}

/// Identity carried by the `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub login: String,
    pub user_id: i64,
    pub token: String,
}

/// Helper function to read request body with timeout
pub async fn read_request_body_with_timeout(
    req: Request<hyper::body::Incoming>,
    timeout_ms: u64,
) -> Result<Bytes, RouterError> {
    let timeout_duration = time::Duration::from_millis(timeout_ms);
    let body = time::timeout(timeout_duration, req.collect())
        .await
        .map_err(|_| RouterError::Timeout)?
        .map_err(|e| RouterError::InternalError(format!("Failed to read request body: {}", e)))?;
    Ok(body.to_bytes())
}

/// Helper to build HTTP response with proper error handling
pub fn build_response(status: u16, json: Vec<u8>) -> Result<Response<Bytes>, RouterError> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Bytes::from(json))
        .map_err(|e| RouterError::InternalError(format!("Failed to build response: {}", e)))
}

/// Parses `Session base64(login:user_id:token)`.
pub fn parse_authorization(header: &str) -> Result<SessionIdentity, RouterError> {
    let encoded = header
        .strip_prefix("Session ")
        .ok_or_else(|| RouterError::Unauthorized("Unsupported authorization scheme".to_string()))?;
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| RouterError::Unauthorized(format!("Invalid session encoding: {}", e)))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|e| RouterError::Unauthorized(format!("Invalid session encoding: {}", e)))?;

    let mut parts = decoded.rsplitn(3, ':');
    let (Some(token), Some(user_id), Some(login)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(RouterError::Unauthorized("Malformed session".to_string()));
    };
    let user_id = user_id
        .parse()
        .map_err(|_| RouterError::Unauthorized(format!("Invalid user id '{}'", user_id)))?;
    Ok(SessionIdentity {
        login: login.to_string(),
        user_id,
        token: token.to_string(),
    })
}

/// Splits the trailing context off the positional arguments.
///
/// The context is only removed when more than `arity` arguments were sent,
/// so an object argument in last position is never mistaken for it.
pub fn split_context(params: &[Value], arity: usize) -> &[Value] {
    match params.split_last() {
        Some((Value::Object(_), args)) if params.len() > arity => args,
        _ => params,
    }
}

/// Returns argument `index` as a string.
pub fn string_param<'a>(params: &'a [Value], index: usize, name: &str) -> Result<&'a str, ServerError> {
    params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| ServerError::InvalidParams(format!("'{}' must be a string", name)))
}

/// Returns argument `index` as a list of record ids.
pub fn ids_param(params: &[Value], index: usize) -> Result<Vec<i64>, ServerError> {
    let items = params
        .get(index)
        .and_then(Value::as_array)
        .ok_or_else(|| ServerError::InvalidParams("'ids' must be a list".to_string()))?;
    items
        .iter()
        .map(|item| {
            item.as_i64()
                .ok_or_else(|| ServerError::InvalidParams(format!("invalid id {}", item)))
        })
        .collect()
}

/// Returns argument `index` as a list of field names, empty when absent.
pub fn names_param(params: &[Value], index: usize) -> Result<Vec<String>, ServerError> {
    match params.get(index) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ServerError::InvalidParams(format!("invalid field name {}", item))
                })
            })
            .collect(),
        Some(other) => Err(ServerError::InvalidParams(format!(
            "field names must be a list, got {}",
            other
        ))),
    }
}

/// Returns argument `index` as an optional non-negative integer.
pub fn usize_param(params: &[Value], index: usize, name: &str) -> Result<Option<usize>, ServerError> {
    match params.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let n = value.as_u64().ok_or_else(|| {
                ServerError::InvalidParams(format!("'{}' must be an integer", name))
            })?;
            usize::try_from(n).map(Some).map_err(|_| {
                ServerError::InvalidParams(format!("'{}' is out of range: {}", name, n))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_authorization() {
        let header = format!("Session {}", STANDARD.encode("admin:1:abc"));
        assert_eq!(
            parse_authorization(&header).unwrap(),
            SessionIdentity {
                login: "admin".to_string(),
                user_id: 1,
                token: "abc".to_string(),
            }
        );

        let header = format!("Session {}", STANDARD.encode("with:colon:2:tok"));
        let identity = parse_authorization(&header).unwrap();
        assert_eq!(identity.login, "with:colon");
        assert_eq!(identity.user_id, 2);

        assert!(parse_authorization("Basic abc").is_err());
        assert!(parse_authorization("Session !!!").is_err());
        let header = format!("Session {}", STANDARD.encode("admin:x:abc"));
        assert!(parse_authorization(&header).is_err());
    }

    #[test]
    fn test_split_context() {
        let params = vec![json!([1]), json!({"name": "A"}), json!({"language": "en"})];
        assert_eq!(split_context(&params, 2).len(), 2);
        assert_eq!(split_context(&params[..2], 2).len(), 2);
        let params = vec![json!([1]), json!(["name"])];
        assert_eq!(split_context(&params, 1).len(), 2);

        let context_only = vec![json!({"language": "en_US"})];
        assert!(split_context(&context_only, 0).is_empty());
        let with_names = vec![json!(["name"]), json!({})];
        assert_eq!(split_context(&with_names, 0), &[json!(["name"])][..]);
    }

    #[test]
    fn test_param_helpers() {
        let params = vec![json!([1, 2]), json!(["name"]), json!(null), json!(5)];
        assert_eq!(ids_param(&params, 0).unwrap(), vec![1, 2]);
        assert_eq!(names_param(&params, 1).unwrap(), vec!["name".to_string()]);
        assert!(names_param(&params, 2).unwrap().is_empty());
        assert_eq!(usize_param(&params, 2, "limit").unwrap(), None);
        assert_eq!(usize_param(&params, 3, "limit").unwrap(), Some(5));
        assert!(usize_param(&[json!(-1)], 0, "offset").is_err());
        assert!(ids_param(&params, 1).is_err());
        assert!(string_param(&params, 0, "name").is_err());
    }
}
