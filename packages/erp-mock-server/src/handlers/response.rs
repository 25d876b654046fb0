//! Reply envelopes.

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ServerError;

/// JSON-RPC reply.
#[derive(Debug, Serialize)]
pub struct RpcReply {
    /// Echo of the request id
    pub id: Value,
    /// Call result, absent on faults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Fault as `[kind, [message]]`, absent on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

/// Helper to create a success reply
pub fn success_reply(id: Value, result: Value) -> RpcReply {
    RpcReply {
        id,
        result: Some(result),
        error: None,
    }
}

/// Helper to create a fault reply
pub fn fault_reply(id: Value, fault: &ServerError) -> RpcReply {
    RpcReply {
        id,
        result: None,
        error: Some(json!([fault.kind(), [fault.to_string()]])),
    }
}

/// Consistent HTTP error wrapper for requests rejected before dispatch
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always false for error responses
    pub success: bool,
    /// Error information
    pub error: ApiError,
}

/// HTTP error details
#[derive(Debug, Serialize)]
pub struct ApiError {
    /// Error code (HTTP status code as string)
    pub code: String,
    /// Error message
    pub message: String,
    /// Optional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Helper to create error response
pub fn error_response(code: u16, message: String, details: Option<String>) -> ErrorResponse {
    ErrorResponse {
        success: false,
        error: ApiError {
            code: code.to_string(),
            message,
            details,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_reply_shape() {
        let reply = fault_reply(json!(4), &ServerError::LoginFailed);
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"id": 4, "error": ["LoginException", ["Bad login or password"]]})
        );
    }

    #[test]
    fn test_success_reply_shape() {
        let reply = success_reply(json!(1), json!([3]));
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"id": 1, "result": [3]})
        );
    }
}
