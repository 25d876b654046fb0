//! JSON-RPC envelope exchanged with the server.
//!
//! Requests are `{"id", "method", "params"}` objects. Responses carry
//! either `result` or `error`; an error is a bare string or a
//! `[kind, args]` pair.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

/// Placeholder written to logs instead of secrets.
const MASK: &str = "xxxxxxxxxx";

/// Outgoing JSON-RPC call.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    /// Request sequence number
    pub id: u64,
    /// Dotted method name (e.g. `model.res.user.read`)
    pub method: &'a str,
    /// Positional arguments
    pub params: &'a [Value],
}

/// Incoming JSON-RPC reply.
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    /// Echo of the request id
    #[serde(default)]
    pub id: Option<Value>,
    /// Call result
    #[serde(default)]
    pub result: Option<Value>,
    /// Server fault
    #[serde(default)]
    pub error: Option<Value>,
}

impl RpcResponse {
    /// Converts the envelope into the call result or the server fault.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.error {
            Some(Value::Null) | None => Ok(self.result.unwrap_or(Value::Null)),
            Some(error) => Err(parse_fault(&error)),
        }
    }
}

/// Maps a fault payload to a server error.
pub fn parse_fault(error: &Value) -> RpcError {
    match error {
        Value::String(message) => RpcError::Server {
            kind: "Error".to_string(),
            message: message.clone(),
        },
        Value::Array(parts) => {
            let kind = parts
                .first()
                .and_then(Value::as_str)
                .unwrap_or("Error")
                .to_string();
            let message = match parts.get(1) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Array(args)) => args
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(": "),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            RpcError::Server { kind, message }
        }
        other => RpcError::Server {
            kind: "Error".to_string(),
            message: other.to_string(),
        },
    }
}

/// Returns a copy of the arguments safe to write to the log.
///
/// Passwords of the database administration and login calls are replaced.
pub fn loggable_params(method: &str, params: &[Value]) -> Vec<Value> {
    let mut params = params.to_vec();
    match method {
        "common.db.create" => {
            for index in [1, 3] {
                if let Some(slot) = params.get_mut(index) {
                    *slot = Value::String(MASK.to_string());
                }
            }
        }
        "common.db.login" => {
            if let Some(Value::Object(parameters)) = params.get_mut(1) {
                if let Some(password) = parameters.get_mut("password") {
                    *password = Value::String(MASK.to_string());
                }
            }
        }
        "common.db.drop" => {
            if let Some(slot) = params.get_mut(1) {
                *slot = Value::String(MASK.to_string());
            }
        }
        _ => {}
    }
    params
}
