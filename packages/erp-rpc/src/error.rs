//! Client error types.

use thiserror::Error;

/// Errors raised while talking to the server or manipulating records.
#[derive(Error, Debug, Clone)]
pub enum RpcError {
    /// Connection could not be established or the request failed in flight
    #[error("Transport error: {0}")]
    Transport(String),

    /// Server answered with a non-success HTTP status
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// Server rejected the session credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Server executed the call and returned a fault
    #[error("Server fault {kind}: {message}")]
    Server { kind: String, message: String },

    /// Response body did not follow the JSON-RPC envelope
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Field is not part of the model's descriptor mapping
    #[error("Field '{field}' not found in model '{model}'")]
    FieldNotFound { model: String, field: String },

    /// Value cannot be stored in the field
    #[error("Invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Operation requires a persisted record
    #[error("Record {id} of model '{model}' is not saved")]
    UnsavedRecord { model: String, id: i64 },
}

impl RpcError {
    /// Returns true if the error means the session must log in again.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RpcError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            RpcError::Http {
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            RpcError::Protocol(err.to_string())
        } else {
            RpcError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::Protocol(err.to_string())
    }
}
