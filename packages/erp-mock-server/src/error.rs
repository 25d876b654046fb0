//! Server-side fault types.

use thiserror::Error;

/// Faults raised while executing a JSON-RPC method.
///
/// Every fault is sent back in the reply's `error` member as
/// `[kind, [message]]`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServerError {
    /// Database already exists
    #[error("Database '{0}' already exists")]
    DatabaseExists(String),

    /// Database not found
    #[error("Database '{0}' not found")]
    DatabaseNotFound(String),

    /// Administration password mismatch
    #[error("Wrong administration password")]
    AccessDenied,

    /// Login or password mismatch
    #[error("Bad login or password")]
    LoginFailed,

    /// Model not registered in the database
    #[error("Model '{0}' not found")]
    ModelNotFound(String),

    /// Method not served
    #[error("Method '{0}' not found")]
    MethodNotFound(String),

    /// Field not part of the model
    #[error("Field '{field}' not found in model '{model}'")]
    FieldNotFound { model: String, field: String },

    /// Record id not present
    #[error("Record {id} of model '{model}' not found")]
    RecordNotFound { model: String, id: i64 },

    /// Required field left empty on create
    #[error("Field '{field}' of model '{model}' is required")]
    RequiredField { model: String, field: String },

    /// Readonly field written
    #[error("Field '{field}' of model '{model}' is readonly")]
    ReadonlyField { model: String, field: String },

    /// Unique constraint violated
    #[error("Value of '{field}' in model '{model}' must be unique")]
    UniqueViolation { model: String, field: String },

    /// Malformed positional arguments
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Malformed search domain
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
}

impl ServerError {
    /// Returns the fault kind sent to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::DatabaseExists(_) | ServerError::DatabaseNotFound(_) => {
                "DatabaseOperationalError"
            }
            ServerError::AccessDenied => "AccessError",
            ServerError::LoginFailed => "LoginException",
            ServerError::ModelNotFound(_)
            | ServerError::MethodNotFound(_)
            | ServerError::FieldNotFound { .. }
            | ServerError::InvalidParams(_)
            | ServerError::InvalidDomain(_) => "ValueError",
            ServerError::RecordNotFound { .. }
            | ServerError::RequiredField { .. }
            | ServerError::ReadonlyField { .. }
            | ServerError::UniqueViolation { .. } => "UserError",
        }
    }
}
