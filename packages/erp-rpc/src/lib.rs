//! JSON-RPC client for business-application servers.
//!
//! Provides the connection and wire protocol, authenticated sessions,
//! model handles with field introspection, client-side records and
//! domain filters.

pub mod config;
pub mod connection;
pub mod domain;
pub mod error;
pub mod field;
pub mod model;
pub mod protocol;
pub mod record;
pub mod session;

pub use config::ClientConfig;
pub use connection::Connection;
pub use domain::{Domain, Operator};
pub use error::RpcError;
pub use field::{Field, FieldDescriptor, FieldType};
pub use model::Model;
pub use record::Record;
pub use session::Session;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, RpcError>;

/// Request context sent as the trailing argument of every model call
pub type Context = serde_json::Map<String, serde_json::Value>;
