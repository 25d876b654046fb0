//! In-process JSON-RPC business-application server.
//!
//! Serves the database administration, login and model methods used by
//! CRUD clients, backed by an in-memory registry of databases.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod store;

pub use config::MockServerConfig;
pub use error::ServerError;
pub use server::{MockServer, MockServerHandle};
pub use store::Registry;
