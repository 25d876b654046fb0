//! HTTP connection to the server.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::config::ClientConfig;
use crate::error::RpcError;
use crate::protocol::{loggable_params, RpcRequest, RpcResponse};
use crate::Result;

/// Characters escaped in the database path segment.
const DATABASE_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_').remove(b'-').remove(b'.');

/// Unauthenticated connection to one server.
///
/// Database administration calls go through the connection directly;
/// model calls go through a [`crate::Session`] built on top of it.
#[derive(Debug)]
pub struct Connection {
    base_url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl Connection {
    /// Creates a connection from the client configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| RpcError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(&config.server_url, client))
    }

    /// Creates a connection from an existing HTTP client.
    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            next_id: AtomicU64::new(0),
        }
    }

    /// Returns the server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the endpoint URL for calls against `database`.
    pub fn endpoint(&self, database: Option<&str>) -> String {
        match database {
            Some(name) if !name.is_empty() => format!(
                "{}/{}/",
                self.base_url,
                utf8_percent_encode(name, DATABASE_SEGMENT)
            ),
            _ => format!("{}/", self.base_url),
        }
    }

    /// Issues one JSON-RPC call.
    ///
    /// # Arguments
    /// * `database` - Target database, `None` for server-level methods
    /// * `method` - Dotted method name
    /// * `params` - Positional arguments
    /// * `authorization` - Value of the `Authorization` header, if any
    ///
    /// # Returns
    /// The `result` member of the reply, or the mapped fault.
    pub async fn call(
        &self,
        database: Option<&str>,
        method: &str,
        params: &[Value],
        authorization: Option<&str>,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            "{}{}",
            method,
            serde_json::Value::Array(loggable_params(method, params))
        );

        let body = serde_json::to_vec(&RpcRequest { id, method, params })?;
        let mut request = self
            .client
            .post(self.endpoint(database))
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!("Failed to read {} rejection body: {}", method, e);
                    String::new()
                }
            };
            tracing::warn!("{} rejected with {}", method, status);
            return Err(RpcError::Unauthorized(if text.is_empty() {
                status.to_string()
            } else {
                text
            }));
        }
        if !status.is_success() {
            tracing::error!("{} failed with {}", method, status);
            return Err(RpcError::Http {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        let envelope: RpcResponse = serde_json::from_slice(&bytes)
            .map_err(|e| RpcError::Protocol(format!("Invalid response to {}: {}", method, e)))?;
        if let Some(reply_id) = envelope.id.as_ref().and_then(Value::as_u64) {
            if reply_id != id {
                return Err(RpcError::Protocol(format!(
                    "Response id {} does not match request id {}",
                    reply_id, id
                )));
            }
        }
        let result = envelope.into_result();
        match &result {
            Ok(value) => tracing::debug!("{} -> {}", method, value),
            Err(e) => tracing::debug!("{} -> {}", method, e),
        }
        result
    }

    /// Creates a database on the server.
    pub async fn create_database(
        &self,
        name: &str,
        password: &str,
        language: &str,
        admin_password: &str,
    ) -> Result<()> {
        self.call(
            None,
            "common.db.create",
            &[
                json!(name),
                json!(password),
                json!(language),
                json!(admin_password),
            ],
            None,
        )
        .await?;
        Ok(())
    }

    /// Lists the databases served.
    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let value = self.call(None, "common.db.list", &[], None).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Returns the server version string.
    pub async fn server_version(&self) -> Result<String> {
        let value = self.call(None, "common.server.version", &[], None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RpcError::Protocol(format!("Unexpected version payload: {}", value)))
    }
}
