//! Mock server configuration.

/// Mock server configuration.
#[derive(Debug, Clone)]
pub struct MockServerConfig {
    /// Request body read timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Version string returned by `common.server.version`
    pub version: String,
    /// Language used when a database is created without one
    pub default_language: String,
    /// Server administration password checked by `common.db.create`
    pub super_password: String,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5000, // 5 seconds default
            version: env!("CARGO_PKG_VERSION").to_string(),
            default_language: "en_US".to_string(),
            super_password: "admin".to_string(),
        }
    }
}
