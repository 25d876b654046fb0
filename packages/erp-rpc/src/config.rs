//! Client configuration.

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the server (scheme, host and port)
    pub server_url: String,
    /// Timeout for a single HTTP request in milliseconds
    pub request_timeout_ms: u64,
    /// Language sent in the session context
    pub language: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_ms: 30000, // 30 seconds default
            language: "en_US".to_string(),
        }
    }
}
