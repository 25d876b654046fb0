//! Scenario configuration.

use erp_rpc::ClientConfig;

/// Scenario configuration.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Base URL of the server under test
    pub server_url: String,
    /// Login used for the session
    pub login: String,
    /// Password used for the session
    pub password: String,
    /// Password of the `admin` user of the new database
    pub admin_password: String,
    /// Language of the new database and of the session context
    pub language: String,
    /// Database to create (`test_<epoch-ms>` when unset)
    pub database: Option<String>,
    /// Timeout for a single HTTP request in milliseconds
    pub request_timeout_ms: u64,
    /// Close the session once the scenario is over
    pub logout_on_finish: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".to_string(),
            login: "admin".to_string(),
            password: "admin".to_string(),
            admin_password: "admin".to_string(),
            language: "en_US".to_string(),
            database: None,
            request_timeout_ms: 30000, // 30 seconds default
            logout_on_finish: true,
        }
    }
}

impl ScenarioConfig {
    /// Returns the database name, generating a timestamped one if unset.
    pub fn database_name(&self) -> String {
        match &self.database {
            Some(name) => name.clone(),
            None => format!("test_{}", chrono::Utc::now().timestamp_millis()),
        }
    }

    /// Returns the client configuration derived from the scenario settings.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server_url: self.server_url.clone(),
            request_timeout_ms: self.request_timeout_ms,
            language: self.language.clone(),
        }
    }
}
