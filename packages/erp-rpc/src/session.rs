//! Authenticated session against one database.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::connection::Connection;
use crate::error::RpcError;
use crate::{Context, Result};

/// Identity issued by the server at login.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Credentials {
    user_id: i64,
    token: String,
}

/// Authenticated connection to one database for one user.
///
/// The session is passed explicitly to every model and record call. When
/// the server rejects its token, the session logs in again with the
/// credentials it was opened with and retries the call once.
pub struct Session {
    connection: Arc<Connection>,
    database: String,
    login: String,
    password: String,
    context: Context,
    credentials: ArcSwap<Credentials>,
}

impl Session {
    /// Opens a session.
    ///
    /// # Arguments
    /// * `connection` - Server connection
    /// * `database` - Database to log into
    /// * `login` - User login
    /// * `password` - User password
    /// * `language` - Language stored in the session context
    pub async fn login(
        connection: Arc<Connection>,
        database: &str,
        login: &str,
        password: &str,
        language: &str,
    ) -> Result<Self> {
        let credentials = authenticate(&connection, database, login, password, language).await?;
        tracing::info!(
            "Logged into '{}' as '{}' (user {})",
            database,
            login,
            credentials.user_id
        );

        let mut context = Context::new();
        context.insert("language".to_string(), json!(language));

        Ok(Self {
            connection,
            database: database.to_string(),
            login: login.to_string(),
            password: password.to_string(),
            context,
            credentials: ArcSwap::from_pointee(credentials),
        })
    }

    /// Returns the database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Returns the user login.
    pub fn login_name(&self) -> &str {
        &self.login
    }

    /// Returns the id of the logged-in user.
    pub fn user_id(&self) -> i64 {
        self.credentials.load().user_id
    }

    /// Returns the session context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Returns the `Authorization` header value for the current credentials.
    pub fn authorization(&self) -> String {
        let credentials = self.credentials.load();
        authorization_header(&self.login, credentials.user_id, &credentials.token)
    }

    /// Issues an authenticated call, renewing the session once if rejected.
    pub async fn call(&self, method: &str, params: &[Value]) -> Result<Value> {
        let authorization = self.authorization();
        match self
            .connection
            .call(Some(&self.database), method, params, Some(&authorization))
            .await
        {
            Err(e) if e.is_unauthorized() => {
                tracing::warn!("Session for '{}' rejected, renewing credentials", self.login);
                self.renew().await?;
                let authorization = self.authorization();
                self.connection
                    .call(Some(&self.database), method, params, Some(&authorization))
                    .await
            }
            result => result,
        }
    }

    /// Calls `method` on `model` with the merged session and call context.
    pub async fn execute(
        &self,
        model: &str,
        method: &str,
        mut args: Vec<Value>,
        context: &Context,
    ) -> Result<Value> {
        let mut merged = self.context.clone();
        for (key, value) in context {
            merged.insert(key.clone(), value.clone());
        }
        args.push(Value::Object(merged));
        self.call(&format!("model.{}.{}", model, method), &args).await
    }

    /// Logs in again with the stored credentials.
    pub async fn renew(&self) -> Result<()> {
        let language = self
            .context
            .get("language")
            .and_then(Value::as_str)
            .unwrap_or("en_US");
        let credentials = authenticate(
            &self.connection,
            &self.database,
            &self.login,
            &self.password,
            language,
        )
        .await?;
        tracing::info!("Renewed session for '{}'", self.login);
        self.credentials.store(Arc::new(credentials));
        Ok(())
    }

    /// Closes the session on the server.
    pub async fn logout(&self) -> Result<()> {
        let authorization = self.authorization();
        self.connection
            .call(
                Some(&self.database),
                "common.db.logout",
                &[],
                Some(&authorization),
            )
            .await?;
        tracing::info!("Logged out of '{}'", self.database);
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("database", &self.database)
            .field("login", &self.login)
            .field("user_id", &self.user_id())
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Builds `Session base64(login:user_id:token)`.
pub fn authorization_header(login: &str, user_id: i64, token: &str) -> String {
    let raw = format!("{}:{}:{}", login, user_id, token);
    format!("Session {}", STANDARD.encode(raw))
}

async fn authenticate(
    connection: &Connection,
    database: &str,
    login: &str,
    password: &str,
    language: &str,
) -> Result<Credentials> {
    let result = connection
        .call(
            Some(database),
            "common.db.login",
            &[json!(login), json!({ "password": password }), json!(language)],
            None,
        )
        .await?;
    parse_login_result(&result)
}

fn parse_login_result(result: &Value) -> Result<Credentials> {
    let invalid = || RpcError::Protocol(format!("Unexpected login result: {}", result));
    let parts = result.as_array().ok_or_else(invalid)?;
    let user_id = parts.first().and_then(Value::as_i64).ok_or_else(invalid)?;
    let token = parts.get(1).and_then(Value::as_str).ok_or_else(invalid)?;
    Ok(Credentials {
        user_id,
        token: token.to_string(),
    })
}
