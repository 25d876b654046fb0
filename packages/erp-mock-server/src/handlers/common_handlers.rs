//! Server-level methods: version, database administration, login.

use serde_json::{json, Value};

use crate::error::ServerError;
use crate::router::{AppState, RouterError};

use super::request_utils::{string_param, SessionIdentity};

/// Executes a `common.*` method.
///
/// # Methods
/// - `common.server.version()` → version string
/// - `common.db.list()` → database names
/// - `common.db.create(name, password, language, admin_password)` → `true`
/// - `common.db.drop(name, password)` → `true`
/// - `common.db.login(login, {"password": ...}, language)` → `[user_id, token]`
/// - `common.db.logout()` → `null` (authenticated)
pub fn common(
    method: &str,
    params: &[Value],
    database: Option<&str>,
    identity: Option<&SessionIdentity>,
    state: &AppState,
) -> Result<Result<Value, ServerError>, RouterError> {
    let result = match method {
        "common.server.version" => Ok(json!(state.config.version)),
        "common.db.list" => Ok(json!(state.registry.list_databases())),
        "common.db.create" => create_database(params, state),
        "common.db.drop" => drop_database(params, state),
        "common.db.login" => {
            let database = database.ok_or_else(|| {
                RouterError::BadRequest("common.db.login requires a database".to_string())
            })?;
            login(params, database, state)
        }
        "common.db.logout" => {
            let (database, identity) = require_session(database, identity, state)?;
            state.registry.logout(database, &identity.token);
            Ok(Value::Null)
        }
        other => Err(ServerError::MethodNotFound(other.to_string())),
    };
    Ok(result)
}

fn create_database(params: &[Value], state: &AppState) -> Result<Value, ServerError> {
    let name = string_param(params, 0, "database")?;
    let password = string_param(params, 1, "password")?;
    let language = params
        .get(2)
        .and_then(Value::as_str)
        .unwrap_or(&state.config.default_language);
    let admin_password = string_param(params, 3, "admin_password")?;
    state
        .registry
        .create_database(name, password, language, admin_password)?;
    Ok(json!(true))
}

fn drop_database(params: &[Value], state: &AppState) -> Result<Value, ServerError> {
    let name = string_param(params, 0, "database")?;
    let password = string_param(params, 1, "password")?;
    state.registry.drop_database(name, password)?;
    Ok(json!(true))
}

fn login(params: &[Value], database: &str, state: &AppState) -> Result<Value, ServerError> {
    let login = string_param(params, 0, "login")?;
    let password = params
        .get(1)
        .and_then(|parameters| parameters.get("password"))
        .and_then(Value::as_str)
        .ok_or(ServerError::LoginFailed)?;
    let (user_id, token) = state.registry.login(database, login, password)?;
    Ok(json!([user_id, token]))
}

/// Checks that the request carries an open session of `database`.
pub fn require_session<'a>(
    database: Option<&'a str>,
    identity: Option<&'a SessionIdentity>,
    state: &AppState,
) -> Result<(&'a str, &'a SessionIdentity), RouterError> {
    let database = database
        .ok_or_else(|| RouterError::BadRequest("Method requires a database".to_string()))?;
    let identity =
        identity.ok_or_else(|| RouterError::Unauthorized("Missing session".to_string()))?;
    if !state
        .registry
        .check_session(database, identity.user_id, &identity.token)
    {
        return Err(RouterError::Unauthorized(format!(
            "Invalid session for '{}'",
            identity.login
        )));
    }
    Ok((database, identity))
}
