//! In-memory registry of databases, models and sessions.

mod domain;
mod table;

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use serde_json::{json, Value};

use crate::error::ServerError;

pub use domain::{parse_domain, DomainNode};
pub use table::ModelTable;

/// Model holding the users able to log in.
pub const USER_MODEL: &str = "res.user";

/// One provisioned database.
#[derive(Debug)]
pub struct Database {
    name: String,
    language: String,
    models: BTreeMap<String, ModelTable>,
    sessions: HashMap<String, i64>,
}

impl Database {
    fn new(name: &str, language: &str, admin_password: &str) -> Result<Self, ServerError> {
        let mut users = user_model();
        users.create(&[json!({
            "name": "Administrator",
            "login": "admin",
            "password": admin_password,
            "language": language,
        })])?;

        let mut models = BTreeMap::new();
        models.insert(USER_MODEL.to_string(), users);
        Ok(Self {
            name: name.to_string(),
            language: language.to_string(),
            models,
            sessions: HashMap::new(),
        })
    }

    /// Returns the database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the language the database was created with.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Returns the model table `name`.
    pub fn model(&self, name: &str) -> Result<&ModelTable, ServerError> {
        self.models
            .get(name)
            .ok_or_else(|| ServerError::ModelNotFound(name.to_string()))
    }

    /// Returns the model table `name` for modification.
    pub fn model_mut(&mut self, name: &str) -> Result<&mut ModelTable, ServerError> {
        self.models
            .get_mut(name)
            .ok_or_else(|| ServerError::ModelNotFound(name.to_string()))
    }

    /// Registers an additional model.
    pub fn add_model(&mut self, table: ModelTable) {
        self.models.insert(table.name().to_string(), table);
    }
}

/// Field definitions of the user model.
fn user_model() -> ModelTable {
    ModelTable::new(USER_MODEL)
        .with_field(
            "name",
            json!({"type": "char", "string": "Name", "required": true}),
        )
        .with_field(
            "login",
            json!({"type": "char", "string": "Login", "required": true, "size": 64}),
        )
        .with_field("password", json!({"type": "char", "string": "Password"}))
        .with_field("email", json!({"type": "char", "string": "Email"}))
        .with_field("active", json!({"type": "boolean", "string": "Active"}))
        .with_field("language", json!({"type": "char", "string": "Language"}))
        .with_default("active", json!(true))
        .with_unique("login")
        .with_write_only("password")
}

/// Registry of every database served.
#[derive(Debug)]
pub struct Registry {
    super_password: String,
    databases: RwLock<HashMap<String, Database>>,
}

impl Registry {
    /// Creates an empty registry guarded by `super_password`.
    pub fn new(super_password: &str) -> Self {
        Self {
            super_password: super_password.to_string(),
            databases: RwLock::new(HashMap::new()),
        }
    }

    /// Provisions a database with an `admin` user.
    ///
    /// # Arguments
    /// * `name` - Database name
    /// * `password` - Server administration password
    /// * `language` - Default language of the database
    /// * `admin_password` - Password of the `admin` user
    pub fn create_database(
        &self,
        name: &str,
        password: &str,
        language: &str,
        admin_password: &str,
    ) -> Result<(), ServerError> {
        if password != self.super_password {
            return Err(ServerError::AccessDenied);
        }
        if name.is_empty() {
            return Err(ServerError::InvalidParams(
                "database name must not be empty".to_string(),
            ));
        }
        let mut databases = self.databases.write();
        if databases.contains_key(name) {
            return Err(ServerError::DatabaseExists(name.to_string()));
        }
        databases.insert(
            name.to_string(),
            Database::new(name, language, admin_password)?,
        );
        tracing::info!("Created database '{}'", name);
        Ok(())
    }

    /// Drops a database.
    pub fn drop_database(&self, name: &str, password: &str) -> Result<(), ServerError> {
        if password != self.super_password {
            return Err(ServerError::AccessDenied);
        }
        self.databases
            .write()
            .remove(name)
            .map(|_| tracing::info!("Dropped database '{}'", name))
            .ok_or_else(|| ServerError::DatabaseNotFound(name.to_string()))
    }

    /// Returns the database names in lexical order.
    pub fn list_databases(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Checks a login and opens a session.
    ///
    /// # Returns
    /// The user id and the session token.
    pub fn login(
        &self,
        database: &str,
        login: &str,
        password: &str,
    ) -> Result<(i64, String), ServerError> {
        let mut databases = self.databases.write();
        let db = databases
            .get_mut(database)
            .ok_or_else(|| ServerError::DatabaseNotFound(database.to_string()))?;

        let users = db.model(USER_MODEL)?;
        let candidates = users.search(
            &json!([["login", "=", login], ["active", "=", true]]),
            0,
            Some(1),
            &Value::Null,
        )?;
        let user_id = candidates
            .first()
            .copied()
            .filter(|id| {
                users
                    .get(*id)
                    .and_then(|user| user.get("password"))
                    .and_then(Value::as_str)
                    == Some(password)
            })
            .ok_or(ServerError::LoginFailed)?;

        let token = hex::encode(rand::random::<[u8; 16]>());
        db.sessions.insert(token.clone(), user_id);
        tracing::info!("User {} logged into '{}'", user_id, database);
        Ok((user_id, token))
    }

    /// Closes a session.
    pub fn logout(&self, database: &str, token: &str) {
        if let Some(db) = self.databases.write().get_mut(database) {
            db.sessions.remove(token);
        }
    }

    /// Returns true if `token` is an open session of `user_id` on `database`.
    pub fn check_session(&self, database: &str, user_id: i64, token: &str) -> bool {
        self.databases
            .read()
            .get(database)
            .and_then(|db| db.sessions.get(token))
            .is_some_and(|owner| *owner == user_id)
    }

    /// Invalidates every open session of every database.
    pub fn expire_sessions(&self) {
        for db in self.databases.write().values_mut() {
            db.sessions.clear();
        }
        tracing::info!("Expired all sessions");
    }

    /// Runs `f` with read access to `database`.
    pub fn with_database<R>(
        &self,
        database: &str,
        f: impl FnOnce(&Database) -> Result<R, ServerError>,
    ) -> Result<R, ServerError> {
        let databases = self.databases.read();
        let db = databases
            .get(database)
            .ok_or_else(|| ServerError::DatabaseNotFound(database.to_string()))?;
        f(db)
    }

    /// Runs `f` with write access to `database`.
    pub fn with_database_mut<R>(
        &self,
        database: &str,
        f: impl FnOnce(&mut Database) -> Result<R, ServerError>,
    ) -> Result<R, ServerError> {
        let mut databases = self.databases.write();
        let db = databases
            .get_mut(database)
            .ok_or_else(|| ServerError::DatabaseNotFound(database.to_string()))?;
        f(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_database_seeds_admin() {
        let registry = Registry::new("admin");
        registry
            .create_database("test_1", "admin", "en_US", "secret")
            .unwrap();

        assert_eq!(registry.list_databases(), vec!["test_1".to_string()]);
        assert_eq!(
            registry.create_database("test_1", "admin", "en_US", "secret"),
            Err(ServerError::DatabaseExists("test_1".to_string()))
        );
        assert_eq!(
            registry.create_database("test_2", "wrong", "en_US", "secret"),
            Err(ServerError::AccessDenied)
        );

        let (user_id, token) = registry.login("test_1", "admin", "secret").unwrap();
        assert_eq!(user_id, 1);
        assert_eq!(token.len(), 32);
        assert!(registry.check_session("test_1", user_id, &token));
        assert!(!registry.check_session("test_1", user_id + 1, &token));
    }

    #[test]
    fn test_login_failures() {
        let registry = Registry::new("admin");
        registry
            .create_database("db", "admin", "en_US", "secret")
            .unwrap();
        assert_eq!(
            registry.login("db", "admin", "nope"),
            Err(ServerError::LoginFailed)
        );
        assert_eq!(
            registry.login("db", "ghost", "secret"),
            Err(ServerError::LoginFailed)
        );
        assert_eq!(
            registry.login("other", "admin", "secret"),
            Err(ServerError::DatabaseNotFound("other".to_string()))
        );
    }

    #[test]
    fn test_sessions_expire_and_logout() {
        let registry = Registry::new("admin");
        registry
            .create_database("db", "admin", "en_US", "secret")
            .unwrap();
        let (user_id, first) = registry.login("db", "admin", "secret").unwrap();
        let (_, second) = registry.login("db", "admin", "secret").unwrap();

        registry.logout("db", &first);
        assert!(!registry.check_session("db", user_id, &first));
        assert!(registry.check_session("db", user_id, &second));

        registry.expire_sessions();
        assert!(!registry.check_session("db", user_id, &second));
    }

    #[test]
    fn test_additional_model() {
        let registry = Registry::new("admin");
        registry
            .create_database("db", "admin", "fr", "secret")
            .unwrap();

        registry
            .with_database_mut("db", |db| {
                assert_eq!(db.name(), "db");
                assert_eq!(db.language(), "fr");
                db.add_model(ModelTable::new("res.group").with_field(
                    "name",
                    json!({"type": "char", "string": "Name", "required": true}),
                ));
                db.model_mut("res.group")?.create(&[json!({"name": "Admins"})])
            })
            .unwrap();

        let found = registry
            .with_database("db", |db| {
                db.model("res.group")?
                    .search(&json!([["name", "=", "Admins"]]), 0, None, &Value::Null)
            })
            .unwrap();
        assert_eq!(found, vec![1]);
        assert_eq!(
            registry.with_database("db", |db| db.model("res.partner").map(|_| ())),
            Err(ServerError::ModelNotFound("res.partner".to_string()))
        );
    }

    #[test]
    fn test_drop_database() {
        let registry = Registry::new("admin");
        registry
            .create_database("db", "admin", "en_US", "secret")
            .unwrap();
        assert_eq!(
            registry.drop_database("db", "wrong"),
            Err(ServerError::AccessDenied)
        );
        registry.drop_database("db", "admin").unwrap();
        assert!(registry.list_databases().is_empty());
        assert!(registry.drop_database("db", "admin").is_err());
    }
}
