//! Client-side records.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Map, Value};

use crate::error::RpcError;
use crate::session::Session;
use crate::{Context, Result};

/// In-memory representation of one remote entity instance.
///
/// An unsaved record carries a negative id handed out by its model; a
/// successful save replaces it with the id assigned by the server.
#[derive(Debug, Clone)]
pub struct Record {
    model: String,
    id: i64,
    values: BTreeMap<String, Value>,
    modified: BTreeSet<String>,
    loaded: BTreeSet<String>,
}

impl Record {
    pub(crate) fn new(model: &str, id: i64) -> Self {
        Self {
            model: model.to_string(),
            id,
            values: BTreeMap::new(),
            modified: BTreeSet::new(),
            loaded: BTreeSet::new(),
        }
    }

    /// Returns the name of the record's model.
    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Returns the record id (negative while unsaved).
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Returns true once the record exists on the server.
    pub fn is_saved(&self) -> bool {
        self.id >= 0
    }

    /// Returns the client-side value of `field`.
    pub fn get_client(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Returns true if `field` was loaded from the server since the last change.
    pub fn is_loaded(&self, field: &str) -> bool {
        self.loaded.contains(field)
    }

    /// Returns the fields changed client-side since the last save.
    pub fn modified_fields(&self) -> impl Iterator<Item = &str> {
        self.modified.iter().map(String::as_str)
    }

    pub(crate) fn set_modified(&mut self, field: &str, value: Value) {
        self.values.insert(field.to_string(), value);
        self.modified.insert(field.to_string());
        self.loaded.remove(field);
    }

    fn modified_values(&self) -> Map<String, Value> {
        self.modified
            .iter()
            .filter_map(|name| self.values.get(name).map(|v| (name.clone(), v.clone())))
            .collect()
    }

    /// Persists the record.
    ///
    /// Unsaved records are created; saved records write the fields modified
    /// since the last save. Nothing is sent when a saved record is unchanged.
    pub async fn save(&mut self, session: &Session) -> Result<()> {
        let values = self.modified_values();
        if !self.is_saved() {
            let result = session
                .execute(
                    &self.model,
                    "create",
                    vec![json!([values])],
                    &Context::new(),
                )
                .await?;
            let id = result
                .as_array()
                .and_then(|ids| ids.first())
                .and_then(Value::as_i64)
                .ok_or_else(|| {
                    RpcError::Protocol(format!("Unexpected create result: {}", result))
                })?;
            tracing::info!("Created {} record {} (was {})", self.model, id, self.id);
            self.id = id;
        } else if !values.is_empty() {
            session
                .execute(
                    &self.model,
                    "write",
                    vec![json!([self.id]), Value::Object(values)],
                    &Context::new(),
                )
                .await?;
            tracing::info!("Wrote {} record {}", self.model, self.id);
        } else {
            tracing::debug!("{} record {} unchanged, skipping save", self.model, self.id);
        }
        self.modified.clear();
        Ok(())
    }

    /// Refreshes one field from the server.
    pub async fn load(&mut self, session: &Session, field: &str) -> Result<()> {
        self.read_fields(session, vec![field.to_string()]).await
    }

    /// Refreshes every field known client-side from the server.
    pub async fn reload(&mut self, session: &Session) -> Result<()> {
        let fields: Vec<String> = self.values.keys().cloned().collect();
        if fields.is_empty() {
            return Ok(());
        }
        self.read_fields(session, fields).await
    }

    async fn read_fields(&mut self, session: &Session, fields: Vec<String>) -> Result<()> {
        if !self.is_saved() {
            return Err(RpcError::UnsavedRecord {
                model: self.model.clone(),
                id: self.id,
            });
        }
        let result = session
            .execute(
                &self.model,
                "read",
                vec![json!([self.id]), json!(fields)],
                &Context::new(),
            )
            .await?;
        let row = result
            .as_array()
            .and_then(|rows| rows.first())
            .and_then(Value::as_object)
            .ok_or_else(|| {
                RpcError::Protocol(format!(
                    "Record {} of model '{}' not returned by read",
                    self.id, self.model
                ))
            })?;
        for field in fields {
            let value = row.get(&field).cloned().unwrap_or(Value::Null);
            self.modified.remove(&field);
            self.loaded.insert(field.clone());
            self.values.insert(field, value);
        }
        Ok(())
    }
}
