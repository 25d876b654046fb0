//! Model handles.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use serde_json::{json, Value};

use crate::domain::Domain;
use crate::error::RpcError;
use crate::field::{Field, FieldDescriptor};
use crate::record::Record;
use crate::session::Session;
use crate::{Context, Result};

/// Named reference to a remote entity type.
///
/// Field accessors are resolved by name from the descriptor mapping, so
/// [`Model::introspect`] (or [`Model::add_fields`]) must run before any
/// field is used.
#[derive(Debug)]
pub struct Model {
    name: String,
    fields: BTreeMap<String, Field>,
    next_unsaved_id: AtomicI64,
}

impl Model {
    /// Creates a handle with no known fields.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: BTreeMap::new(),
            next_unsaved_id: AtomicI64::new(-1),
        }
    }

    /// Returns the model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calls `method` on the model.
    pub async fn execute(
        &self,
        session: &Session,
        method: &str,
        args: Vec<Value>,
        context: &Context,
    ) -> Result<Value> {
        session.execute(&self.name, method, args, context).await
    }

    /// Fetches the field descriptors of the model.
    pub async fn fields_get(&self, session: &Session) -> Result<BTreeMap<String, FieldDescriptor>> {
        let result = self
            .execute(session, "fields_get", Vec::new(), &Context::new())
            .await?;
        serde_json::from_value(result).map_err(|e| {
            RpcError::Protocol(format!("Invalid fields_get payload for '{}': {}", self.name, e))
        })
    }

    /// Registers field accessors; already known fields are kept.
    pub fn add_fields(&mut self, descriptions: BTreeMap<String, FieldDescriptor>) {
        for (name, descriptor) in descriptions {
            if !self.fields.contains_key(&name) {
                let field = Field::new(&self.name, &name, descriptor);
                self.fields.insert(name, field);
            }
        }
    }

    /// Fetches and registers the field descriptors.
    pub async fn introspect(&mut self, session: &Session) -> Result<()> {
        let descriptions = self.fields_get(session).await?;
        tracing::info!(
            "Model '{}' has {} fields",
            self.name,
            descriptions.len()
        );
        self.add_fields(descriptions);
        Ok(())
    }

    /// Returns the accessor of field `name`.
    pub fn field(&self, name: &str) -> Result<&Field> {
        self.fields.get(name).ok_or_else(|| RpcError::FieldNotFound {
            model: self.name.clone(),
            field: name.to_string(),
        })
    }

    /// Returns the names of the registered fields.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Instantiates an unsaved record with a fresh negative id.
    pub fn new_record(&self) -> Record {
        let id = self.next_unsaved_id.fetch_sub(1, Ordering::Relaxed);
        Record::new(&self.name, id)
    }

    /// Searches records matching `domain`.
    ///
    /// # Arguments
    /// * `session` - Session used for the call
    /// * `domain` - Filter predicate
    /// * `offset` - Number of matches to skip
    /// * `limit` - Maximum number of matches, `None` for all
    /// * `order` - `(field, direction)` pairs, `None` for the server default
    /// * `context` - Extra call context
    ///
    /// # Returns
    /// Unloaded records, one per matching id.
    pub async fn find(
        &self,
        session: &Session,
        domain: &Domain,
        offset: u64,
        limit: Option<u64>,
        order: Option<&[(&str, &str)]>,
        context: &Context,
    ) -> Result<Vec<Record>> {
        let order = match order {
            Some(pairs) => json!(pairs
                .iter()
                .map(|(field, direction)| json!([field, direction]))
                .collect::<Vec<_>>()),
            None => Value::Null,
        };
        let result = self
            .execute(
                session,
                "search",
                vec![domain.to_value(), json!(offset), json!(limit), order],
                context,
            )
            .await?;
        let ids: Vec<i64> = serde_json::from_value(result).map_err(|e| {
            RpcError::Protocol(format!("Invalid search result for '{}': {}", self.name, e))
        })?;
        tracing::debug!("Found {} '{}' records", ids.len(), self.name);
        Ok(ids.into_iter().map(|id| Record::new(&self.name, id)).collect())
    }

    /// Counts records matching `domain`.
    pub async fn search_count(&self, session: &Session, domain: &Domain) -> Result<u64> {
        let result = self
            .execute(
                session,
                "search_count",
                vec![domain.to_value()],
                &Context::new(),
            )
            .await?;
        result
            .as_u64()
            .ok_or_else(|| RpcError::Protocol(format!("Unexpected search_count result: {}", result)))
    }

    /// Deletes `records` on the server.
    pub async fn delete(&self, session: &Session, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            if !record.is_saved() {
                return Err(RpcError::UnsavedRecord {
                    model: self.name.clone(),
                    id: record.id(),
                });
            }
            ids.push(record.id());
        }
        self.execute(session, "delete", vec![json!(ids)], &Context::new())
            .await?;
        tracing::info!("Deleted {} '{}' records", ids.len(), self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptions() -> BTreeMap<String, FieldDescriptor> {
        serde_json::from_value(json!({
            "name": {"type": "char", "string": "Name", "required": true},
            "login": {"type": "char", "string": "Login", "required": true},
            "id": {"type": "integer", "string": "ID", "readonly": true}
        }))
        .unwrap()
    }

    #[test]
    fn test_unsaved_ids_are_negative_and_distinct() {
        let model = Model::new("res.user");
        let first = model.new_record();
        let second = model.new_record();
        assert!(first.id() < 0);
        assert!(second.id() < 0);
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_field_lookup_requires_introspection() {
        let mut model = Model::new("res.user");
        assert!(matches!(
            model.field("name"),
            Err(RpcError::FieldNotFound { .. })
        ));

        model.add_fields(descriptions());
        assert_eq!(model.field_names().collect::<Vec<_>>(), vec!["id", "login", "name"]);

        let mut record = model.new_record();
        model.field("name").unwrap().set_client(&mut record, "Test").unwrap();
        assert_eq!(record.get_client("name"), Some(&json!("Test")));

        let readonly = model.field("id").unwrap().set_client(&mut record, 3);
        assert!(matches!(readonly, Err(RpcError::InvalidValue { .. })));
    }

    #[test]
    fn test_set_client_rejects_foreign_record() {
        let mut users = Model::new("res.user");
        users.add_fields(descriptions());
        let groups = Model::new("res.group");
        let mut group = groups.new_record();

        let result = users.field("name").unwrap().set_client(&mut group, "Admins");
        assert!(matches!(result, Err(RpcError::InvalidValue { .. })));
    }
}
