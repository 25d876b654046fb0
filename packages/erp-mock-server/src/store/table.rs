//! Record storage for one model.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Map, Value};

use super::domain::{compare, parse_domain};
use crate::error::ServerError;

/// Records and field definitions of one model.
#[derive(Debug, Clone)]
pub struct ModelTable {
    name: String,
    fields: BTreeMap<String, Value>,
    defaults: Map<String, Value>,
    unique: Vec<String>,
    write_only: BTreeSet<String>,
    records: BTreeMap<i64, Map<String, Value>>,
    next_id: i64,
}

impl ModelTable {
    /// Creates an empty model with only the `id` field.
    pub fn new(name: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            "id".to_string(),
            json!({"type": "integer", "string": "ID", "readonly": true}),
        );
        Self {
            name: name.to_string(),
            fields,
            defaults: Map::new(),
            unique: Vec::new(),
            write_only: BTreeSet::new(),
            records: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Adds a field described by `descriptor` (`{"type", "string", ...}`).
    pub fn with_field(mut self, name: &str, descriptor: Value) -> Self {
        self.fields.insert(name.to_string(), descriptor);
        self
    }

    /// Sets the value used when a create omits `field`.
    pub fn with_default(mut self, field: &str, value: Value) -> Self {
        self.defaults.insert(field.to_string(), value);
        self
    }

    /// Requires the values of `field` to be unique.
    pub fn with_unique(mut self, field: &str) -> Self {
        self.unique.push(field.to_string());
        self
    }

    /// Hides `field` from reads.
    pub fn with_write_only(mut self, field: &str) -> Self {
        self.write_only.insert(field.to_string());
        self
    }

    /// Returns the model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stored records.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Returns the stored values of record `id`.
    pub fn get(&self, id: i64) -> Option<&Map<String, Value>> {
        self.records.get(&id)
    }

    /// Returns the descriptors of `names`, or of every field when empty.
    pub fn fields_get(&self, names: &[String]) -> Result<Map<String, Value>, ServerError> {
        if names.is_empty() {
            return Ok(self
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect());
        }
        names
            .iter()
            .map(|name| {
                self.fields
                    .get(name)
                    .map(|d| (name.clone(), d.clone()))
                    .ok_or_else(|| self.field_not_found(name))
            })
            .collect()
    }

    /// Creates one record per values object and returns their ids.
    ///
    /// Either every record is created or none is.
    pub fn create(&mut self, values_list: &[Value]) -> Result<Vec<i64>, ServerError> {
        let mut pending = Vec::with_capacity(values_list.len());
        for values in values_list {
            let values = values.as_object().ok_or_else(|| {
                ServerError::InvalidParams(format!("create expects objects, got {}", values))
            })?;
            self.check_writable(values)?;

            let mut record = self.defaults.clone();
            for (key, value) in values {
                record.insert(key.clone(), value.clone());
            }
            for (field, descriptor) in &self.fields {
                let required = descriptor
                    .get("required")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if required && is_empty(record.get(field)) {
                    return Err(ServerError::RequiredField {
                        model: self.name.clone(),
                        field: field.clone(),
                    });
                }
            }
            self.check_unique(&record, None, &pending)?;
            pending.push(record);
        }

        let mut ids = Vec::with_capacity(pending.len());
        for mut record in pending {
            let id = self.next_id;
            self.next_id += 1;
            record.insert("id".to_string(), json!(id));
            self.records.insert(id, record);
            ids.push(id);
        }
        tracing::debug!("Created {:?} in '{}'", ids, self.name);
        Ok(ids)
    }

    /// Reads `fields` (every field when empty) of records `ids`.
    pub fn read(&self, ids: &[i64], fields: &[String]) -> Result<Vec<Value>, ServerError> {
        let names: Vec<&String> = if fields.is_empty() {
            self.fields.keys().collect()
        } else {
            for field in fields {
                if !self.fields.contains_key(field) {
                    return Err(self.field_not_found(field));
                }
            }
            fields.iter().collect()
        };

        ids.iter()
            .map(|id| {
                let record = self.records.get(id).ok_or_else(|| self.record_not_found(*id))?;
                let mut row = Map::new();
                row.insert("id".to_string(), json!(id));
                for name in &names {
                    let value = if self.write_only.contains(name.as_str()) {
                        Value::Null
                    } else {
                        record.get(name.as_str()).cloned().unwrap_or(Value::Null)
                    };
                    row.insert((*name).clone(), value);
                }
                Ok(Value::Object(row))
            })
            .collect()
    }

    /// Writes `values` on records `ids`.
    pub fn write(&mut self, ids: &[i64], values: &Value) -> Result<(), ServerError> {
        let values = values.as_object().ok_or_else(|| {
            ServerError::InvalidParams(format!("write expects an object, got {}", values))
        })?;
        self.check_writable(values)?;
        for id in ids {
            let record = self.records.get(id).ok_or_else(|| self.record_not_found(*id))?;
            let mut updated = record.clone();
            for (key, value) in values {
                updated.insert(key.clone(), value.clone());
            }
            self.check_unique(&updated, Some(*id), &[])?;
        }
        for id in ids {
            if let Some(record) = self.records.get_mut(id) {
                for (key, value) in values {
                    record.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    /// Deletes records `ids`; fails without deleting if one is missing.
    pub fn delete(&mut self, ids: &[i64]) -> Result<(), ServerError> {
        if let Some(missing) = ids.iter().find(|id| !self.records.contains_key(id)) {
            return Err(self.record_not_found(*missing));
        }
        for id in ids {
            self.records.remove(id);
        }
        tracing::debug!("Deleted {:?} from '{}'", ids, self.name);
        Ok(())
    }

    /// Returns the ids of records matching `domain`.
    ///
    /// # Arguments
    /// * `domain` - Domain in list form
    /// * `offset` - Number of matches to skip
    /// * `limit` - Maximum number of ids to return
    /// * `order` - `[[field, "ASC"|"DESC"], ...]`, id order when null
    pub fn search(
        &self,
        domain: &Value,
        offset: usize,
        limit: Option<usize>,
        order: &Value,
    ) -> Result<Vec<i64>, ServerError> {
        let node = parse_domain(domain)?;
        let mut fields = Vec::new();
        node.collect_fields(&mut fields);
        if let Some(unknown) = fields.iter().find(|f| !self.fields.contains_key(**f)) {
            return Err(self.field_not_found(unknown));
        }
        let order = self.parse_order(order)?;

        let mut matching: Vec<(&i64, &Map<String, Value>)> = self
            .records
            .iter()
            .filter(|(_, record)| node.matches(record))
            .collect();
        if !order.is_empty() {
            matching.sort_by(|(_, a), (_, b)| {
                for (field, descending) in &order {
                    let ordering = compare(
                        a.get(field).unwrap_or(&Value::Null),
                        b.get(field).unwrap_or(&Value::Null),
                    )
                    .unwrap_or(Ordering::Equal);
                    let ordering = if *descending {
                        ordering.reverse()
                    } else {
                        ordering
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let ids = matching
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .map(|(id, _)| *id)
            .collect();
        Ok(ids)
    }

    /// Counts records matching `domain`.
    pub fn search_count(&self, domain: &Value) -> Result<usize, ServerError> {
        Ok(self.search(domain, 0, None, &Value::Null)?.len())
    }

    fn parse_order(&self, order: &Value) -> Result<Vec<(String, bool)>, ServerError> {
        let items = match order {
            Value::Null => return Ok(Vec::new()),
            Value::Array(items) => items,
            other => {
                return Err(ServerError::InvalidParams(format!(
                    "order must be a list, got {}",
                    other
                )))
            }
        };
        items
            .iter()
            .map(|item| {
                let field = item.get(0).and_then(Value::as_str);
                let direction = item.get(1).and_then(Value::as_str).unwrap_or("ASC");
                match field {
                    Some(field) if self.fields.contains_key(field) => {
                        Ok((field.to_string(), direction.eq_ignore_ascii_case("DESC")))
                    }
                    Some(field) => Err(self.field_not_found(field)),
                    None => Err(ServerError::InvalidParams(format!(
                        "invalid order item {}",
                        item
                    ))),
                }
            })
            .collect()
    }

    fn check_writable(&self, values: &Map<String, Value>) -> Result<(), ServerError> {
        for key in values.keys() {
            let descriptor = self.fields.get(key).ok_or_else(|| self.field_not_found(key))?;
            if descriptor
                .get("readonly")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                return Err(ServerError::ReadonlyField {
                    model: self.name.clone(),
                    field: key.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_unique(
        &self,
        record: &Map<String, Value>,
        own_id: Option<i64>,
        pending: &[Map<String, Value>],
    ) -> Result<(), ServerError> {
        for field in &self.unique {
            let Some(value) = record.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let stored = self
                .records
                .iter()
                .filter(|(id, _)| Some(**id) != own_id)
                .map(|(_, r)| r);
            if stored.chain(pending.iter()).any(|r| r.get(field) == Some(value)) {
                return Err(ServerError::UniqueViolation {
                    model: self.name.clone(),
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }

    fn field_not_found(&self, field: &str) -> ServerError {
        ServerError::FieldNotFound {
            model: self.name.clone(),
            field: field.to_string(),
        }
    }

    fn record_not_found(&self, id: i64) -> ServerError {
        ServerError::RecordNotFound {
            model: self.name.clone(),
            id,
        }
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn users() -> ModelTable {
        ModelTable::new("res.user")
            .with_field("name", json!({"type": "char", "required": true}))
            .with_field("login", json!({"type": "char", "required": true}))
            .with_field("password", json!({"type": "char"}))
            .with_field("active", json!({"type": "boolean"}))
            .with_default("active", json!(true))
            .with_unique("login")
            .with_write_only("password")
    }

    #[test]
    fn test_create_assigns_increasing_ids() {
        let mut table = users();
        let ids = table
            .create(&[
                json!({"name": "A", "login": "a"}),
                json!({"name": "B", "login": "b"}),
            ])
            .unwrap();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(table.get(1).unwrap().get("active"), Some(&json!(true)));
    }

    #[test]
    fn test_create_validation_is_atomic() {
        let mut table = users();
        let err = table
            .create(&[json!({"name": "A", "login": "a"}), json!({"name": "B"})])
            .unwrap_err();
        assert!(matches!(err, ServerError::RequiredField { .. }));
        assert_eq!(table.record_count(), 0);

        let err = table
            .create(&[
                json!({"name": "A", "login": "same"}),
                json!({"name": "B", "login": "same"}),
            ])
            .unwrap_err();
        assert!(matches!(err, ServerError::UniqueViolation { .. }));
        assert_eq!(table.record_count(), 0);

        let err = table.create(&[json!({"id": 9, "name": "A", "login": "a"})]).unwrap_err();
        assert!(matches!(err, ServerError::ReadonlyField { .. }));
        let err = table.create(&[json!({"nick": "A"})]).unwrap_err();
        assert!(matches!(err, ServerError::FieldNotFound { .. }));
    }

    #[test]
    fn test_read_hides_write_only_fields() {
        let mut table = users();
        table
            .create(&[json!({"name": "A", "login": "a", "password": "secret"})])
            .unwrap();
        let rows = table
            .read(&[1], &["name".to_string(), "password".to_string()])
            .unwrap();
        assert_eq!(rows, vec![json!({"id": 1, "name": "A", "password": null})]);
        assert!(matches!(
            table.read(&[2], &[]),
            Err(ServerError::RecordNotFound { id: 2, .. })
        ));
    }

    #[test]
    fn test_write_and_delete() {
        let mut table = users();
        table
            .create(&[
                json!({"name": "A", "login": "a"}),
                json!({"name": "B", "login": "b"}),
            ])
            .unwrap();
        table.write(&[1], &json!({"name": "Renamed"})).unwrap();
        assert_eq!(table.get(1).unwrap().get("name"), Some(&json!("Renamed")));

        let err = table.write(&[2], &json!({"login": "a"})).unwrap_err();
        assert!(matches!(err, ServerError::UniqueViolation { .. }));
        table.write(&[1], &json!({"login": "a"})).unwrap();

        assert!(table.delete(&[1, 3]).is_err());
        assert_eq!(table.record_count(), 2);
        table.delete(&[1]).unwrap();
        assert_eq!(table.record_count(), 1);
    }

    #[test]
    fn test_search_offset_limit_order() {
        let mut table = users();
        table
            .create(&[
                json!({"name": "C", "login": "c"}),
                json!({"name": "A", "login": "a"}),
                json!({"name": "B", "login": "b", "active": false}),
            ])
            .unwrap();

        assert_eq!(table.search(&json!([]), 0, None, &Value::Null).unwrap(), vec![1, 2, 3]);
        assert_eq!(
            table
                .search(&json!([]), 0, None, &json!([["name", "ASC"]]))
                .unwrap(),
            vec![2, 3, 1]
        );
        assert_eq!(
            table
                .search(&json!([]), 1, Some(1), &json!([["name", "DESC"]]))
                .unwrap(),
            vec![3]
        );
        assert_eq!(
            table
                .search(&json!([["active", "=", true]]), 0, None, &Value::Null)
                .unwrap(),
            vec![1, 2]
        );
        assert_eq!(table.search_count(&json!([["login", "=", "b"]])).unwrap(), 1);
        assert!(matches!(
            table.search(&json!([["nick", "=", 1]]), 0, None, &Value::Null),
            Err(ServerError::FieldNotFound { .. })
        ));
    }
}
