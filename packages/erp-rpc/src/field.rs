//! Field descriptors and client-side accessors.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::RpcError;
use crate::record::Record;
use crate::Result;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATETIME_INPUT_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Kind of a field as reported by `fields_get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Char,
    Text,
    Integer,
    Float,
    Numeric,
    Boolean,
    Selection,
    Many2One,
    Date,
    DateTime,
    /// Any type the accessors pass through untouched
    Other(String),
}

impl FieldType {
    /// Parses the type name sent by the server.
    pub fn parse(name: &str) -> Self {
        match name {
            "char" => FieldType::Char,
            "text" => FieldType::Text,
            "integer" => FieldType::Integer,
            "float" => FieldType::Float,
            "numeric" => FieldType::Numeric,
            "boolean" => FieldType::Boolean,
            "selection" => FieldType::Selection,
            "many2one" => FieldType::Many2One,
            "date" => FieldType::Date,
            "datetime" => FieldType::DateTime,
            other => FieldType::Other(other.to_string()),
        }
    }
}

/// Field description as returned by `fields_get`.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDescriptor {
    /// Type name (`char`, `integer`, ...)
    #[serde(rename = "type")]
    pub type_name: String,
    /// Human-readable label
    #[serde(default)]
    pub string: Option<String>,
    /// Value must be set on create
    #[serde(default)]
    pub required: bool,
    /// Value cannot be written by clients
    #[serde(default)]
    pub readonly: bool,
    /// Target model of relational fields
    #[serde(default)]
    pub relation: Option<String>,
    /// Allowed `[value, label]` pairs of selection fields
    #[serde(default)]
    pub selection: Option<Value>,
    /// Attributes not interpreted by the client
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accessor for one field of a model.
#[derive(Debug, Clone)]
pub struct Field {
    model: String,
    name: String,
    field_type: FieldType,
    descriptor: FieldDescriptor,
}

impl Field {
    /// Creates an accessor from a descriptor.
    pub fn new(model: &str, name: &str, descriptor: FieldDescriptor) -> Self {
        Self {
            model: model.to_string(),
            name: name.to_string(),
            field_type: FieldType::parse(&descriptor.type_name),
            descriptor,
        }
    }

    /// Returns the field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field type.
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Returns the raw descriptor.
    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    /// Sets the client-side value of the field on `record`.
    ///
    /// The value is converted to the field type and the field is marked
    /// as modified so the next save sends it.
    pub fn set_client(&self, record: &mut Record, value: impl Into<Value>) -> Result<()> {
        if record.model_name() != self.model {
            return Err(RpcError::InvalidValue {
                field: self.name.clone(),
                reason: format!(
                    "record belongs to model '{}', not '{}'",
                    record.model_name(),
                    self.model
                ),
            });
        }
        if self.descriptor.readonly {
            return Err(self.invalid("field is readonly"));
        }
        let value = self.convert(value.into())?;
        record.set_modified(&self.name, value);
        Ok(())
    }

    /// Returns the client-side value of the field on `record`.
    pub fn get_client<'a>(&self, record: &'a Record) -> Option<&'a Value> {
        record.get_client(&self.name)
    }

    /// Converts a client value to the representation sent to the server.
    pub fn convert(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self.field_type {
            FieldType::Char | FieldType::Text | FieldType::Selection => match value {
                Value::String(_) => Ok(value),
                other => Err(self.invalid(&format!("expected a string, got {}", other))),
            },
            FieldType::Integer | FieldType::Many2One => match &value {
                Value::Number(n) if n.is_i64() => Ok(value),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|e| self.invalid(&format!("'{}' is not an integer: {}", s, e))),
                other => Err(self.invalid(&format!("expected an integer, got {}", other))),
            },
            FieldType::Float | FieldType::Numeric => match &value {
                Value::Number(_) => Ok(value),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::from)
                    .map_err(|e| self.invalid(&format!("'{}' is not a number: {}", s, e))),
                other => Err(self.invalid(&format!("expected a number, got {}", other))),
            },
            FieldType::Boolean => match value {
                Value::Bool(_) => Ok(value),
                other => Err(self.invalid(&format!("expected a boolean, got {}", other))),
            },
            FieldType::Date => match &value {
                Value::String(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                    .map(|date| Value::String(date.format(DATE_FORMAT).to_string()))
                    .map_err(|e| self.invalid(&format!("'{}' is not a date: {}", s, e))),
                other => Err(self.invalid(&format!("expected an ISO date, got {}", other))),
            },
            FieldType::DateTime => match &value {
                Value::String(s) => DATETIME_INPUT_FORMATS
                    .iter()
                    .find_map(|format| NaiveDateTime::parse_from_str(s.trim(), format).ok())
                    .map(|datetime| Value::String(datetime.format(DATETIME_FORMAT).to_string()))
                    .ok_or_else(|| self.invalid(&format!("'{}' is not a datetime", s))),
                other => Err(self.invalid(&format!("expected an ISO datetime, got {}", other))),
            },
            FieldType::Other(_) => Ok(value),
        }
    }

    fn invalid(&self, reason: &str) -> RpcError {
        RpcError::InvalidValue {
            field: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(type_name: &str) -> Field {
        let descriptor: FieldDescriptor =
            serde_json::from_value(json!({"type": type_name, "string": "Label"})).unwrap();
        Field::new("res.user", "value", descriptor)
    }

    #[test]
    fn test_descriptor_keeps_unknown_attributes() {
        let descriptor: FieldDescriptor = serde_json::from_value(json!({
            "type": "char",
            "string": "Login",
            "required": true,
            "size": 64
        }))
        .unwrap();
        assert!(descriptor.required);
        assert!(!descriptor.readonly);
        assert_eq!(descriptor.extra.get("size"), Some(&json!(64)));
    }

    #[test]
    fn test_convert_by_type() {
        assert_eq!(field("char").convert(json!("Test")).unwrap(), json!("Test"));
        assert!(field("char").convert(json!(3)).is_err());
        assert_eq!(field("integer").convert(json!("42")).unwrap(), json!(42));
        assert!(field("integer").convert(json!(1.5)).is_err());
        assert_eq!(field("many2one").convert(json!(7)).unwrap(), json!(7));
        assert_eq!(field("float").convert(json!("2.5")).unwrap(), json!(2.5));
        assert_eq!(field("boolean").convert(json!(true)).unwrap(), json!(true));
        assert!(field("boolean").convert(json!("yes")).is_err());
        assert_eq!(
            field("date").convert(json!("2024-01-31")).unwrap(),
            json!("2024-01-31")
        );
        assert_eq!(
            field("one2many").convert(json!([1, 2])).unwrap(),
            json!([1, 2])
        );
        assert_eq!(field("char").convert(Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_convert_dates() {
        assert!(field("date").convert(json!("not a date")).is_err());
        assert!(field("date").convert(json!("2024-02-30")).is_err());
        assert!(field("date").convert(json!(20240131)).is_err());
        assert_eq!(
            field("datetime").convert(json!("2024-01-31T08:15:00")).unwrap(),
            json!("2024-01-31 08:15:00")
        );
        assert_eq!(
            field("datetime").convert(json!("2024-01-31 08:15:00.250")).unwrap(),
            json!("2024-01-31 08:15:00.250")
        );
        assert!(matches!(
            field("datetime").convert(json!("2024-01-31")),
            Err(RpcError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_field_type_parse() {
        assert_eq!(FieldType::parse("datetime"), FieldType::DateTime);
        assert_eq!(
            FieldType::parse("binary"),
            FieldType::Other("binary".to_string())
        );
    }
}
