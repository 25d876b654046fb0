//! Search domains.
//!
//! A domain is a predicate tree sent in the server's list dialect:
//! a leaf is `["field", "operator", value]`, a conjunction is a plain
//! list of nodes and a disjunction is a list whose first item is `"OR"`.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{json, Value};

/// Comparison operator of a domain leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Like,
    ILike,
    NotLike,
    NotILike,
}

impl Operator {
    /// Returns the wire spelling of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::In => "in",
            Operator::NotIn => "not in",
            Operator::Like => "like",
            Operator::ILike => "ilike",
            Operator::NotLike => "not like",
            Operator::NotILike => "not ilike",
        }
    }

    /// Parses the wire spelling of an operator.
    pub fn parse(s: &str) -> Option<Self> {
        let operator = match s {
            "=" => Operator::Eq,
            "!=" => Operator::NotEq,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "in" => Operator::In,
            "not in" => Operator::NotIn,
            "like" => Operator::Like,
            "ilike" => Operator::ILike,
            "not like" => Operator::NotLike,
            "not ilike" => Operator::NotILike,
            _ => return None,
        };
        Some(operator)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter predicate for searches.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// Single comparison
    Leaf {
        field: String,
        operator: Operator,
        value: Value,
    },
    /// All children must match
    And(Vec<Domain>),
    /// At least one child must match
    Or(Vec<Domain>),
}

impl Domain {
    /// Matches every record.
    pub fn all() -> Self {
        Domain::And(Vec::new())
    }

    /// Builds a leaf.
    pub fn leaf(field: &str, operator: Operator, value: impl Into<Value>) -> Self {
        Domain::Leaf {
            field: field.to_string(),
            operator,
            value: value.into(),
        }
    }

    /// Builds an equality leaf.
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::leaf(field, Operator::Eq, value)
    }

    /// Conjunction of `domains`.
    pub fn and(domains: Vec<Domain>) -> Self {
        Domain::And(domains)
    }

    /// Disjunction of `domains`.
    pub fn or(domains: Vec<Domain>) -> Self {
        Domain::Or(domains)
    }

    /// Returns the top-level wire form, which is always a list.
    pub fn to_value(&self) -> Value {
        match self {
            Domain::Leaf { .. } => Value::Array(vec![self.node_value()]),
            _ => self.node_value(),
        }
    }

    fn node_value(&self) -> Value {
        match self {
            Domain::Leaf {
                field,
                operator,
                value,
            } => json!([field, operator.as_str(), value]),
            Domain::And(children) => {
                Value::Array(children.iter().map(Domain::node_value).collect())
            }
            Domain::Or(children) => {
                let mut items = Vec::with_capacity(children.len() + 1);
                items.push(json!("OR"));
                items.extend(children.iter().map(Domain::node_value));
                Value::Array(items)
            }
        }
    }
}

impl Serialize for Domain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
