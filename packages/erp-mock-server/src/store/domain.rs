//! Search domain parsing and evaluation.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::error::ServerError;

const OPERATORS: &[&str] = &[
    "=", "!=", "<", "<=", ">", ">=", "in", "not in", "like", "ilike", "not like", "not ilike",
];

/// Parsed search domain.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainNode {
    Leaf {
        field: String,
        operator: String,
        value: Value,
    },
    And(Vec<DomainNode>),
    Or(Vec<DomainNode>),
}

/// Parses a domain in list form.
///
/// `[]` matches everything; a list is a conjunction unless its first
/// item is `"OR"`.
pub fn parse_domain(value: &Value) -> Result<DomainNode, ServerError> {
    match value {
        Value::Null => Ok(DomainNode::And(Vec::new())),
        Value::Array(items) => {
            if let Some(leaf) = parse_leaf(items)? {
                return Ok(leaf);
            }
            let (is_or, rest) = match items.first() {
                Some(Value::String(s)) if s == "OR" => (true, &items[1..]),
                Some(Value::String(s)) if s == "AND" => (false, &items[1..]),
                _ => (false, &items[..]),
            };
            let children = rest
                .iter()
                .map(parse_domain)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(if is_or {
                DomainNode::Or(children)
            } else {
                DomainNode::And(children)
            })
        }
        other => Err(ServerError::InvalidDomain(format!(
            "expected a list, got {}",
            other
        ))),
    }
}

fn parse_leaf(items: &[Value]) -> Result<Option<DomainNode>, ServerError> {
    let (field, operator) = match (items.first(), items.get(1)) {
        (Some(Value::String(field)), Some(Value::String(operator)))
            if field != "OR" && field != "AND" =>
        {
            (field, operator)
        }
        _ => return Ok(None),
    };
    if items.len() != 3 {
        return Err(ServerError::InvalidDomain(format!(
            "leaf on '{}' must have 3 items",
            field
        )));
    }
    if !OPERATORS.contains(&operator.as_str()) {
        return Err(ServerError::InvalidDomain(format!(
            "unsupported operator '{}'",
            operator
        )));
    }
    if matches!(operator.as_str(), "in" | "not in") && !items[2].is_array() {
        return Err(ServerError::InvalidDomain(format!(
            "operator '{}' expects a list",
            operator
        )));
    }
    Ok(Some(DomainNode::Leaf {
        field: field.clone(),
        operator: operator.clone(),
        value: items[2].clone(),
    }))
}

impl DomainNode {
    /// Appends the field names referenced by the domain.
    pub fn collect_fields<'a>(&'a self, fields: &mut Vec<&'a str>) {
        match self {
            DomainNode::Leaf { field, .. } => fields.push(field),
            DomainNode::And(children) | DomainNode::Or(children) => {
                for child in children {
                    child.collect_fields(fields);
                }
            }
        }
    }

    /// Evaluates the domain against one stored record.
    pub fn matches(&self, record: &Map<String, Value>) -> bool {
        match self {
            DomainNode::And(children) => children.iter().all(|c| c.matches(record)),
            DomainNode::Or(children) => children.iter().any(|c| c.matches(record)),
            DomainNode::Leaf {
                field,
                operator,
                value,
            } => {
                let actual = record.get(field).unwrap_or(&Value::Null);
                evaluate(actual, operator, value)
            }
        }
    }
}

fn evaluate(actual: &Value, operator: &str, expected: &Value) -> bool {
    match operator {
        "=" => values_equal(actual, expected),
        "!=" => !values_equal(actual, expected),
        "<" => compare(actual, expected) == Some(Ordering::Less),
        "<=" => matches!(
            compare(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        ">" => compare(actual, expected) == Some(Ordering::Greater),
        ">=" => matches!(
            compare(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        "in" => contains(expected, actual),
        "not in" => !contains(expected, actual),
        "like" => like(actual, expected, false),
        "ilike" => like(actual, expected, true),
        "not like" => !like(actual, expected, false),
        "not ilike" => !like(actual, expected, true),
        _ => false,
    }
}

fn contains(list: &Value, actual: &Value) -> bool {
    list.as_array()
        .map(|items| items.iter().any(|item| values_equal(actual, item)))
        .unwrap_or(false)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, Value::Bool(false)) | (Value::Bool(false), Value::Null) => true,
        _ => compare(a, b) == Some(Ordering::Equal) || a == b,
    }
}

/// Orders two scalar values of the same kind.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn like(actual: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    let (Some(text), Some(pattern)) = (actual.as_str(), pattern.as_str()) else {
        return false;
    };
    if case_insensitive {
        let text: Vec<char> = text.to_lowercase().chars().collect();
        let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
        like_match(&text, &pattern)
    } else {
        let text: Vec<char> = text.chars().collect();
        let pattern: Vec<char> = pattern.chars().collect();
        like_match(&text, &pattern)
    }
}

/// SQL `LIKE` matching: `%` is any run, `_` any single char, `\` escapes.
fn like_match(text: &[char], pattern: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('%') => (0..=text.len()).any(|skip| like_match(&text[skip..], &pattern[1..])),
        Some('_') => !text.is_empty() && like_match(&text[1..], &pattern[1..]),
        Some('\\') if pattern.len() > 1 => {
            text.first() == Some(&pattern[1]) && like_match(&text[1..], &pattern[2..])
        }
        Some(c) => text.first() == Some(c) && like_match(&text[1..], &pattern[1..]),
    }
}
