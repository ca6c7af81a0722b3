//! Tagged values stored in a [`Node`].

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::Number;

use crate::duration::format_iso_duration;
use crate::error::ModelError;
use crate::node::Node;

/// A value held under a key of a [`Node`].
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Duration(TimeDelta),
    List(Vec<Value>),
    Node(Node),
    /// A caught failure, as bound to `exception` inside a `tryExcept` handler.
    Failure(Arc<ModelError>),
}

impl Value {
    /// Runtime type name, used in type mismatch reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Duration(_) => "duration",
            Value::List(_) => "list",
            Value::Node(_) => "node",
            Value::Failure(_) => "failure",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, empty strings, empty lists and empty nodes are "empty" and are
    /// left out of JSON snapshots.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Node(node) => node.is_empty(),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_failure(&self) -> Option<&ModelError> {
        match self {
            Value::Failure(err) => Some(err),
            _ => None,
        }
    }

    /// Builds a number from an `f64`, falling back to null for NaN and
    /// infinities which JSON cannot carry.
    pub fn from_f64(n: f64) -> Value {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }

    /// Plain JSON rendering of the value. Nodes become objects and keep every
    /// entry, including empty ones.
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json_value).collect())
            }
            Value::Node(node) => node.to_json_value(),
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x == y,
        _ => match (a.as_u64(), b.as_u64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        },
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Failure(a), Value::Failure(b)) => {
                Arc::ptr_eq(a, b) || a.to_string() == b.to_string()
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            Value::Duration(d) => f.write_str(&format_iso_duration(*d)),
            Value::List(_) => write!(f, "{}", self.to_json_value()),
            Value::Node(node) => f.write_str(&node.path()),
            Value::Failure(err) => write!(f, "{err}"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::Text(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Node(node) => node.serialize(serializer),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(Number::from(n as u64))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::from_f64(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(node)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<ModelError> for Value {
    fn from(err: ModelError) -> Self {
        Value::Failure(Arc::new(err))
    }
}

/// Objects become detached plain nodes; use [`Node::append_from_json`] to
/// build nodes that belong to a tree.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                let node = Node::plain();
                for (key, value) in map {
                    node.put(&key, Value::from(value));
                }
                Value::Node(node)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_and_float_numbers_compare_numerically() {
        assert_eq!(Value::from(3), Value::from(3.0));
        assert_ne!(Value::from(3), Value::from(3.5));
        assert_ne!(Value::from(3), Value::from("3"));
    }

    #[test]
    fn empty_values() {
        assert!(Value::Null.is_empty());
        assert!(Value::from("").is_empty());
        assert!(Value::List(vec![]).is_empty());
        assert!(Value::Node(Node::plain()).is_empty());
        assert!(!Value::from(0).is_empty());
        assert!(!Value::from(false).is_empty());
    }

    #[test]
    fn json_objects_become_plain_nodes() {
        let value = Value::from(json!({"a": {"b": [1, "two"]}}));
        let node = value.as_node().expect("node");
        let a = node.get_raw("a").expect("a");
        let a = a.as_node().expect("nested node");
        assert_eq!(a.parent().as_ref(), Some(node));
        assert_eq!(
            a.get_raw("b"),
            Some(Value::List(vec![Value::from(1), Value::from("two")]))
        );
    }

    #[test]
    fn display_renders_scalars_plainly() {
        assert_eq!(Value::from("abc").to_string(), "abc");
        assert_eq!(Value::from(12).to_string(), "12");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(
            Value::List(vec![Value::from(1), Value::from("x")]).to_string(),
            r#"[1,"x"]"#
        );
    }
}
