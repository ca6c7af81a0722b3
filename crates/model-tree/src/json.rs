//! Lenient JSON in, pretty JSON out.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Map;

use crate::error::ModelError;
use crate::node::Node;
use crate::value::Value;

/// Parses JSON allowing comments, single quotes, unquoted names and
/// trailing commas.
pub fn parse_lenient(text: &str) -> Result<serde_json::Value, ModelError> {
    json5::from_str::<serde_json::Value>(text).map_err(|e| ModelError::InvalidJson {
        message: e.to_string(),
    })
}

fn json_type_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl Node {
    /// Builds a detached node from a literal mapping, with this node as its
    /// parent. Nested mappings become child nodes named after their keys;
    /// every new node is introspected once, children before parents.
    pub fn new_child(&self, text: &str) -> Result<Node, ModelError> {
        let literal = match parse_lenient(text)? {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(ModelError::InvalidLiteral {
                    found: json_type_name(&other),
                })
            }
        };
        let item = self.new_item();
        item.set_parent(Some(self));
        item.materialize(literal)?;
        Ok(item)
    }

    fn materialize(&self, literal: Map<String, serde_json::Value>) -> Result<(), ModelError> {
        let mut children = Vec::new();
        for (key, value) in literal {
            match value {
                serde_json::Value::Object(map) => {
                    let child = self.new_item();
                    child.set_name(key.as_str());
                    self.put(&key, Value::Node(child.clone()));
                    children.push((child, map));
                }
                other => {
                    self.put(&key, self.literal_value(other));
                }
            }
        }
        for (child, map) in children {
            child.materialize(map)?;
        }
        self.introspect_entries()
    }

    /// Converts a JSON value for storage under this node. Mappings inside
    /// lists become nodes sharing this node's engine but are not
    /// introspected.
    pub fn literal_value(&self, json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(|v| self.literal_value(v)).collect())
            }
            serde_json::Value::Object(map) => {
                let node = self.new_item();
                node.set_parent(Some(self));
                for (key, value) in map {
                    let value = node.literal_value(value);
                    node.put(&key, value);
                }
                Value::Node(node)
            }
            other => Value::from(other),
        }
    }

    /// Pretty JSON snapshot, leaving out null and empty entries.
    pub fn to_json(&self) -> Result<String, ModelError> {
        serde_json::to_string_pretty(self).map_err(|e| ModelError::InvalidJson {
            message: format!("node at path '{}': {e}", self.path()),
        })
    }

    /// Plain JSON rendering of every stored entry, unexpanded.
    pub fn to_json_value(&self) -> serde_json::Value {
        let map = self
            .entries()
            .into_iter()
            .map(|(key, value)| (key, value.to_json_value()))
            .collect::<Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self
            .entries()
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .collect::<Vec<_>>();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in &entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_syntax_is_accepted() {
        let json = parse_lenient(
            "{ // comment\n  name: 'fred', list: [1, 2,], /* block */ 'q': \"x\", }",
        )
        .unwrap();
        assert_eq!(json["name"], "fred");
        assert_eq!(json["list"][1].as_f64(), Some(2.0));
        assert_eq!(json["q"], "x");
    }

    #[test]
    fn malformed_text_is_invalid_json() {
        assert!(matches!(
            parse_lenient("{ a: "),
            Err(ModelError::InvalidJson { .. })
        ));
    }

    #[test]
    fn top_level_must_be_an_object() {
        let root = Node::plain();
        assert!(matches!(
            root.new_child("[1, 2]"),
            Err(ModelError::InvalidLiteral { found: "array" })
        ));
    }

    #[test]
    fn nested_mappings_become_named_children() {
        let root = Node::plain();
        let item = root.new_child("{ a: { b: { c: 1 } }, d: [ { e: 2 } ] }").unwrap();
        assert_eq!(item.parent().as_ref(), Some(&root));

        let b = item.find("a.b").and_then(|v| v.as_node().cloned()).unwrap();
        assert_eq!(b.name().as_deref(), Some("b"));
        assert_eq!(b.parent().and_then(|a| a.name()).as_deref(), Some("a"));
        assert_eq!(b.get("c"), Some(Value::from(1)));

        let listed = item.find("d.0").and_then(|v| v.as_node().cloned()).unwrap();
        assert_eq!(listed.get("e"), Some(Value::from(2)));
    }

    #[test]
    fn snapshot_omits_empty_entries() {
        let root = Node::plain();
        root.put("name", Value::from("x"));
        root.put("blank", Value::from(""));
        root.put("none", Value::Null);
        root.put("empty", Value::Node(Node::plain()));
        root.put("zero", Value::from(0));
        let json: serde_json::Value = serde_json::from_str(&root.to_json().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"name": "x", "zero": 0}));

        let full = root.to_json_value();
        assert_eq!(full["blank"], "");
        assert!(full["none"].is_null());
    }
}
