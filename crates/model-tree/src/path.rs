//! Dot-paths of nodes, and resolution of path expressions to nodes.

use crate::error::ModelError;
use crate::node::Node;
use crate::value::Value;

impl Node {
    /// Dot-joined names from just below the root down to this node.
    ///
    /// The root never contributes a segment, so the root's path is `""`, a
    /// child of the root is just its name, and deeper nodes are
    /// `parent.path() + "." + name`.
    pub fn path(&self) -> String {
        let Some(parent) = self.parent() else {
            return String::new();
        };
        let name = self.name().unwrap_or_default();
        if parent.is_root() {
            name
        } else {
            format!("{}.{}", parent.path(), name)
        }
    }

    /// Evaluates `path` and insists that the result is a node.
    pub fn get_item(&self, path: &str) -> Result<Node, ModelError> {
        match self.eval(path)? {
            Value::Node(node) => Ok(node),
            other => Err(ModelError::TypeMismatch {
                path: path.to_string(),
                expected: "node",
                found: other.type_name(),
            }),
        }
    }

    /// Walks `path` one dotted segment at a time through stored entries,
    /// without involving the evaluator.
    pub fn find(&self, path: &str) -> Option<Value> {
        let mut current = Value::Node(self.clone());
        for segment in path.split('.').map(str::trim).filter(|s| !s.is_empty()) {
            current = match current {
                Value::Node(node) => node.get(segment)?,
                Value::List(items) => {
                    let index = segment.parse::<usize>().ok()?;
                    items.get(index)?.clone()
                }
                _ => return None,
            };
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (Node, Node, Node) {
        let root = Node::plain();
        let x = Node::plain();
        let y = Node::plain();
        root.put("x", Value::Node(x.clone()));
        x.put("y", Value::Node(y.clone()));
        (root, x, y)
    }

    #[test]
    fn path_of_root_child_and_grandchild() {
        let (root, x, y) = tree();
        assert_eq!(root.path(), "");
        assert_eq!(x.path(), "x");
        assert_eq!(y.path(), "x.y");
    }

    #[test]
    fn root_name_never_appears() {
        let (root, _, y) = tree();
        root.set_name("root");
        assert_eq!(y.path(), "x.y");
    }

    #[test]
    fn find_walks_nodes_and_lists() {
        let (root, x, _) = tree();
        x.put(
            "list",
            Value::List(vec![Value::from("a"), Value::from("b")]),
        );
        assert_eq!(root.find("x.list.1"), Some(Value::from("b")));
        assert_eq!(root.find("x.missing"), None);
        assert_eq!(root.find("x.list.9"), None);
    }

    #[test]
    fn get_item_without_evaluator_fails() {
        let (root, _, _) = tree();
        let err = root.get_item("x").unwrap_err();
        assert!(matches!(err, ModelError::NoEvaluator(_)));
    }
}
