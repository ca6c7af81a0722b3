//! Directive keys and the merging of file contents into a node.

pub mod properties;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ModelError;
use crate::guard::CircularityGuard;
use crate::node::Node;
use crate::steps::steps_text;

pub const JSON: &str = "$json";
pub const XML: &str = "$xml";
pub const PROPERTIES: &str = "$properties";
pub const PROPERTIES_XML: &str = "$properties-xml";
pub const ONLOAD: &str = "$onload";

/// Splits a comma-separated file list, dropping blank names.
pub fn file_list(text: &str) -> Vec<&str> {
    text.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

pub(crate) fn read_file(path: &Path) -> Result<String, ModelError> {
    fs::read_to_string(path).map_err(|e| ModelError::InvalidFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

impl Node {
    /// Interprets the directive keys of a freshly populated node, in order:
    /// `$json`, `$xml`, `$properties`, `$properties-xml`, then `$onload`.
    ///
    /// Fails fast; whatever was merged before the failure stays merged.
    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path()))]
    pub fn introspect_entries(&self) -> Result<(), ModelError> {
        if let Some(files) = self.get_string(JSON) {
            for name in file_list(&files) {
                self.merge_json_file(name)?;
            }
        }
        if let Some(files) = self.get_string(XML) {
            for name in file_list(&files) {
                let file = self.local_file(name)?;
                self.append_from_xml_file(&file)?;
            }
        }
        if let Some(files) = self.get_string(PROPERTIES) {
            for name in file_list(&files) {
                self.merge_properties_file(name, false)?;
            }
        }
        if let Some(files) = self.get_string(PROPERTIES_XML) {
            for name in file_list(&files) {
                self.merge_properties_file(name, true)?;
            }
        }
        if let Some(onload) = self.get_raw(ONLOAD) {
            self.eval(&self.expand(&steps_text(&onload)))?;
        }
        Ok(())
    }

    fn merge_json_file(&self, name: &str) -> Result<(), ModelError> {
        let file = self.local_file(name)?;
        self.append_from_json_file(&file)?;
        Ok(())
    }

    /// Like [`Node::append_from_json`], reading `path`. The file is held on
    /// the circularity guard while it is materialized, and relative names
    /// inside it resolve against its directory.
    pub fn append_from_json_file(&self, path: &Path) -> Result<Node, ModelError> {
        let guard = CircularityGuard::enter(path)?;
        debug!(file = %guard.path().display(), directive = JSON, "loading");
        let directory = guard
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        self.set_current_directory(&directory)?;
        self.append_from_json(&read_file(path)?)
    }

    fn merge_properties_file(&self, name: &str, xml: bool) -> Result<(), ModelError> {
        let file = self.local_file(name)?;
        let directive = if xml { PROPERTIES_XML } else { PROPERTIES };
        debug!(file = %file.display(), directive, "loading");
        let text = read_file(&file)?;
        let parsed = if xml {
            properties::parse_properties_xml(&text)
        } else {
            properties::parse_properties(&text)
        };
        let entries = parsed.map_err(|message| ModelError::InvalidProperties {
            path: file.clone(),
            message,
        })?;
        self.flatten_properties(entries);
        Ok(())
    }

    /// Builds a sibling node from `text` and merges its entries in, keeping
    /// entries this node already has. Returns this node.
    pub fn append_from_json(&self, text: &str) -> Result<Node, ModelError> {
        let item = self.new_child(text)?;
        self.filtered_put_all(item.entries());
        Ok(self.clone())
    }

    /// Builds a child node from `text` and stores it under `key`. Returns
    /// this node.
    pub fn insert_from_json(&self, key: &str, text: &str) -> Result<Node, ModelError> {
        let item = self.new_child(text)?;
        item.set_name(key);
        self.put(key, item.into());
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn file_lists_are_trimmed() {
        assert_eq!(file_list(" a.json, ,b.json ,"), vec!["a.json", "b.json"]);
        assert!(file_list("  ").is_empty());
    }

    #[test]
    fn append_from_json_is_idempotent_and_unions() {
        let root = Node::plain();
        root.append_from_json("{ a: 1, b: { c: 2 } }").unwrap();
        root.append_from_json("{ a: 1, b: { c: 2 } }").unwrap();
        assert_eq!(root.keys(), vec!["a", "b"]);

        root.append_from_json("{ d: 'x' }").unwrap();
        assert_eq!(root.keys(), vec!["a", "b", "d"]);
    }

    #[test]
    fn appended_nodes_are_adopted() {
        let root = Node::plain();
        root.append_from_json("{ b: { c: 2 } }").unwrap();
        let b = root.get("b").and_then(|v| v.as_node().cloned()).unwrap();
        assert_eq!(b.parent().as_ref(), Some(&root));
        assert_eq!(b.path(), "b");
    }

    #[test]
    fn insert_from_json_names_the_child() {
        let root = Node::plain();
        root.insert_from_json("kid", "{ age: 3 }").unwrap();
        let kid = root.get("kid").and_then(|v| v.as_node().cloned()).unwrap();
        assert_eq!(kid.name().as_deref(), Some("kid"));
        assert_eq!(kid.path(), "kid");
        assert_eq!(kid.get("age"), Some(Value::from(3)));
    }

    #[test]
    fn json_directive_merges_file_and_keeps_local_values() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.json"), "{ colour: 'red', size: 2 }").unwrap();

        let root = Node::plain();
        root.set_current_directory(dir.path()).unwrap();
        root.append_from_json("{ $json: 'base.json', size: 5 }").unwrap();
        assert_eq!(root.get("colour"), Some(Value::from("red")));
        assert_eq!(root.get("size"), Some(Value::from(5)));
        assert!(!root.contains_key(JSON));
    }

    #[test]
    fn self_referencing_json_is_circular() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("loop.json");
        fs::write(&file, "{ $json: 'loop.json' }").unwrap();

        let root = Node::plain();
        root.set_current_directory(dir.path()).unwrap();
        let err = root.append_from_json("{ $json: 'loop.json' }").unwrap_err();
        assert!(matches!(err, ModelError::Circularity(_)));
        assert_eq!(CircularityGuard::depth(), 0);
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let root = Node::plain();
        let err = root.append_from_json("{ $json: 'nowhere.json' }").unwrap_err();
        assert!(matches!(err, ModelError::MissingFile { .. }));
    }
}
