use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use super::{EntryKind, KEY_ATTRIBUTE, MODEL_TAG};
use crate::error::ModelError;
use crate::guard::CircularityGuard;
use crate::merge::read_file;
use crate::node::Node;
use crate::value::Value;

/// Open element on the materialization stack.
enum Frame {
    Model(Node),
    Leaf {
        kind: EntryKind,
        key: String,
        node: Node,
        text: String,
    },
}

struct Materializer<'a> {
    source_id: &'a str,
    frames: Vec<Frame>,
}

impl<'a> Materializer<'a> {
    fn error(&self, message: impl Into<String>) -> ModelError {
        ModelError::InvalidXml {
            source_id: self.source_id.to_string(),
            message: message.into(),
        }
    }

    fn attributes(&self, e: &BytesStart<'_>) -> Result<Vec<(String, String)>, ModelError> {
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| self.error(err.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).trim().to_string();
            let value = attr
                .unescape_value()
                .map_err(|err| self.error(err.to_string()))?;
            attributes.push((key, value.trim().to_string()));
        }
        Ok(attributes)
    }

    fn set_directives(node: &Node, attributes: Vec<(String, String)>) {
        for (key, value) in attributes {
            if key != KEY_ATTRIBUTE {
                node.put(&format!("${key}"), Value::Text(value));
            }
        }
    }

    fn open(&mut self, root: &Node, e: &BytesStart<'_>) -> Result<(), ModelError> {
        let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let attributes = self.attributes(e)?;
        let key = attributes
            .iter()
            .find(|(k, _)| k == KEY_ATTRIBUTE)
            .map(|(_, v)| v.clone());

        let frame = match self.frames.last() {
            None => {
                Self::set_directives(root, attributes);
                Frame::Model(root.clone())
            }
            Some(Frame::Leaf { kind, .. }) => {
                return Err(self.error(format!(
                    "<{tag}> is not allowed inside <{}>",
                    kind.tag()
                )))
            }
            Some(Frame::Model(parent)) => {
                let key = key.ok_or_else(|| self.error(format!("<{tag}> has no key attribute")))?;
                if tag == MODEL_TAG {
                    let child = parent.new_item();
                    child.set_name(key.as_str());
                    parent.put(&key, Value::Node(child.clone()));
                    Self::set_directives(&child, attributes);
                    Frame::Model(child)
                } else {
                    let kind = EntryKind::from_tag(&tag)
                        .ok_or_else(|| self.error(format!("unknown element <{tag}>")))?;
                    Frame::Leaf {
                        kind,
                        key,
                        node: parent.clone(),
                        text: String::new(),
                    }
                }
            }
        };
        self.frames.push(frame);
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if let Some(Frame::Leaf { text: buffer, .. }) = self.frames.last_mut() {
            buffer.push_str(text);
        }
    }

    fn close(&mut self) -> Result<(), ModelError> {
        match self.frames.pop() {
            Some(Frame::Model(node)) => node.introspect_entries(),
            Some(Frame::Leaf {
                kind,
                key,
                node,
                text,
            }) => {
                let value = kind.parse(&node, &text)?;
                node.put(&key, value);
                Ok(())
            }
            None => Err(self.error("unbalanced closing element")),
        }
    }

    fn run(&mut self, root: &Node, text: &str) -> Result<(), ModelError> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);
        loop {
            match reader.read_event().map_err(|e| self.error(e.to_string()))? {
                Event::Start(e) => self.open(root, &e)?,
                Event::Empty(e) => {
                    self.open(root, &e)?;
                    self.close()?;
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(|e| self.error(e.to_string()))?;
                    self.text(&text);
                }
                Event::CData(t) => self.text(&String::from_utf8_lossy(&t)),
                Event::End(_) => self.close()?,
                Event::Eof => break,
                _ => {}
            }
        }
        if !self.frames.is_empty() {
            return Err(self.error("unexpected end of document"));
        }
        Ok(())
    }
}

impl Node {
    /// Materializes an XML document into a sibling node, then merges the
    /// sibling's entries in, keeping entries this node already has.
    /// Returns this node.
    pub fn append_from_xml_str(&self, text: &str) -> Result<Node, ModelError> {
        self.append_from_xml_source(text, "(inline)")
    }

    /// Like [`Node::append_from_xml_str`], reading `path`. The file is held on
    /// the circularity guard while it is materialized, and relative names
    /// inside it resolve against its directory.
    pub fn append_from_xml_file(&self, path: &Path) -> Result<Node, ModelError> {
        let guard = CircularityGuard::enter(path)?;
        debug!(file = %guard.path().display(), directive = "$xml", "loading");
        let directory = guard
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        self.set_current_directory(&directory)?;
        let text = read_file(path)?;
        self.append_from_xml_source(&text, &guard.path().display().to_string())
    }

    fn append_from_xml_source(&self, text: &str, source_id: &str) -> Result<Node, ModelError> {
        let item = self.new_item();
        item.set_parent(Some(self));
        Materializer {
            source_id,
            frames: Vec::new(),
        }
        .run(&item, text)?;
        self.filtered_put_all(item.entries());
        Ok(self.clone())
    }
}
