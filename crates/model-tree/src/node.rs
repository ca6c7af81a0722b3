//! The tree unit: an ordered, shared, mutable key → value mapping.
//!
//! Children are owned through the mapping (strong `Arc` edges); the parent
//! link is a `Weak` back reference used for upward navigation only, so a
//! subtree stays alive exactly as long as something holds it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use indexmap::IndexMap;

use crate::engine::Engine;
use crate::error::ModelError;
use crate::value::Value;

/// Reserved key holding a node's base directory for relative file names.
pub const CURRENT_DIRECTORY: &str = "$currentDirectory";

/// Reserved key overriding the engine's operation delay, in milliseconds.
pub const DELAY: &str = "$delay";

/// Key prefixes consumed by directive introspection. Entries starting with
/// any of these are never carried across by [`Node::filtered_put_all`].
pub const DIRECTIVE_PREFIXES: [&str; 5] =
    ["$onload", "$json", "$xml", "$properties", CURRENT_DIRECTORY];

struct NodeInner {
    engine: Option<Engine>,
    state: RwLock<NodeState>,
}

#[derive(Default)]
struct NodeState {
    name: Option<String>,
    parent: Weak<NodeInner>,
    entries: IndexMap<String, Value>,
}

/// Shared handle to a node. Cloning the handle does not copy the node.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl Node {
    /// Creates a detached root node whose strings expand and evaluate through
    /// `engine`.
    pub fn new(engine: Engine) -> Node {
        Node::with_engine(Some(engine))
    }

    /// Creates a detached node with no expression strategies: reads return
    /// stored values untouched. Used for binding frames and the static model.
    pub fn plain() -> Node {
        Node::with_engine(None)
    }

    fn with_engine(engine: Option<Engine>) -> Node {
        Node {
            inner: Arc::new(NodeInner {
                engine,
                state: RwLock::new(NodeState::default()),
            }),
        }
    }

    /// Creates a fresh, detached node sharing this node's engine.
    pub fn new_item(&self) -> Node {
        Node::with_engine(self.inner.engine.clone())
    }

    pub fn engine(&self) -> Option<&Engine> {
        self.inner.engine.as_ref()
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn read(&self) -> RwLockReadGuard<'_, NodeState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, NodeState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Identity and navigation ────────────────────────────────────────────

    pub fn name(&self) -> Option<String> {
        self.read().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.write().name = Some(name.into());
    }

    pub fn parent(&self) -> Option<Node> {
        self.read().parent.upgrade().map(|inner| Node { inner })
    }

    /// Replaces the parent link. Does not touch either parent's entries.
    pub fn set_parent(&self, parent: Option<&Node>) {
        let link = match parent {
            Some(p) if !p.ptr_eq(self) => Arc::downgrade(&p.inner),
            _ => Weak::new(),
        };
        self.write().parent = link;
    }

    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    pub fn root(&self) -> Node {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    // ── Reads ──────────────────────────────────────────────────────────────

    /// Stored value, without expansion.
    pub fn get_raw(&self, key: &str) -> Option<Value> {
        self.read().entries.get(key).cloned()
    }

    /// Stored value; strings are expanded on every read. The stored text is
    /// left as it was.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.get_raw(key)? {
            Value::Text(text) => Some(Value::Text(self.expand(&text))),
            other => Some(other),
        }
    }

    /// Expanded string form of a stored value.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    /// Looks `key` up on this node, then on each ancestor in turn.
    pub fn resolve(&self, key: &str) -> Option<Value> {
        let mut current = self.clone();
        loop {
            if let Some(value) = current.get(key) {
                return Some(value);
            }
            current = current.parent()?;
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.read().entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.read().entries.keys().cloned().collect()
    }

    /// Snapshot of the stored entries, in insertion order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.read()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    // ── Writes ─────────────────────────────────────────────────────────────

    /// Stores `value`, adopting it first when it is a node. An adopted node
    /// without a name takes `key` as its name.
    pub fn put(&self, key: &str, value: Value) -> Option<Value> {
        if let Value::Node(child) = &value {
            if !child.ptr_eq(self) {
                child.set_parent(Some(self));
                let mut state = child.write();
                if state.name.is_none() {
                    state.name = Some(key.to_string());
                }
            }
        }
        self.set(key, value)
    }

    /// Stores `value` as is: no adoption, no renaming.
    pub fn set(&self, key: &str, value: Value) -> Option<Value> {
        self.write().entries.insert(key.to_string(), value)
    }

    pub fn put_all<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (key, value) in entries {
            self.put(&key, value);
        }
    }

    /// Merges `entries` in, skipping directive keys and keys this node
    /// already holds.
    pub fn filtered_put_all<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (key, value) in entries {
            if is_directive_key(&key) || self.contains_key(&key) {
                continue;
            }
            self.put(&key, value);
        }
    }

    /// Removes `key`, preserving the order of the remaining entries.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.write().entries.shift_remove(key)
    }

    pub fn clear(&self) {
        self.write().entries.clear();
    }

    /// Mutates the stored value in place. The closure runs under this node's
    /// write lock and must not reach back into the tree.
    pub fn update<R>(&self, key: &str, f: impl FnOnce(&mut Value) -> R) -> Option<R> {
        self.write().entries.get_mut(key).map(f)
    }

    // ── Files and directories ─────────────────────────────────────────────

    /// Base directory for relative file names: this node's
    /// `$currentDirectory`, else the nearest ancestor's, else `.`.
    pub fn current_directory(&self) -> PathBuf {
        match self.get(CURRENT_DIRECTORY) {
            Some(Value::Text(dir)) => PathBuf::from(dir),
            _ => self
                .parent()
                .map(|p| p.current_directory())
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    /// Points relative file resolution at `directory`. The entry is only
    /// written when it differs from the inherited directory.
    pub fn set_current_directory(&self, directory: &Path) -> Result<(), ModelError> {
        if !directory.exists() {
            return Err(ModelError::MissingDirectory(directory.to_path_buf()));
        }
        if !directory.is_dir() {
            return Err(ModelError::NotADirectory(directory.to_path_buf()));
        }
        if self.current_directory() != directory {
            self.put(
                CURRENT_DIRECTORY,
                Value::Text(directory.to_string_lossy().into_owned()),
            );
        }
        Ok(())
    }

    /// Resolves `name` as given when it exists, otherwise relative to
    /// [`Node::current_directory`].
    pub fn local_file(&self, name: &str) -> Result<PathBuf, ModelError> {
        let direct = PathBuf::from(name);
        if direct.exists() {
            return Ok(direct);
        }
        let directory = self.current_directory();
        let relative = directory.join(name);
        if relative.exists() {
            return Ok(relative);
        }
        Err(ModelError::MissingFile {
            directory,
            name: name.to_string(),
        })
    }

    // ── Pacing ─────────────────────────────────────────────────────────────

    /// Sleeps for this node's `$delay` milliseconds, or the engine default.
    pub fn maybe_delay(&self) {
        std::thread::sleep(self.operation_delay());
    }

    pub fn operation_delay(&self) -> Duration {
        let configured = self.get(DELAY).and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::Text(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        });
        match configured {
            Some(millis) => Duration::from_millis(millis),
            None => self
                .engine()
                .map(Engine::operation_delay)
                .unwrap_or(Duration::ZERO),
        }
    }
}

pub fn is_directive_key(key: &str) -> bool {
    DIRECTIVE_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Node")
            .field("name", &state.name)
            .field("entries", &state.entries)
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
