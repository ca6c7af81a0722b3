//! Hierarchical model trees assembled from JSON, XML and properties sources,
//! with a step execution engine.
//!
//! # Overview
//!
//! A [`Node`] is an ordered, shared, mutable mapping from keys to
//! [`Value`]s. Nested nodes form a tree: children are owned through the
//! mapping, parents are weak back references. `$`-prefixed directive keys
//! (`$json`, `$xml`, `$properties`, `$properties-xml`, `$onload`) pull other
//! files into a node when it is built.
//!
//! Expression handling is pluggable. An [`Engine`] carries an optional
//! [`Expander`] (read-time templating of strings) and [`Evaluator`]
//! (statement evaluation used by steps, `whileDo`, `ifThen`, ...).
//!
//! # Example
//!
//! ```
//! use model_tree::{Engine, Value};
//!
//! let root = Engine::default().root();
//! root.append_from_json("{ site: { title: 'Home', pages: [1, 2] } }").unwrap();
//!
//! let site = root.get("site").and_then(|v| v.as_node().cloned()).unwrap();
//! assert_eq!(site.path(), "site");
//! assert_eq!(root.find("site.title"), Some(Value::from("Home")));
//! ```

pub mod duration;
pub mod engine;
pub mod error;
pub mod events;
pub mod guard;
pub mod json;
pub mod merge;
pub mod methods;
pub mod node;
pub mod path;
pub mod scope;
pub mod steps;
pub mod value;
pub mod xml;

pub use engine::{Engine, EngineOptions, Evaluator, Expander};
pub use error::{ErrorCategory, ModelError};
pub use events::{EventKind, EventSink, ModelEvent, TracingSink};
pub use guard::CircularityGuard;
pub use json::parse_lenient;
pub use node::Node;
pub use scope::{EvaluationContext, ScopeFrame, ScopeStack};
pub use steps::{steps_list, steps_stream, steps_text};
pub use value::Value;
pub use xml::EntryKind;
