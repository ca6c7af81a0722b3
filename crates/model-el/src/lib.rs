//! A small expression language for `model-tree`.
//!
//! # Overview
//!
//! [`ElExpander`] fills `${ expression }` placeholders when node values are
//! read, and [`ElEvaluator`] runs the statements of step sequences, loop
//! tests and `$onload` hooks. Statements support assignment, arithmetic,
//! comparison, logic, the ternary operator, dotted paths rooted at `$self`,
//! `$parent`, `$local` and `$static`, indexing and method calls on nodes,
//! lists and text.
//!
//! # Example
//!
//! ```
//! use model_el::engine;
//! use model_tree::Value;
//!
//! let root = engine().root();
//! root.append_from_json("{ count: 5, label: 'left: ${count}' }").unwrap();
//! root.steps("whileDo('count > 0', 'count = count - 1', 10)").unwrap();
//!
//! assert_eq!(root.get("count"), Some(Value::from(0)));
//! assert_eq!(root.get("label"), Some(Value::from("left: 0")));
//! ```

pub mod ast;
pub mod cli;
pub mod error;
pub mod evaluate;
pub mod evaluator;
pub mod expander;
pub mod lexer;
pub mod parser;
pub mod util;

pub use error::ElError;
pub use evaluate::evaluate;
pub use evaluator::ElEvaluator;
pub use expander::ElExpander;
pub use parser::parse;

use model_tree::{Engine, EngineOptions};

/// Engine options with this language installed as both expander and
/// evaluator.
pub fn engine_options() -> EngineOptions {
    EngineOptions::default()
        .with_expander(ElExpander)
        .with_evaluator(ElEvaluator)
}

/// A fresh engine built from [`engine_options`].
pub fn engine() -> Engine {
    Engine::new(engine_options())
}
