//! Pluggable expression strategies and the state shared by every node of a
//! tree.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ModelError;
use crate::events::{EventSink, ModelEvent, TracingSink};
use crate::node::Node;
use crate::scope::EvaluationContext;
use crate::value::Value;

/// Lazy read-time templating: template text in, text out.
///
/// Expansion never fails; placeholders that cannot be resolved are left to
/// the implementation to render (typically verbatim).
pub trait Expander: Send + Sync {
    fn expand(&self, text: &str, ctx: &EvaluationContext) -> String;
}

impl<F> Expander for F
where
    F: Fn(&str, &EvaluationContext) -> String + Send + Sync,
{
    fn expand(&self, text: &str, ctx: &EvaluationContext) -> String {
        self(text, ctx)
    }
}

/// Evaluates one statement against a binding container.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, statement: &str, ctx: &EvaluationContext) -> Result<Value, ModelError>;
}

impl<F> Evaluator for F
where
    F: Fn(&str, &EvaluationContext) -> Result<Value, ModelError> + Send + Sync,
{
    fn evaluate(&self, statement: &str, ctx: &EvaluationContext) -> Result<Value, ModelError> {
        self(statement, ctx)
    }
}

/// Options for [`Engine::new`].
pub struct EngineOptions {
    pub expander: Option<Arc<dyn Expander>>,
    pub evaluator: Option<Arc<dyn Evaluator>>,
    pub event_sink: Arc<dyn EventSink>,
    /// Pause used by [`Node::maybe_delay`] when a node has no `$delay`.
    pub operation_delay: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            expander: None,
            evaluator: None,
            event_sink: Arc::new(TracingSink),
            operation_delay: Duration::from_millis(100),
        }
    }
}

impl EngineOptions {
    pub fn with_expander(mut self, expander: impl Expander + 'static) -> Self {
        self.expander = Some(Arc::new(expander));
        self
    }

    pub fn with_evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    pub fn with_event_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.event_sink = Arc::new(sink);
        self
    }

    pub fn with_operation_delay(mut self, delay: Duration) -> Self {
        self.operation_delay = delay;
        self
    }
}

struct EngineInner {
    expander: Option<Arc<dyn Expander>>,
    evaluator: Option<Arc<dyn Evaluator>>,
    event_sink: Arc<dyn EventSink>,
    operation_delay: Duration,
    static_model: Node,
}

/// Cheap-clone handle shared by the nodes of one or more trees.
///
/// Owns the `$static` model: a single mutable mapping visible to every node
/// built on this engine, living until the engine is dropped or the caller
/// clears it.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        Engine {
            inner: Arc::new(EngineInner {
                expander: options.expander,
                evaluator: options.evaluator,
                event_sink: options.event_sink,
                operation_delay: options.operation_delay,
                static_model: Node::plain(),
            }),
        }
    }

    pub fn expander(&self) -> Option<&Arc<dyn Expander>> {
        self.inner.expander.as_ref()
    }

    pub fn evaluator(&self) -> Option<&Arc<dyn Evaluator>> {
        self.inner.evaluator.as_ref()
    }

    pub fn static_model(&self) -> &Node {
        &self.inner.static_model
    }

    pub fn operation_delay(&self) -> Duration {
        self.inner.operation_delay
    }

    pub fn notify(&self, event: &ModelEvent) {
        self.inner.event_sink.notify(event);
    }

    /// Creates an empty root node bound to this engine.
    pub fn root(&self) -> Node {
        Node::new(self.clone())
    }

    pub fn ptr_eq(&self, other: &Engine) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(EngineOptions::default())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("expander", &self.inner.expander.is_some())
            .field("evaluator", &self.inner.evaluator.is_some())
            .field("operation_delay", &self.inner.operation_delay)
            .finish()
    }
}
