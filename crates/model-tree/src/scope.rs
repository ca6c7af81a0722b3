//! Local binding frames and the per-call binding container handed to the
//! expression strategies.

use std::cell::RefCell;
use std::marker::PhantomData;

use indexmap::IndexMap;

use crate::error::ModelError;
use crate::node::Node;
use crate::steps::steps_stream;
use crate::value::Value;

pub const SELF: &str = "$self";
pub const PARENT: &str = "$parent";
pub const LOCAL: &str = "$local";
pub const STATIC: &str = "$static";

thread_local! {
    static SCOPE_STACK: RefCell<Vec<Node>> = const { RefCell::new(Vec::new()) };
}

/// The calling thread's stack of `$local` frames.
pub struct ScopeStack;

impl ScopeStack {
    /// Pushes a frame holding `args`; the frame is popped when the returned
    /// guard drops, whichever way the caller exits. Nodes passed in stay
    /// owned by their own parents.
    pub fn push(args: IndexMap<String, Value>) -> ScopeFrame {
        let frame = Node::plain();
        for (key, value) in args {
            frame.set(&key, value);
        }
        SCOPE_STACK.with(|stack| stack.borrow_mut().push(frame.clone()));
        ScopeFrame {
            frame,
            _not_send: PhantomData,
        }
    }

    /// Innermost frame, if any.
    pub fn top() -> Option<Node> {
        SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
    }

    pub fn depth() -> usize {
        SCOPE_STACK.with(|stack| stack.borrow().len())
    }
}

#[must_use = "the frame is popped as soon as the guard is dropped"]
pub struct ScopeFrame {
    frame: Node,
    _not_send: PhantomData<*const ()>,
}

impl ScopeFrame {
    pub fn node(&self) -> &Node {
        &self.frame
    }
}

impl Drop for ScopeFrame {
    fn drop(&mut self) {
        SCOPE_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|n| n.ptr_eq(&self.frame)) {
                stack.truncate(pos);
            }
        });
    }
}

/// Binding container for one expansion or evaluation call.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    this: Node,
    parent: Option<Node>,
    local: Node,
    static_model: Node,
}

impl EvaluationContext {
    pub fn new(this: &Node) -> Self {
        EvaluationContext {
            this: this.clone(),
            parent: this.parent(),
            local: ScopeStack::top().unwrap_or_else(Node::plain),
            static_model: this
                .engine()
                .map(|e| e.static_model().clone())
                .unwrap_or_else(Node::plain),
        }
    }

    /// `$self`
    pub fn this(&self) -> &Node {
        &self.this
    }

    /// `$parent`
    pub fn parent(&self) -> Option<&Node> {
        self.parent.as_ref()
    }

    /// `$local`
    pub fn local(&self) -> &Node {
        &self.local
    }

    /// `$static`
    pub fn static_model(&self) -> &Node {
        &self.static_model
    }

    /// One of the four reserved binding names.
    pub fn binding(&self, name: &str) -> Option<Value> {
        match name {
            SELF => Some(Value::Node(self.this.clone())),
            PARENT => Some(self.parent.clone().map(Value::Node).unwrap_or(Value::Null)),
            LOCAL => Some(Value::Node(self.local.clone())),
            STATIC => Some(Value::Node(self.static_model.clone())),
            _ => None,
        }
    }

    /// Resolves a bare name: reserved bindings, then the local frame, then
    /// the node and its ancestors, and finally the static model.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.binding(name)
            .or_else(|| self.local.get_raw(name))
            .or_else(|| self.this.resolve(name))
            .or_else(|| self.static_model.get_raw(name))
    }

    /// Bare-name assignment always targets the node itself.
    pub fn assign(&self, name: &str, value: Value) -> Option<Value> {
        self.this.put(name, value)
    }

    /// Stores `value` under `key` on `target`. The `$local` frame only
    /// binds values; every other node adopts them.
    pub fn store(&self, target: &Node, key: &str, value: Value) -> Option<Value> {
        if target.ptr_eq(&self.local) {
            target.set(key, value)
        } else {
            target.put(key, value)
        }
    }
}

impl Node {
    /// A fresh binding container for this node.
    pub fn context(&self) -> EvaluationContext {
        EvaluationContext::new(self)
    }

    /// Runs `text` through the engine's expander, or returns it unchanged.
    pub fn expand(&self, text: &str) -> String {
        match self.engine().and_then(|e| e.expander()) {
            Some(expander) => expander.expand(text, &self.context()),
            None => text.to_string(),
        }
    }

    /// Evaluates every statement in `text` against one binding container and
    /// returns the value of the last.
    ///
    /// Failures are wrapped as [`ModelError::Evaluation`] naming the
    /// statement that failed.
    pub fn eval(&self, text: &str) -> Result<Value, ModelError> {
        let Some(evaluator) = self.engine().and_then(|e| e.evaluator()).cloned() else {
            return Err(ModelError::NoEvaluator(text.to_string()));
        };
        let ctx = self.context();
        let mut last = Value::Null;
        for statement in steps_stream(text) {
            last = evaluator
                .evaluate(&statement, &ctx)
                .map_err(|e| ModelError::evaluation(statement.clone(), e))?;
        }
        Ok(last)
    }

    /// Adds an entry to the static model shared by every node of this
    /// engine. Returns the previous value.
    pub fn put_static(&self, key: &str, value: Value) -> Option<Value> {
        self.engine().and_then(|e| e.static_model().put(key, value))
    }

    pub fn static_model(&self) -> Option<Node> {
        self.engine().map(|e| e.static_model().clone())
    }
}
