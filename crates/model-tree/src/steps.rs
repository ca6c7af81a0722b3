//! Step sequences and the control-flow operations built on them.

use indexmap::IndexMap;

use crate::error::ModelError;
use crate::events::{EventKind, ModelEvent};
use crate::node::Node;
use crate::scope::ScopeStack;
use crate::value::Value;

/// Key run by [`Node::run`] in preference to [`STEPS`].
pub const RUN: &str = "$$run";
pub const STEPS: &str = "$steps";

/// Splits step text into statements.
///
/// Blank lines and lines starting with `#` are dropped. Statements end at a
/// `;` or at the end of a line, except inside quotes or open brackets, where
/// the statement carries on across the line break.
pub fn steps_stream(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for line in text.lines() {
        let line = line.trim();
        let continuing = quote.is_some() || depth > 0;
        if !continuing && (line.is_empty() || line.starts_with('#')) {
            continue;
        }
        if continuing {
            current.push(' ');
        }
        let mut chars = line.chars();
        while let Some(c) = chars.next() {
            match quote {
                Some(q) => {
                    current.push(c);
                    if c == '\\' {
                        if let Some(escaped) = chars.next() {
                            current.push(escaped);
                        }
                    } else if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    '\'' | '"' => {
                        quote = Some(c);
                        current.push(c);
                    }
                    '(' | '[' | '{' => {
                        depth += 1;
                        current.push(c);
                    }
                    ')' | ']' | '}' => {
                        depth = depth.saturating_sub(1);
                        current.push(c);
                    }
                    ';' if depth == 0 => flush(&mut current, &mut statements),
                    _ => current.push(c),
                },
            }
        }
        if quote.is_none() && depth == 0 {
            flush(&mut current, &mut statements);
        }
    }
    flush(&mut current, &mut statements);
    statements
}

fn flush(current: &mut String, statements: &mut Vec<String>) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}

/// Step text from a value: lists are joined one statement per line.
pub fn steps_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::List(items) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(";\n"),
        other => other.to_string(),
    }
}

/// Operations from a value: each list item is one operation, anything else
/// is a single operation.
pub fn steps_list(value: &Value) -> Vec<String> {
    match value {
        Value::List(items) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(Value::to_string)
            .collect(),
        other => vec![other.to_string()],
    }
}

impl Node {
    fn notify(&self, kind: EventKind, message: String) {
        if let Some(engine) = self.engine() {
            engine.notify(&ModelEvent::new(kind, self.path(), message));
        }
    }

    /// Runs `text` as a step sequence with an empty `$local` frame.
    pub fn steps(&self, text: &str) -> Result<Value, ModelError> {
        self.steps_with(text, IndexMap::new())
    }

    /// Runs `text` as a step sequence with `$local` seeded from `args`.
    ///
    /// Each statement is expanded and then evaluated; the value of the last
    /// one is the result. An early return anywhere in the sequence ends it
    /// with the returned value.
    pub fn steps_with<I>(&self, text: &str, args: I) -> Result<Value, ModelError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let _frame = ScopeStack::push(args.into_iter().collect());
        let indent = "  ".repeat(ScopeStack::depth());
        let path = self.path();
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}:")
        };
        self.notify(EventKind::StepsStart, format!("{indent}{prefix} (inline)"));

        let outcome = steps_stream(text).into_iter().try_fold(Value::Null, |_, step| {
            self.notify(EventKind::StepStart, format!("{indent} -> {step}"));
            self.eval(&self.expand(&step))
        });

        match outcome {
            Ok(value) => Ok(value),
            Err(err) => match err.returned_value() {
                Some(value) => Ok(value.clone()),
                None => Err(err.collapse()),
            },
        }
    }

    /// Runs the steps stored at `key`.
    pub fn call(&self, key: &str) -> Result<Value, ModelError> {
        self.call_with(key, IndexMap::new())
    }

    pub fn call_with<I>(&self, key: &str, args: I) -> Result<Value, ModelError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        match self.get_raw(key) {
            Some(value) if !value.is_null() => self.steps_with(&steps_text(&value), args),
            _ => Err(ModelError::TypeMismatch {
                path: key.to_string(),
                expected: "steps",
                found: "null",
            }),
        }
    }

    /// Runs `$$run`, or `$steps` when there is no `$$run`.
    pub fn run(&self) -> Result<Value, ModelError> {
        if self.contains_key(RUN) || !self.contains_key(STEPS) {
            self.call(RUN)
        } else {
            self.call(STEPS)
        }
    }

    /// Expands and evaluates `test`, insisting on a boolean.
    fn test(&self, test: &str) -> Result<bool, ModelError> {
        match self.eval(&self.expand(test))? {
            Value::Bool(b) => Ok(b),
            other => Err(ModelError::TypeMismatch {
                path: test.to_string(),
                expected: "boolean",
                found: other.type_name(),
            }),
        }
    }

    pub fn if_then(&self, test: &str, then: impl Into<Value>) -> Result<Node, ModelError> {
        if self.test(test)? {
            self.steps(&steps_text(&then.into()))?;
        }
        Ok(self.clone())
    }

    pub fn if_then_else(
        &self,
        test: &str,
        then: impl Into<Value>,
        otherwise: impl Into<Value>,
    ) -> Result<Node, ModelError> {
        let branch = if self.test(test)? {
            then.into()
        } else {
            otherwise.into()
        };
        self.steps(&steps_text(&branch))?;
        Ok(self.clone())
    }

    /// Repeats `operations` while `test` holds, at most `max_tries` times.
    ///
    /// Failing tests count as true and failing operations are skipped; both
    /// are reported as events. An early return propagates at once. Running
    /// out of tries while the test still holds is an
    /// [`ModelError::OutOfTries`].
    pub fn while_do(
        &self,
        test: &str,
        operations: impl Into<Value>,
        max_tries: usize,
    ) -> Result<Node, ModelError> {
        let operations = steps_list(&operations.into());
        let mut tries = 0;
        while self.while_test(test, tries)? {
            if tries >= max_tries {
                return Err(ModelError::OutOfTries {
                    tries,
                    test: test.to_string(),
                });
            }
            tries += 1;
            for operation in &operations {
                if let Err(err) = self.eval(&self.expand(operation)) {
                    let err = match err.into_return_signal() {
                        Ok(signal) => return Err(signal),
                        Err(err) => err,
                    };
                    self.notify(
                        EventKind::WhileDoOperation,
                        format!(
                            "whileDo: operation [{tries}: {operation}]; [{:?}] {err}",
                            err.category()
                        ),
                    );
                }
            }
        }
        Ok(self.clone())
    }

    pub fn while_do_all(
        &self,
        test: &str,
        operations: &[String],
        max_tries: usize,
    ) -> Result<Node, ModelError> {
        let operations = operations.iter().map(|op| Value::from(op.as_str())).collect::<Vec<_>>();
        self.while_do(test, operations, max_tries)
    }

    fn while_test(&self, test: &str, tries: usize) -> Result<bool, ModelError> {
        match self.test(test) {
            Ok(holds) => {
                if tries > 0 || !holds {
                    self.notify(
                        EventKind::WhileDoTest,
                        format!("whileDo [{tries}]: test: '{test}' == {holds}"),
                    );
                }
                Ok(holds)
            }
            Err(err) => {
                let err = match err.into_return_signal() {
                    Ok(signal) => return Err(signal),
                    Err(err) => err,
                };
                self.notify(
                    EventKind::WhileDoTest,
                    format!("whileDo: test [{tries}: {test}]; [{:?}] {err}", err.category()),
                );
                Ok(true)
            }
        }
    }

    /// Runs `operations`; if they fail, runs `on_exception` with the failure
    /// bound to `exception` in its `$local` frame. Failures raised by the
    /// handler itself propagate.
    pub fn try_except(
        &self,
        operations: impl Into<Value>,
        on_exception: impl Into<Value>,
    ) -> Result<Node, ModelError> {
        if let Err(err) = self.steps(&steps_text(&operations.into())) {
            self.notify(
                EventKind::ExceptionHandled,
                format!("Handling exception: [{:?}]: {err}", err.category()),
            );
            let handler = steps_text(&on_exception.into());
            self.steps_with(&handler, [("exception".to_string(), Value::from(err))])?;
        }
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::engine::{Engine, EngineOptions};
    use crate::scope::EvaluationContext;

    #[test]
    fn splitter_drops_comments_and_blank_lines() {
        let text = "# setup\n a = 1 ;b = 2\n\n  # more\nc = 3;;";
        assert_eq!(steps_stream(text), vec!["a = 1", "b = 2", "c = 3"]);
    }

    #[test]
    fn splitter_respects_quotes_and_brackets() {
        assert_eq!(
            steps_stream("x = 'a;b'; y = f(1;\n 2); z = \"q\\\";\""),
            vec!["x = 'a;b'", "y = f(1; 2)", "z = \"q\\\";\""]
        );
        assert_eq!(
            steps_stream("whileDo('n > 0',\n  'n = n - 1',\n  3)"),
            vec!["whileDo('n > 0', 'n = n - 1', 3)"]
        );
    }

    #[test]
    fn steps_text_joins_lists() {
        let list = Value::List(vec![Value::from("a = 1"), Value::Null, Value::from("b = 2")]);
        assert_eq!(steps_text(&list), "a = 1;\nb = 2");
        assert_eq!(steps_list(&list), vec!["a = 1", "b = 2"]);
        assert_eq!(steps_list(&Value::from("x")), vec!["x"]);
    }

    /// Records each evaluated statement and returns it as text, except
    /// `fail` which raises and `ret` which returns early with 7.
    fn recording_engine(seen: Arc<Mutex<Vec<String>>>) -> Engine {
        Engine::new(
            EngineOptions::default()
                .with_evaluator(move |s: &str, _ctx: &EvaluationContext| -> Result<Value, ModelError> {
                    seen.lock().unwrap().push(s.to_string());
                    match s {
                        "fail" => Err(ModelError::Script("failed".into())),
                        "ret" => Err(ModelError::early_return(Value::from(7))),
                        "yes" => Ok(Value::Bool(true)),
                        "no" => Ok(Value::Bool(false)),
                        other => Ok(Value::from(other)),
                    }
                })
                .with_event_sink(|_: &ModelEvent| {}),
        )
    }

    #[test]
    fn steps_return_last_value_and_pop_frame() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let node = Node::new(recording_engine(seen.clone()));
        assert_eq!(node.steps("a; b").unwrap(), Value::from("b"));
        assert_eq!(ScopeStack::depth(), 0);
        assert!(node.steps("a; fail; c").is_err());
        assert_eq!(ScopeStack::depth(), 0);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "a", "fail"]);
    }

    #[test]
    fn early_return_ends_sequence_with_value() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let node = Node::new(recording_engine(seen.clone()));
        assert_eq!(node.steps("a; ret; c").unwrap(), Value::from(7));
        assert_eq!(*seen.lock().unwrap(), vec!["a", "ret"]);
    }

    #[test]
    fn same_category_failures_are_collapsed() {
        let node = Node::new(recording_engine(Arc::default()));
        match node.steps("fail").unwrap_err() {
            ModelError::Script(msg) => assert_eq!(msg, "failed"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn events_are_indented_by_depth() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let engine = Engine::new(
            EngineOptions::default()
                .with_evaluator(|s: &str, _ctx: &EvaluationContext| -> Result<Value, ModelError> {
                    Ok(Value::from(s))
                })
                .with_event_sink(move |e: &ModelEvent| sink.lock().unwrap().push(e.clone())),
        );
        let root = Node::new(engine);
        let child = root.new_item();
        root.put("child", Value::Node(child.clone()));
        child.steps("a").unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events[0].kind, EventKind::StepsStart);
        assert_eq!(events[0].message, "  child: (inline)");
        assert_eq!(events[1].kind, EventKind::StepStart);
        assert_eq!(events[1].message, "   -> a");
        assert_eq!(events[1].path, "child");
    }

    #[test]
    fn run_prefers_run_key_over_steps() {
        let node = Node::new(recording_engine(Arc::default()));
        node.put(STEPS, Value::from("from-steps"));
        assert_eq!(node.run().unwrap(), Value::from("from-steps"));
        node.put(RUN, Value::from("from-run"));
        assert_eq!(node.run().unwrap(), Value::from("from-run"));
        assert!(matches!(
            Node::new(Engine::default()).run(),
            Err(ModelError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn if_then_requires_boolean_test() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let node = Node::new(recording_engine(seen.clone()));
        node.if_then("yes", "a").unwrap();
        node.if_then("no", "b").unwrap();
        node.if_then_else("no", "c", "d").unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["yes", "a", "no", "no", "d"]);
        assert!(matches!(
            node.if_then("text", "x"),
            Err(ModelError::TypeMismatch { expected: "boolean", .. })
        ));
    }

    #[test]
    fn while_do_with_always_true_test_runs_out_of_tries() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let node = Node::new(recording_engine(seen.clone()));
        match node.while_do("yes", "op", 2) {
            Err(ModelError::OutOfTries { tries, test }) => {
                assert_eq!(tries, 2);
                assert_eq!(test, "yes");
            }
            other => panic!("unexpected: {other:?}"),
        }
        let ops = seen.lock().unwrap().iter().filter(|s| *s == "op").count();
        assert_eq!(ops, 2);
    }

    #[test]
    fn while_do_treats_failing_test_as_true() {
        let node = Node::new(recording_engine(Arc::default()));
        assert!(matches!(
            node.while_do("fail", "op", 3),
            Err(ModelError::OutOfTries { tries: 3, .. })
        ));
    }

    #[test]
    fn while_do_skips_failing_operations_but_not_returns() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let node = Node::new(recording_engine(seen.clone()));
        assert!(matches!(
            node.while_do("yes", vec![Value::from("fail"), Value::from("op")], 1),
            Err(ModelError::OutOfTries { tries: 1, .. })
        ));
        assert!(seen.lock().unwrap().contains(&"op".to_string()));

        match node.while_do("yes", "ret", 5) {
            Err(err) => assert_eq!(err.returned_value(), Some(&Value::from(7))),
            Ok(_) => panic!("expected early return"),
        }
    }

    #[test]
    fn try_except_binds_exception_and_returns_receiver() {
        let caught = Arc::new(Mutex::new(Vec::new()));
        let sink = caught.clone();
        let engine = Engine::new(
            EngineOptions::default()
                .with_evaluator(move |s: &str, ctx: &EvaluationContext| -> Result<Value, ModelError> {
                    match s {
                        "fail" => Err(ModelError::Script("bad thing".into())),
                        "handle" => {
                            let exception = ctx.local().get_raw("exception").unwrap_or(Value::Null);
                            sink.lock().unwrap().push(exception);
                            Ok(Value::Null)
                        }
                        _ => Ok(Value::Null),
                    }
                })
                .with_event_sink(|_: &ModelEvent| {}),
        );
        let node = Node::new(engine);
        let returned = node.try_except("fail", "handle").unwrap();
        assert!(returned.ptr_eq(&node));

        {
            let caught = caught.lock().unwrap();
            assert_eq!(caught.len(), 1);
            let failure = caught[0].as_failure().expect("failure bound");
            assert_eq!(failure.to_string(), "bad thing");
        }

        node.try_except("fine", "handle").unwrap();
        assert_eq!(caught.lock().unwrap().len(), 1);
    }
}
