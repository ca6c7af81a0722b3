//! Tree-walking evaluation of parsed statements against an
//! [`EvaluationContext`].
//!
//! Names resolve through [`EvaluationContext::lookup`]; unknown names, and
//! members of values that have none, evaluate to null. Method calls on nodes
//! dispatch to [`Node::invoke`], so every node operation is reachable from
//! expressions. Lists and text carry a small set of methods of their own.

use model_tree::{EvaluationContext, ModelError, Node, Value};

use crate::ast::{Expr, UnaryOp};
use crate::error::ElError;
use crate::util::{as_index, binary, is_truthy, negate};

/// Evaluates `expr`, returning its value.
pub fn evaluate(expr: &Expr, ctx: &EvaluationContext) -> Result<Value, ModelError> {
    Interpreter { ctx }.eval(expr)
}

struct Interpreter<'a> {
    ctx: &'a EvaluationContext,
}

fn no_method(method: &str, found: &Value) -> ModelError {
    ElError::NoSuchMethod {
        method: method.to_string(),
        found: found.type_name(),
    }
    .into()
}

fn arg<'v>(method: &str, args: &'v [Value], index: usize) -> Result<&'v Value, ModelError> {
    args.get(index).ok_or_else(|| {
        ModelError::Script(format!(
            "{method}: expected at least {} argument(s) but got {}",
            index + 1,
            args.len()
        ))
    })
}

fn index_arg(method: &str, args: &[Value], index: usize) -> Result<usize, ModelError> {
    let value = arg(method, args, index)?;
    as_index(value).ok_or_else(|| ModelError::TypeMismatch {
        path: format!("{method}[{index}]"),
        expected: "index",
        found: value.type_name(),
    })
}

fn member(target: &Value, name: &str) -> Value {
    match target {
        Value::Node(node) => node.get(name).unwrap_or(Value::Null),
        Value::List(items) => match name {
            "length" | "size" => Value::from(items.len()),
            _ => as_index(&Value::from(name))
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Null),
        },
        Value::Text(s) if name == "length" => Value::from(s.chars().count()),
        Value::Failure(err) => failure_member(err, name).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn failure_member(err: &ModelError, name: &str) -> Option<Value> {
    match name {
        "message" => Some(Value::Text(err.to_string())),
        "category" => Some(Value::Text(format!("{:?}", err.category()))),
        "cause" => Some(err.cause().cloned().map(Value::from).unwrap_or(Value::Null)),
        _ => None,
    }
}

fn index(target: &Value, key: &Value) -> Value {
    match target {
        Value::Node(node) => node.get(&key.to_string()).unwrap_or(Value::Null),
        Value::List(items) => as_index(key)
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(Value::Null),
        Value::Text(s) => as_index(key)
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::Text(c.to_string()))
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn text_method(s: &str, method: &str, args: &[Value]) -> Result<Value, ModelError> {
    let text = |i: usize| arg(method, args, i).map(Value::to_string);
    let value = match method {
        "length" | "size" => Value::from(s.chars().count()),
        "isEmpty" => Value::Bool(s.is_empty()),
        "trim" => Value::from(s.trim()),
        "toUpperCase" => Value::Text(s.to_uppercase()),
        "toLowerCase" => Value::Text(s.to_lowercase()),
        "contains" => Value::Bool(s.contains(&text(0)?)),
        "startsWith" => Value::Bool(s.starts_with(&text(0)?)),
        "endsWith" => Value::Bool(s.ends_with(&text(0)?)),
        "equals" => Value::Bool(s == text(0)?),
        "indexOf" => s
            .find(&text(0)?)
            .map(|byte| Value::from(s[..byte].chars().count()))
            .unwrap_or(Value::from(-1)),
        "replace" => Value::Text(s.replace(&text(0)?, &text(1)?)),
        "split" => Value::List(s.split(&text(0)?).map(Value::from).collect()),
        "substring" => {
            let start = index_arg(method, args, 0)?;
            let chars = s.chars().skip(start);
            match args.get(1) {
                Some(_) => {
                    let end = index_arg(method, args, 1)?;
                    chars.take(end.saturating_sub(start)).collect::<String>().into()
                }
                None => chars.collect::<String>().into(),
            }
        }
        _ => return Err(no_method(method, &Value::from(s))),
    };
    Ok(value)
}

/// List methods; mutating ones hand back the modified list alongside the
/// result.
fn list_method(
    items: &[Value],
    method: &str,
    args: &[Value],
) -> Result<(Value, Option<Vec<Value>>), ModelError> {
    let read = |value: Value| -> Result<(Value, Option<Vec<Value>>), ModelError> {
        Ok((value, None))
    };
    match method {
        "size" | "length" => read(Value::from(items.len())),
        "isEmpty" => read(Value::Bool(items.is_empty())),
        "contains" => read(Value::Bool(items.contains(arg(method, args, 0)?))),
        "get" => read(items.get(index_arg(method, args, 0)?).cloned().unwrap_or(Value::Null)),
        "indexOf" => {
            let needle = arg(method, args, 0)?;
            read(
                items
                    .iter()
                    .position(|v| v == needle)
                    .map(Value::from)
                    .unwrap_or(Value::from(-1)),
            )
        }
        "join" => {
            let separator = args.first().map(Value::to_string).unwrap_or_default();
            read(Value::Text(
                items.iter().map(Value::to_string).collect::<Vec<_>>().join(&separator),
            ))
        }
        "add" => {
            let mut updated = items.to_vec();
            updated.push(arg(method, args, 0)?.clone());
            Ok((Value::Bool(true), Some(updated)))
        }
        "remove" => {
            let needle = arg(method, args, 0)?;
            let mut updated = items.to_vec();
            match updated.iter().position(|v| v == needle) {
                Some(pos) => {
                    updated.remove(pos);
                    Ok((Value::Bool(true), Some(updated)))
                }
                None => read(Value::Bool(false)),
            }
        }
        "removeAt" => {
            let pos = index_arg(method, args, 0)?;
            if pos >= items.len() {
                return read(Value::Null);
            }
            let mut updated = items.to_vec();
            let removed = updated.remove(pos);
            Ok((removed, Some(updated)))
        }
        "clear" => Ok((Value::Null, Some(Vec::new()))),
        _ => Err(no_method(method, &Value::List(items.to_vec()))),
    }
}

impl Interpreter<'_> {
    fn eval(&self, expr: &Expr) -> Result<Value, ModelError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::List(items) => Ok(Value::List(
                items.iter().map(|e| self.eval(e)).collect::<Result<_, _>>()?,
            )),
            Expr::Name(name) => Ok(self.ctx.lookup(name).unwrap_or(Value::Null)),
            Expr::Member(target, name) => Ok(member(&self.eval(target)?, name)),
            Expr::Index(target, key) => Ok(index(&self.eval(target)?, &self.eval(key)?)),
            Expr::Call {
                receiver,
                name,
                args,
            } => {
                let args = args.iter().map(|e| self.eval(e)).collect::<Result<Vec<_>, _>>()?;
                match receiver {
                    Some(receiver) => self.call_method(receiver, name, &args),
                    None => self.call_bare(name, &args),
                }
            }
            Expr::Unary(UnaryOp::Not, operand) => {
                Ok(Value::Bool(!is_truthy(&self.eval(operand)?)))
            }
            Expr::Unary(UnaryOp::Neg, operand) => Ok(negate(&self.eval(operand)?)?),
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(binary(*op, &left, &right)?)
            }
            Expr::And(left, right) => Ok(Value::Bool(
                is_truthy(&self.eval(left)?) && is_truthy(&self.eval(right)?),
            )),
            Expr::Or(left, right) => Ok(Value::Bool(
                is_truthy(&self.eval(left)?) || is_truthy(&self.eval(right)?),
            )),
            Expr::Ternary(test, then, otherwise) => {
                if is_truthy(&self.eval(test)?) {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Assign(target, value) => {
                let value = self.eval(value)?;
                match target.as_ref() {
                    Expr::Name(name) if self.ctx.binding(name).is_some() => {
                        return Err(ElError::NotAssignable(name.clone()).into())
                    }
                    Expr::Name(name) => {
                        self.ctx.assign(name, value.clone());
                    }
                    place => self.store(place, value.clone())?,
                }
                Ok(value)
            }
        }
    }

    fn call_bare(&self, name: &str, args: &[Value]) -> Result<Value, ModelError> {
        match name {
            "return" => Err(ModelError::early_return(
                args.first().cloned().unwrap_or(Value::Null),
            )),
            "raise" => Err(ElError::Raised(
                args.first().map(Value::to_string).unwrap_or_default(),
            )
            .into()),
            _ => self.ctx.this().invoke(name, args),
        }
    }

    fn call_method(&self, receiver: &Expr, name: &str, args: &[Value]) -> Result<Value, ModelError> {
        match self.eval(receiver)? {
            Value::Node(node) => node.invoke(name, args),
            Value::Text(s) => text_method(&s, name, args),
            Value::List(items) => {
                let (result, updated) = list_method(&items, name, args)?;
                if let Some(updated) = updated {
                    self.write_back(receiver, Value::List(updated))?;
                }
                Ok(result)
            }
            Value::Failure(err) => {
                failure_member(&err, name).ok_or_else(|| no_method(name, &Value::Failure(err)))
            }
            other => Err(no_method(name, &other)),
        }
    }

    /// Writes a modified list back to where `place` read it from. Values
    /// that came from anywhere else are temporaries and are dropped.
    fn write_back(&self, place: &Expr, value: Value) -> Result<(), ModelError> {
        match place {
            Expr::Name(name) => {
                if let Some(holder) = self.holder_of(name) {
                    self.ctx.store(&holder, name, value);
                }
                Ok(())
            }
            Expr::Member(..) | Expr::Index(..) => self.store(place, value),
            _ => Ok(()),
        }
    }

    /// The node a bare name was read from: the local frame, then the node
    /// and its ancestors, then the static model.
    fn holder_of(&self, name: &str) -> Option<Node> {
        if self.ctx.binding(name).is_some() {
            return None;
        }
        if self.ctx.local().contains_key(name) {
            return Some(self.ctx.local().clone());
        }
        let mut node = Some(self.ctx.this().clone());
        while let Some(current) = node {
            if current.contains_key(name) {
                return Some(current);
            }
            node = current.parent();
        }
        self.ctx
            .static_model()
            .contains_key(name)
            .then(|| self.ctx.static_model().clone())
    }

    /// Assigns through a member or index expression.
    fn store(&self, place: &Expr, value: Value) -> Result<(), ModelError> {
        match place {
            Expr::Member(target, name) => match self.eval(target)? {
                Value::Node(node) => {
                    self.ctx.store(&node, name, value);
                    Ok(())
                }
                other => {
                    Err(ElError::NotAssignable(format!("{name} of {}", other.type_name())).into())
                }
            },
            Expr::Index(target, key) => {
                let key = self.eval(key)?;
                match self.eval(target)? {
                    Value::Node(node) => {
                        self.ctx.store(&node, &key.to_string(), value);
                        Ok(())
                    }
                    Value::List(mut items) => {
                        let pos = as_index(&key)
                            .filter(|pos| *pos < items.len())
                            .ok_or_else(|| ElError::NotAssignable(format!("index {key}")))?;
                        items[pos] = value;
                        self.write_back(target, Value::List(items))
                    }
                    other => Err(ElError::NotAssignable(format!(
                        "[{key}] of {}",
                        other.type_name()
                    ))
                    .into()),
                }
            }
            other => Err(ElError::NotAssignable(format!("{other:?}")).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use model_tree::{Engine, ScopeStack};

    fn run(node: &Node, src: &str) -> Result<Value, ModelError> {
        evaluate(&parse(src).map_err(ModelError::from)?, &node.context())
    }

    #[test]
    fn names_resolve_through_the_tree() {
        let root = Engine::default().root();
        root.append_from_json("{ level: 1, kid: { name: 'k' } }").unwrap();
        let kid = root.get("kid").and_then(|v| v.as_node().cloned()).unwrap();

        assert_eq!(run(&kid, "level + 1").unwrap(), Value::from(2));
        assert_eq!(run(&kid, "$parent.level").unwrap(), Value::from(1));
        assert_eq!(run(&kid, "$self.name").unwrap(), Value::from("k"));
        assert_eq!(run(&kid, "missing").unwrap(), Value::Null);
        assert_eq!(run(&kid, "missing.deeper").unwrap(), Value::Null);
    }

    #[test]
    fn assignment_targets() {
        let root = Engine::default().root();
        root.append_from_json("{ kid: {} }").unwrap();
        let kid = root.get("kid").and_then(|v| v.as_node().cloned()).unwrap();

        run(&kid, "x = 3").unwrap();
        assert_eq!(kid.get("x"), Some(Value::from(3)));
        run(&kid, "$parent.level = x + 1").unwrap();
        assert_eq!(root.get("level"), Some(Value::from(4)));
        run(&kid, "$static.vegetable = 'cabbage'").unwrap();
        assert_eq!(run(&root, "vegetable").unwrap(), Value::from("cabbage"));
        run(&root, "$self['odd key'] = true").unwrap();
        assert_eq!(root.get("odd key"), Some(Value::Bool(true)));
        assert!(run(&root, "$self = 1").is_err());
    }

    #[test]
    fn list_mutations_write_back() {
        let root = Engine::default().root();
        root.append_from_json("{ digits: [1, 2, 3], kid: {} }").unwrap();
        let kid = root.get("kid").and_then(|v| v.as_node().cloned()).unwrap();

        assert_eq!(run(&kid, "digits.remove(digits[0])").unwrap(), Value::Bool(true));
        assert_eq!(
            root.get("digits"),
            Some(Value::List(vec![Value::from(2), Value::from(3)]))
        );
        run(&root, "digits.add(9)").unwrap();
        run(&root, "digits[0] = 7").unwrap();
        assert_eq!(
            root.get("digits"),
            Some(Value::List(vec![Value::from(7), Value::from(3), Value::from(9)]))
        );
        assert_eq!(run(&root, "digits.size()").unwrap(), Value::from(3));
    }

    #[test]
    fn local_frame_is_visible_and_writable() {
        let root = Engine::default().root();
        let _frame = ScopeStack::push([("items".to_string(), Value::List(vec![]))].into());
        run(&root, "items.add('a')").unwrap();
        assert_eq!(
            run(&root, "$local.items").unwrap(),
            Value::List(vec![Value::from("a")])
        );
        assert!(!root.contains_key("items"));
    }

    #[test]
    fn method_calls() {
        let root = Engine::default().root();
        root.append_from_json("{ inserted: { fred: 'x' } }").unwrap();
        assert_eq!(run(&root, "inserted['fred']").unwrap(), Value::from("x"));
        assert_eq!(run(&root, "inserted.path()").unwrap(), Value::from("inserted"));
        assert_eq!(run(&root, "containsKey('inserted')").unwrap(), Value::Bool(true));
        assert_eq!(run(&root, "'a,b'.split(',').size()").unwrap(), Value::from(2));
        assert_eq!(run(&root, "' Hi '.trim().toUpperCase()").unwrap(), Value::from("HI"));
        assert!(matches!(run(&root, "(1).foo()"), Err(ModelError::Script(_))));
    }

    #[test]
    fn return_and_raise() {
        let root = Engine::default().root();
        let err = run(&root, "return(4)").unwrap_err();
        assert_eq!(err.returned_value(), Some(&Value::from(4)));
        let err = run(&root, "raise('boom')").unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
