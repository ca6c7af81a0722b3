//! By-name dispatch of node operations, for expression evaluators that
//! expose method calls on nodes.

use crate::error::ModelError;
use crate::node::Node;
use crate::value::Value;

fn arg<'a>(method: &str, args: &'a [Value], index: usize) -> Result<&'a Value, ModelError> {
    args.get(index).ok_or_else(|| {
        ModelError::Script(format!(
            "{method}: expected at least {} argument(s) but got {}",
            index + 1,
            args.len()
        ))
    })
}

fn text_arg(method: &str, args: &[Value], index: usize) -> Result<String, ModelError> {
    match arg(method, args, index)? {
        Value::Text(s) => Ok(s.clone()),
        other => Err(ModelError::TypeMismatch {
            path: format!("{method}[{index}]"),
            expected: "string",
            found: other.type_name(),
        }),
    }
}

fn count_arg(method: &str, args: &[Value], index: usize) -> Result<usize, ModelError> {
    let value = arg(method, args, index)?;
    value
        .as_f64()
        .filter(|n| *n >= 0.0 && n.fract() == 0.0)
        .map(|n| n as usize)
        .ok_or_else(|| ModelError::TypeMismatch {
            path: format!("{method}[{index}]"),
            expected: "count",
            found: value.type_name(),
        })
}

/// Optional trailing argument map, as accepted by `steps` and `call`.
fn args_arg(args: &[Value], index: usize) -> Vec<(String, Value)> {
    match args.get(index) {
        Some(Value::Node(node)) => node.entries(),
        _ => Vec::new(),
    }
}

fn node_or_null(node: Option<Node>) -> Value {
    node.map(Value::Node).unwrap_or(Value::Null)
}

impl Node {
    /// Invokes the operation called `method` with positional `args`.
    ///
    /// Operations returning the receiver come back as [`Value::Node`], so
    /// calls chain naturally in expressions. `return(value)` raises the
    /// early-return signal.
    pub fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, ModelError> {
        let node = |n: Node| -> Result<Value, ModelError> { Ok(Value::Node(n)) };
        match method {
            "whileDo" => node(self.while_do(
                &text_arg(method, args, 0)?,
                arg(method, args, 1)?.clone(),
                count_arg(method, args, 2)?,
            )?),
            "whileDoAll" => {
                let operations = match arg(method, args, 1)? {
                    Value::List(items) => items.iter().map(Value::to_string).collect::<Vec<_>>(),
                    other => vec![other.to_string()],
                };
                node(self.while_do_all(
                    &text_arg(method, args, 0)?,
                    &operations,
                    count_arg(method, args, 2)?,
                )?)
            }
            "ifThen" => node(self.if_then(&text_arg(method, args, 0)?, arg(method, args, 1)?.clone())?),
            "ifThenElse" => node(self.if_then_else(
                &text_arg(method, args, 0)?,
                arg(method, args, 1)?.clone(),
                arg(method, args, 2)?.clone(),
            )?),
            "tryExcept" => node(self.try_except(
                arg(method, args, 0)?.clone(),
                arg(method, args, 1)?.clone(),
            )?),
            "steps" => self.steps_with(&text_arg(method, args, 0)?, args_arg(args, 1)),
            "call" => self.call_with(&text_arg(method, args, 0)?, args_arg(args, 1)),
            "run" => self.run(),
            "getItem" => node(self.get_item(&text_arg(method, args, 0)?)?),
            "path" => Ok(Value::Text(self.path())),
            "getName" => Ok(self.name().map(Value::Text).unwrap_or(Value::Null)),
            "getParent" => Ok(node_or_null(self.parent())),
            "getRoot" => node(self.root()),
            "appendFromJson" => node(self.append_from_json(&text_arg(method, args, 0)?)?),
            "insertFromJson" => node(self.insert_from_json(
                &text_arg(method, args, 0)?,
                &text_arg(method, args, 1)?,
            )?),
            "appendFromXml" => node(self.append_from_xml_str(&text_arg(method, args, 0)?)?),
            "toJson" => self.to_json().map(Value::Text),
            "maybeDelay" => {
                self.maybe_delay();
                node(self.clone())
            }
            "get" => Ok(self.get(&text_arg(method, args, 0)?).unwrap_or(Value::Null)),
            "put" => Ok(self
                .put(&text_arg(method, args, 0)?, arg(method, args, 1)?.clone())
                .unwrap_or(Value::Null)),
            "putStatic" => Ok(self
                .put_static(&text_arg(method, args, 0)?, arg(method, args, 1)?.clone())
                .unwrap_or(Value::Null)),
            "containsKey" => Ok(Value::Bool(self.contains_key(&text_arg(method, args, 0)?))),
            "size" => Ok(Value::from(self.len())),
            "isEmpty" => Ok(Value::Bool(self.is_empty())),
            "keys" => Ok(Value::List(self.keys().into_iter().map(Value::Text).collect())),
            "remove" => Ok(self.remove(&text_arg(method, args, 0)?).unwrap_or(Value::Null)),
            "expand" => Ok(Value::Text(self.expand(&text_arg(method, args, 0)?))),
            "eval" => self.eval(&text_arg(method, args, 0)?),
            "return" => Err(ModelError::early_return(
                args.first().cloned().unwrap_or(Value::Null),
            )),
            _ => Err(ModelError::Script(format!(
                "no operation '{method}' on node '{}'",
                self.path()
            ))),
        }
    }
}
