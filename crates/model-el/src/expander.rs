use std::cell::Cell;

use model_tree::{EvaluationContext, Expander, Value};
use tracing::trace;

use crate::evaluate::evaluate;
use crate::parser::parse;

/// Nested expansions deeper than this are left verbatim, which stops
/// mutually referencing templates.
const MAX_DEPTH: usize = 32;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Option<DepthGuard> {
        DEPTH.with(|depth| {
            if depth.get() >= MAX_DEPTH {
                None
            } else {
                depth.set(depth.get() + 1);
                Some(DepthGuard)
            }
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// `${ expression }` templating.
///
/// Each placeholder is parsed and evaluated against the context and replaced
/// by the value's string form, with null rendering as nothing. Placeholders
/// that fail to parse or evaluate stay in the text as written.
#[derive(Debug, Default, Clone, Copy)]
pub struct ElExpander;

/// Byte offset of the `}` closing a placeholder whose body starts at
/// `start`, skipping braces inside quotes and nested braces.
fn closing_brace(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '{' => depth += 1,
            '}' if depth == 0 => return Some(start + offset),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn render(expression: &str, ctx: &EvaluationContext) -> Option<String> {
    let expr = parse(expression.trim()).ok()?;
    match evaluate(&expr, ctx).ok()? {
        Value::Null => Some(String::new()),
        value => Some(value.to_string()),
    }
}

impl Expander for ElExpander {
    fn expand(&self, text: &str, ctx: &EvaluationContext) -> String {
        if !text.contains("${") {
            return text.to_string();
        }
        let Some(_depth) = DepthGuard::enter() else {
            return text.to_string();
        };

        let mut out = String::with_capacity(text.len());
        let mut rest = 0;
        while let Some(found) = text[rest..].find("${") {
            let open = rest + found;
            let body = open + 2;
            let Some(close) = closing_brace(text, body) else {
                break;
            };
            out.push_str(&text[rest..open]);
            match render(&text[body..close], ctx) {
                Some(rendered) => out.push_str(&rendered),
                None => {
                    trace!(placeholder = &text[open..=close], "left unexpanded");
                    out.push_str(&text[open..=close]);
                }
            }
            rest = close + 1;
        }
        out.push_str(&text[rest..]);
        out
    }
}
