//! The XML model vocabulary.
//!
//! ```xml
//! <site $json="base.json">
//!   <model key="home">
//!     <text key="title">Home</text>
//!     <integer key="visits">3</integer>
//!   </model>
//! </site>
//! ```
//!
//! The document element may have any name; its attributes become `$`-prefixed
//! directive keys on the receiving node. `model` elements open child nodes.
//! Every other element is a typed leaf holding one value under its `key`.

mod reader;

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};

use crate::duration::parse_iso_duration;
use crate::error::ModelError;
use crate::json::parse_lenient;
use crate::node::Node;
use crate::steps::steps_stream;
use crate::value::Value;

pub const MODEL_TAG: &str = "model";
pub const KEY_ATTRIBUTE: &str = "key";

/// Typed leaf elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Evaluated expression.
    El,
    Json,
    Entry,
    /// Step text, normalised to `a ; b`.
    Steps,
    Text,
    Date,
    DateTime,
    Duration,
    Integer,
    Long,
    Double,
    Boolean,
    BigInteger,
    BigDecimal,
}

impl EntryKind {
    pub fn from_tag(tag: &str) -> Option<EntryKind> {
        Some(match tag {
            "el" => EntryKind::El,
            "json" => EntryKind::Json,
            "entry" => EntryKind::Entry,
            "steps" => EntryKind::Steps,
            "text" => EntryKind::Text,
            "date" => EntryKind::Date,
            "datetime" => EntryKind::DateTime,
            "duration" => EntryKind::Duration,
            "integer" => EntryKind::Integer,
            "long" => EntryKind::Long,
            "double" => EntryKind::Double,
            "boolean" => EntryKind::Boolean,
            "big-integer" => EntryKind::BigInteger,
            "big-decimal" => EntryKind::BigDecimal,
            _ => return None,
        })
    }

    pub fn tag(self) -> &'static str {
        match self {
            EntryKind::El => "el",
            EntryKind::Json => "json",
            EntryKind::Entry => "entry",
            EntryKind::Steps => "steps",
            EntryKind::Text => "text",
            EntryKind::Date => "date",
            EntryKind::DateTime => "datetime",
            EntryKind::Duration => "duration",
            EntryKind::Integer => "integer",
            EntryKind::Long => "long",
            EntryKind::Double => "double",
            EntryKind::Boolean => "boolean",
            EntryKind::BigInteger => "big-integer",
            EntryKind::BigDecimal => "big-decimal",
        }
    }

    /// Converts the element text into the value stored on `node`.
    pub fn parse(self, node: &Node, text: &str) -> Result<Value, ModelError> {
        let text = text.trim();
        let invalid = |message: String| ModelError::InvalidEntry {
            tag: self.tag().to_string(),
            text: text.to_string(),
            message,
        };
        match self {
            EntryKind::El => node.eval(text),
            EntryKind::Json => Ok(node.literal_value(parse_lenient(text)?)),
            EntryKind::Entry | EntryKind::Text => Ok(Value::from(text)),
            EntryKind::Steps => Ok(Value::from(steps_stream(text).join(" ; "))),
            EntryKind::Boolean => Ok(Value::Bool(text.eq_ignore_ascii_case("true"))),
            EntryKind::Integer => text
                .parse::<i32>()
                .map(Value::from)
                .map_err(|e| invalid(e.to_string())),
            EntryKind::Long => text
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| invalid(e.to_string())),
            EntryKind::Double => text
                .parse::<f64>()
                .map(Value::from_f64)
                .map_err(|e| invalid(e.to_string())),
            EntryKind::BigInteger => integer_number(text)
                .map(Value::Number)
                .ok_or_else(|| invalid("not an integer within 64 bits".to_string())),
            EntryKind::BigDecimal if !text.contains(['.', 'e', 'E']) => integer_number(text)
                .map(Value::Number)
                .ok_or_else(|| invalid("integer wider than 64 bits".to_string())),
            EntryKind::BigDecimal => serde_json::Number::from_str(text)
                .map(Value::Number)
                .map_err(|e| invalid(e.to_string())),
            EntryKind::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| invalid(e.to_string())),
            EntryKind::DateTime => NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
                .map(Value::DateTime)
                .map_err(|e| invalid(e.to_string())),
            EntryKind::Duration => parse_iso_duration(text)
                .map(Value::Duration)
                .ok_or_else(|| invalid("not an ISO-8601 duration".to_string())),
        }
    }
}

/// Integer text as an exact JSON number. `None` when the value does not
/// fit in an `i64` or `u64`.
fn integer_number(text: &str) -> Option<serde_json::Number> {
    let text = text.strip_prefix('+').unwrap_or(text);
    if let Ok(n) = text.parse::<i64>() {
        return Some(n.into());
    }
    text.parse::<u64>().ok().map(Into::into)
}
