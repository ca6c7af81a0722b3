//! Operator semantics over [`Value`]s.

use std::cmp::Ordering;

use model_tree::Value;

use crate::ast::BinaryOp;
use crate::error::ElError;

/// Truthiness used by `!`, `&&`, `||` and `?:`.
///
/// Null, `false`, zero and the empty string are false; everything else is
/// true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Text(s) => !s.is_empty(),
        _ => true,
    }
}

fn bad(op: BinaryOp, left: &Value, right: &Value) -> ElError {
    ElError::BadOperands {
        op: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    }
}

/// Integer arithmetic when both sides are integers and the result fits,
/// floating point otherwise.
fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ElError> {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        let exact = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div if b == 0 => return Err(ElError::DivisionByZero),
            BinaryOp::Div if a % b == 0 => a.checked_div(b),
            BinaryOp::Mod if b == 0 => return Err(ElError::DivisionByZero),
            BinaryOp::Mod => a.checked_rem(b),
            _ => None,
        };
        if let Some(n) = exact {
            return Ok(Value::from(n));
        }
    }
    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Err(bad(op, left, right));
    };
    let n = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div if b == 0.0 => return Err(ElError::DivisionByZero),
        BinaryOp::Div => a / b,
        BinaryOp::Mod if b == 0.0 => return Err(ElError::DivisionByZero),
        BinaryOp::Mod => a % b,
        _ => return Err(bad(op, left, right)),
    };
    Ok(Value::from_f64(n))
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => left.as_f64()?.partial_cmp(&right.as_f64()?),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Applies a binary operator. `+` concatenates when either side is text.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ElError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::Ne => Ok(Value::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(left, right).ok_or_else(|| bad(op, left, right))?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::Add if matches!(left, Value::Text(_)) || matches!(right, Value::Text(_)) => {
            Ok(Value::Text(format!("{left}{right}")))
        }
        _ => arithmetic(op, left, right),
    }
}

pub fn negate(value: &Value) -> Result<Value, ElError> {
    if let Some(n) = value.as_i64().and_then(i64::checked_neg) {
        return Ok(Value::from(n));
    }
    value
        .as_f64()
        .map(|n| Value::from_f64(-n))
        .ok_or(ElError::BadOperands {
            op: "-",
            left: "nothing",
            right: value.type_name(),
        })
}

/// Interprets `value` as a list position.
pub fn as_index(value: &Value) -> Option<usize> {
    value
        .as_i64()
        .and_then(|n| usize::try_from(n).ok())
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_stay_integers() {
        let sum = binary(BinaryOp::Add, &Value::from(2), &Value::from(3)).unwrap();
        assert_eq!(sum.as_i64(), Some(5));
        let quotient = binary(BinaryOp::Div, &Value::from(7), &Value::from(2)).unwrap();
        assert_eq!(quotient.as_f64(), Some(3.5));
        assert_eq!(quotient.as_i64(), None);
        let product = binary(BinaryOp::Mul, &Value::from(i64::MAX), &Value::from(2)).unwrap();
        assert_eq!(product.as_i64(), None);
    }

    #[test]
    fn text_concatenation() {
        assert_eq!(
            binary(BinaryOp::Add, &Value::from("n="), &Value::from(4)).unwrap(),
            Value::from("n=4")
        );
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(
            binary(BinaryOp::Div, &Value::from(1), &Value::from(0)),
            Err(ElError::DivisionByZero)
        );
        assert_eq!(
            binary(BinaryOp::Mod, &Value::from(1.5), &Value::from(0.0)),
            Err(ElError::DivisionByZero)
        );
    }

    #[test]
    fn comparisons() {
        assert_eq!(
            binary(BinaryOp::Le, &Value::from(2), &Value::from(2.5)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            binary(BinaryOp::Gt, &Value::from("b"), &Value::from("a")).unwrap(),
            Value::Bool(true)
        );
        assert!(matches!(
            binary(BinaryOp::Lt, &Value::from(1), &Value::from("a")),
            Err(ElError::BadOperands { op: "<", .. })
        ));
        assert_eq!(
            binary(BinaryOp::Eq, &Value::Null, &Value::Null).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&Value::from(0)));
        assert!(!is_truthy(&Value::from("")));
        assert!(is_truthy(&Value::from("0")));
        assert!(is_truthy(&Value::List(vec![])));
    }
}
