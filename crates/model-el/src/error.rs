use model_tree::ModelError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ElError {
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated string starting at {0}")]
    UnterminatedString(usize),

    #[error("expected {expected} but found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },

    #[error("cannot assign to {0}")]
    NotAssignable(String),

    #[error("cannot call {method}() on {found}")]
    NoSuchMethod { method: String, found: &'static str },

    #[error("cannot apply '{op}' to {left} and {right}")]
    BadOperands {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("DIVISION_BY_ZERO")]
    DivisionByZero,

    #[error("{0}")]
    Raised(String),
}

impl From<ElError> for ModelError {
    fn from(e: ElError) -> Self {
        ModelError::Script(e.to_string())
    }
}
