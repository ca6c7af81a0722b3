use std::path::PathBuf;

use thiserror::Error;

use crate::value::Value;

/// Failure categories used when collapsing nested failures and when callers
/// need to branch on the kind of problem rather than the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or invalid file, directory or source text.
    Configuration,
    /// A file (directly or transitively) references itself.
    Circularity,
    /// A value did not have the expected runtime type.
    TypeMismatch,
    /// A bounded loop was exhausted while its test still held.
    OutOfTries,
    /// Early return from a nested step sequence. Not an error.
    Return,
    /// Failure raised by, or passing through, the expression evaluator.
    Evaluation,
}

#[derive(Error, Debug, Clone)]
pub enum ModelError {
    #[error("local file does not exist: {directory}/{name}")]
    MissingFile { directory: PathBuf, name: String },

    #[error("invalid file: {path}: {message}")]
    InvalidFile { path: PathBuf, message: String },

    #[error("directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("JSON text failed to materialize: {message}")]
    InvalidJson { message: String },

    #[error("expected a JSON object at the top level but found {found}")]
    InvalidLiteral { found: &'static str },

    #[error("invalid XML in {source_id}: {message}")]
    InvalidXml { source_id: String, message: String },

    #[error("invalid properties in {path}: {message}")]
    InvalidProperties { path: PathBuf, message: String },

    #[error("invalid <{tag}> entry '{text}': {message}")]
    InvalidEntry {
        tag: String,
        text: String,
        message: String,
    },

    #[error("File: '{}' is already on the stack", .0.display())]
    Circularity(PathBuf),

    #[error("Object at path '{path}' is not a {expected}: '{found}'")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Ran out of tries ({tries}) but: {test}")]
    OutOfTries { tries: usize, test: String },

    #[error("Returning: {0}")]
    Return(Box<Value>),

    #[error("failed to evaluate '{expression}': {source}")]
    Evaluation {
        expression: String,
        #[source]
        source: Box<ModelError>,
    },

    #[error("{0}")]
    Script(String),

    #[error("no evaluator configured for '{0}'")]
    NoEvaluator(String),
}

impl ModelError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ModelError::MissingFile { .. }
            | ModelError::InvalidFile { .. }
            | ModelError::MissingDirectory(_)
            | ModelError::NotADirectory(_)
            | ModelError::InvalidJson { .. }
            | ModelError::InvalidLiteral { .. }
            | ModelError::InvalidXml { .. }
            | ModelError::InvalidProperties { .. }
            | ModelError::InvalidEntry { .. }
            | ModelError::NoEvaluator(_) => ErrorCategory::Configuration,
            ModelError::Circularity(_) => ErrorCategory::Circularity,
            ModelError::TypeMismatch { .. } => ErrorCategory::TypeMismatch,
            ModelError::OutOfTries { .. } => ErrorCategory::OutOfTries,
            ModelError::Return(_) => ErrorCategory::Return,
            ModelError::Evaluation { .. } | ModelError::Script(_) => ErrorCategory::Evaluation,
        }
    }

    /// Direct cause, when this failure wraps another one.
    pub fn cause(&self) -> Option<&ModelError> {
        match self {
            ModelError::Evaluation { source, .. } => Some(source),
            _ => None,
        }
    }

    /// The value carried by an early-return signal, found either on this
    /// failure or on its direct cause.
    pub fn returned_value(&self) -> Option<&Value> {
        match self {
            ModelError::Return(value) => Some(value),
            _ => match self.cause() {
                Some(ModelError::Return(value)) => Some(value),
                _ => None,
            },
        }
    }

    /// Unwraps the early-return signal so it can be re-raised on its own.
    pub fn into_return_signal(self) -> Result<ModelError, ModelError> {
        match self {
            ModelError::Return(_) => Ok(self),
            ModelError::Evaluation { source, expression } => match *source {
                signal @ ModelError::Return(_) => Ok(signal),
                other => Err(ModelError::Evaluation {
                    expression,
                    source: Box::new(other),
                }),
            },
            other => Err(other),
        }
    }

    /// Drops one redundant wrapping layer: when the direct cause is of the
    /// same category as this failure, only the cause is kept.
    pub fn collapse(self) -> ModelError {
        let same = matches!(self.cause(), Some(cause) if cause.category() == self.category());
        match self {
            ModelError::Evaluation { source, .. } if same => *source,
            other => other,
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn evaluation(expression: impl Into<String>, source: ModelError) -> Self {
        ModelError::Evaluation {
            expression: expression.into(),
            source: Box::new(source),
        }
    }

    pub fn early_return(value: Value) -> Self {
        ModelError::Return(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returned_value_looks_one_level_deep() {
        let direct = ModelError::early_return(Value::from(5));
        assert_eq!(direct.returned_value(), Some(&Value::from(5)));

        let wrapped = ModelError::evaluation("return(5)", ModelError::early_return(Value::from(5)));
        assert_eq!(wrapped.returned_value(), Some(&Value::from(5)));

        let deep = ModelError::evaluation(
            "outer",
            ModelError::evaluation("inner", ModelError::early_return(Value::from(5))),
        );
        assert_eq!(deep.returned_value(), None);
    }

    #[test]
    fn collapse_keeps_inner_cause_of_same_category() {
        let nested = ModelError::evaluation("outer", ModelError::Script("boom".into()));
        match nested.collapse() {
            ModelError::Script(msg) => assert_eq!(msg, "boom"),
            other => panic!("unexpected: {other:?}"),
        }

        let mixed = ModelError::evaluation(
            "outer",
            ModelError::OutOfTries {
                tries: 2,
                test: "true".into(),
            },
        );
        assert!(matches!(mixed.collapse(), ModelError::Evaluation { .. }));
    }

    #[test]
    fn messages_name_the_offending_item() {
        let err = ModelError::OutOfTries {
            tries: 3,
            test: "x > 0".into(),
        };
        assert_eq!(err.to_string(), "Ran out of tries (3) but: x > 0");
        let err = ModelError::Circularity(PathBuf::from("/tmp/a.json"));
        assert_eq!(err.to_string(), "File: '/tmp/a.json' is already on the stack");
    }
}
