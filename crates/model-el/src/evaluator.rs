use model_tree::{EvaluationContext, Evaluator, ModelError, Value};

use crate::evaluate::evaluate;
use crate::parser::parse;

/// Parses and evaluates one statement per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct ElEvaluator;

impl Evaluator for ElEvaluator {
    fn evaluate(&self, statement: &str, ctx: &EvaluationContext) -> Result<Value, ModelError> {
        let expr = parse(statement)?;
        evaluate(&expr, ctx)
    }
}
