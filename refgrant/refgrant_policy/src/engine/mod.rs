//! Reference evaluation.

mod evaluator;

pub use evaluator::GrantEvaluator;
