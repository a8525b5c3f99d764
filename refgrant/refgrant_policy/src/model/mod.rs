//! Evaluation model.

mod evaluation;

pub use evaluation::{Evaluation, Verdict};
