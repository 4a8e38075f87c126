//! Transform error types.

use thiserror::Error;

/// Errors raised while compiling or applying a field transform.
///
/// These never abort a match run; the engine records them as field issues
/// on the affected row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// The rule's parameters do not fit its transform type.
    #[error("Invalid {transform_type} parameters: {reason}")]
    InvalidParams {
        transform_type: &'static str,
        reason: String,
    },

    /// A formula could not be tokenized, parsed or evaluated.
    #[error("Formula evaluation failed: {0}")]
    FormulaEvaluation(String),
}

impl TransformError {
    pub(crate) fn formula(reason: impl Into<String>) -> Self {
        Self::FormulaEvaluation(reason.into())
    }
}
