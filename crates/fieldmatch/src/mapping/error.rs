//! Mapping configuration errors.

use thiserror::Error;

use super::model::MappingScope;
use crate::transform::TransformError;

/// A configuration is malformed or contradicts an existing one.
/// Raised when a configuration is saved, never during a match run.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("{scope} configuration requires {reference}")]
    MissingReference {
        scope: MappingScope,
        reference: &'static str,
    },

    #[error("{scope} configuration must not set {reference}")]
    UnexpectedReference {
        scope: MappingScope,
        reference: &'static str,
    },

    #[error("Template reference is empty")]
    MissingTemplate,

    #[error("Rule {index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },

    #[error("Target field '{0}' is mapped more than once")]
    DuplicateTargetField(String),

    #[error("Rule for target '{target}' is invalid: {source}")]
    InvalidTransform {
        target: String,
        #[source]
        source: TransformError,
    },

    #[error(
        "A {scope} configuration already exists for template '{template_id}' \
         (company: {company}, format: {format}): {existing_id}",
        company = .company_id.as_deref().unwrap_or("-"),
        format = .format_id.as_deref().unwrap_or("-")
    )]
    DuplicateConfiguration {
        existing_id: String,
        template_id: String,
        scope: MappingScope,
        company_id: Option<String>,
        format_id: Option<String>,
    },

    #[error("{}", join_errors(.0))]
    Multiple(Vec<ConfigurationError>),
}

fn join_errors(errors: &[ConfigurationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
