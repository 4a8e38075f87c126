use thiserror::Error;

use crate::error::StoreError;

/// Structural failures that abort a match run. Per-document and per-field
/// problems are reported in the result instead.
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Template instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template instance '{0}' has been exported and can no longer be modified")]
    InstanceImmutable(String),

    #[error("Failed to resolve mapping configuration: {0}")]
    Resolve(#[source] StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
