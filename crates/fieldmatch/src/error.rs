use std::path::PathBuf;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::mapping::ConfigurationError;
use crate::matching::MatchError;
use crate::template::model::InstanceStatus;
use crate::transform::TransformError;

#[derive(Error, Debug)]
pub enum FieldMatchError {
    #[error("Settings error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mapping configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Match error: {0}")]
    Match(#[from] MatchError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Engine settings file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(String),

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Settings validation failed: {message}")]
    Validation { message: String },
}

/// Repository-level errors shared by the configuration and instance stores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid template '{id}': {reason}")]
    InvalidTemplate { id: String, reason: String },

    #[error("Template instance '{0}' has been exported and can no longer be modified")]
    InstanceImmutable(String),

    #[error("Template instance '{id}' cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: InstanceStatus,
        to: InstanceStatus,
    },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed")]
    ChannelClosed,
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FieldMatchError>;
