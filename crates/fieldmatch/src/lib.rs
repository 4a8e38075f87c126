pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod matching;
pub mod service;
pub mod template;
pub mod transform;
pub mod validation;
pub mod value;
pub mod worker;

pub use config::{load_settings, EngineSettings};
pub use document::{DocumentSource, DocumentStore, SourceDocument};
pub use error::{ConfigError, FieldMatchError, Result, StoreError, WorkerError};
pub use mapping::{
    MappingConfigInput, MappingConfigStore, MappingConfiguration, MappingResolver, MappingRule,
    MappingScope, ResolvedMappingConfig,
};
pub use matching::{
    CancellationToken, MatchError, MatchOptions, MatchRequest, MatchResult, MatchingEngine,
};
pub use service::FieldMatch;
pub use template::{ConflictPolicy, InstanceStore, Template, TemplateInstance, TemplateInstanceRow};
pub use transform::{TransformError, TransformParams, TransformType};
pub use value::{FieldMap, FieldValue};
