//! Three-tier mapping configurations (GLOBAL, COMPANY, FORMAT) and their
//! resolution into one effective rule set.

pub mod error;
pub mod model;
pub mod resolver;
pub mod store;
pub mod validation;

pub use error::ConfigurationError;
pub use model::{
    MappingConfigFilter, MappingConfigInput, MappingConfiguration, MappingRule, MappingScope,
};
pub use resolver::{
    ConfigurationSource, MappingResolver, ResolveKey, ResolvedMappingConfig, ResolvedSource,
    ResolverCache,
};
pub use store::MappingConfigStore;
pub use validation::{validate_configuration, ConfigValidator};
