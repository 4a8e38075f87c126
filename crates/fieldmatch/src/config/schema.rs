use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::template::ConflictPolicy;

/// Engine-wide settings, loaded from YAML or JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    pub version: String,
    /// Defaults to `~/.fieldmatch/data/fieldmatch.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Used when neither the run nor the template names a row key field.
    #[serde(default = "default_row_key_field")]
    pub row_key_field: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_cache_ttl")]
    pub resolver_cache_ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub resolver_cache_capacity: u64,
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

fn default_batch_size() -> usize {
    100
}

fn default_row_key_field() -> String {
    "shipment_no".to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_capacity() -> u64 {
    1000
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            batch_size: default_batch_size(),
            row_key_field: default_row_key_field(),
            worker_count: default_worker_count(),
            resolver_cache_ttl_secs: default_cache_ttl(),
            resolver_cache_capacity: default_cache_capacity(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

impl EngineSettings {
    pub fn resolver_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.resolver_cache_ttl_secs)
    }
}
