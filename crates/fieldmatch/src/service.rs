//! Wires the database, stores, resolver and engine together.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::config::EngineSettings;
use crate::db::{default_database_path, Database, DatabaseError};
use crate::document::DocumentStore;
use crate::mapping::{MappingConfigStore, MappingResolver, ResolverCache};
use crate::matching::MatchingEngine;
use crate::template::InstanceStore;

/// All components sharing one database and one resolver cache.
pub struct FieldMatch {
    pub db: Database,
    pub configs: MappingConfigStore,
    pub instances: InstanceStore,
    pub documents: DocumentStore,
    pub engine: MatchingEngine,
}

impl FieldMatch {
    /// Opens the database named by the settings (or the default path).
    pub fn open(settings: EngineSettings) -> Result<Self, DatabaseError> {
        let path = settings
            .database_path
            .clone()
            .or_else(default_database_path)
            .unwrap_or_else(|| PathBuf::from("fieldmatch.db"));
        let db = Database::open(&path)?;
        Ok(Self::with_database(db, settings))
    }

    pub fn open_in_memory(settings: EngineSettings) -> Result<Self, DatabaseError> {
        Ok(Self::with_database(Database::open_in_memory()?, settings))
    }

    pub fn with_database(db: Database, settings: EngineSettings) -> Self {
        let cache = ResolverCache::new(
            settings.resolver_cache_ttl(),
            settings.resolver_cache_capacity,
        );
        let configs = MappingConfigStore::new(db.clone(), cache.clone());
        let instances = InstanceStore::new(db.clone());
        let documents = DocumentStore::new(db.clone());
        let resolver = MappingResolver::new(Arc::new(configs.clone()), cache);
        let engine = MatchingEngine::new(
            resolver,
            instances.clone(),
            Arc::new(documents.clone()),
            settings,
        );

        info!(
            workers = engine.settings().worker_count,
            batch_size = engine.settings().batch_size,
            "Field matching engine ready"
        );

        Self {
            db,
            configs,
            instances,
            documents,
            engine,
        }
    }
}
