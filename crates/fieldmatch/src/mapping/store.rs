//! Persisted mapping configurations.
//!
//! Every write validates the configuration, enforces one configuration per
//! (template, scope, company, format) and invalidates the resolver cache for
//! the affected template.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::error::ConfigurationError;
use super::model::{MappingConfigFilter, MappingConfigInput, MappingConfiguration};
use super::resolver::{ConfigurationSource, ResolverCache};
use super::validation::validate_configuration;
use crate::db::{format_timestamp, mapping_repo, Database};
use crate::error::StoreError;

const KIND: &str = "Mapping configuration";

#[derive(Clone)]
pub struct MappingConfigStore {
    db: Database,
    cache: ResolverCache,
}

fn normalize_ref(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl MappingConfigStore {
    pub fn new(db: Database, cache: ResolverCache) -> Self {
        Self { db, cache }
    }

    pub fn cache(&self) -> &ResolverCache {
        &self.cache
    }

    /// Validates and stores a new configuration.
    pub fn create(&self, input: MappingConfigInput) -> Result<MappingConfiguration, StoreError> {
        validate_configuration(&input)?;

        let now = Utc::now();
        let config = MappingConfiguration {
            id: input
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            template_id: input.template_id.trim().to_string(),
            scope: input.scope,
            company_id: normalize_ref(input.company_id),
            format_id: normalize_ref(input.format_id),
            priority: input.priority,
            is_active: input.is_active,
            rules: input.rules,
            description: input.description,
            created_at: now,
            updated_at: now,
        };

        self.db.with_transaction(|tx| {
            ensure_unique_scope_key(tx, &config)?;
            mapping_repo::insert(tx, &config)?;
            Ok::<_, StoreError>(())
        })?;

        self.cache.invalidate_template(&config.template_id);
        info!(
            id = %config.id,
            template_id = %config.template_id,
            scope = %config.scope,
            rules = config.rules.len(),
            "Created mapping configuration"
        );
        Ok(config)
    }

    /// Replaces a configuration's content, keeping its ID and creation time.
    pub fn update(
        &self,
        id: &str,
        input: MappingConfigInput,
    ) -> Result<MappingConfiguration, StoreError> {
        validate_configuration(&input)?;

        let (previous, updated) = self.db.with_transaction(|tx| {
            let previous = mapping_repo::find_by_id(tx, id)?
                .ok_or_else(|| StoreError::not_found(KIND, id))?;

            let updated = MappingConfiguration {
                id: previous.id.clone(),
                template_id: input.template_id.trim().to_string(),
                scope: input.scope,
                company_id: normalize_ref(input.company_id.clone()),
                format_id: normalize_ref(input.format_id.clone()),
                priority: input.priority,
                is_active: input.is_active,
                rules: input.rules.clone(),
                description: input.description.clone(),
                created_at: previous.created_at,
                updated_at: Utc::now(),
            };

            ensure_unique_scope_key(tx, &updated)?;
            mapping_repo::update(tx, &updated)?;
            Ok::<_, StoreError>((previous, updated))
        })?;

        self.cache.invalidate_template(&previous.template_id);
        if previous.template_id != updated.template_id {
            self.cache.invalidate_template(&updated.template_id);
        }
        info!(id, template_id = %updated.template_id, "Updated mapping configuration");
        Ok(updated)
    }

    /// Creates the configuration, or updates it when its ID already exists.
    pub fn apply(&self, input: MappingConfigInput) -> Result<MappingConfiguration, StoreError> {
        match input.id.clone() {
            Some(id) if self.get(&id)?.is_some() => self.update(&id, input),
            _ => self.create(input),
        }
    }

    /// Marks a configuration inactive. Inactive configurations are ignored by
    /// the resolver but keep their scope key.
    pub fn deactivate(&self, id: &str) -> Result<(), StoreError> {
        self.set_active(id, false)
    }

    pub fn activate(&self, id: &str) -> Result<(), StoreError> {
        self.set_active(id, true)
    }

    fn set_active(&self, id: &str, is_active: bool) -> Result<(), StoreError> {
        let template_id = self.db.with_transaction(|tx| {
            let config = mapping_repo::find_by_id(tx, id)?
                .ok_or_else(|| StoreError::not_found(KIND, id))?;
            mapping_repo::set_active(tx, id, is_active, &format_timestamp(&Utc::now()))?;
            Ok::<_, StoreError>(config.template_id)
        })?;

        self.cache.invalidate_template(&template_id);
        info!(id, is_active, "Changed mapping configuration state");
        Ok(())
    }

    /// Removes a configuration permanently.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let template_id = self.db.with_transaction(|tx| {
            let config = mapping_repo::find_by_id(tx, id)?
                .ok_or_else(|| StoreError::not_found(KIND, id))?;
            mapping_repo::delete(tx, id)?;
            Ok::<_, StoreError>(config.template_id)
        })?;

        self.cache.invalidate_template(&template_id);
        info!(id, "Deleted mapping configuration");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<MappingConfiguration>, StoreError> {
        Ok(self.db.with_conn(|conn| mapping_repo::find_by_id(conn, id))?)
    }

    pub fn list(&self, filter: &MappingConfigFilter) -> Result<Vec<MappingConfiguration>, StoreError> {
        Ok(self.db.with_conn(|conn| mapping_repo::query(conn, filter))?)
    }
}

fn ensure_unique_scope_key(
    conn: &rusqlite::Connection,
    config: &MappingConfiguration,
) -> Result<(), StoreError> {
    let existing = mapping_repo::find_id_by_scope_key(
        conn,
        &config.template_id,
        config.scope,
        config.company_id.as_deref(),
        config.format_id.as_deref(),
    )?;

    match existing {
        Some(existing_id) if existing_id != config.id => {
            Err(ConfigurationError::DuplicateConfiguration {
                existing_id,
                template_id: config.template_id.clone(),
                scope: config.scope,
                company_id: config.company_id.clone(),
                format_id: config.format_id.clone(),
            }
            .into())
        }
        _ => Ok(()),
    }
}

impl ConfigurationSource for MappingConfigStore {
    fn applicable_configurations(
        &self,
        template_id: &str,
        company_id: Option<&str>,
        format_id: Option<&str>,
    ) -> Result<Vec<MappingConfiguration>, StoreError> {
        Ok(self
            .db
            .with_conn(|conn| mapping_repo::find_applicable(conn, template_id, company_id, format_id))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::model::{MappingRule, MappingScope};
    use crate::mapping::resolver::{MappingResolver, ResolveKey};
    use std::sync::Arc;
    use std::time::Duration;

    fn store() -> MappingConfigStore {
        MappingConfigStore::new(
            Database::open_in_memory().unwrap(),
            ResolverCache::new(Duration::from_secs(300), 100),
        )
    }

    fn global() -> MappingConfigInput {
        MappingConfigInput::new("tpl", MappingScope::Global)
            .rule(MappingRule::direct("bl_no", "shipment_no"))
    }

    #[test]
    fn test_create_assigns_id() {
        let store = store();
        let config = store.create(global()).unwrap();
        assert!(!config.id.is_empty());
        assert_eq!(store.get(&config.id).unwrap().unwrap(), config);
    }

    #[test]
    fn test_rejects_invalid_configuration() {
        let store = store();
        let err = store
            .create(MappingConfigInput::new("tpl", MappingScope::Company))
            .unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));
    }

    #[test]
    fn test_rejects_duplicate_scope_key() {
        let store = store();
        store.create(global()).unwrap();
        let err = store.create(global()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Configuration(ConfigurationError::DuplicateConfiguration { .. })
        ));

        // Same scope for another company is fine.
        let acme = MappingConfigInput::new("tpl", MappingScope::Company).company("acme");
        let other = MappingConfigInput::new("tpl", MappingScope::Company).company("other");
        store.create(acme).unwrap();
        store.create(other).unwrap();
    }

    #[test]
    fn test_update_keeps_identity() {
        let store = store();
        let created = store.create(global()).unwrap();
        let updated = store
            .update(&created.id, global().priority(7))
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.priority, 7);
    }

    #[test]
    fn test_update_missing() {
        let store = store();
        let err = store.update("nope", global()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_apply_upserts_by_id() {
        let store = store();
        let mut input = global();
        input.id = Some("cfg-global".to_string());
        store.apply(input.clone()).unwrap();
        store.apply(input.priority(3)).unwrap();

        let all = store.list(&MappingConfigFilter::default()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].priority, 3);
    }

    #[test]
    fn test_writes_invalidate_resolver_cache() {
        let store = store();
        let resolver = MappingResolver::new(Arc::new(store.clone()), store.cache().clone());
        let created = store.create(global()).unwrap();

        resolver.resolve("tpl", None, None).unwrap();
        let key = ResolveKey::new("tpl", None, None);
        assert!(store.cache().contains(&key));

        store.deactivate(&created.id).unwrap();
        assert!(!store.cache().contains(&key));
        assert!(resolver.resolve("tpl", None, None).unwrap().mappings.is_empty());

        store.activate(&created.id).unwrap();
        assert_eq!(resolver.resolve("tpl", None, None).unwrap().mappings.len(), 1);

        store.delete(&created.id).unwrap();
        assert!(resolver.resolve("tpl", None, None).unwrap().mappings.is_empty());
    }
}
