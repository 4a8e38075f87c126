//! Resolution of the effective rule set for a (template, company, format).
//!
//! Applicable configurations are merged from lowest to highest precedence
//! into a map keyed by target field, so FORMAT overrides COMPANY overrides
//! GLOBAL, and within a scope the higher `priority` wins. Results are cached
//! as immutable `Arc` snapshots.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::{MappingConfiguration, MappingRule, MappingScope};
use crate::error::StoreError;

/// Supplies active configurations to the resolver.
pub trait ConfigurationSource: Send + Sync {
    /// Active configurations of `template_id` that apply to the given refs.
    fn applicable_configurations(
        &self,
        template_id: &str,
        company_id: Option<&str>,
        format_id: Option<&str>,
    ) -> Result<Vec<MappingConfiguration>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolveKey {
    pub template_id: String,
    pub company_id: Option<String>,
    pub format_id: Option<String>,
}

impl ResolveKey {
    pub fn new(template_id: &str, company_id: Option<&str>, format_id: Option<&str>) -> Self {
        let normalize = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            template_id: template_id.to_string(),
            company_id: normalize(company_id),
            format_id: normalize(format_id),
        }
    }
}

/// A configuration that took part in a resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSource {
    pub configuration_id: String,
    pub scope: MappingScope,
    pub priority: i32,
    /// Target fields whose winning rule came from this configuration.
    pub target_fields: Vec<String>,
}

/// The merged rule set for one (template, company, format).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMappingConfig {
    pub template_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_id: Option<String>,
    /// Winning rules ordered by `order`, then target field.
    pub mappings: Vec<MappingRule>,
    /// Consulted configurations, most specific first.
    pub resolved_from: Vec<ResolvedSource>,
    pub resolved_at: DateTime<Utc>,
}

impl ResolvedMappingConfig {
    pub fn rule_for(&self, target_field: &str) -> Option<&MappingRule> {
        self.mappings.iter().find(|r| r.target_field == target_field)
    }

    /// The configuration whose rule won for `target_field`.
    pub fn source_of(&self, target_field: &str) -> Option<&ResolvedSource> {
        self.resolved_from
            .iter()
            .find(|s| s.target_fields.iter().any(|t| t == target_field))
    }
}

/// Merges applicable configurations into one rule set.
pub fn merge_configurations(
    key: &ResolveKey,
    mut configs: Vec<MappingConfiguration>,
) -> ResolvedMappingConfig {
    configs.sort_by(|a, b| {
        a.scope
            .precedence()
            .cmp(&b.scope.precedence())
            .then(a.priority.cmp(&b.priority))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut winners: BTreeMap<&str, (&MappingRule, usize)> = BTreeMap::new();
    for (index, config) in configs.iter().enumerate() {
        for rule in &config.rules {
            winners.insert(rule.target_field.as_str(), (rule, index));
        }
    }

    let mut won_by: Vec<Vec<String>> = vec![Vec::new(); configs.len()];
    let mut mappings: Vec<MappingRule> = Vec::with_capacity(winners.len());
    for (target, (rule, index)) in &winners {
        won_by[*index].push(target.to_string());
        mappings.push((*rule).clone());
    }
    mappings.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then_with(|| a.target_field.cmp(&b.target_field))
    });

    let resolved_from = configs
        .iter()
        .zip(won_by)
        .rev()
        .map(|(config, target_fields)| ResolvedSource {
            configuration_id: config.id.clone(),
            scope: config.scope,
            priority: config.priority,
            target_fields,
        })
        .collect();

    ResolvedMappingConfig {
        template_id: key.template_id.clone(),
        company_id: key.company_id.clone(),
        format_id: key.format_id.clone(),
        mappings,
        resolved_from,
        resolved_at: Utc::now(),
    }
}

/// TTL cache of resolved rule sets.
///
/// Every invalidation bumps a generation counter; a resolution that started
/// under an older generation does not store its result.
#[derive(Clone)]
pub struct ResolverCache {
    entries: Cache<ResolveKey, Arc<ResolvedMappingConfig>>,
    generation: Arc<AtomicU64>,
}

impl ResolverCache {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn get(&self, key: &ResolveKey) -> Option<Arc<ResolvedMappingConfig>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &ResolveKey) -> bool {
        self.entries.contains_key(key)
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn insert_if_current(&self, key: ResolveKey, value: Arc<ResolvedMappingConfig>, generation: u64) {
        if self.generation() != generation {
            return;
        }
        self.entries.insert(key.clone(), value);
        if self.generation() != generation {
            self.entries.invalidate(&key);
        }
    }

    /// Drops every cached resolution of `template_id`.
    pub fn invalidate_template(&self, template_id: &str) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let stale: Vec<Arc<ResolveKey>> = self
            .entries
            .iter()
            .filter(|(key, _)| key.template_id == template_id)
            .map(|(key, _)| key)
            .collect();
        for key in stale {
            self.entries.invalidate(key.as_ref());
        }
        debug!(template_id, "Invalidated resolver cache");
    }

    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.invalidate_all();
    }
}

/// Resolves effective mappings, caching per (template, company, format).
#[derive(Clone)]
pub struct MappingResolver {
    source: Arc<dyn ConfigurationSource>,
    cache: ResolverCache,
}

impl MappingResolver {
    pub fn new(source: Arc<dyn ConfigurationSource>, cache: ResolverCache) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &ResolverCache {
        &self.cache
    }

    pub fn resolve(
        &self,
        template_id: &str,
        company_id: Option<&str>,
        format_id: Option<&str>,
    ) -> Result<Arc<ResolvedMappingConfig>, StoreError> {
        let key = ResolveKey::new(template_id, company_id, format_id);
        if let Some(hit) = self.cache.get(&key) {
            debug!(template_id, ?company_id, ?format_id, "Resolver cache hit");
            return Ok(hit);
        }

        let generation = self.cache.generation();
        let configs = self.source.applicable_configurations(
            &key.template_id,
            key.company_id.as_deref(),
            key.format_id.as_deref(),
        )?;
        let consulted = configs.len();
        let resolved = Arc::new(merge_configurations(&key, configs));

        debug!(
            template_id,
            ?company_id,
            ?format_id,
            consulted,
            rules = resolved.mappings.len(),
            "Resolved mapping configuration"
        );

        self.cache.insert_if_current(key, Arc::clone(&resolved), generation);
        Ok(resolved)
    }
}
