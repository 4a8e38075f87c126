//! Where merged rows go: the instance store, or an in-memory overlay for
//! previews.

use std::collections::HashMap;

use crate::error::StoreError;
use crate::template::{
    apply_contribution, ConflictPolicy, InstanceStore, RowContribution, TemplateInstanceRow,
    UpsertOutcome,
};
use crate::validation::ValidationEngine;

pub trait RowSink {
    fn upsert(&mut self, contribution: &RowContribution) -> Result<UpsertOutcome, StoreError>;
}

/// Writes every merge through [`InstanceStore::upsert_row`].
pub struct PersistentSink<'a> {
    store: &'a InstanceStore,
    instance_id: &'a str,
    validator: &'a ValidationEngine,
    policy: ConflictPolicy,
}

impl<'a> PersistentSink<'a> {
    pub fn new(
        store: &'a InstanceStore,
        instance_id: &'a str,
        validator: &'a ValidationEngine,
        policy: ConflictPolicy,
    ) -> Self {
        Self {
            store,
            instance_id,
            validator,
            policy,
        }
    }
}

impl RowSink for PersistentSink<'_> {
    fn upsert(&mut self, contribution: &RowContribution) -> Result<UpsertOutcome, StoreError> {
        self.store
            .upsert_row(self.instance_id, contribution, self.validator, self.policy)
    }
}

/// Merges into copies of persisted rows and never writes back.
pub struct PreviewSink<'a> {
    store: &'a InstanceStore,
    instance_id: &'a str,
    validator: &'a ValidationEngine,
    policy: ConflictPolicy,
    overlay: HashMap<String, TemplateInstanceRow>,
    next_row_index: Option<u64>,
}

impl<'a> PreviewSink<'a> {
    pub fn new(
        store: &'a InstanceStore,
        instance_id: &'a str,
        validator: &'a ValidationEngine,
        policy: ConflictPolicy,
    ) -> Self {
        Self {
            store,
            instance_id,
            validator,
            policy,
            overlay: HashMap::new(),
            next_row_index: None,
        }
    }

    fn take_row_index(&mut self) -> Result<u64, StoreError> {
        let index = match self.next_row_index {
            Some(index) => index,
            None => self.store.next_row_index(self.instance_id)?,
        };
        self.next_row_index = Some(index + 1);
        Ok(index)
    }
}

impl RowSink for PreviewSink<'_> {
    fn upsert(&mut self, contribution: &RowContribution) -> Result<UpsertOutcome, StoreError> {
        let existing = match self.overlay.get(&contribution.row_key) {
            Some(row) => Some(row.clone()),
            None => self
                .store
                .get_row_by_key(self.instance_id, &contribution.row_key)?,
        };
        let next_index = match existing {
            Some(_) => 0,
            None => self.take_row_index()?,
        };

        let outcome = apply_contribution(
            existing,
            self.instance_id,
            next_index,
            contribution,
            self.validator,
            self.policy,
        );
        self.overlay
            .insert(contribution.row_key.clone(), outcome.row.clone());
        Ok(outcome)
    }
}
