//! Value substitution through a lookup table.

use std::collections::BTreeMap;

use crate::value::FieldValue;

/// A validated lookup table with an optional fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    entries: BTreeMap<String, FieldValue>,
    default_value: Option<FieldValue>,
}

impl LookupTable {
    pub fn new(entries: BTreeMap<String, FieldValue>, default_value: Option<FieldValue>) -> Self {
        Self {
            entries,
            default_value,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maps `value` through the table.
    ///
    /// The key is the value's canonical string form, tried as-is and then
    /// trimmed. Unmatched values fall back to the default when one exists and
    /// otherwise pass through unchanged, null included.
    pub fn apply(&self, value: Option<&FieldValue>) -> Option<FieldValue> {
        let Some(value) = value else {
            return self.default_value.clone();
        };

        let key = value.as_text();
        self.entries
            .get(&key)
            .or_else(|| self.entries.get(key.trim()))
            .or(self.default_value.as_ref())
            .cloned()
            .or_else(|| Some(value.clone()))
    }
}
