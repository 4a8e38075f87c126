//! Field values carried by source documents and template rows.
//!
//! Upstream extraction hands us flat maps of `standard field -> string | number | null`.
//! Null is modelled as `None` in a [`FieldMap`], so a present key with a `None`
//! value means "explicitly null" while a missing key means "not supplied".

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Flat field map as produced by extraction and materialized on rows.
pub type FieldMap = BTreeMap<String, Option<FieldValue>>;

/// Currency symbols stripped before numeric parsing.
const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₩', '₹'];

/// A single non-null field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Canonical string form. Integral numbers render without a trailing `.0`.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Text(s) => s.clone(),
        }
    }

    /// Numeric interpretation of the value, parsing text leniently.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => parse_number(s),
        }
    }

    /// True for text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.trim().is_empty())
    }

    /// Compares two values by their canonical string form, so `120` and `"120"`
    /// are considered the same contribution.
    pub fn same_as(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Number(a), FieldValue::Number(b)) => a == b,
            _ => self.as_text().trim() == other.as_text().trim(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

/// Renders a number without float noise for integral values.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Parses amounts as they appear on freight invoices.
///
/// Accepts currency symbols, a leading or trailing three-letter currency code,
/// and thousands separators: `"1,234.50"`, `"$ 20"`, `"USD 100"`, `"12,5"`.
/// Anything else that is not plain digits, signs and separators is rejected.
pub fn parse_number(raw: &str) -> Option<f64> {
    let text = strip_currency_code(raw.trim());
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c))
        .collect();

    if cleaned.is_empty()
        || !cleaned.chars().any(|c| c.is_ascii_digit())
        || !cleaned
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+'))
    {
        return None;
    }

    let normalized = if cleaned.contains(',') && cleaned.contains('.') {
        cleaned.replace(',', "")
    } else if cleaned.contains(',') {
        let parts: Vec<&str> = cleaned.split(',').collect();
        if parts.len() == 2 && parts[1].len() <= 2 {
            cleaned.replace(',', ".")
        } else {
            cleaned.replace(',', "")
        }
    } else {
        cleaned
    };

    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn strip_currency_code(text: &str) -> &str {
    let is_code = |s: &str| s.len() == 3 && s.chars().all(|c| c.is_ascii_alphabetic());

    if let Some((head, tail)) = text.split_once(char::is_whitespace) {
        if is_code(head) {
            return tail.trim();
        }
    }
    if let Some((head, tail)) = text.rsplit_once(char::is_whitespace) {
        if is_code(tail) {
            return head.trim();
        }
    }
    text
}
