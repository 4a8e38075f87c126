//! Mapping configuration model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transform::{Transform, TransformError, TransformParams, TransformType};

/// Applicability level of a mapping configuration.
///
/// Precedence runs FORMAT > COMPANY > GLOBAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingScope {
    Global,
    Company,
    Format,
}

impl MappingScope {
    /// Rank used when merging; higher ranks override lower ones.
    pub fn precedence(&self) -> u8 {
        match self {
            MappingScope::Global => 0,
            MappingScope::Company => 1,
            MappingScope::Format => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MappingScope::Global => "GLOBAL",
            MappingScope::Company => "COMPANY",
            MappingScope::Format => "FORMAT",
        }
    }
}

impl fmt::Display for MappingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MappingScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GLOBAL" => Ok(MappingScope::Global),
            "COMPANY" => Ok(MappingScope::Company),
            "FORMAT" => Ok(MappingScope::Format),
            other => Err(format!("unknown mapping scope '{}'", other)),
        }
    }
}

/// One source-field to target-field rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRule {
    pub source_field: String,
    pub target_field: String,
    #[serde(default)]
    pub transform_type: TransformType,
    #[serde(default)]
    pub transform_params: TransformParams,
    /// A null result records a field issue on the row.
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub order: i32,
}

impl MappingRule {
    /// A DIRECT rule copying `source` into `target`.
    pub fn direct(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source_field: source.into(),
            target_field: target.into(),
            transform_type: TransformType::Direct,
            transform_params: TransformParams::default(),
            required: false,
            order: 0,
        }
    }

    pub fn with_transform(mut self, transform_type: TransformType, params: TransformParams) -> Self {
        self.transform_type = transform_type;
        self.transform_params = params;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn compile(&self) -> Result<Transform, TransformError> {
        Transform::compile(self.transform_type, &self.transform_params)
    }
}

/// A persisted, scoped set of mapping rules for one template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingConfiguration {
    pub id: String,
    pub template_id: String,
    pub scope: MappingScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_id: Option<String>,
    pub priority: i32,
    pub is_active: bool,
    pub rules: Vec<MappingRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or updating a configuration.
///
/// This is also the on-disk shape accepted by `fieldmatch apply-config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingConfigInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub template_id: String,
    pub scope: MappingScope,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub rules: Vec<MappingRule>,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_active() -> bool {
    true
}

impl MappingConfigInput {
    pub fn new(template_id: impl Into<String>, scope: MappingScope) -> Self {
        Self {
            id: None,
            template_id: template_id.into(),
            scope,
            company_id: None,
            format_id: None,
            priority: 0,
            is_active: true,
            rules: Vec::new(),
            description: None,
        }
    }

    pub fn company(mut self, company_id: impl Into<String>) -> Self {
        self.company_id = Some(company_id.into());
        self
    }

    pub fn format(mut self, format_id: impl Into<String>) -> Self {
        self.format_id = Some(format_id.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn rule(mut self, rule: MappingRule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Filter for listing configurations.
#[derive(Debug, Clone, Default)]
pub struct MappingConfigFilter {
    pub template_id: Option<String>,
    pub scope: Option<MappingScope>,
    pub company_id: Option<String>,
    pub format_id: Option<String>,
    pub is_active: Option<bool>,
}
