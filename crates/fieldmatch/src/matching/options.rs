use serde::{Deserialize, Serialize};

use crate::config::EngineSettings;
use crate::template::{ConflictPolicy, Template, TemplateInstance};

/// Per-run overrides. Unset fields fall back to the template, the instance
/// and then the engine settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_key_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_policy: Option<ConflictPolicy>,
}

impl MatchOptions {
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn row_key_field(mut self, field: impl Into<String>) -> Self {
        self.row_key_field = Some(field.into());
        self
    }

    pub fn company(mut self, company_id: impl Into<String>) -> Self {
        self.company_id = Some(company_id.into());
        self
    }

    pub fn format(mut self, format_id: impl Into<String>) -> Self {
        self.format_id = Some(format_id.into());
        self
    }

    pub fn workers(mut self, count: usize) -> Self {
        self.worker_count = Some(count);
        self
    }

    pub fn conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = Some(policy);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    /// Identifies the run in progress events and the result. Generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub document_ids: Vec<String>,
    pub template_instance_id: String,
    #[serde(default)]
    pub options: MatchOptions,
}

impl MatchRequest {
    pub fn new<I, S>(template_instance_id: &str, document_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            run_id: None,
            document_ids: document_ids.into_iter().map(Into::into).collect(),
            template_instance_id: template_instance_id.to_string(),
            options: MatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }
}

/// Options with every fallback applied.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunOptions {
    pub batch_size: usize,
    pub row_key_field: String,
    pub company_id: Option<String>,
    pub format_id: Option<String>,
    pub worker_count: usize,
    pub conflict_policy: ConflictPolicy,
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl RunOptions {
    pub fn resolve(
        options: &MatchOptions,
        template: &Template,
        instance: &TemplateInstance,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            batch_size: options.batch_size.unwrap_or(settings.batch_size).max(1),
            row_key_field: non_blank(options.row_key_field.as_ref())
                .or_else(|| non_blank(template.row_key_field.as_ref()))
                .unwrap_or_else(|| settings.row_key_field.clone()),
            company_id: non_blank(options.company_id.as_ref())
                .or_else(|| non_blank(instance.company_id.as_ref())),
            format_id: non_blank(options.format_id.as_ref())
                .or_else(|| non_blank(instance.format_id.as_ref())),
            worker_count: options.worker_count.unwrap_or(settings.worker_count).max(1),
            conflict_policy: options.conflict_policy.unwrap_or(settings.conflict_policy),
        }
    }
}
