//! Save-time validation of mapping configurations.

use std::collections::HashSet;

use super::error::ConfigurationError;
use super::model::{MappingConfigInput, MappingRule, MappingScope};

/// Validator for a single mapping configuration.
pub struct ConfigValidator {
    /// Collected validation errors.
    errors: Vec<ConfigurationError>,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Validates scope references and every rule. Collects all problems
    /// before failing.
    pub fn validate(&mut self, config: &MappingConfigInput) -> Result<(), ConfigurationError> {
        self.errors.clear();

        if config.template_id.trim().is_empty() {
            self.errors.push(ConfigurationError::MissingTemplate);
        }

        self.validate_scope(
            config.scope,
            config.company_id.as_deref(),
            config.format_id.as_deref(),
        );
        self.validate_rules(&config.rules);

        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(ConfigurationError::Multiple(std::mem::take(&mut self.errors))),
        }
    }

    fn validate_scope(&mut self, scope: MappingScope, company: Option<&str>, format: Option<&str>) {
        let company = company.filter(|c| !c.trim().is_empty());
        let format = format.filter(|f| !f.trim().is_empty());

        match scope {
            MappingScope::Global => {
                if company.is_some() {
                    self.errors.push(ConfigurationError::UnexpectedReference {
                        scope,
                        reference: "companyId",
                    });
                }
                if format.is_some() {
                    self.errors.push(ConfigurationError::UnexpectedReference {
                        scope,
                        reference: "formatId",
                    });
                }
            }
            MappingScope::Company => {
                if company.is_none() {
                    self.errors.push(ConfigurationError::MissingReference {
                        scope,
                        reference: "companyId",
                    });
                }
                if format.is_some() {
                    self.errors.push(ConfigurationError::UnexpectedReference {
                        scope,
                        reference: "formatId",
                    });
                }
            }
            // A FORMAT configuration may narrow itself to one company.
            MappingScope::Format => {
                if format.is_none() {
                    self.errors.push(ConfigurationError::MissingReference {
                        scope,
                        reference: "formatId",
                    });
                }
            }
        }
    }

    fn validate_rules(&mut self, rules: &[MappingRule]) {
        let mut targets = HashSet::new();

        for (index, rule) in rules.iter().enumerate() {
            if rule.source_field.trim().is_empty() {
                self.errors.push(ConfigurationError::EmptyField {
                    index,
                    field: "sourceField",
                });
            }
            if rule.target_field.trim().is_empty() {
                self.errors.push(ConfigurationError::EmptyField {
                    index,
                    field: "targetField",
                });
                continue;
            }

            if !targets.insert(rule.target_field.as_str()) {
                self.errors.push(ConfigurationError::DuplicateTargetField(
                    rule.target_field.clone(),
                ));
            }

            if let Err(source) = rule.compile() {
                self.errors.push(ConfigurationError::InvalidTransform {
                    target: rule.target_field.clone(),
                    source,
                });
            }
        }
    }
}

/// Validates one configuration.
pub fn validate_configuration(config: &MappingConfigInput) -> Result<(), ConfigurationError> {
    ConfigValidator::new().validate(config)
}
