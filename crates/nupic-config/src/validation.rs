// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Every problem is collected before reporting, so a single run of
//! [`validate_config`] lists all of them.

use crate::{ConfigError, ConfigResult, EngineConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["text", "json"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` with details if validation fails
pub fn validate_config(config: &EngineConfig) -> ConfigResult<()> {
    let errors = collect_errors(config);
    if errors.is_empty() {
        return Ok(());
    }

    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

fn collect_errors(config: &EngineConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_network(config, &mut errors);
    validate_logging(config, &mut errors);
    validate_runtime(config, &mut errors);
    errors
}

fn validate_network(config: &EngineConfig, errors: &mut Vec<ConfigValidationError>) {
    let extension = &config.network.bundle_extension;
    if extension.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "network.bundle_extension".to_string(),
        });
    } else if !extension.starts_with('.') || extension.len() < 2 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "network.bundle_extension".to_string(),
            reason: format!("'{}' must start with '.' and name an extension", extension),
        });
    }

    let label = &config.network.default_checkpoint_label;
    if label.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "network.default_checkpoint_label".to_string(),
        });
    } else if label.contains(['/', '\\']) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "network.default_checkpoint_label".to_string(),
            reason: "must not contain path separators".to_string(),
        });
    }
}

fn validate_logging(config: &EngineConfig, errors: &mut Vec<ConfigValidationError>) {
    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("'{}' is not one of {}", config.logging.level, LOG_LEVELS.join(", ")),
        });
    }
    let format = config.logging.format.to_lowercase();
    if !LOG_FORMATS.contains(&format.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.format".to_string(),
            reason: format!("'{}' is not one of {}", config.logging.format, LOG_FORMATS.join(", ")),
        });
    }
}

fn validate_runtime(config: &EngineConfig, errors: &mut Vec<ConfigValidationError>) {
    let separator = config.runtime.module_separator;
    if separator.is_alphanumeric() || separator == '/' || separator == '\\' {
        errors.push(ConfigValidationError::InvalidValue {
            field: "runtime.module_separator".to_string(),
            reason: format!("'{}' cannot separate module and type names", separator),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_errors_reported_together() {
        let mut config = EngineConfig::default();
        config.network.bundle_extension = "nta".to_string();
        config.network.default_checkpoint_label = "a/b".to_string();
        config.logging.level = "loud".to_string();

        let errors = collect_errors(&config);
        assert_eq!(errors.len(), 3);

        let err = validate_config(&config).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("network.bundle_extension"));
        assert!(message.contains("network.default_checkpoint_label"));
        assert!(message.contains("logging.level"));
    }

    #[test]
    fn test_missing_label() {
        let mut config = EngineConfig::default();
        config.network.default_checkpoint_label.clear();
        assert_eq!(
            collect_errors(&config),
            vec![ConfigValidationError::MissingRequired {
                field: "network.default_checkpoint_label".to_string()
            }]
        );
    }

    #[test]
    fn test_bad_separator() {
        let mut config = EngineConfig::default();
        config.runtime.module_separator = 'x';
        assert!(validate_config(&config).is_err());
    }
}
