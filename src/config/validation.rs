//! Configuration validation for sbom-binscan.

use super::types::ScanConfig;
use crate::formats::FormatFactory;
use regex::Regex;
use thiserror::Error;

/// A configuration value that failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ConfigError {
    /// The field that failed validation
    pub field: String,
    /// Description of the validation error
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validatable {
    /// Validate the configuration, returning any errors found.
    fn validate(&self) -> Vec<ConfigError>;

    /// Check if the configuration is valid.
    fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

impl Validatable for ScanConfig {
    fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        for (field, version) in [
            ("spdx_version", self.spdx_version.as_str()),
            ("cyclonedx_version", self.cyclonedx_version.as_str()),
        ] {
            let family = if field == "spdx_version" { "spdx" } else { "cyclonedx" };
            if FormatFactory::create(family, version).is_none() {
                errors.push(ConfigError::new(
                    field,
                    format!("unsupported {family} version '{version}'"),
                ));
            }
        }

        if self.output_path.as_os_str().is_empty() {
            errors.push(ConfigError::new("output_path", "must not be empty"));
        }

        for pattern in &self.exclude_patterns {
            if let Err(err) = Regex::new(pattern) {
                errors.push(ConfigError::new(
                    "exclude_patterns",
                    format!("invalid pattern '{pattern}': {err}"),
                ));
            }
        }

        if let Some(dir) = &self.schema_dir {
            if !dir.is_dir() {
                errors.push(ConfigError::new(
                    "schema_dir",
                    format!("{} is not a directory", dir.display()),
                ));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ScanConfig::default().is_valid());
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let mut config = ScanConfig::default();
        config.cyclonedx_version = "1.0".to_string();
        config.exclude_patterns.push("[".to_string());
        config.output_path = "".into();

        let errors = config.validate();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["cyclonedx_version", "output_path", "exclude_patterns"]);
        assert_eq!(errors[0].to_string(), "cyclonedx_version: unsupported cyclonedx version '1.0'");
    }
}
