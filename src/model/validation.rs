use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of validating a serialized SBOM document.
///
/// A default result is valid with no messages. Adding an error flips
/// `is_valid`; warnings never do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Detected properties such as `format` and `version`
    pub metadata: BTreeMap<String, String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
}

impl ValidationResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.is_valid = false;
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let result = ValidationResult::default();
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_warning_keeps_valid_error_does_not() {
        let mut result = ValidationResult::new();
        result.add_warning("no components");
        assert!(result.is_valid);
        result.add_error("missing bomFormat");
        assert!(!result.is_valid);
        assert_eq!(result.errors, ["missing bomFormat"]);
    }
}
