//! JSON report generator.

use super::{ReportError, ReportFormat, ReportGenerator};
use crate::compare::diff_statistics;
use crate::model::SbomDifference;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

/// JSON report generator
pub struct JsonReporter {
    /// Pretty print output
    pretty: bool,
}

impl JsonReporter {
    /// Create a new JSON reporter
    #[must_use]
    pub const fn new() -> Self {
        Self { pretty: true }
    }

    /// Set pretty printing
    #[must_use]
    pub const fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct JsonDiffReport<'a> {
    tool: ToolInfo,
    generated_at: String,
    summary: BTreeMap<String, usize>,
    differences: &'a [SbomDifference],
}

#[derive(Serialize)]
struct ToolInfo {
    name: &'static str,
    version: &'static str,
}

impl ReportGenerator for JsonReporter {
    fn generate_diff_report(&self, diffs: &[SbomDifference]) -> Result<String, ReportError> {
        let report = JsonDiffReport {
            tool: ToolInfo {
                name: "sbom-binscan",
                version: env!("CARGO_PKG_VERSION"),
            },
            generated_at: Utc::now().to_rfc3339(),
            summary: diff_statistics(diffs),
            differences: diffs,
        };

        let json = if self.pretty {
            serde_json::to_string_pretty(&report)
        } else {
            serde_json::to_string(&report)
        };
        json.map_err(|e| ReportError::SerializationError(e.to_string()))
    }

    fn format(&self) -> ReportFormat {
        ReportFormat::Json
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DifferenceType, SbomComponent};

    #[test]
    fn test_summary_and_records() {
        let diffs = vec![
            SbomDifference::new(DifferenceType::Removed, SbomComponent::new("old", "old", "1")),
            SbomDifference::modified(
                SbomComponent::new("libc", "libc", "2.32"),
                SbomComponent::new("libc", "libc", "2.31"),
            ),
        ];
        let report = JsonReporter::new().pretty(false).generate_diff_report(&diffs).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();

        assert_eq!(value["summary"]["removed"], 1);
        assert_eq!(value["summary"]["modified"], 1);
        assert_eq!(value["summary"]["added"], 0);
        assert_eq!(value["differences"][1]["type"], "modified");
        assert_eq!(value["differences"][1]["oldComponent"]["version"], "2.31");
        assert!(value["differences"][0].get("oldComponent").is_none());
    }
}
