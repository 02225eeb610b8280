//! CSV report generator.
//!
//! One row per added, removed or modified component, suitable for
//! spreadsheet import.

use super::{ReportError, ReportFormat, ReportGenerator};
use crate::model::{DifferenceType, SbomDifference};
use std::fmt::Write;

/// CSV report generator.
pub struct CsvReporter;

impl CsvReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportGenerator for CsvReporter {
    fn generate_diff_report(&self, diffs: &[SbomDifference]) -> Result<String, ReportError> {
        let mut content = String::new();
        content.push_str("Change,ID,Name,Version,Type,Old Name,Old Version,Old Type\n");

        for diff in diffs.iter().filter(|d| d.kind != DifferenceType::Unchanged) {
            let new = &diff.component;
            let (old_name, old_version, old_type) = diff.old_component.as_ref().map_or(
                ("-", "-", "-"),
                |old| (old.name.as_str(), old.version.as_str(), old.component_type.as_str()),
            );
            writeln!(
                content,
                "{},\"{}\",\"{}\",\"{}\",\"{}\",\"{}\",\"{}\",\"{}\"",
                diff.kind.as_str(),
                escape_csv(&new.id),
                escape_csv(&new.name),
                escape_csv(&new.version),
                escape_csv(&new.component_type),
                escape_csv(old_name),
                escape_csv(old_version),
                escape_csv(old_type)
            )?;
        }

        Ok(content)
    }

    fn format(&self) -> ReportFormat {
        ReportFormat::Csv
    }
}

/// Escape a string for CSV embedding: double-quote escaping per RFC 4180,
/// plus newline flattening since fields are already wrapped in double quotes.
fn escape_csv(s: &str) -> String {
    s.replace('"', "\"\"").replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SbomComponent;

    #[test]
    fn test_rows_skip_unchanged() {
        let diffs = vec![
            SbomDifference::new(DifferenceType::Unchanged, SbomComponent::new("a", "a", "1")),
            SbomDifference::modified(
                SbomComponent::new("libc", "libc", "2.32").with_type("library"),
                SbomComponent::new("libc", "libc", "2.31").with_type("library"),
            ),
        ];
        let report = CsvReporter::new().generate_diff_report(&diffs).unwrap();
        let lines: Vec<_> = report.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            "modified,\"libc\",\"libc\",\"2.32\",\"library\",\"libc\",\"2.31\",\"library\""
        );
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("say \"hi\""), "say \"\"hi\"\"");
        assert_eq!(escape_csv("two\nlines"), "two lines");
    }
}
