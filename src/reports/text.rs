//! Plain-text report generator.

use super::{ReportError, ReportFormat, ReportGenerator};
use crate::compare::diff_statistics;
use crate::model::{DifferenceType, SbomComponent, SbomDifference};
use std::fmt::Write;

/// Text report generator.
pub struct TextReporter;

impl TextReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(component: &SbomComponent) -> String {
    if component.version.is_empty() {
        format!("{} ({})", component.name, component.id)
    } else {
        format!("{} {} ({})", component.name, component.version, component.id)
    }
}

impl ReportGenerator for TextReporter {
    fn generate_diff_report(&self, diffs: &[SbomDifference]) -> Result<String, ReportError> {
        let stats = diff_statistics(diffs);
        let mut out = String::new();

        writeln!(out, "SBOM Comparison Report")?;
        writeln!(out, "======================")?;
        writeln!(out)?;
        writeln!(out, "Summary:")?;
        for kind in DifferenceType::ALL {
            let label = match kind {
                DifferenceType::Added => "Added",
                DifferenceType::Removed => "Removed",
                DifferenceType::Modified => "Modified",
                DifferenceType::Unchanged => "Unchanged",
            };
            writeln!(out, "  {label}: {}", stats.get(kind.as_str()).copied().unwrap_or(0))?;
        }
        writeln!(out)?;

        let changes: Vec<&SbomDifference> = diffs
            .iter()
            .filter(|d| d.kind != DifferenceType::Unchanged)
            .collect();
        if changes.is_empty() {
            writeln!(out, "No differences found")?;
            return Ok(out);
        }

        writeln!(out, "Details:")?;
        for diff in changes {
            writeln!(
                out,
                "  [{}] {}",
                diff.kind.as_str().to_ascii_uppercase(),
                describe(&diff.component)
            )?;
            if let Some(old) = &diff.old_component {
                writeln!(out, "    Previous: {}", describe(old))?;
            }
        }
        Ok(out)
    }

    fn format(&self) -> ReportFormat {
        ReportFormat::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_differences() {
        let diffs = vec![SbomDifference::new(
            DifferenceType::Unchanged,
            SbomComponent::new("a", "a", "1"),
        )];
        let report = TextReporter::new().generate_diff_report(&diffs).unwrap();
        assert!(report.starts_with("SBOM Comparison Report\n"));
        assert!(report.contains("  Unchanged: 1\n"));
        assert!(report.ends_with("No differences found\n"));
    }

    #[test]
    fn test_detail_lines() {
        let diffs = vec![
            SbomDifference::new(DifferenceType::Added, SbomComponent::new("zlib", "zlib", "1.3")),
            SbomDifference::modified(
                SbomComponent::new("libc", "libc", "2.32"),
                SbomComponent::new("libc", "libc", "2.31"),
            ),
        ];
        let report = TextReporter::new().generate_diff_report(&diffs).unwrap();
        assert!(report.contains("  Added: 1\n"));
        assert!(report.contains("  Removed: 0\n"));
        assert!(report.contains("  [ADDED] zlib 1.3 (zlib)\n"));
        assert!(report.contains("  [MODIFIED] libc 2.32 (libc)\n    Previous: libc 2.31 (libc)\n"));
    }
}
