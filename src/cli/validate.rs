//! Validate command handler.

use super::{read_document, write_output, OutputTarget};
use crate::formats::FormatHandler;
use crate::model::ValidationResult;
use crate::reports::ReportFormat;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::PathBuf;

/// Run the validate command. Returns whether the document is valid.
pub fn run_validate(
    sbom_path: PathBuf,
    format: Option<String>,
    output: ReportFormat,
    output_file: Option<PathBuf>,
) -> Result<bool> {
    let (content, handler) = read_document(&sbom_path, format.as_deref())?;
    let result = handler.validate(&content);

    if !result.is_valid {
        tracing::warn!(
            path = %sbom_path.display(),
            errors = result.errors.len(),
            "SBOM failed validation"
        );
    }

    let rendered = match output {
        ReportFormat::Json => serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?,
        ReportFormat::Text | ReportFormat::Csv => format_validation_text(&sbom_path, &result),
    };
    write_output(&rendered, &OutputTarget::from_option(output_file))?;
    Ok(result.is_valid)
}

fn format_validation_text(path: &std::path::Path, result: &ValidationResult) -> String {
    let mut out = String::new();
    let format = result.metadata("format").unwrap_or("unknown");
    let version = result.metadata("version").unwrap_or("?");
    let _ = writeln!(out, "{}: {format} {version}", path.display());
    let _ = writeln!(out, "Status: {}", if result.is_valid { "valid" } else { "INVALID" });
    for error in &result.errors {
        let _ = writeln!(out, "  error: {error}");
    }
    for warning in &result.warnings {
        let _ = writeln!(out, "  warning: {warning}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_lists_messages() {
        let mut result = ValidationResult::new();
        result.set_metadata("format", "CycloneDX");
        result.set_metadata("version", "1.6");
        result.add_error("Missing required field: bomFormat");
        result.add_warning("No components");

        let text = format_validation_text(std::path::Path::new("bom.json"), &result);
        assert_eq!(
            text,
            "bom.json: CycloneDX 1.6\nStatus: INVALID\n  error: Missing required field: bomFormat\n  warning: No components\n"
        );
    }

    #[test]
    fn test_invalid_document_reports_false() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bom.json");
        std::fs::write(&path, r#"{"bomFormat": "CycloneDX", "specVersion": "1.0", "version": 1}"#).unwrap();
        let report = dir.path().join("report.json");

        let valid = run_validate(path, None, ReportFormat::Json, Some(report.clone())).unwrap();
        assert!(!valid);
        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(report).unwrap()).unwrap();
        assert_eq!(value["is_valid"], false);
    }
}
