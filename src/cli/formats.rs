//! Formats command handler: lists the document formats the tool writes.

use crate::formats::{FormatFactory, FormatHandler};
use crate::reports::ReportFormat;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;

const FEATURES: &[&str] = &[
    "tag_value",
    "json_ld",
    "json",
    "relationships",
    "dependencies",
    "checksums",
    "hashes",
    "properties",
    "evidence",
    "cryptography",
];

#[derive(Serialize)]
struct FormatEntry {
    family: String,
    name: &'static str,
    version: String,
    extension: &'static str,
    features: Vec<&'static str>,
}

fn entries() -> Vec<FormatEntry> {
    FormatFactory::supported_formats()
        .into_iter()
        .filter_map(|(family, version)| FormatFactory::create_for(family, version))
        .map(|handler| FormatEntry {
            family: handler.family().to_string(),
            name: handler.format_name(),
            version: handler.format_version().to_string(),
            extension: handler.file_extension(),
            features: FEATURES
                .iter()
                .copied()
                .filter(|feature| handler.supports_feature(feature))
                .collect(),
        })
        .collect()
}

/// Render the supported format table.
pub fn run_formats(output: ReportFormat) -> Result<String> {
    let entries = entries();
    match output {
        ReportFormat::Json => {
            serde_json::to_string_pretty(&entries).context("Failed to serialize format list")
        }
        ReportFormat::Csv => {
            let mut out = String::from("Family,Name,Version,Extension,Features\n");
            for entry in &entries {
                let _ = writeln!(
                    out,
                    "{},{},{},{},\"{}\"",
                    entry.family,
                    entry.name,
                    entry.version,
                    entry.extension,
                    entry.features.join(" ")
                );
            }
            Ok(out)
        }
        ReportFormat::Text => {
            let mut out = String::new();
            for entry in &entries {
                let _ = writeln!(
                    out,
                    "{:<10} {:<10} {:<6} .{:<5} {}",
                    entry.family,
                    entry.name,
                    entry.version,
                    entry.extension,
                    entry.features.join(", ")
                );
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_every_format() {
        let json = run_formats(ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let list = value.as_array().unwrap();
        assert_eq!(list.len(), 6);

        let cdx16 = list
            .iter()
            .find(|e| e["family"] == "cyclonedx" && e["version"] == "1.6")
            .unwrap();
        let features: Vec<_> = cdx16["features"].as_array().unwrap().iter().filter_map(|f| f.as_str()).collect();
        assert!(features.contains(&"cryptography"));
        assert!(features.contains(&"evidence"));
    }
}
