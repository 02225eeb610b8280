//! Report type definitions.

use clap::ValueEnum;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output format for diff reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Human-readable summary and detail lines
    #[default]
    Text,
    /// Structured JSON output
    Json,
    /// CSV for spreadsheet import
    Csv,
}

impl ReportFormat {
    /// Resolve a renderer name. Unknown names fall back to [`ReportFormat::Text`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "csv" => Self::Csv,
            "text" | "txt" => Self::Text,
            other => {
                tracing::debug!(renderer = other, "Unknown report renderer, using text");
                Self::Text
            }
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Text => write!(f, "text"),
            ReportFormat::Json => write!(f, "json"),
            ReportFormat::Csv => write!(f, "csv"),
        }
    }
}
