//! Report generation for component diffs.
//!
//! Three renderings of the same [`SbomDifference`] list:
//! - Text: summary counts plus one line per change
//! - JSON: summary object plus the full difference records
//! - CSV: one row per change for spreadsheet import

mod csv;
mod json;
mod text;
mod types;

pub use csv::CsvReporter;
pub use json::JsonReporter;
pub use text::TextReporter;
pub use types::ReportFormat;

use crate::model::SbomDifference;
use std::io::Write;
use thiserror::Error;

/// Errors that can occur during report generation
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Format error: {0}")]
    FormatError(#[from] std::fmt::Error),
}

/// Trait for report generators
pub trait ReportGenerator {
    /// Render a diff report
    fn generate_diff_report(&self, diffs: &[SbomDifference]) -> Result<String, ReportError>;

    /// Write report to a writer
    fn write_diff_report(
        &self,
        diffs: &[SbomDifference],
        writer: &mut dyn Write,
    ) -> Result<(), ReportError> {
        let report = self.generate_diff_report(diffs)?;
        writer.write_all(report.as_bytes())?;
        Ok(())
    }

    /// Get the format this generator produces
    fn format(&self) -> ReportFormat;
}

/// Create a report generator for the given format
#[must_use]
pub fn create_reporter(format: ReportFormat) -> Box<dyn ReportGenerator> {
    match format {
        ReportFormat::Text => Box::new(TextReporter::new()),
        ReportFormat::Json => Box::new(JsonReporter::new()),
        ReportFormat::Csv => Box::new(CsvReporter::new()),
    }
}
