//! Diff command handler.

use super::{load_components, write_output, OutputTarget};
use crate::compare::{diff_statistics, SbomComparator};
use crate::model::DifferenceType;
use crate::reports::{create_reporter, ReportFormat};
use anyhow::Result;
use std::path::PathBuf;

/// Run the diff command. Returns the number of added, removed and modified
/// components.
pub fn run_diff(
    old: PathBuf,
    new: PathBuf,
    format: Option<String>,
    output: ReportFormat,
    output_file: Option<PathBuf>,
    include_unchanged: bool,
) -> Result<usize> {
    let old_components = load_components(&old, format.as_deref())?;
    let new_components = load_components(&new, format.as_deref())?;

    let diffs = SbomComparator::new()
        .include_unchanged(include_unchanged)
        .diff(&old_components, &new_components);
    let stats = diff_statistics(&diffs);
    let changes: usize = DifferenceType::ALL
        .iter()
        .filter(|kind| **kind != DifferenceType::Unchanged)
        .map(|kind| stats.get(kind.as_str()).copied().unwrap_or(0))
        .sum();
    tracing::info!(
        old = %old.display(),
        new = %new.display(),
        changes,
        "Compared SBOMs"
    );

    let report = create_reporter(output).generate_diff_report(&diffs)?;
    write_output(&report, &OutputTarget::from_option(output_file))?;
    Ok(changes)
}
