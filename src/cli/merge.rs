//! Merge command handler.

use super::{load_components, write_output, OutputTarget};
use crate::compare::merge;
use crate::formats::{DocumentMetadata, FormatFactory, FormatHandler};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Merge several SBOMs into one document of the requested format.
pub fn run_merge(
    inputs: Vec<PathBuf>,
    input_format: Option<String>,
    output_format: &str,
    name: Option<String>,
    output_file: Option<PathBuf>,
) -> Result<usize> {
    if inputs.is_empty() {
        bail!("No SBOMs to merge");
    }
    let handler = FormatFactory::from_name(output_format)
        .with_context(|| format!("Unsupported output format: {output_format}"))?;

    let sets = inputs
        .iter()
        .map(|path| load_components(path, input_format.as_deref()))
        .collect::<Result<Vec<_>>>()?;
    let merged = merge(&sets);
    tracing::info!(inputs = inputs.len(), components = merged.len(), "Merged SBOMs");

    let metadata = DocumentMetadata::new(name.unwrap_or_else(|| "merged-sbom".to_string()));
    let document = handler.generate(&merged, &metadata)?;
    write_output(&document, &OutputTarget::from_option(output_file))?;
    Ok(merged.len())
}
