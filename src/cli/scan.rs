//! Scan command handler.
//!
//! Drives an [`SbomSession`] the way a linker integration would: every
//! input, then every library, then one `finalize`.

use crate::config::ScanConfig;
use crate::session::SbomSession;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Files handed to the `scan` subcommand.
#[derive(Debug, Clone, Default)]
pub struct ScanInputs {
    /// Objects, archives and executables
    pub files: Vec<PathBuf>,
    /// Shared libraries the artifact links against
    pub libraries: Vec<PathBuf>,
    /// Scan `files` on several threads
    pub parallel: bool,
}

/// Run the scan command. Returns the path of the written document.
pub fn run_scan(config: ScanConfig, inputs: &ScanInputs, show_stats: bool) -> Result<PathBuf> {
    if inputs.files.is_empty() && inputs.libraries.is_empty() {
        bail!("No input files given");
    }

    let mut session = SbomSession::new(config);
    if inputs.parallel {
        session.process_input_files(&inputs.files);
    } else {
        for path in &inputs.files {
            if let Err(err) = session.process_input_file(path) {
                tracing::warn!(path = %path.display(), error = %err, "Input skipped");
            }
        }
    }
    for path in &inputs.libraries {
        if let Err(err) = session.process_library(path) {
            tracing::warn!(path = %path.display(), error = %err, "Library skipped");
        }
    }

    if session.graph().component_count() == 0 {
        bail!("None of the inputs could be read");
    }

    let written = session.finalize().context("Failed to write SBOM")?;
    let stats = session.statistics();
    tracing::info!(
        path = %written.display(),
        files = stats.files_processed(),
        components = stats.components,
        unresolved = stats.unresolved_dependencies,
        skipped = stats.skipped_files,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        "Scan complete"
    );
    if show_stats {
        let json = serde_json::to_string_pretty(&stats).context("Failed to serialize statistics")?;
        println!("{json}");
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FormatFamily;
    use crate::graph::ResolutionMode;

    #[test]
    fn test_scan_writes_cyclonedx() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("app.o");
        std::fs::write(&input, b"plain bytes").unwrap();
        let output = dir.path().join("bom.json");

        let config = ScanConfig::builder()
            .format(FormatFamily::CycloneDx)
            .resolution_mode(ResolutionMode::DeclaredOnly)
            .output_path(&output)
            .build();
        let inputs = ScanInputs {
            files: vec![input],
            ..ScanInputs::default()
        };
        let written = run_scan(config, &inputs, false).unwrap();
        assert_eq!(written, output);

        let bom: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(bom["bomFormat"], "CycloneDX");
        assert_eq!(bom["components"][0]["name"], "app.o");
    }

    #[test]
    fn test_scan_without_readable_inputs_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig::builder().output_path(dir.path().join("sbom.spdx")).build();
        assert!(run_scan(config.clone(), &ScanInputs::default(), false).is_err());

        let inputs = ScanInputs {
            files: vec![dir.path().join("missing.o")],
            ..ScanInputs::default()
        };
        assert!(run_scan(config, &inputs, false).is_err());
        assert!(!dir.path().join("sbom.spdx").exists());
    }
}
