//! CLI command handlers.
//!
//! Testable handlers invoked by main.rs, one per subcommand.

mod diff;
mod formats;
mod merge;
mod scan;
mod validate;

pub use diff::run_diff;
pub use formats::run_formats;
pub use merge::run_merge;
pub use scan::{run_scan, ScanInputs};
pub use validate::run_validate;

use crate::formats::{FormatFactory, FormatHandler, SbomFormat};
use crate::model::SbomComponent;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Where a handler writes its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    pub fn from_option(path: Option<PathBuf>) -> Self {
        path.map_or(Self::Stdout, Self::File)
    }
}

/// Write `content` to stdout or a file.
pub fn write_output(content: &str, target: &OutputTarget) -> Result<()> {
    match target {
        OutputTarget::Stdout => {
            print!("{content}");
            if !content.ends_with('\n') {
                println!();
            }
            Ok(())
        }
        OutputTarget::File(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            tracing::info!(path = %path.display(), "Output written");
            Ok(())
        }
    }
}

/// Read an SBOM document and pick its handler: the named format when given,
/// otherwise whatever the content looks like.
pub fn read_document(path: &Path, format: Option<&str>) -> Result<(String, SbomFormat)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read SBOM {}", path.display()))?;
    let handler = match format {
        Some(name) => FormatFactory::from_name(name)
            .with_context(|| format!("Unsupported SBOM format: {name}"))?,
        None => FormatFactory::detect(&content)
            .with_context(|| format!("Could not detect the SBOM format of {}", path.display()))?,
    };
    tracing::debug!(
        path = %path.display(),
        format = handler.format_name(),
        version = handler.format_version(),
        "Read SBOM document"
    );
    Ok((content, handler))
}

/// Components of an SBOM document on disk.
pub fn load_components(path: &Path, format: Option<&str>) -> Result<Vec<SbomComponent>> {
    let (content, handler) = read_document(path, format)?;
    Ok(handler.parse_components(&content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::DocumentMetadata;

    #[test]
    fn test_output_target_from_option() {
        assert_eq!(OutputTarget::from_option(None), OutputTarget::Stdout);
        let path = PathBuf::from("/tmp/report.json");
        assert_eq!(OutputTarget::from_option(Some(path.clone())), OutputTarget::File(path));
    }

    #[test]
    fn test_load_components_detects_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bom.json");
        let handler = FormatFactory::create("cyclonedx", "1.5").unwrap();
        let document = handler
            .generate(
                &[SbomComponent::new("zlib", "zlib", "1.3")],
                &DocumentMetadata::new("test"),
            )
            .unwrap();
        std::fs::write(&path, document).unwrap();

        let components = load_components(&path, None).unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].version, "1.3");
        assert!(load_components(&path, Some("swid")).is_err());
    }
}
