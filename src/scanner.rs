//! Building a [`ComponentInfo`] from one artifact on disk.
//!
//! Every reader runs over a single in-memory copy of the file. Failures past
//! the initial read are recorded on the component as a processing error
//! instead of rejecting it, so an artifact the readers only partly
//! understand is still emitted.

use crate::binary::{inspect_bytes, read_input, ExtractError};
use crate::debuginfo::{DebugInfoExtractor, DualStrategyExtractor};
use crate::graph::{classify_package_manager, extract_version_from_path, is_system_library};
use crate::model::{ComponentInfo, FileType};
use crate::utils::sha256_hex;
use std::path::Path;

/// Knobs for [`scan_file`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub extract_debug_info: bool,
    pub generate_checksums: bool,
    /// Skip the authoritative DWARF reader, e.g. when scanning on several threads
    pub lightweight_debug_info: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extract_debug_info: true,
            generate_checksums: true,
            lightweight_debug_info: false,
        }
    }
}

/// Logical component name for a path: its file name.
#[must_use]
pub fn component_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.to_string_lossy().into_owned(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Scan `path` under its file name.
pub fn scan_file(path: &Path, options: &ScanOptions) -> Result<ComponentInfo, ExtractError> {
    scan_file_named(component_name(path), path, options)
}

/// Scan `path` and register the result under `name`.
///
/// Fails only when the file cannot be read at all.
pub fn scan_file_named(
    name: impl Into<String>,
    path: &Path,
    options: &ScanOptions,
) -> Result<ComponentInfo, ExtractError> {
    let data = read_input(path)?;
    let mut builder = ComponentInfo::builder(name, path);
    builder.file_size(data.len() as u64);

    if options.generate_checksums {
        builder.checksum(sha256_hex(&data));
    }

    let provenance = classify_package_manager(path);
    builder
        .package_manager(provenance.manager)
        .supplier(provenance.supplier)
        .system_library(is_system_library(path));
    if let Some(location) = provenance.download_location {
        builder.download_location(location);
    }
    if let Some(version) = extract_version_from_path(path) {
        builder.version(version);
    }

    let mut has_debug_sections = false;
    match inspect_bytes(&data) {
        Ok(inspection) => {
            has_debug_sections = inspection.sections.iter().any(|s| s.flags.debug);
            if inspection.file_type != FileType::Unknown {
                builder.file_type(inspection.file_type);
            }
            builder
                .stripped(!inspection.has_symbol_table)
                .symbols(inspection.symbols)
                .sections(inspection.sections)
                .dependencies(inspection.dependencies);
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Could not read binary tables");
            builder.processing_error(err.to_string());
        }
    }

    if options.extract_debug_info && has_debug_sections {
        let extractor = if options.lightweight_debug_info {
            DualStrategyExtractor::lightweight_only()
        } else {
            DualStrategyExtractor::new()
        };
        match extractor.extract_all_debug_info(path) {
            Ok(info) => {
                builder
                    .source_files(info.source_files)
                    .compile_units(info.compile_units)
                    .functions(info.functions)
                    .debug_info_from(info.strategy);
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "No usable debug info");
            }
        }
    }

    let component = builder.finish();
    tracing::debug!(
        path = %path.display(),
        name = component.name(),
        symbols = component.symbols().len(),
        dependencies = component.dependency_count(),
        "Scanned component"
    );
    Ok(component)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_name_is_file_name() {
        assert_eq!(component_name(Path::new("/usr/lib/libc.so.6")), "libc.so.6");
        assert_eq!(component_name(Path::new("main.o")), "main.o");
    }

    #[test]
    fn test_unparseable_file_is_kept_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let component = scan_file(&path, &ScanOptions::default()).unwrap();
        assert!(component.was_processed());
        assert!(component.processing_error().is_some());
        assert_eq!(component.file_size(), 5);
        assert_eq!(
            component.checksum(),
            Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
        );
    }

    #[test]
    fn test_missing_file_fails() {
        assert!(scan_file(Path::new("/nonexistent/lib.so"), &ScanOptions::default()).is_err());
    }
}
