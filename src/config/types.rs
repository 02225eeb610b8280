//! Configuration types for sbom-binscan scans.

use super::defaults::{
    DEFAULT_CYCLONEDX_VERSION, DEFAULT_OUTPUT_PATH, DEFAULT_SPDX_VERSION,
};
use crate::formats::FormatFamily;
use crate::graph::{default_search_paths, ResolutionMode};
use crate::scanner::ScanOptions;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Scan Configuration
// ============================================================================

/// Settings for one scan session.
///
/// Loaded from a YAML file, from command-line flags, or both (with flags
/// layered over the file through [`ScanConfig::merge`]).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ScanConfig {
    /// Output document family
    pub format: FormatFamily,
    /// SPDX version used when the family is SPDX
    pub spdx_version: String,
    /// CycloneDX version used when the family is CycloneDX
    pub cyclonedx_version: String,
    /// Where `finalize` writes the document
    pub output_path: PathBuf,
    /// Recover source files, compile units and functions from DWARF
    pub extract_debug_info: bool,
    /// Emit components that live in system library directories
    pub include_system_libraries: bool,
    /// Follow dependencies of resolved dependencies
    pub transitive_dependencies: bool,
    /// Whether dependency names are looked up on the host filesystem
    pub resolution_mode: ResolutionMode,
    /// Directories searched for shared libraries, in order
    pub library_search_paths: Vec<PathBuf>,
    /// Directory holding `spdx-<version>.json` node-shape schemas
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_dir: Option<PathBuf>,
    /// Record a SHA-256 checksum per component
    pub generate_checksums: bool,
    /// Regular expressions; matching input paths are skipped
    pub exclude_patterns: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            format: FormatFamily::Spdx,
            spdx_version: DEFAULT_SPDX_VERSION.to_string(),
            cyclonedx_version: DEFAULT_CYCLONEDX_VERSION.to_string(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            extract_debug_info: true,
            include_system_libraries: false,
            transitive_dependencies: true,
            resolution_mode: ResolutionMode::LiveFilesystem,
            library_search_paths: default_search_paths(),
            schema_dir: None,
            generate_checksums: true,
            exclude_patterns: Vec::new(),
        }
    }
}

impl ScanConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Version selected for the configured family.
    #[must_use]
    pub fn format_version(&self) -> &str {
        match self.format {
            FormatFamily::Spdx => &self.spdx_version,
            FormatFamily::CycloneDx => &self.cyclonedx_version,
        }
    }

    /// Set the version for the configured family.
    pub fn set_format_version(&mut self, version: impl Into<String>) {
        match self.format {
            FormatFamily::Spdx => self.spdx_version = version.into(),
            FormatFamily::CycloneDx => self.cyclonedx_version = version.into(),
        }
    }

    /// Options handed to the per-file scanner.
    #[must_use]
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            extract_debug_info: self.extract_debug_info,
            generate_checksums: self.generate_checksums,
            lightweight_debug_info: false,
        }
    }

    /// Compiled exclude patterns. Patterns that fail to compile are logged
    /// and dropped.
    #[must_use]
    pub fn exclude_matcher(&self) -> ExcludeMatcher {
        let patterns = self
            .exclude_patterns
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(err) => {
                    tracing::warn!(pattern = %pattern, error = %err, "Ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();
        ExcludeMatcher { patterns }
    }
}

/// Compiled form of [`ScanConfig::exclude_patterns`].
#[derive(Debug, Clone, Default)]
pub struct ExcludeMatcher {
    patterns: Vec<Regex>,
}

impl ExcludeMatcher {
    /// True when any pattern matches the path's display form.
    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let text = path.to_string_lossy();
        self.patterns.iter().any(|re| re.is_match(&text))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

// ============================================================================
// Builder for ScanConfig
// ============================================================================

/// Builder for constructing `ScanConfig` with fluent API.
#[derive(Debug, Default)]
#[must_use]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    pub const fn format(mut self, format: FormatFamily) -> Self {
        self.config.format = format;
        self
    }

    /// Version for whichever family is set when this is called.
    pub fn format_version(mut self, version: impl Into<String>) -> Self {
        self.config.set_format_version(version);
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_path = path.into();
        self
    }

    pub const fn extract_debug_info(mut self, enabled: bool) -> Self {
        self.config.extract_debug_info = enabled;
        self
    }

    pub const fn include_system_libraries(mut self, enabled: bool) -> Self {
        self.config.include_system_libraries = enabled;
        self
    }

    pub const fn transitive_dependencies(mut self, enabled: bool) -> Self {
        self.config.transitive_dependencies = enabled;
        self
    }

    pub const fn resolution_mode(mut self, mode: ResolutionMode) -> Self {
        self.config.resolution_mode = mode;
        self
    }

    pub fn library_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.config.library_search_paths = paths;
        self
    }

    pub fn schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.schema_dir = Some(dir.into());
        self
    }

    pub const fn generate_checksums(mut self, enabled: bool) -> Self {
        self.config.generate_checksums = enabled;
        self
    }

    pub fn exclude_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.exclude_patterns.push(pattern.into());
        self
    }

    #[must_use]
    pub fn build(self) -> ScanConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.format, FormatFamily::Spdx);
        assert_eq!(config.format_version(), "2.3");
        assert_eq!(config.output_path, PathBuf::from("sbom.json"));
        assert!(config.extract_debug_info);
        assert!(!config.include_system_libraries);
        assert!(config.transitive_dependencies);
        assert!(config.library_search_paths.contains(&PathBuf::from("/usr/lib")));
    }

    #[test]
    fn test_builder_sets_family_version() {
        let config = ScanConfig::builder()
            .format(FormatFamily::CycloneDx)
            .format_version("1.5")
            .resolution_mode(ResolutionMode::DeclaredOnly)
            .build();
        assert_eq!(config.format_version(), "1.5");
        assert_eq!(config.spdx_version, "2.3");
        assert_eq!(config.resolution_mode, ResolutionMode::DeclaredOnly);
    }

    #[test]
    fn test_exclude_matcher_skips_invalid_patterns() {
        let config = ScanConfig::builder()
            .exclude_pattern(r"\.txt$")
            .exclude_pattern("(unclosed")
            .build();
        let matcher = config.exclude_matcher();
        assert!(matcher.is_excluded(Path::new("/tmp/notes.txt")));
        assert!(!matcher.is_excluded(Path::new("/tmp/main.o")));
    }

    #[test]
    fn test_yaml_partial_uses_defaults() {
        let config: ScanConfig =
            serde_yaml_ng::from_str("format: cyclonedx\nresolution_mode: declared-only\n").unwrap();
        assert_eq!(config.format, FormatFamily::CycloneDx);
        assert_eq!(config.format_version(), "1.6");
        assert_eq!(config.resolution_mode, ResolutionMode::DeclaredOnly);
        assert!(config.generate_checksums);
    }
}
