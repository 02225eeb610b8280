//! Scan sessions: the entry points a linker integration drives.
//!
//! A linker plugin calls [`SbomSession::process_input_file`] for every
//! object or archive it opens, [`SbomSession::process_library`] for every
//! shared library it links against and [`SbomSession::process_symbol`] for
//! every resolved symbol, then [`SbomSession::finalize`] once the link is
//! done. The session owns the dependency graph and writes one document.
//!
//! ```rust,ignore
//! use sbom_binscan::{ScanConfig, SbomSession};
//!
//! let mut session = SbomSession::new(ScanConfig::default());
//! session.set_format("cyclonedx")?;
//! session.process_input_file("main.o".as_ref())?;
//! session.process_library("/usr/lib/libz.so.1".as_ref())?;
//! let written = session.finalize()?;
//! ```

use crate::config::{ExcludeMatcher, ScanConfig};
use crate::error::{Result, SbomError};
use crate::formats::{DocumentMetadata, FormatFactory, FormatFamily, FormatHandler, SbomFormat};
use crate::graph::{DependencyGraph, FileLoader, ResolutionSummary};
use crate::model::{ComponentInfo, FileType, Symbol};
use crate::scanner::{scan_file, ScanOptions};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Counters collected over a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStatistics {
    /// Processed inputs keyed by file type name
    pub files_by_type: BTreeMap<String, usize>,
    /// Processed inputs that live in a system library directory
    pub system_libraries: usize,
    /// Symbols read from inputs plus symbols reported by the linker
    pub symbols: usize,
    /// Inputs excluded by pattern or not readable
    pub skipped_files: usize,
    /// Nodes in the dependency graph, resolved dependencies included
    pub components: usize,
    /// Dependency names that could not be located
    pub unresolved_dependencies: usize,
    /// Time since the session was created, or until it was finalized
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl SessionStatistics {
    /// Total number of processed inputs.
    #[must_use]
    pub fn files_processed(&self) -> usize {
        self.files_by_type.values().sum()
    }

    fn record(&mut self, component: &ComponentInfo) {
        *self
            .files_by_type
            .entry(component.file_type().as_str().to_string())
            .or_insert(0) += 1;
        if component.is_system_library() {
            self.system_libraries += 1;
        }
        self.symbols += component.symbols().len();
    }
}

fn serialize_millis<S: serde::Serializer>(elapsed: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

/// One SBOM generation run.
pub struct SbomSession {
    config: ScanConfig,
    exclude: ExcludeMatcher,
    graph: DependencyGraph,
    processed_files: HashSet<PathBuf>,
    processed_libraries: HashSet<PathBuf>,
    linker_symbols: Vec<Symbol>,
    stats: SessionStatistics,
    started: Instant,
    finished: Option<Duration>,
}

impl Default for SbomSession {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

impl SbomSession {
    #[must_use]
    pub fn new(config: ScanConfig) -> Self {
        let graph = DependencyGraph::new(config.resolution_mode, config.library_search_paths.clone());
        let exclude = config.exclude_matcher();
        Self {
            config,
            exclude,
            graph,
            processed_files: HashSet::new(),
            processed_libraries: HashSet::new(),
            linker_symbols: Vec::new(),
            stats: SessionStatistics::default(),
            started: Instant::now(),
            finished: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Symbols reported through [`SbomSession::process_symbol`].
    #[must_use]
    pub fn linker_symbols(&self) -> &[Symbol] {
        &self.linker_symbols
    }

    // ========================================================================
    // Linker entry points
    // ========================================================================

    /// Scan one linker input and add it to the graph.
    ///
    /// Returns `Ok(false)` when the path was already processed or matches an
    /// exclude pattern. An unreadable file is counted as skipped and
    /// reported as an error; the session stays usable.
    pub fn process_input_file(&mut self, path: &Path) -> Result<bool> {
        if !self.admit(path, false) {
            return Ok(false);
        }
        let options = self.config.scan_options();
        let component = self.scan(path, &options)?;
        self.add(component);
        Ok(true)
    }

    /// Scan one shared library the link pulls in. The component is always
    /// typed as a shared library, whatever its content says.
    pub fn process_library(&mut self, path: &Path) -> Result<bool> {
        if !self.admit(path, true) {
            return Ok(false);
        }
        let options = self.config.scan_options();
        let component = self.scan(path, &options)?;
        let mut builder = component.to_builder();
        builder.file_type(FileType::SharedLibrary);
        self.add(builder.finish());
        Ok(true)
    }

    /// Record a symbol the linker resolved.
    pub fn process_symbol(&mut self, name: &str, address: u64, size: u64) {
        tracing::trace!(symbol = name, address, size, "Linker symbol");
        self.linker_symbols.push(Symbol::new(name, address, size));
        self.stats.symbols += 1;
    }

    /// Scan many inputs on the rayon thread pool.
    ///
    /// Debug info comes from the lightweight reader only, since the
    /// authoritative one admits a single caller at a time. Components are
    /// added in input order. Returns the number of inputs added.
    pub fn process_input_files(&mut self, paths: &[PathBuf]) -> usize {
        let admitted: Vec<&PathBuf> = paths.iter().filter(|path| self.admit(path, false)).collect();
        let options = ScanOptions {
            lightweight_debug_info: true,
            ..self.config.scan_options()
        };

        let scanned: Vec<_> = admitted
            .par_iter()
            .map(|path| (path.as_path(), scan_file(path, &options)))
            .collect();

        let mut added = 0;
        for (path, result) in scanned {
            match result {
                Ok(component) => {
                    self.add(component);
                    added += 1;
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Skipping unreadable input");
                    self.stats.skipped_files += 1;
                }
            }
        }
        tracing::info!(inputs = paths.len(), added, "Processed inputs in parallel");
        added
    }

    // ========================================================================
    // Output selection
    // ========================================================================

    pub fn set_output_path(&mut self, path: impl Into<PathBuf>) {
        self.config.output_path = path.into();
    }

    /// Select the document family by name or alias (`spdx`, `cyclonedx`,
    /// `spdx-3.0.1`, `cyclonedx-1.5`). An alias carrying a version also sets
    /// the version.
    pub fn set_format(&mut self, name: &str) -> Result<()> {
        let lower = name.trim().to_ascii_lowercase();
        let (family_name, version) = lower.split_once('-').unwrap_or((lower.as_str(), ""));
        let family: FormatFamily = family_name
            .parse()
            .map_err(|_| SbomError::unsupported_format(name, version))?;
        if !version.is_empty() && FormatFactory::create_for(family, version).is_none() {
            return Err(SbomError::unsupported_format(family.as_str(), version));
        }

        self.config.format = family;
        if !version.is_empty() {
            self.config.set_format_version(version);
        }
        tracing::debug!(format = %family, version = self.config.format_version(), "Output format selected");
        Ok(())
    }

    /// Select the version for the current family.
    pub fn set_format_version(&mut self, version: &str) -> Result<()> {
        let family = self.config.format;
        if FormatFactory::create_for(family, version.trim()).is_none() {
            return Err(SbomError::unsupported_format(family.as_str(), version));
        }
        self.config.set_format_version(version.trim());
        Ok(())
    }

    /// Handler for the configured family and version.
    pub fn handler(&self) -> Result<SbomFormat> {
        let family = self.config.format;
        let version = self.config.format_version();
        FormatFactory::create_for(family, version)
            .map(|format| format.with_schema_dir(self.config.schema_dir.as_deref()))
            .ok_or_else(|| SbomError::unsupported_format(family.as_str(), version))
    }

    // ========================================================================
    // Finalization
    // ========================================================================

    /// Resolve dependencies and render the document without writing it.
    pub fn render(&mut self) -> Result<String> {
        let handler = self.handler()?;
        let summary = self.resolve();
        let components = self.graph.sbom_components(self.config.include_system_libraries);
        let metadata = DocumentMetadata::new(self.document_name());
        let document = handler.generate(&components, &metadata)?;

        self.finished = Some(self.started.elapsed());
        tracing::info!(
            format = handler.format_name(),
            version = handler.format_version(),
            components = components.len(),
            unresolved = summary.unresolved,
            "Generated SBOM"
        );
        Ok(document)
    }

    /// Resolve dependencies, render the document and write it to the output
    /// path. Returns the path written.
    pub fn finalize(&mut self) -> Result<PathBuf> {
        let document = self.render()?;
        let path = self.config.output_path.clone();
        if path.as_os_str().is_empty() {
            return Err(SbomError::format(
                "finalize",
                crate::error::FormatErrorKind::MissingOutputPath,
            ));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SbomError::io(parent, e))?;
        }
        std::fs::write(&path, document).map_err(|e| SbomError::io(&path, e))?;
        tracing::info!(path = %path.display(), "Wrote SBOM");
        Ok(path)
    }

    /// Current counters.
    #[must_use]
    pub fn statistics(&self) -> SessionStatistics {
        let mut stats = self.stats.clone();
        stats.components = self.graph.component_count();
        stats.unresolved_dependencies = self.graph.unresolved().count();
        stats.elapsed = self.finished.unwrap_or_else(|| self.started.elapsed());
        stats
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// First sighting of a path that no exclude pattern matches.
    fn admit(&mut self, path: &Path, library: bool) -> bool {
        if self.exclude.is_excluded(path) {
            tracing::debug!(path = %path.display(), "Excluded by pattern");
            self.stats.skipped_files += 1;
            return false;
        }
        let seen = if library {
            &mut self.processed_libraries
        } else {
            &mut self.processed_files
        };
        if !seen.insert(path.to_path_buf()) {
            tracing::debug!(path = %path.display(), "Already processed");
            return false;
        }
        true
    }

    fn scan(&mut self, path: &Path, options: &ScanOptions) -> Result<ComponentInfo> {
        scan_file(path, options).map_err(|err| {
            tracing::warn!(path = %path.display(), error = %err, "Skipping unreadable input");
            self.stats.skipped_files += 1;
            SbomError::extract(path.display().to_string(), err)
        })
    }

    fn add(&mut self, component: ComponentInfo) {
        self.stats.record(&component);
        self.graph.process_component(component);
    }

    fn resolve(&mut self) -> ResolutionSummary {
        let loader = FileLoader::new(ScanOptions {
            extract_debug_info: false,
            generate_checksums: self.config.generate_checksums,
            lightweight_debug_info: true,
        });
        self.graph
            .resolve_dependencies_with(self.config.transitive_dependencies, &loader)
    }

    fn document_name(&self) -> String {
        self.config
            .output_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| "sbom".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FormatHandler;
    use crate::graph::ResolutionMode;

    fn session_in(dir: &Path) -> SbomSession {
        SbomSession::new(
            ScanConfig::builder()
                .resolution_mode(ResolutionMode::DeclaredOnly)
                .output_path(dir.join("out").join("sbom.spdx"))
                .exclude_pattern(r"\.skip$")
                .build(),
        )
    }

    #[test]
    fn test_repeated_and_excluded_paths() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.txt");
        let skipped = dir.path().join("build.skip");
        std::fs::write(&input, b"text").unwrap();
        std::fs::write(&skipped, b"text").unwrap();

        let mut session = session_in(dir.path());
        assert!(session.process_input_file(&input).unwrap());
        assert!(!session.process_input_file(&input).unwrap());
        assert!(!session.process_input_file(&skipped).unwrap());

        let stats = session.statistics();
        assert_eq!(stats.files_processed(), 1);
        assert_eq!(stats.skipped_files, 1);
        assert_eq!(stats.components, 1);
    }

    #[test]
    fn test_unreadable_input_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path());
        assert!(session.process_input_file(&dir.path().join("missing.o")).is_err());
        assert_eq!(session.statistics().skipped_files, 1);
        assert_eq!(session.graph().component_count(), 0);
    }

    #[test]
    fn test_library_is_typed_shared() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("libplugin");
        std::fs::write(&lib, b"not an elf").unwrap();

        let mut session = session_in(dir.path());
        session.process_library(&lib).unwrap();
        let component = session.graph().get("libplugin").unwrap();
        assert_eq!(component.file_type(), FileType::SharedLibrary);
        assert_eq!(session.statistics().files_by_type.get("shared-library"), Some(&1));
    }

    #[test]
    fn test_format_selection() {
        let mut session = SbomSession::default();
        session.set_format("CycloneDX-1.5").unwrap();
        assert_eq!(session.config().format, FormatFamily::CycloneDx);
        assert_eq!(session.config().format_version(), "1.5");

        assert!(session.set_format_version("1.0").is_err());
        assert_eq!(session.config().format_version(), "1.5");
        assert!(session.set_format("yaml").is_err());

        session.set_format("spdx").unwrap();
        session.set_format_version("3.0.1").unwrap();
        assert_eq!(session.handler().unwrap().format_version(), "3.0.1");
    }

    #[test]
    fn test_symbols_are_counted() {
        let mut session = SbomSession::default();
        session.process_symbol("main", 0x1000, 64);
        session.process_symbol("fibonacci", 0x1040, 32);
        assert_eq!(session.linker_symbols().len(), 2);
        assert_eq!(session.statistics().symbols, 2);
    }

    #[test]
    fn test_finalize_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("main.o");
        std::fs::write(&input, b"\x7fELF-truncated").unwrap();

        let mut session = session_in(dir.path());
        session.process_input_file(&input).unwrap();
        let written = session.finalize().unwrap();

        let content = std::fs::read_to_string(&written).unwrap();
        assert!(content.starts_with("SPDXVersion: SPDX-2.3"));
        assert!(content.contains("PackageName: main.o"));
        let parsed = FormatFactory::create("spdx", "2.3").unwrap().parse_components(&content);
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_parallel_inputs_keep_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..8)
            .map(|i| {
                let path = dir.path().join(format!("input{i}.o"));
                std::fs::write(&path, format!("object {i}")).unwrap();
                path
            })
            .collect();
        let mut with_missing = paths.clone();
        with_missing.push(dir.path().join("missing.o"));

        let mut session = session_in(dir.path());
        assert_eq!(session.process_input_files(&with_missing), 8);
        let names: Vec<_> = session.graph().components().map(|c| c.name().to_string()).collect();
        let expected: Vec<_> = (0..8).map(|i| format!("input{i}.o")).collect();
        assert_eq!(names, expected);
        assert_eq!(session.statistics().skipped_files, 1);
    }
}
