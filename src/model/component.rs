//! Per-artifact component record and its builder.
//!
//! A [`ComponentInfo`] is assembled by several extraction passes (symbols,
//! sections, dependencies, debug info, provenance). All of that mutation goes
//! through a [`ComponentInfoBuilder`]; [`ComponentInfoBuilder::finish`]
//! produces the immutable record consumed by the dependency graph and the
//! SBOM format handlers.

use super::{Section, Symbol};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Kind of artifact a component was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
    #[default]
    Unknown,
    Object,
    StaticLibrary,
    SharedLibrary,
    Executable,
    Source,
}

const SOURCE_EXTENSIONS: &[&str] = &[
    "c", "cc", "cpp", "cxx", "h", "hh", "hpp", "hxx", "rs", "s", "asm",
];

impl FileType {
    /// Guess the file type from a path's name alone.
    ///
    /// Used when the content could not be classified, e.g. COFF objects or
    /// linker scripts passed through the linker.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return Self::Unknown;
        };
        let lower = file_name.to_ascii_lowercase();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "o" | "obj" => Self::Object,
            "a" | "lib" => Self::StaticLibrary,
            "so" | "dylib" | "dll" => Self::SharedLibrary,
            "exe" => Self::Executable,
            e if SOURCE_EXTENSIONS.contains(&e) => Self::Source,
            // libfoo.so.1.2.3
            _ if lower.contains(".so.") => Self::SharedLibrary,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Object => "object",
            Self::StaticLibrary => "static-library",
            Self::SharedLibrary => "shared-library",
            Self::Executable => "executable",
            Self::Source => "source",
        }
    }

    /// CycloneDX component type for this artifact kind.
    #[must_use]
    pub fn cyclonedx_type(&self) -> &'static str {
        match self {
            Self::Executable => "application",
            Self::StaticLibrary | Self::SharedLibrary => "library",
            Self::Object | Self::Source | Self::Unknown => "file",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything known about one input artifact after extraction.
///
/// Fields are read through accessors; the only way to change a record is to
/// turn it back into a builder with [`ComponentInfo::to_builder`] and finish
/// a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInfo {
    name: String,
    file_path: PathBuf,
    version: Option<String>,
    supplier: String,
    download_location: Option<String>,
    homepage: Option<String>,
    license: Option<String>,
    checksum: Option<String>,
    package_manager: String,
    file_type: FileType,
    file_size: u64,
    symbols: Vec<Symbol>,
    sections: Vec<Section>,
    dependencies: IndexSet<String>,
    source_files: Vec<String>,
    compile_units: Vec<String>,
    functions: Vec<String>,
    contains_debug_info: bool,
    detected_by: Option<String>,
    is_system_library: bool,
    is_stripped: bool,
    processing_error: Option<String>,
    was_processed: bool,
}

impl ComponentInfo {
    /// Start a builder for a component with the given logical name.
    pub fn builder(name: impl Into<String>, file_path: impl Into<PathBuf>) -> ComponentInfoBuilder {
        ComponentInfoBuilder::new(name, file_path)
    }

    /// Reopen this record for another extraction pass.
    #[must_use]
    pub fn to_builder(&self) -> ComponentInfoBuilder {
        ComponentInfoBuilder {
            inner: Self {
                was_processed: false,
                ..self.clone()
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn supplier(&self) -> &str {
        &self.supplier
    }

    pub fn download_location(&self) -> Option<&str> {
        self.download_location.as_deref()
    }

    pub fn homepage(&self) -> Option<&str> {
        self.homepage.as_deref()
    }

    pub fn license(&self) -> Option<&str> {
        self.license.as_deref()
    }

    /// SHA-256 of the file content, lowercase hex.
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn package_manager(&self) -> &str {
        &self.package_manager
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Names of components this one depends on, in discovery order.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(String::as_str)
    }

    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    pub fn source_files(&self) -> &[String] {
        &self.source_files
    }

    pub fn compile_units(&self) -> &[String] {
        &self.compile_units
    }

    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    pub fn contains_debug_info(&self) -> bool {
        self.contains_debug_info
    }

    /// Which debug-info strategy produced the debug fields, if any.
    pub fn detected_by(&self) -> Option<&str> {
        self.detected_by.as_deref()
    }

    pub fn is_system_library(&self) -> bool {
        self.is_system_library
    }

    pub fn is_stripped(&self) -> bool {
        self.is_stripped
    }

    pub fn processing_error(&self) -> Option<&str> {
        self.processing_error.as_deref()
    }

    pub fn was_processed(&self) -> bool {
        self.was_processed
    }
}

/// Mutable accumulator for a [`ComponentInfo`].
#[derive(Debug, Clone)]
pub struct ComponentInfoBuilder {
    inner: ComponentInfo,
}

impl ComponentInfoBuilder {
    pub fn new(name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        let file_path = file_path.into();
        let file_type = FileType::from_path(&file_path);
        Self {
            inner: ComponentInfo {
                name: name.into(),
                file_path,
                version: None,
                supplier: String::new(),
                download_location: None,
                homepage: None,
                license: None,
                checksum: None,
                package_manager: "unknown".to_string(),
                file_type,
                file_size: 0,
                symbols: Vec::new(),
                sections: Vec::new(),
                dependencies: IndexSet::new(),
                source_files: Vec::new(),
                compile_units: Vec::new(),
                functions: Vec::new(),
                contains_debug_info: false,
                detected_by: None,
                is_system_library: false,
                is_stripped: false,
                processing_error: None,
                was_processed: false,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn file_path(&self) -> &Path {
        &self.inner.file_path
    }

    pub fn version(&mut self, version: impl Into<String>) -> &mut Self {
        let version = version.into();
        if !version.is_empty() {
            self.inner.version = Some(version);
        }
        self
    }

    pub fn supplier(&mut self, supplier: impl Into<String>) -> &mut Self {
        self.inner.supplier = supplier.into();
        self
    }

    pub fn download_location(&mut self, location: impl Into<String>) -> &mut Self {
        self.inner.download_location = Some(location.into());
        self
    }

    pub fn homepage(&mut self, homepage: impl Into<String>) -> &mut Self {
        self.inner.homepage = Some(homepage.into());
        self
    }

    pub fn license(&mut self, license: impl Into<String>) -> &mut Self {
        self.inner.license = Some(license.into());
        self
    }

    pub fn checksum(&mut self, checksum: impl Into<String>) -> &mut Self {
        self.inner.checksum = Some(checksum.into());
        self
    }

    pub fn package_manager(&mut self, manager: impl Into<String>) -> &mut Self {
        self.inner.package_manager = manager.into();
        self
    }

    pub fn file_type(&mut self, file_type: FileType) -> &mut Self {
        self.inner.file_type = file_type;
        self
    }

    pub fn file_size(&mut self, size: u64) -> &mut Self {
        self.inner.file_size = size;
        self
    }

    pub fn system_library(&mut self, is_system: bool) -> &mut Self {
        self.inner.is_system_library = is_system;
        self
    }

    pub fn stripped(&mut self, stripped: bool) -> &mut Self {
        self.inner.is_stripped = stripped;
        self
    }

    pub fn symbol(&mut self, symbol: Symbol) -> &mut Self {
        self.inner.symbols.push(symbol);
        self
    }

    /// Append symbols, skipping any whose name is already recorded.
    pub fn symbols(&mut self, symbols: impl IntoIterator<Item = Symbol>) -> &mut Self {
        let mut seen: HashSet<String> = self.inner.symbols.iter().map(|s| s.name.clone()).collect();
        for symbol in symbols {
            if seen.insert(symbol.name.clone()) {
                self.inner.symbols.push(symbol);
            }
        }
        self
    }

    /// Append sections, skipping any whose name is already recorded.
    pub fn sections(&mut self, sections: impl IntoIterator<Item = Section>) -> &mut Self {
        for section in sections {
            if !self.inner.sections.iter().any(|s| s.name == section.name) {
                self.inner.sections.push(section);
            }
        }
        self
    }

    pub fn dependency(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if !name.is_empty() && name != self.inner.name {
            self.inner.dependencies.insert(name);
        }
        self
    }

    pub fn dependencies(&mut self, names: impl IntoIterator<Item = String>) -> &mut Self {
        for name in names {
            self.dependency(name);
        }
        self
    }

    pub fn source_files(&mut self, files: impl IntoIterator<Item = String>) -> &mut Self {
        extend_unique(&mut self.inner.source_files, files);
        self
    }

    pub fn compile_units(&mut self, units: impl IntoIterator<Item = String>) -> &mut Self {
        extend_unique(&mut self.inner.compile_units, units);
        self
    }

    pub fn functions(&mut self, functions: impl IntoIterator<Item = String>) -> &mut Self {
        extend_unique(&mut self.inner.functions, functions);
        self
    }

    /// Mark that debug information was found and which strategy found it.
    pub fn debug_info_from(&mut self, strategy: impl Into<String>) -> &mut Self {
        self.inner.contains_debug_info = true;
        self.inner.detected_by = Some(strategy.into());
        self
    }

    /// Record a non-fatal problem hit during extraction.
    ///
    /// The component is still emitted; downstream consumers may surface the
    /// message. Later errors replace earlier ones.
    pub fn processing_error(&mut self, message: impl Into<String>) -> &mut Self {
        self.inner.processing_error = Some(message.into());
        self
    }

    /// Fold another record for the same logical component into this one.
    ///
    /// Collections are unioned, scalar fields from `other` win when they
    /// carry a value. Identity (name, path) is kept from `self`.
    pub fn merge(&mut self, other: &ComponentInfo) -> &mut Self {
        if let Some(version) = other.version() {
            self.version(version);
        }
        if !other.supplier.is_empty() {
            self.inner.supplier.clone_from(&other.supplier);
        }
        if other.package_manager != "unknown" {
            self.inner.package_manager.clone_from(&other.package_manager);
        }
        if other.checksum.is_some() {
            self.inner.checksum.clone_from(&other.checksum);
        }
        if other.license.is_some() {
            self.inner.license.clone_from(&other.license);
        }
        if other.download_location.is_some() {
            self.inner.download_location.clone_from(&other.download_location);
        }
        if other.homepage.is_some() {
            self.inner.homepage.clone_from(&other.homepage);
        }
        if other.file_type != FileType::Unknown {
            self.inner.file_type = other.file_type;
        }
        if other.file_size > 0 {
            self.inner.file_size = other.file_size;
        }
        if other.contains_debug_info {
            self.inner.contains_debug_info = true;
            self.inner.detected_by.clone_from(&other.detected_by);
        }
        self.inner.is_system_library |= other.is_system_library;
        self.inner.is_stripped = self.inner.is_stripped && other.is_stripped;

        self.symbols(other.symbols.iter().cloned());
        self.sections(other.sections.iter().cloned());
        self.dependencies(other.dependencies.iter().cloned());
        self.source_files(other.source_files.iter().cloned());
        self.compile_units(other.compile_units.iter().cloned());
        self.functions(other.functions.iter().cloned());
        self
    }

    /// Freeze the record. This is the only place `was_processed` is set.
    #[must_use]
    pub fn finish(self) -> ComponentInfo {
        ComponentInfo {
            was_processed: true,
            ..self.inner
        }
    }
}

fn extend_unique(target: &mut Vec<String>, items: impl IntoIterator<Item = String>) {
    let mut seen: HashSet<String> = target.iter().cloned().collect();
    for item in items {
        if !item.is_empty() && seen.insert(item.clone()) {
            target.push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SectionFlags;

    #[test]
    fn test_file_type_from_path() {
        assert_eq!(FileType::from_path(Path::new("main.o")), FileType::Object);
        assert_eq!(FileType::from_path(Path::new("libz.a")), FileType::StaticLibrary);
        assert_eq!(
            FileType::from_path(Path::new("/usr/lib/libssl.so.1.1")),
            FileType::SharedLibrary
        );
        assert_eq!(FileType::from_path(Path::new("lib.dylib")), FileType::SharedLibrary);
        assert_eq!(FileType::from_path(Path::new("fib.c")), FileType::Source);
        assert_eq!(FileType::from_path(Path::new("a.out")), FileType::Unknown);
    }

    #[test]
    fn test_finish_sets_processed() {
        let builder = ComponentInfo::builder("app", "/tmp/app");
        let info = builder.finish();
        assert!(info.was_processed());
        assert_eq!(info.package_manager(), "unknown");
        assert!(info.version().is_none());
    }

    #[test]
    fn test_builder_deduplicates_collections() {
        let mut builder = ComponentInfo::builder("app", "app");
        builder
            .symbol(Symbol::new("main", 0x1000, 10))
            .symbols([Symbol::new("main", 0x1000, 10), Symbol::new("helper", 0, 4)])
            .dependencies(["libc.so.6".to_string(), "libc.so.6".to_string()])
            .dependency("app")
            .source_files(["a.c".to_string(), "a.c".to_string(), String::new()]);
        let info = builder.finish();

        assert_eq!(info.symbols().len(), 2);
        assert_eq!(info.dependencies().collect::<Vec<_>>(), vec!["libc.so.6"]);
        assert_eq!(info.source_files(), ["a.c".to_string()]);
    }

    #[test]
    fn test_merge_preserves_identity() {
        let mut first = ComponentInfo::builder("libfoo.so", "/opt/libfoo.so");
        first
            .symbol(Symbol::new("foo", 0, 0))
            .dependency("libc.so.6");
        let first = first.finish();

        let mut second = ComponentInfo::builder("libfoo.so", "/elsewhere/libfoo.so");
        second
            .version("1.2.3")
            .sections([Section::new(".text", 0, 16, SectionFlags::default())])
            .dependency("libm.so.6");
        let second = second.finish();

        let mut merged = first.to_builder();
        merged.merge(&second);
        let merged = merged.finish();

        assert_eq!(merged.file_path(), Path::new("/opt/libfoo.so"));
        assert_eq!(merged.version(), Some("1.2.3"));
        assert_eq!(merged.symbols().len(), 1);
        assert_eq!(merged.sections().len(), 1);
        assert_eq!(merged.dependency_count(), 2);
    }

    #[test]
    fn test_empty_version_is_ignored() {
        let mut builder = ComponentInfo::builder("x", "x");
        builder.version("");
        assert!(builder.finish().version().is_none());
    }
}
