//! Debug information extraction.
//!
//! Two strategies implement [`DebugInfoExtractor`]:
//!
//! - [`AuthoritativeExtractor`] walks DWARF with `gimli` over sections loaded
//!   by `object`, and resolves `.dSYM` bundles. Only one instance may exist
//!   per process at a time; constructing one acquires a process-wide
//!   [`AuthoritativeGuard`] which is released when the extractor is dropped.
//! - [`LightweightExtractor`] is a hand-written ELF/DWARF reader built on a
//!   bounds-checked cursor. It holds no shared state and is safe to use from
//!   any number of threads at once.
//!
//! [`DualStrategyExtractor`] tries the authoritative path first and falls back
//! to the lightweight one when the authoritative result is an error or empty.
//!
//! Every operation either returns a freshly built collection or an error;
//! callers never observe a partially filled result.

mod authoritative;
pub mod lightweight;

pub use authoritative::{resolve_debug_bundle, AuthoritativeExtractor, AuthoritativeGuard};
pub use lightweight::LightweightExtractor;

use crate::binary::cursor::CursorError;
use crate::binary::{BinaryFormat, ExtractError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Why debug information could not be extracted.
#[derive(Error, Debug)]
pub enum DebugInfoError {
    #[error(transparent)]
    Input(#[from] ExtractError),

    #[error("{0} files are not supported by this extractor")]
    UnsupportedFormat(BinaryFormat),

    #[error("no debug sections present")]
    NoDebugInfo,

    #[error("malformed debug data: {0}")]
    Malformed(String),

    #[error("debug sections contained no {0}")]
    Empty(&'static str),
}

impl From<CursorError> for DebugInfoError {
    fn from(err: CursorError) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<gimli::Error> for DebugInfoError {
    fn from(err: gimli::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<object::Error> for DebugInfoError {
    fn from(err: object::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// One row of a DWARF line-number table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineInfo {
    pub file: String,
    pub line: u64,
    pub address: u64,
}

/// Aggregate result of [`DebugInfoExtractor::extract_all_debug_info`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub source_files: Vec<String>,
    pub compile_units: Vec<String>,
    pub functions: Vec<String>,
    pub line_info: Vec<LineInfo>,
    /// Name of the strategy that produced this result
    pub strategy: String,
}

impl DebugInfo {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source_files.is_empty()
            && self.compile_units.is_empty()
            && self.functions.is_empty()
            && self.line_info.is_empty()
    }
}

/// Common contract of both debug-info strategies.
pub trait DebugInfoExtractor {
    /// Short name recorded as `detected_by` on components.
    fn strategy(&self) -> &'static str;

    fn extract_source_files(&self, path: &Path) -> Result<Vec<String>, DebugInfoError>;

    fn extract_compile_units(&self, path: &Path) -> Result<Vec<String>, DebugInfoError>;

    fn extract_functions(&self, path: &Path) -> Result<Vec<String>, DebugInfoError>;

    fn extract_line_info(&self, path: &Path) -> Result<Vec<LineInfo>, DebugInfoError>;

    /// Whether the file carries DWARF this extractor can see.
    fn has_dwarf_info(&self, path: &Path) -> bool;

    /// All four categories from one opened file.
    ///
    /// Succeeds if at least one category is non-empty.
    fn extract_all_debug_info(&self, path: &Path) -> Result<DebugInfo, DebugInfoError>;
}

/// Authoritative extraction with lightweight fallback.
#[derive(Debug, Clone, Default)]
pub struct DualStrategyExtractor {
    lightweight: LightweightExtractor,
    lightweight_only: bool,
}

impl DualStrategyExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the authoritative path entirely, e.g. when the caller is running
    /// extractions on several threads.
    #[must_use]
    pub fn lightweight_only() -> Self {
        Self {
            lightweight: LightweightExtractor::new(),
            lightweight_only: true,
        }
    }

    fn run<T, F, E>(&self, path: &Path, op: F, is_empty: E) -> Result<T, DebugInfoError>
    where
        F: Fn(&dyn DebugInfoExtractor) -> Result<T, DebugInfoError>,
        E: Fn(&T) -> bool,
    {
        if self.lightweight_only {
            return op(&self.lightweight);
        }

        // The guard lives exactly as long as this block.
        let first = {
            let authoritative = AuthoritativeExtractor::new();
            op(&authoritative)
        };
        match &first {
            Ok(value) if !is_empty(value) => {}
            Ok(_) => tracing::debug!(
                path = %path.display(),
                "Authoritative debug info empty, trying lightweight parser"
            ),
            Err(err) => tracing::debug!(
                path = %path.display(),
                error = %err,
                "Authoritative debug info failed, trying lightweight parser"
            ),
        }
        if first.as_ref().is_ok_and(|value| !is_empty(value)) {
            return first;
        }

        match op(&self.lightweight) {
            Ok(value) => Ok(value),
            Err(fallback_err) => match first {
                Ok(empty) => Ok(empty),
                Err(_) => Err(fallback_err),
            },
        }
    }
}

impl DebugInfoExtractor for DualStrategyExtractor {
    fn strategy(&self) -> &'static str {
        "dual"
    }

    fn extract_source_files(&self, path: &Path) -> Result<Vec<String>, DebugInfoError> {
        self.run(path, |ex| ex.extract_source_files(path), Vec::is_empty)
    }

    fn extract_compile_units(&self, path: &Path) -> Result<Vec<String>, DebugInfoError> {
        self.run(path, |ex| ex.extract_compile_units(path), Vec::is_empty)
    }

    fn extract_functions(&self, path: &Path) -> Result<Vec<String>, DebugInfoError> {
        self.run(path, |ex| ex.extract_functions(path), Vec::is_empty)
    }

    fn extract_line_info(&self, path: &Path) -> Result<Vec<LineInfo>, DebugInfoError> {
        self.run(path, |ex| ex.extract_line_info(path), Vec::is_empty)
    }

    fn has_dwarf_info(&self, path: &Path) -> bool {
        if self.lightweight_only {
            return self.lightweight.has_dwarf_info(path);
        }
        let authoritative = AuthoritativeExtractor::new();
        authoritative.has_dwarf_info(path) || self.lightweight.has_dwarf_info(path)
    }

    fn extract_all_debug_info(&self, path: &Path) -> Result<DebugInfo, DebugInfoError> {
        self.run(path, |ex| ex.extract_all_debug_info(path), DebugInfo::is_empty)
    }
}

/// Sort and deduplicate a list of names, dropping empty strings.
pub(crate) fn normalize_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let set: std::collections::BTreeSet<String> =
        names.into_iter().filter(|n| !n.is_empty()).collect();
    set.into_iter().collect()
}

/// Join a directory and a file name the way DWARF consumers expect.
pub(crate) fn join_path(dir: Option<&str>, name: &str) -> String {
    match dir {
        Some(dir) if !dir.is_empty() && !name.starts_with('/') => {
            format!("{}/{}", dir.trim_end_matches('/'), name)
        }
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_names_sorts_and_dedups() {
        let names = vec![
            "main".to_string(),
            String::new(),
            "fibonacci".to_string(),
            "main".to_string(),
        ];
        assert_eq!(normalize_names(names), ["fibonacci", "main"]);
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path(Some("/src"), "fib.c"), "/src/fib.c");
        assert_eq!(join_path(Some("/src/"), "fib.c"), "/src/fib.c");
        assert_eq!(join_path(Some("/src"), "/abs/fib.c"), "/abs/fib.c");
        assert_eq!(join_path(None, "fib.c"), "fib.c");
        assert_eq!(join_path(Some(""), "fib.c"), "fib.c");
    }

    #[test]
    fn test_dual_strategy_missing_file_fails() {
        let extractor = DualStrategyExtractor::new();
        let missing = Path::new("/nonexistent/binary");
        assert!(extractor.extract_functions(missing).is_err());
        assert!(extractor.extract_all_debug_info(missing).is_err());
        assert!(!extractor.has_dwarf_info(missing));
    }

    #[test]
    fn test_debug_info_is_empty() {
        let mut info = DebugInfo::default();
        assert!(info.is_empty());
        info.functions.push("main".to_string());
        assert!(!info.is_empty());
    }
}
