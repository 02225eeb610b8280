//! Unified error types for sbom-binscan.
//!
//! Extraction and format errors are local to their modules; this module
//! collects them under [`SbomError`] for callers that cross module
//! boundaries (the session entry points and the command-line front end).

use std::path::PathBuf;
use thiserror::Error;

pub use crate::binary::ExtractError;
pub use crate::debuginfo::DebugInfoError;
pub use crate::reports::ReportError;

/// Main error type for sbom-binscan operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SbomError {
    /// Symbol, section or dependency extraction failed
    #[error("Extraction failed: {context}")]
    Extract {
        context: String,
        #[source]
        source: ExtractError,
    },

    /// Debug information could not be recovered
    #[error("Debug info extraction failed: {context}")]
    DebugInfo {
        context: String,
        #[source]
        source: DebugInfoError,
    },

    /// SBOM document generation or format selection failed
    #[error("SBOM format error: {context}")]
    Format {
        context: String,
        #[source]
        source: FormatErrorKind,
    },

    /// Diff report rendering failed
    #[error("Report generation failed: {context}")]
    Report {
        context: String,
        #[source]
        source: ReportError,
    },

    /// IO errors with context
    #[error("IO error at {path:?}: {message}")]
    Io {
        path: Option<PathBuf>,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Specific format error kinds
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FormatErrorKind {
    #[error("Unsupported SBOM format: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported format version: {version} (supported: {supported})")]
    UnsupportedVersion { version: String, supported: String },

    #[error("JSON serialization failed: {0}")]
    Serialization(String),

    #[error("No output path configured")]
    MissingOutputPath,
}

// ============================================================================
// Result type alias
// ============================================================================

/// Convenient Result type for sbom-binscan operations
pub type Result<T> = std::result::Result<T, SbomError>;

// ============================================================================
// Error construction helpers
// ============================================================================

impl SbomError {
    /// Create an extraction error with context
    pub fn extract(context: impl Into<String>, source: ExtractError) -> Self {
        Self::Extract {
            context: context.into(),
            source,
        }
    }

    /// Create a debug info error with context
    pub fn debug_info(context: impl Into<String>, source: DebugInfoError) -> Self {
        Self::DebugInfo {
            context: context.into(),
            source,
        }
    }

    /// Create a format error with context
    pub fn format(context: impl Into<String>, source: FormatErrorKind) -> Self {
        Self::Format {
            context: context.into(),
            source,
        }
    }

    /// Create an error for a format/version pair the factory does not know
    pub fn unsupported_format(format: &str, version: &str) -> Self {
        Self::format(
            format!("{format} {version}"),
            FormatErrorKind::UnsupportedFormat(format.to_string()),
        )
    }

    /// Create a report error with context
    pub fn report(context: impl Into<String>, source: ReportError) -> Self {
        Self::Report {
            context: context.into(),
            source,
        }
    }

    /// Create an IO error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        let message = format!("{source}");
        Self::Io {
            path: Some(path),
            message,
            source,
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

// ============================================================================
// Conversions from module error types
// ============================================================================

impl From<std::io::Error> for SbomError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: None,
            message: format!("{err}"),
            source: err,
        }
    }
}

impl From<ExtractError> for SbomError {
    fn from(err: ExtractError) -> Self {
        Self::extract("", err)
    }
}

impl From<DebugInfoError> for SbomError {
    fn from(err: DebugInfoError) -> Self {
        Self::debug_info("", err)
    }
}

impl From<ReportError> for SbomError {
    fn from(err: ReportError) -> Self {
        Self::report("", err)
    }
}

impl From<serde_json::Error> for SbomError {
    fn from(err: serde_json::Error) -> Self {
        Self::format(
            "JSON serialization",
            FormatErrorKind::Serialization(err.to_string()),
        )
    }
}

// ============================================================================
// Error context extension trait
// ============================================================================

/// Extension trait for adding context to errors.
///
/// Context strings are chained outermost-first, so the rendered message reads
/// as the path through the code:
///
/// ```ignore
/// use sbom_binscan::error::ErrorContext;
///
/// let symbols = extract_symbols(&path).context("reading linker input")?;
/// ```
pub trait ErrorContext<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context from a closure, evaluated only on error.
    fn with_context<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: Into<SbomError>> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        let ctx: String = context.into();
        self.map_err(|e| add_context_to_error(e.into(), &ctx))
    }

    fn with_context<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| {
            let ctx: String = f().into();
            add_context_to_error(e.into(), &ctx)
        })
    }
}

fn add_context_to_error(err: SbomError, new_ctx: &str) -> SbomError {
    match err {
        SbomError::Extract { context, source } => SbomError::Extract {
            context: chain_context(new_ctx, &context),
            source,
        },
        SbomError::DebugInfo { context, source } => SbomError::DebugInfo {
            context: chain_context(new_ctx, &context),
            source,
        },
        SbomError::Format { context, source } => SbomError::Format {
            context: chain_context(new_ctx, &context),
            source,
        },
        SbomError::Report { context, source } => SbomError::Report {
            context: chain_context(new_ctx, &context),
            source,
        },
        SbomError::Io {
            path,
            message,
            source,
        } => SbomError::Io {
            path,
            message: chain_context(new_ctx, &message),
            source,
        },
        SbomError::Config(msg) => SbomError::Config(chain_context(new_ctx, &msg)),
        SbomError::Validation(msg) => SbomError::Validation(chain_context(new_ctx, &msg)),
    }
}

/// Chain two context strings, skipping the separator when `existing` is empty.
fn chain_context(new: &str, existing: &str) -> String {
    if existing.is_empty() {
        new.to_string()
    } else {
        format!("{new}: {existing}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_chains_outermost_first() {
        let result: std::result::Result<(), SbomError> = Err(SbomError::config("bad value"));
        let err = result
            .context("loading config")
            .context("starting session")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: starting session: loading config: bad value"
        );
    }

    #[test]
    fn test_extract_error_converts_with_context() {
        let result: std::result::Result<(), ExtractError> = Err(ExtractError::EmptyFile(PathBuf::from("main.o")));
        let err = result.context("reading main.o").unwrap_err();
        match err {
            SbomError::Extract { context, .. } => assert_eq!(context, "reading main.o"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_format_message() {
        let err = SbomError::unsupported_format("swid", "1.0");
        assert!(err.to_string().contains("swid 1.0"));
    }
}
