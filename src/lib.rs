//! **Binary introspection and SBOM generation for linked artifacts.**
//!
//! `sbom-binscan` reads the objects, archives, executables and shared
//! libraries that go into a link, records what each one is made of, and
//! writes a Software Bill of Materials describing the result as SPDX 2.3
//! tag-value, SPDX 3.0 JSON-LD or CycloneDX 1.4–1.6 JSON. It also validates,
//! parses, compares and merges such documents.
//!
//! ## Core Concepts & Modules
//!
//! - **[`binary`]**: format sniffing (ELF, Mach-O, PE, archives) and symbol,
//!   section and dependency readers over an in-memory copy of each file.
//! - **[`debuginfo`]**: source files, compile units, functions and line
//!   tables recovered from DWARF, with an authoritative reader guarded by a
//!   process-wide lock and a lightweight reader that is safe to run anywhere.
//! - **[`model`]**: the per-artifact [`ComponentInfo`] (frozen by its
//!   builder) and the format-neutral [`SbomComponent`].
//! - **[`graph`]**: the [`DependencyGraph`] that turns declared library
//!   names into components, on the live filesystem or declared-only.
//! - **[`formats`]**: generation, validation and parsing for every supported
//!   document family behind [`FormatFactory`].
//! - **[`compare`]**: component diffs, statistics, diff reports and merges.
//! - **[`session`]**: the [`SbomSession`] a linker integration drives.
//!
//! ## Getting Started
//!
//! ```no_run
//! use sbom_binscan::{ScanConfig, SbomSession};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = SbomSession::new(ScanConfig::default());
//!     session.set_format("cyclonedx-1.6")?;
//!     session.set_output_path("app.cdx.json");
//!     session.process_input_file(Path::new("build/main.o"))?;
//!     session.process_library(Path::new("/usr/lib/libz.so.1"))?;
//!     let written = session.finalize()?;
//!     println!("SBOM written to {}", written.display());
//!     Ok(())
//! }
//! ```
//!
//! ### Comparing two documents
//!
//! ```no_run
//! use sbom_binscan::compare::{diff, generate_diff_report};
//! use sbom_binscan::formats::{FormatFactory, FormatHandler};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let old = std::fs::read_to_string("old.spdx")?;
//!     let new = std::fs::read_to_string("new.spdx")?;
//!     let handler = FormatFactory::detect(&old).ok_or("unknown format")?;
//!
//!     let diffs = diff(&handler.parse_components(&old), &handler.parse_components(&new));
//!     print!("{}", generate_diff_report(&diffs, "text")?);
//!     Ok(())
//! }
//! ```

// Lint to discourage unwrap() in production code - prefer explicit error handling
#![warn(clippy::unwrap_used)]
// Pedantic lints: allow categories that are design choices for this codebase
#![allow(
    // Offsets and sizes read from binaries are u64; slices index with usize
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::too_many_lines,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::unused_self,
    // Variable names like `old`/`new` are clear in context
    clippy::similar_names
)]

pub mod binary;
pub mod cli;
pub mod compare;
pub mod config;
pub mod debuginfo;
pub mod error;
pub mod formats;
pub mod graph;
pub mod model;
pub mod reports;
pub mod scanner;
pub mod session;
pub mod utils;

// Re-export main types for convenience
pub use binary::{detect_file_format, detect_format, BinaryFormat, ExtractError};
pub use compare::{diff, diff_statistics, generate_diff_report, merge, SbomComparator};
pub use config::{ConfigError, ScanConfig, ScanConfigBuilder, Validatable};
pub use debuginfo::{
    AuthoritativeGuard, DebugInfo, DebugInfoError, DebugInfoExtractor, DualStrategyExtractor,
    LightweightExtractor, LineInfo,
};
pub use error::{ErrorContext, Result, SbomError};
pub use formats::{DocumentMetadata, FormatFactory, FormatFamily, FormatHandler, SbomFormat};
pub use graph::{DependencyGraph, ResolutionMode};
pub use model::{
    ComponentInfo, ComponentInfoBuilder, DifferenceType, FileType, SbomComponent, SbomDifference,
    Section, Symbol, ValidationResult,
};
pub use reports::{ReportFormat, ReportGenerator};
pub use scanner::{scan_file, ScanOptions};
pub use session::{SbomSession, SessionStatistics};
