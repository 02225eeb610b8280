//! Data model shared by the extractors, the dependency graph and the SBOM
//! format handlers.
//!
//! [`ComponentInfo`] is the per-artifact record produced by extraction; it is
//! frozen by [`ComponentInfoBuilder::finish`]. [`SbomComponent`] is the
//! format-neutral view of a component inside a serialized document, used by
//! validation, parsing and comparison.

mod component;
mod sbom;
mod symbol;
mod validation;

pub use crate::debuginfo::{DebugInfo, LineInfo};
pub use component::{ComponentInfo, ComponentInfoBuilder, FileType};
pub use sbom::{sanitize_id, DifferenceType, SbomComponent, SbomDifference, NOASSERTION};
pub use symbol::{Section, SectionFlags, Symbol, SymbolBinding};
pub use validation::ValidationResult;
