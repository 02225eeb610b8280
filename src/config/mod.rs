//! Configuration for scan sessions.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sbom_binscan::config::{ScanConfig, load_or_default};
//! use sbom_binscan::formats::FormatFamily;
//!
//! let config = ScanConfig::builder()
//!     .format(FormatFamily::CycloneDx)
//!     .format_version("1.5")
//!     .output_path("bom.json")
//!     .build();
//!
//! let (config, loaded_from) = load_or_default(None);
//! ```
//!
//! # Configuration File
//!
//! Place a `.sbom-binscan.yaml` file in the working directory or
//! `~/.config/sbom-binscan/`:
//!
//! ```yaml
//! format: cyclonedx
//! cyclonedx_version: "1.6"
//! resolution_mode: declared-only
//! exclude_patterns:
//!   - '\.txt$'
//! ```

mod defaults;
pub mod file;
mod types;
mod validation;

pub use defaults::{CONFIG_FILE_NAMES, DEFAULT_OUTPUT_PATH};
pub use file::{
    discover_config_file, generate_example_config, load_config_file, load_or_default,
    ConfigFileError,
};
pub use types::{ExcludeMatcher, ScanConfig, ScanConfigBuilder};
pub use validation::{ConfigError, Validatable};

/// Generate a JSON Schema for the `ScanConfig` file format.
#[must_use]
pub fn generate_json_schema() -> String {
    let schema = schemars::schema_for!(ScanConfig);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
