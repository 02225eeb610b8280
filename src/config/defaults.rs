//! Default values for scan configuration.

pub use crate::formats::{DEFAULT_CYCLONEDX_VERSION, DEFAULT_SPDX_VERSION};

/// Document path used when none is configured.
pub const DEFAULT_OUTPUT_PATH: &str = "sbom.json";

/// Config file names searched for in each candidate directory, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &[".sbom-binscan.yaml", ".sbom-binscan.yml", "sbom-binscan.yaml"];

/// Subdirectory of the user config directory searched for a config file.
pub const CONFIG_DIR_NAME: &str = "sbom-binscan";
