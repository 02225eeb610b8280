//! SBOM document families.
//!
//! Each family turns a set of [`SbomComponent`]s into a serialized document,
//! validates serialized documents of its own kind, and parses them back into
//! components. [`SbomFormat`] is the closed set of handlers; the match in
//! each of its methods is the single dispatch point.
//!
//! | Family | Versions | Encoding |
//! |---|---|---|
//! | SPDX | 2.3 | tag-value text |
//! | SPDX | 3.0.0, 3.0.1 | JSON-LD |
//! | CycloneDX | 1.4, 1.5, 1.6 | JSON |

mod cyclonedx;
mod spdx_jsonld;
mod spdx_tag_value;

pub use cyclonedx::CycloneDx;
pub use spdx_jsonld::{NodeShapes, SpdxJsonLd};
pub use spdx_tag_value::SpdxTagValue;

use crate::error::Result;
use crate::model::{SbomComponent, ValidationResult};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Tool name written into every document's creator fields.
pub const TOOL_NAME: &str = "sbom-binscan";
/// Tool version written into every document's creator fields.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_SPDX_VERSION: &str = "2.3";
pub const DEFAULT_CYCLONEDX_VERSION: &str = "1.6";

/// Document-level fields shared by every family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub name: String,
    /// Unique document URI; generated from the name when absent
    pub namespace: Option<String>,
    pub created: DateTime<Utc>,
}

impl DocumentMetadata {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            created: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    /// The namespace, or `https://spdx.org/spdxdocs/<name>-<uuid>`.
    #[must_use]
    pub fn namespace_or_generated(&self) -> String {
        self.namespace.clone().unwrap_or_else(|| {
            format!(
                "https://spdx.org/spdxdocs/{}-{}",
                crate::model::sanitize_id(&self.name),
                uuid::Uuid::new_v4()
            )
        })
    }

    /// Creation time as `YYYY-MM-DDThh:mm:ssZ`.
    #[must_use]
    pub fn timestamp(&self) -> String {
        self.created.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self::new(TOOL_NAME)
    }
}

/// The operations every document family provides.
pub trait FormatHandler {
    /// Family name, e.g. `SPDX`
    fn format_name(&self) -> &'static str;

    /// Version this handler writes, e.g. `2.3`
    fn format_version(&self) -> &str;

    /// Conventional file extension, without the dot
    fn file_extension(&self) -> &'static str;

    /// Whether this family/version can express `feature`. Case-insensitive.
    fn supports_feature(&self, feature: &str) -> bool;

    /// Serialize `components` as one document.
    fn generate(&self, components: &[SbomComponent], metadata: &DocumentMetadata) -> Result<String>;

    /// Check a serialized document. Never fails: every problem is reported
    /// inside the result.
    fn validate(&self, content: &str) -> ValidationResult;

    /// Read the components back out of a document. Unreadable input yields
    /// an empty list.
    fn parse_components(&self, content: &str) -> Vec<SbomComponent>;
}

/// Document family, without a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FormatFamily {
    #[default]
    Spdx,
    #[serde(alias = "cyclone", alias = "cdx")]
    CycloneDx,
}

impl FormatFamily {
    pub const ALL: [Self; 2] = [Self::Spdx, Self::CycloneDx];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spdx => "spdx",
            Self::CycloneDx => "cyclonedx",
        }
    }

    /// Every version the family supports, oldest first.
    #[must_use]
    pub fn versions(&self) -> &'static [&'static str] {
        match self {
            Self::Spdx => &["2.3", "3.0.0", "3.0.1"],
            Self::CycloneDx => &["1.4", "1.5", "1.6"],
        }
    }

    #[must_use]
    pub fn default_version(&self) -> &'static str {
        match self {
            Self::Spdx => DEFAULT_SPDX_VERSION,
            Self::CycloneDx => DEFAULT_CYCLONEDX_VERSION,
        }
    }
}

impl std::fmt::Display for FormatFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FormatFamily {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spdx" => Ok(Self::Spdx),
            "cyclonedx" | "cyclone" | "cdx" => Ok(Self::CycloneDx),
            other => Err(format!("unknown SBOM format: {other}")),
        }
    }
}

/// A concrete document handler.
#[derive(Debug, Clone)]
pub enum SbomFormat {
    SpdxTagValue(SpdxTagValue),
    SpdxJsonLd(SpdxJsonLd),
    CycloneDx(CycloneDx),
}

impl SbomFormat {
    #[must_use]
    pub fn family(&self) -> FormatFamily {
        match self {
            Self::SpdxTagValue(_) | Self::SpdxJsonLd(_) => FormatFamily::Spdx,
            Self::CycloneDx(_) => FormatFamily::CycloneDx,
        }
    }

    /// Apply a JSON-LD node-shape schema directory. No effect on other
    /// families.
    #[must_use]
    pub fn with_schema_dir(self, dir: Option<&std::path::Path>) -> Self {
        match (self, dir) {
            (Self::SpdxJsonLd(handler), Some(dir)) => Self::SpdxJsonLd(handler.with_schema_dir(dir)),
            (other, _) => other,
        }
    }

    fn handler(&self) -> &dyn FormatHandler {
        match self {
            Self::SpdxTagValue(h) => h,
            Self::SpdxJsonLd(h) => h,
            Self::CycloneDx(h) => h,
        }
    }
}

impl FormatHandler for SbomFormat {
    fn format_name(&self) -> &'static str {
        self.handler().format_name()
    }

    fn format_version(&self) -> &str {
        self.handler().format_version()
    }

    fn file_extension(&self) -> &'static str {
        self.handler().file_extension()
    }

    fn supports_feature(&self, feature: &str) -> bool {
        self.handler().supports_feature(feature)
    }

    fn generate(&self, components: &[SbomComponent], metadata: &DocumentMetadata) -> Result<String> {
        self.handler().generate(components, metadata)
    }

    fn validate(&self, content: &str) -> ValidationResult {
        self.handler().validate(content)
    }

    fn parse_components(&self, content: &str) -> Vec<SbomComponent> {
        self.handler().parse_components(content)
    }
}

/// Resolves family/version pairs and aliases to handlers.
pub struct FormatFactory;

impl FormatFactory {
    /// Handler for `family` at `version`; an empty version selects the
    /// family default. Unknown pairs yield `None`.
    #[must_use]
    pub fn create(family: &str, version: &str) -> Option<SbomFormat> {
        let family: FormatFamily = family.parse().ok()?;
        let version = match version.trim() {
            "" => family.default_version(),
            v => v,
        };
        Self::create_for(family, version)
    }

    /// Handler for a typed family at `version`.
    #[must_use]
    pub fn create_for(family: FormatFamily, version: &str) -> Option<SbomFormat> {
        match (family, version) {
            (FormatFamily::Spdx, "2.3") => Some(SbomFormat::SpdxTagValue(SpdxTagValue::new())),
            (FormatFamily::Spdx, "3.0" | "3.0.0") => {
                Some(SbomFormat::SpdxJsonLd(SpdxJsonLd::new("3.0.0")))
            }
            (FormatFamily::Spdx, "3.0.1") => Some(SbomFormat::SpdxJsonLd(SpdxJsonLd::new("3.0.1"))),
            (FormatFamily::CycloneDx, "1.4" | "1.5" | "1.6") => {
                Some(SbomFormat::CycloneDx(CycloneDx::new(version)))
            }
            _ => None,
        }
    }

    /// Handler for an alias such as `spdx`, `spdx-3.0.1` or `cyclonedx-1.5`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<SbomFormat> {
        let lower = name.trim().to_ascii_lowercase();
        match lower.split_once('-') {
            Some((family, version)) => Self::create(family, version),
            None => Self::create(&lower, ""),
        }
    }

    /// Guess the handler for an existing document from its content.
    ///
    /// Tag-value documents are recognized by their `SPDXVersion` line,
    /// JSON-LD by the SPDX `@context` URL and CycloneDX by `bomFormat`. A
    /// CycloneDX document with an unsupported `specVersion` still gets the
    /// default CycloneDX handler, which reads no components from it.
    #[must_use]
    pub fn detect(content: &str) -> Option<SbomFormat> {
        let trimmed = content.trim_start();
        if !trimmed.starts_with('{') {
            let tag_value = trimmed
                .lines()
                .take(16)
                .any(|line| line.trim_start().starts_with("SPDXVersion:"));
            return tag_value.then(|| SbomFormat::SpdxTagValue(SpdxTagValue::new()));
        }

        let root: serde_json::Value = serde_json::from_str(trimmed).ok()?;
        if root.get("bomFormat").and_then(serde_json::Value::as_str) == Some("CycloneDX") {
            let version = root
                .get("specVersion")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            return Self::create_for(FormatFamily::CycloneDx, version)
                .or_else(|| Self::create_for(FormatFamily::CycloneDx, DEFAULT_CYCLONEDX_VERSION));
        }

        let context = match root.get("@context")? {
            serde_json::Value::String(url) => url.clone(),
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(serde_json::Value::as_str)
                .find(|url| url.contains("spdx.org/rdf/"))?
                .to_string(),
            _ => return None,
        };
        ["3.0.0", "3.0.1"]
            .into_iter()
            .find(|version| context.contains(&format!("/rdf/{version}/")))
            .and_then(|version| Self::create_for(FormatFamily::Spdx, version))
    }

    /// Every supported `(family, version)` pair.
    #[must_use]
    pub fn supported_formats() -> Vec<(FormatFamily, &'static str)> {
        FormatFamily::ALL
            .iter()
            .flat_map(|family| family.versions().iter().map(move |v| (*family, *v)))
            .collect()
    }

    #[must_use]
    pub fn supported_families() -> Vec<FormatFamily> {
        FormatFamily::ALL.to_vec()
    }

    #[must_use]
    pub fn supported_versions(family: FormatFamily) -> &'static [&'static str] {
        family.versions()
    }
}

/// Replace line breaks so a value stays on one line.
pub(crate) fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_resolves_pairs() {
        let spdx = FormatFactory::create("spdx", "2.3").unwrap();
        assert_eq!(spdx.format_name(), "SPDX");
        assert_eq!(spdx.file_extension(), "spdx");

        let cdx = FormatFactory::create("CycloneDX", "1.5").unwrap();
        assert_eq!(cdx.format_version(), "1.5");
        assert_eq!(cdx.family(), FormatFamily::CycloneDx);

        assert!(FormatFactory::create("cyclonedx", "1.0").is_none());
        assert!(FormatFactory::create("swid", "1.0").is_none());
    }

    #[test]
    fn test_aliases_and_defaults() {
        assert_eq!(FormatFactory::from_name("spdx").unwrap().format_version(), "2.3");
        assert_eq!(FormatFactory::from_name("SPDX-3.0").unwrap().format_version(), "3.0.0");
        assert_eq!(FormatFactory::from_name("spdx-3.0.1").unwrap().format_version(), "3.0.1");
        assert_eq!(FormatFactory::from_name("cyclone").unwrap().format_version(), "1.6");
        assert_eq!(FormatFactory::from_name("cyclonedx-1.4").unwrap().format_version(), "1.4");
        assert!(FormatFactory::from_name("spdx-2.2").is_none());
    }

    #[test]
    fn test_supported_lists() {
        let formats = FormatFactory::supported_formats();
        assert_eq!(formats.len(), 6);
        assert!(formats.contains(&(FormatFamily::Spdx, "3.0.1")));
        assert_eq!(FormatFactory::supported_families(), [FormatFamily::Spdx, FormatFamily::CycloneDx]);
        assert_eq!(FormatFactory::supported_versions(FormatFamily::CycloneDx), ["1.4", "1.5", "1.6"]);
    }

    #[test]
    fn test_generated_namespace_is_unique() {
        let metadata = DocumentMetadata::new("my app");
        let a = metadata.namespace_or_generated();
        let b = metadata.namespace_or_generated();
        assert!(a.starts_with("https://spdx.org/spdxdocs/my-app-"));
        assert_ne!(a, b);
        let fixed = metadata.with_namespace("https://example.com/doc");
        assert_eq!(fixed.namespace_or_generated(), "https://example.com/doc");
    }

    #[test]
    fn test_detect_generated_documents() {
        let components = [SbomComponent::new("libc", "libc", "2.31")];
        let metadata = DocumentMetadata::new("detect");
        for (family, version) in FormatFactory::supported_formats() {
            let handler = FormatFactory::create_for(family, version).unwrap();
            let document = handler.generate(&components, &metadata).unwrap();
            let detected = FormatFactory::detect(&document).unwrap();
            assert_eq!(detected.family(), family);
            assert_eq!(detected.format_version(), version);
        }
    }

    #[test]
    fn test_detect_unknown_content() {
        assert!(FormatFactory::detect("").is_none());
        assert!(FormatFactory::detect("hello world").is_none());
        assert!(FormatFactory::detect(r#"{"name": "x"}"#).is_none());
        let old = FormatFactory::detect(r#"{"bomFormat": "CycloneDX", "specVersion": "1.0"}"#).unwrap();
        assert_eq!(old.family(), FormatFamily::CycloneDx);
        assert!(old.parse_components(r#"{"bomFormat": "CycloneDX", "specVersion": "1.0", "components": [{"name": "a"}]}"#).is_empty());
    }
}
