//! SPDX 2.3 tag-value documents.

use super::{single_line, DocumentMetadata, FormatHandler, TOOL_NAME, TOOL_VERSION};
use crate::error::Result;
use crate::model::{sanitize_id, SbomComponent, ValidationResult, NOASSERTION};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;
use std::sync::LazyLock;

const SPDX_VERSION: &str = "SPDX-2.3";
const DATA_LICENSE: &str = "CC0-1.0";
const DOCUMENT_ID: &str = "SPDXRef-DOCUMENT";

static SPDX_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SPDXRef-[A-Za-z0-9.\-]+$").expect("static regex"));

/// Element reference in a relationship: a local id, an external document
/// reference, or one of the special values.
static ELEMENT_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((DocumentRef-[A-Za-z0-9.\-]+:)?SPDXRef-[A-Za-z0-9.\-]+|NONE|NOASSERTION)$")
        .expect("static regex")
});

#[derive(Debug, Clone, Default)]
pub struct SpdxTagValue;

impl SpdxTagValue {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn element_id(id: &str) -> String {
    format!("SPDXRef-{}", sanitize_id(id))
}

fn purpose_for(component_type: &str) -> &'static str {
    match component_type {
        "application" => "APPLICATION",
        "library" => "LIBRARY",
        "file" => "FILE",
        "firmware" => "FIRMWARE",
        _ => "OTHER",
    }
}

fn type_for(purpose: &str) -> &'static str {
    match purpose {
        "APPLICATION" => "application",
        "LIBRARY" => "library",
        "FILE" => "file",
        "FIRMWARE" => "firmware",
        _ => "",
    }
}

fn is_special(value: &str) -> bool {
    value == NOASSERTION || value == "NONE"
}

/// Iterate `(line number, tag, value)` over a tag-value document.
///
/// Blank lines and comments are skipped. `<text>` values that span lines are
/// folded into one value. Lines without a `:` are reported as `None` tags.
fn tag_lines(content: &str) -> Vec<(usize, Option<&str>, String)> {
    let mut out = Vec::new();
    let mut lines = content.lines().enumerate();
    while let Some((index, raw)) = lines.next() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((tag, value)) = line.split_once(':') else {
            out.push((index + 1, None, line.to_string()));
            continue;
        };
        let mut value = value.trim().to_string();
        if value.starts_with("<text>") && !value.contains("</text>") {
            for (_, next) in lines.by_ref() {
                value.push('\n');
                value.push_str(next);
                if next.contains("</text>") {
                    break;
                }
            }
        }
        if let Some(inner) = value
            .strip_prefix("<text>")
            .and_then(|v| v.trim_end().strip_suffix("</text>"))
        {
            value = inner.to_string();
        }
        out.push((index + 1, Some(tag.trim()), value));
    }
    out
}

impl FormatHandler for SpdxTagValue {
    fn format_name(&self) -> &'static str {
        "SPDX"
    }

    fn format_version(&self) -> &str {
        "2.3"
    }

    fn file_extension(&self) -> &'static str {
        "spdx"
    }

    fn supports_feature(&self, feature: &str) -> bool {
        matches!(
            feature.to_ascii_lowercase().as_str(),
            "tag_value" | "relationships" | "checksums"
        )
    }

    fn generate(&self, components: &[SbomComponent], metadata: &DocumentMetadata) -> Result<String> {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(out, "SPDXVersion: {SPDX_VERSION}");
        let _ = writeln!(out, "DataLicense: {DATA_LICENSE}");
        let _ = writeln!(out, "SPDXID: {DOCUMENT_ID}");
        let _ = writeln!(out, "DocumentName: {}", single_line(&metadata.name));
        let _ = writeln!(out, "DocumentNamespace: {}", metadata.namespace_or_generated());
        let _ = writeln!(out, "Creator: Tool: {TOOL_NAME}-{TOOL_VERSION}");
        let _ = writeln!(out, "Created: {}", metadata.timestamp());

        for component in components {
            let version = if component.version.is_empty() {
                NOASSERTION
            } else {
                component.version.as_str()
            };
            let license = if component.license.is_empty() {
                NOASSERTION
            } else {
                component.license.as_str()
            };
            let download = component
                .properties
                .get("download_location")
                .map_or(NOASSERTION, String::as_str);

            out.push('\n');
            let _ = writeln!(out, "PackageName: {}", single_line(&component.name));
            let _ = writeln!(out, "SPDXID: {}", element_id(&component.id));
            let _ = writeln!(out, "PackageVersion: {}", single_line(version));
            if let Some(supplier) = component.properties.get("supplier") {
                let _ = writeln!(out, "PackageSupplier: Organization: {}", single_line(supplier));
            }
            let _ = writeln!(out, "PackageDownloadLocation: {}", single_line(download));
            let _ = writeln!(out, "FilesAnalyzed: false");
            if let Some(sha) = component.sha256() {
                let _ = writeln!(out, "PackageChecksum: SHA256: {sha}");
            }
            let _ = writeln!(out, "PackageLicenseConcluded: {}", single_line(license));
            let _ = writeln!(out, "PackageLicenseDeclared: {NOASSERTION}");
            let _ = writeln!(out, "PackageCopyrightText: {NOASSERTION}");
            if !component.component_type.is_empty() {
                let _ = writeln!(
                    out,
                    "PrimaryPackagePurpose: {}",
                    purpose_for(&component.component_type)
                );
            }
            if !component.purl.is_empty() {
                let _ = writeln!(out, "ExternalRef: PACKAGE-MANAGER purl {}", component.purl);
            }
        }

        if !components.is_empty() {
            out.push('\n');
        }
        for component in components {
            let _ = writeln!(
                out,
                "Relationship: {DOCUMENT_ID} DESCRIBES {}",
                element_id(&component.id)
            );
        }
        for component in components {
            for dep in component.dependencies() {
                let _ = writeln!(
                    out,
                    "Relationship: {} DEPENDS_ON {}",
                    element_id(&component.id),
                    element_id(dep)
                );
            }
        }

        tracing::debug!(components = components.len(), "Generated SPDX 2.3 tag-value document");
        Ok(out)
    }

    fn validate(&self, content: &str) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.set_metadata("format", "SPDX");

        let mut seen_header: HashSet<&'static str> = HashSet::new();
        let mut ids: HashSet<String> = HashSet::new();
        let mut packages = 0usize;
        // (name, has id, has download location) of the open package block
        let mut open: Option<(String, bool, bool)> = None;

        let close = |open: &mut Option<(String, bool, bool)>, result: &mut ValidationResult| {
            if let Some((name, has_id, has_download)) = open.take() {
                if !has_id {
                    result.add_error(format!("Package '{name}' has no SPDXID"));
                }
                if !has_download {
                    result.add_error(format!("Package '{name}' has no PackageDownloadLocation"));
                }
            }
        };

        for (line_no, tag, value) in tag_lines(content) {
            let Some(tag) = tag else {
                result.add_warning(format!("Line {line_no}: not a tag-value pair"));
                continue;
            };
            match tag {
                "SPDXVersion" => {
                    seen_header.insert("SPDXVersion");
                    if value == SPDX_VERSION {
                        result.set_metadata("version", "2.3");
                    } else {
                        result.add_error(format!("Invalid SPDX version: {value}"));
                    }
                }
                "DataLicense" => {
                    seen_header.insert("DataLicense");
                    if spdx::license_id(&value).is_none() {
                        result.add_error(format!("Unrecognized DataLicense: {value}"));
                    } else if value != DATA_LICENSE {
                        result.add_error(format!("DataLicense must be {DATA_LICENSE}, found {value}"));
                    }
                }
                "DocumentName" => {
                    seen_header.insert("DocumentName");
                    if value.is_empty() {
                        result.add_error("DocumentName is empty");
                    }
                }
                "DocumentNamespace" => {
                    seen_header.insert("DocumentNamespace");
                    if !value.contains("://") || value.contains('#') {
                        result.add_error(format!("Invalid DocumentNamespace: {value}"));
                    }
                }
                "Creator" => {
                    seen_header.insert("Creator");
                    if !["Tool:", "Organization:", "Person:"]
                        .iter()
                        .any(|prefix| value.starts_with(prefix))
                    {
                        result.add_error(format!("Invalid Creator: {value}"));
                    }
                }
                "Created" => {
                    seen_header.insert("Created");
                    if chrono::NaiveDateTime::parse_from_str(&value, "%Y-%m-%dT%H:%M:%SZ").is_err() {
                        result.add_error(format!("Invalid Created timestamp: {value}"));
                    }
                }
                "PackageName" => {
                    close(&mut open, &mut result);
                    packages += 1;
                    open = Some((value, false, false));
                }
                "SPDXID" | "PackageSPDXID" => {
                    if !SPDX_ID.is_match(&value) {
                        result.add_error(format!("Invalid SPDXID: {value}"));
                    } else if !ids.insert(value.clone()) {
                        result.add_error(format!("Duplicate SPDXID: {value}"));
                    }
                    match open.as_mut() {
                        Some(package) => package.1 = true,
                        None if value != DOCUMENT_ID => {
                            result.add_error(format!("Document SPDXID must be {DOCUMENT_ID}"));
                        }
                        None => {}
                    }
                }
                "PackageDownloadLocation" => {
                    if let Some(package) = open.as_mut() {
                        package.2 = true;
                    }
                }
                "PackageLicenseConcluded" | "PackageLicenseDeclared" => {
                    if !is_special(&value)
                        && spdx::Expression::parse_mode(&value, spdx::ParseMode::LAX).is_err()
                    {
                        result.add_error(format!("Invalid license expression in {tag}: {value}"));
                    }
                }
                "Relationship" => {
                    let parts: Vec<&str> = value.split_whitespace().collect();
                    if parts.len() != 3 {
                        result.add_error(format!("Line {line_no}: malformed Relationship"));
                    } else {
                        for element in [parts[0], parts[2]] {
                            if !ELEMENT_REF.is_match(element) {
                                result.add_error(format!("Invalid SPDXID in Relationship: {element}"));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        close(&mut open, &mut result);

        for field in ["SPDXVersion", "DataLicense", "DocumentName", "DocumentNamespace", "Creator", "Created"] {
            if !seen_header.contains(field) {
                result.add_error(format!("Missing required field: {field}"));
            }
        }
        if packages == 0 {
            result.add_warning("Document describes no packages");
        }
        result.set_metadata("packages", packages.to_string());

        if !result.is_valid {
            tracing::debug!(errors = result.errors.len(), "SPDX tag-value validation failed");
        }
        result
    }

    fn parse_components(&self, content: &str) -> Vec<SbomComponent> {
        let mut components: Vec<SbomComponent> = Vec::new();
        let mut depends_on: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (_, tag, value) in tag_lines(content) {
            let Some(tag) = tag else {
                continue;
            };
            if tag == "PackageName" {
                components.push(SbomComponent::new(String::new(), value, String::new()));
                continue;
            }
            if tag == "Relationship" {
                let parts: Vec<&str> = value.split_whitespace().collect();
                if let [from, "DEPENDS_ON", to] = parts.as_slice() {
                    if let (Some(from), Some(to)) =
                        (from.strip_prefix("SPDXRef-"), to.strip_prefix("SPDXRef-"))
                    {
                        depends_on.entry(from.to_string()).or_default().push(to.to_string());
                    }
                }
                continue;
            }
            let Some(current) = components.last_mut() else {
                continue;
            };
            match tag {
                "SPDXID" | "PackageSPDXID" => {
                    current.id = value.strip_prefix("SPDXRef-").unwrap_or(&value).to_string();
                }
                "PackageVersion" => current.version = value,
                "PackageLicenseConcluded" if !is_special(&value) => current.license = value,
                "PackageDownloadLocation" if !is_special(&value) => {
                    current.properties.insert("download_location".to_string(), value);
                }
                "PackageSupplier" => {
                    let supplier = value.strip_prefix("Organization:").unwrap_or(&value).trim();
                    current.properties.insert("supplier".to_string(), supplier.to_string());
                }
                "PackageChecksum" => {
                    if let Some((alg, digest)) = value.split_once(':') {
                        if alg.trim().eq_ignore_ascii_case("SHA256") {
                            current.properties.insert("sha256".to_string(), digest.trim().to_string());
                        }
                    }
                }
                "PrimaryPackagePurpose" => current.component_type = type_for(&value).to_string(),
                "ExternalRef" => {
                    let parts: Vec<&str> = value.split_whitespace().collect();
                    if let [_, "purl", locator] = parts.as_slice() {
                        current.purl = (*locator).to_string();
                    }
                }
                _ => {}
            }
        }

        components
            .into_iter()
            .map(|component| match depends_on.remove(&component.id) {
                Some(deps) => component.with_dependencies(deps),
                None => component,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn metadata() -> DocumentMetadata {
        DocumentMetadata::new("demo")
            .with_namespace("https://example.com/spdx/demo")
            .with_created(chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    fn components() -> Vec<SbomComponent> {
        vec![
            SbomComponent::new("app", "app", "1.0.0")
                .with_type("application")
                .with_license("MIT")
                .with_dependencies(["libc.so.6"])
                .with_property("sha256", "ab12"),
            SbomComponent::new("libc.so.6", "libc.so.6", "2.31").with_type("library"),
        ]
    }

    #[test]
    fn test_generated_document_is_valid() {
        let handler = SpdxTagValue::new();
        let doc = handler.generate(&components(), &metadata()).unwrap();

        assert!(doc.starts_with("SPDXVersion: SPDX-2.3\nDataLicense: CC0-1.0\nSPDXID: SPDXRef-DOCUMENT\n"));
        assert!(doc.contains("Created: 2024-05-01T12:00:00Z"));
        assert!(doc.contains("PackageChecksum: SHA256: ab12"));
        assert!(doc.contains("Relationship: SPDXRef-app DEPENDS_ON SPDXRef-libc.so.6"));

        let result = handler.validate(&doc);
        assert!(result.is_valid, "{:?}", result.errors);
        assert_eq!(result.metadata("version"), Some("2.3"));
        assert_eq!(result.metadata("packages"), Some("2"));
    }

    #[test]
    fn test_round_trip_components() {
        let handler = SpdxTagValue::new();
        let doc = handler.generate(&components(), &metadata()).unwrap();
        let parsed = handler.parse_components(&doc);

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].id, "app");
        assert_eq!(parsed[0].version, "1.0.0");
        assert_eq!(parsed[0].license, "MIT");
        assert_eq!(parsed[0].component_type, "application");
        assert_eq!(parsed[0].dependencies(), ["libc.so.6"]);
        assert_eq!(parsed[0].sha256(), Some("ab12"));
        assert_eq!(parsed[1].name, "libc.so.6");
        assert_eq!(parsed[1].license, "");
    }

    #[test]
    fn test_missing_fields_and_bad_ids() {
        let doc = "SPDXVersion: SPDX-2.2\nDataLicense: MIT\nSPDXID: SPDXRef-DOCUMENT\n\
                   PackageName: foo\nSPDXID: Package_foo\nPackageLicenseConcluded: MIT AND\n";
        let result = SpdxTagValue::new().validate(doc);

        assert!(!result.is_valid);
        let joined = result.errors.join("\n");
        assert!(joined.contains("Invalid SPDX version: SPDX-2.2"));
        assert!(joined.contains("DataLicense must be CC0-1.0"));
        assert!(joined.contains("Invalid SPDXID: Package_foo"));
        assert!(joined.contains("Invalid license expression"));
        assert!(joined.contains("Package 'foo' has no PackageDownloadLocation"));
        assert!(joined.contains("Missing required field: DocumentNamespace"));
        assert!(joined.contains("Missing required field: Created"));
    }

    #[test]
    fn test_multiline_text_values() {
        let doc = "PackageName: foo\nSPDXID: SPDXRef-foo\nPackageComment: <text>first\nPackageVersion: 9\n</text>\nPackageVersion: 1.2\n";
        let parsed = SpdxTagValue::new().parse_components(doc);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].version, "1.2");
    }

    #[test]
    fn test_garbage_never_panics() {
        let handler = SpdxTagValue::new();
        for input in ["", ":", "::::", "SPDXID:", "Relationship: a", "PackageName:\n<text>", "\u{feff}\u{0}"] {
            let result = handler.validate(input);
            assert!(!result.is_valid);
            let _ = handler.parse_components(input);
        }
    }

    #[test]
    fn test_features() {
        let handler = SpdxTagValue::new();
        assert!(handler.supports_feature("TAG_VALUE"));
        assert!(handler.supports_feature("checksums"));
        assert!(!handler.supports_feature("json_ld"));
    }
}
