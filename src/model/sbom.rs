//! Format-neutral SBOM component and diff records.

use super::ComponentInfo;
use crate::utils::content_hash;
use packageurl::PackageUrl;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version rendered for components whose version is not known.
pub const NOASSERTION: &str = "NOASSERTION";

/// Turn a component name into an identifier safe for every document family:
/// ASCII letters, digits, `.` and `-`.
///
/// Names already in that alphabet are returned unchanged. Any other name has
/// its disallowed characters replaced with `-` and gains a `-<hash>` suffix
/// of the original name, so `foo_bar` and `foo-bar` stay distinct. The result
/// is a fixed point: sanitizing an identifier again returns it as is.
#[must_use]
pub fn sanitize_id(name: &str) -> String {
    let is_allowed = |c: char| c.is_ascii_alphanumeric() || c == '.' || c == '-';
    if !name.is_empty() && name.chars().all(is_allowed) {
        return name.to_string();
    }
    let base: String = name
        .chars()
        .map(|c| if is_allowed(c) { c } else { '-' })
        .collect();
    let base = if base.is_empty() { "unnamed" } else { &base };
    format!("{base}-{:016x}", content_hash(name.as_bytes()))
}

/// A component as it appears in a serialized SBOM document.
///
/// Dependencies are kept sorted and deduplicated so that equality and
/// [`SbomComponent::content_hash`] depend only on the component's content,
/// not on the order in which fields were collected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SbomComponent {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub purl: String,
    pub license: String,
    dependencies: Vec<String>,
    pub properties: BTreeMap<String, String>,
}

impl SbomComponent {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_type(mut self, component_type: impl Into<String>) -> Self {
        self.component_type = component_type.into();
        self
    }

    #[must_use]
    pub fn with_purl(mut self, purl: impl Into<String>) -> Self {
        self.purl = purl.into();
        self
    }

    #[must_use]
    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = license.into();
        self
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self.dependencies.sort();
        self.dependencies.dedup();
        self
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Drop dependency ids rejected by `keep`.
    pub fn retain_dependencies(&mut self, keep: impl FnMut(&String) -> bool) {
        self.dependencies.retain(keep);
    }

    /// Placeholder for a declared dependency with no backing artifact.
    #[must_use]
    pub fn unresolved(name: &str) -> Self {
        Self::new(sanitize_id(name), name, NOASSERTION)
            .with_type("library")
            .with_property("resolved", "false")
    }

    /// Format-neutral projection of an extracted component.
    #[must_use]
    pub fn from_component_info(info: &ComponentInfo) -> Self {
        let version = info.version().unwrap_or(NOASSERTION);
        let purl_type = if info.package_manager() == "conan" {
            "conan"
        } else {
            "generic"
        };
        let purl = PackageUrl::new(purl_type, info.name())
            .map(|mut purl| {
                if let Some(v) = info.version() {
                    purl.with_version(v);
                }
                purl.to_string()
            })
            .unwrap_or_default();

        let mut component = Self::new(sanitize_id(info.name()), info.name(), version)
            .with_type(info.file_type().cyclonedx_type())
            .with_purl(purl)
            .with_license(info.license().unwrap_or_default())
            .with_dependencies(info.dependencies().map(sanitize_id))
            .with_property("file_path", info.file_path().to_string_lossy())
            .with_property("file_type", info.file_type().as_str())
            .with_property("package_manager", info.package_manager());

        let optional = [
            ("supplier", Some(info.supplier()).filter(|s| !s.is_empty())),
            ("sha256", info.checksum()),
            ("download_location", info.download_location()),
            ("homepage", info.homepage()),
            ("detected_by", info.detected_by()),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                component = component.with_property(key, value);
            }
        }
        if info.is_system_library() {
            component = component.with_property("system_library", "true");
        }
        if info.contains_debug_info() {
            component = component
                .with_property("source_files", info.source_files().len().to_string())
                .with_property("functions", info.functions().len().to_string());
        }
        component
    }

    /// SHA-256 checksum carried in the properties, if any.
    #[must_use]
    pub fn sha256(&self) -> Option<&str> {
        self.properties.get("sha256").map(String::as_str)
    }

    /// Structural hash over every field.
    ///
    /// Fields are separated by a NUL byte so that `("ab", "c")` and
    /// `("a", "bc")` hash differently.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let mut input = Vec::with_capacity(128);
        for field in [
            &self.id,
            &self.name,
            &self.version,
            &self.component_type,
            &self.purl,
            &self.license,
        ] {
            input.extend_from_slice(field.as_bytes());
            input.push(0);
        }
        for dep in &self.dependencies {
            input.extend_from_slice(dep.as_bytes());
            input.push(0);
        }
        input.push(0xff);
        for (key, value) in &self.properties {
            input.extend_from_slice(key.as_bytes());
            input.push(b'=');
            input.extend_from_slice(value.as_bytes());
            input.push(0);
        }
        content_hash(&input)
    }
}

/// Category of a single diff entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifferenceType {
    Added,
    Removed,
    Modified,
    Unchanged,
}

impl DifferenceType {
    pub const ALL: [Self; 4] = [Self::Added, Self::Removed, Self::Modified, Self::Unchanged];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
            Self::Unchanged => "unchanged",
        }
    }
}

impl std::fmt::Display for DifferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the result of comparing two component sets.
///
/// `component` is the new side (the old side for `Removed`); `old_component`
/// is only present for `Modified`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SbomDifference {
    #[serde(rename = "type")]
    pub kind: DifferenceType,
    pub component: SbomComponent,
    #[serde(rename = "oldComponent", skip_serializing_if = "Option::is_none")]
    pub old_component: Option<SbomComponent>,
}

impl SbomDifference {
    #[must_use]
    pub fn new(kind: DifferenceType, component: SbomComponent) -> Self {
        Self {
            kind,
            component,
            old_component: None,
        }
    }

    #[must_use]
    pub fn modified(new: SbomComponent, old: SbomComponent) -> Self {
        Self {
            kind: DifferenceType::Modified,
            component: new,
            old_component: Some(old),
        }
    }
}
