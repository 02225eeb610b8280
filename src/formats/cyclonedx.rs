//! CycloneDX JSON documents, spec versions 1.4 to 1.6.

use super::{DocumentMetadata, FormatHandler, TOOL_NAME, TOOL_VERSION};
use crate::error::Result;
use crate::model::{SbomComponent, ValidationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const SUPPORTED_VERSIONS: &[&str] = &["1.4", "1.5", "1.6"];

/// Prefix for component properties carried as CycloneDX `properties`.
const PROPERTY_PREFIX: &str = "sbom-binscan:";

#[derive(Debug, Clone)]
pub struct CycloneDx {
    version: String,
}

impl CycloneDx {
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CdxBom {
    bom_format: String,
    spec_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    serial_number: Option<String>,
    version: u32,
    metadata: CdxMetadata,
    #[serde(default)]
    components: Vec<CdxComponent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<CdxDependency>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CdxMetadata {
    timestamp: String,
    /// Array of tools up to 1.4, `{ "components": [...] }` from 1.5 on
    tools: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    component: Option<CdxComponent>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CdxComponent {
    #[serde(rename = "type")]
    component_type: String,
    #[serde(rename = "bom-ref", skip_serializing_if = "Option::is_none")]
    bom_ref: Option<String>,
    name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    purl: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    licenses: Vec<CdxLicenseChoice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    hashes: Vec<CdxHash>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    properties: Vec<CdxProperty>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CdxLicenseChoice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    license: Option<CdxLicense>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CdxLicense {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CdxHash {
    alg: String,
    content: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CdxProperty {
    name: String,
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CdxDependency {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default)]
    depends_on: Vec<String>,
}

impl CdxComponent {
    fn from_component(component: &SbomComponent) -> Self {
        let component_type = if component.component_type.is_empty() {
            "library".to_string()
        } else {
            component.component_type.clone()
        };
        let licenses = if component.license.is_empty() {
            Vec::new()
        } else {
            vec![CdxLicenseChoice {
                expression: Some(component.license.clone()),
                license: None,
            }]
        };
        let hashes = component
            .sha256()
            .map(|sha| {
                vec![CdxHash {
                    alg: "SHA-256".to_string(),
                    content: sha.to_string(),
                }]
            })
            .unwrap_or_default();
        let properties = component
            .properties
            .iter()
            .filter(|(key, _)| key.as_str() != "sha256")
            .map(|(key, value)| CdxProperty {
                name: format!("{PROPERTY_PREFIX}{key}"),
                value: value.clone(),
            })
            .collect();

        Self {
            component_type,
            bom_ref: Some(component.id.clone()),
            name: component.name.clone(),
            version: component.version.clone(),
            purl: Some(component.purl.clone()).filter(|p| !p.is_empty()),
            licenses,
            hashes,
            properties,
        }
    }

    fn into_component(self) -> SbomComponent {
        let id = self.bom_ref.unwrap_or_else(|| self.name.clone());
        let license = self
            .licenses
            .into_iter()
            .find_map(|choice| {
                choice
                    .expression
                    .or_else(|| choice.license.and_then(|l| l.id.or(l.name)))
            })
            .unwrap_or_default();
        let mut component = SbomComponent::new(id, self.name, self.version)
            .with_type(self.component_type)
            .with_purl(self.purl.unwrap_or_default())
            .with_license(license);
        for hash in self.hashes {
            if hash.alg.eq_ignore_ascii_case("SHA-256") {
                component = component.with_property("sha256", hash.content);
            }
        }
        for property in self.properties {
            if let Some(key) = property.name.strip_prefix(PROPERTY_PREFIX) {
                component = component.with_property(key, property.value);
            }
        }
        component
    }
}

impl FormatHandler for CycloneDx {
    fn format_name(&self) -> &'static str {
        "CycloneDX"
    }

    fn format_version(&self) -> &str {
        &self.version
    }

    fn file_extension(&self) -> &'static str {
        "cdx.json"
    }

    fn supports_feature(&self, feature: &str) -> bool {
        match feature.to_ascii_lowercase().as_str() {
            "json" | "dependencies" | "hashes" | "properties" => true,
            "evidence" => matches!(self.version.as_str(), "1.5" | "1.6"),
            "cryptography" => self.version == "1.6",
            _ => false,
        }
    }

    fn generate(&self, components: &[SbomComponent], metadata: &DocumentMetadata) -> Result<String> {
        let tools = if self.version == "1.4" {
            serde_json::json!([{ "vendor": TOOL_NAME, "name": TOOL_NAME, "version": TOOL_VERSION }])
        } else {
            serde_json::json!({
                "components": [{ "type": "application", "name": TOOL_NAME, "version": TOOL_VERSION }]
            })
        };
        let dependencies = components
            .iter()
            .map(|c| CdxDependency {
                reference: c.id.clone(),
                depends_on: c.dependencies().to_vec(),
            })
            .collect();

        let bom = CdxBom {
            bom_format: "CycloneDX".to_string(),
            spec_version: self.version.clone(),
            serial_number: Some(format!("urn:uuid:{}", uuid::Uuid::new_v4())),
            version: 1,
            metadata: CdxMetadata {
                timestamp: metadata.timestamp(),
                tools,
                component: Some(CdxComponent {
                    component_type: "application".to_string(),
                    bom_ref: None,
                    name: metadata.name.clone(),
                    version: String::new(),
                    purl: None,
                    licenses: Vec::new(),
                    hashes: Vec::new(),
                    properties: Vec::new(),
                }),
            },
            components: components.iter().map(CdxComponent::from_component).collect(),
            dependencies,
        };
        tracing::debug!(components = components.len(), version = %self.version, "Generated CycloneDX document");
        Ok(serde_json::to_string_pretty(&bom)?)
    }

    fn validate(&self, content: &str) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.set_metadata("format", "CycloneDX");

        let root: Value = match serde_json::from_str(content) {
            Ok(value) => value,
            Err(err) => {
                result.add_error(format!("Invalid JSON: {err}"));
                return result;
            }
        };
        let Some(root) = root.as_object() else {
            result.add_error("Document root is not a JSON object");
            return result;
        };

        match root.get("bomFormat").and_then(Value::as_str) {
            Some("CycloneDX") => {}
            Some(other) => result.add_error(format!("Invalid bomFormat: {other}")),
            None => result.add_error("Missing required field: bomFormat"),
        }
        match root.get("specVersion").and_then(Value::as_str) {
            Some(version) if SUPPORTED_VERSIONS.contains(&version) => {
                result.set_metadata("version", version);
                if version != self.version {
                    result.add_warning(format!(
                        "Document declares CycloneDX {version}, handler expects {}",
                        self.version
                    ));
                }
            }
            Some(version) => result.add_error(format!("Unsupported specVersion: {version}")),
            None => result.add_error("Missing required field: specVersion"),
        }
        if !root.get("version").is_some_and(Value::is_u64) {
            result.add_error("Missing or invalid field: version");
        }
        match root.get("metadata") {
            Some(Value::Object(metadata)) => {
                if !metadata.get("tools").is_some_and(|t| t.is_array() || t.is_object()) {
                    result.add_warning("metadata.tools is missing");
                }
            }
            Some(_) => result.add_error("metadata is not an object"),
            None => result.add_warning("metadata is missing"),
        }

        match root.get("components") {
            None => result.add_warning("Document has no components array"),
            Some(Value::Array(components)) => {
                for (index, component) in components.iter().enumerate() {
                    let Some(component) = component.as_object() else {
                        result.add_error(format!("components[{index}] is not an object"));
                        continue;
                    };
                    for field in ["type", "name"] {
                        if !component.get(field).is_some_and(Value::is_string) {
                            result.add_error(format!("components[{index}]: missing required field '{field}'"));
                        }
                    }
                    if component.get("bom-ref").is_some_and(|r| !r.is_string()) {
                        result.add_error(format!("components[{index}]: bom-ref is not a string"));
                    }
                }
                result.set_metadata("components", components.len().to_string());
            }
            Some(_) => result.add_error("components is not an array"),
        }

        if !result.is_valid {
            tracing::debug!(errors = result.errors.len(), "CycloneDX validation failed");
        }
        result
    }

    /// Documents with a spec version outside 1.4 to 1.6 are treated as
    /// having no components.
    fn parse_components(&self, content: &str) -> Vec<SbomComponent> {
        let Ok(root) = serde_json::from_str::<Value>(content) else {
            return Vec::new();
        };
        let spec_version = root.get("specVersion").and_then(Value::as_str).unwrap_or_default();
        if !SUPPORTED_VERSIONS.contains(&spec_version) {
            tracing::debug!(spec_version, "Ignoring components of unsupported CycloneDX version");
            return Vec::new();
        }

        let dependencies: Vec<CdxDependency> = root
            .get("dependencies")
            .and_then(|d| serde_json::from_value(d.clone()).ok())
            .unwrap_or_default();
        let Some(components) = root.get("components").and_then(Value::as_array) else {
            return Vec::new();
        };

        components
            .iter()
            .filter_map(|c| serde_json::from_value::<CdxComponent>(c.clone()).ok())
            .map(|c| {
                let component = c.into_component();
                match dependencies.iter().find(|d| d.reference == component.id) {
                    Some(dep) => component.with_dependencies(dep.depends_on.iter().cloned()),
                    None => component,
                }
            })
            .collect()
    }
}
