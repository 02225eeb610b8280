//! SPDX 3.0 JSON-LD documents.
//!
//! A document is a `@context` plus a flat `@graph` of typed nodes:
//! `CreationInfo`, `Tool`, `SpdxDocument`, `software_Package`,
//! `simplelicensing_LicenseExpression` and `Relationship`. Node shapes are
//! checked against a map of node type to required properties, read from
//! `<schema_dir>/spdx-<version>.json` when a schema directory is set.

use super::{DocumentMetadata, FormatHandler, TOOL_NAME, TOOL_VERSION};
use crate::error::Result;
use crate::model::{sanitize_id, SbomComponent, ValidationResult};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

const CREATION_INFO_ID: &str = "_:creationinfo";

/// Required properties per node type.
pub type NodeShapes = BTreeMap<String, Vec<String>>;

fn builtin_shapes() -> NodeShapes {
    let shape = |props: &[&str]| props.iter().map(|p| (*p).to_string()).collect::<Vec<_>>();
    BTreeMap::from([
        ("CreationInfo".to_string(), shape(&["specVersion", "created", "createdBy"])),
        ("SpdxDocument".to_string(), shape(&["spdxId", "creationInfo", "rootElement"])),
        ("software_Package".to_string(), shape(&["spdxId", "name", "creationInfo"])),
        ("Relationship".to_string(), shape(&["spdxId", "from", "to", "relationshipType", "creationInfo"])),
        (
            "simplelicensing_LicenseExpression".to_string(),
            shape(&["spdxId", "simplelicensing_licenseExpression", "creationInfo"]),
        ),
    ])
}

#[derive(Debug, Clone)]
pub struct SpdxJsonLd {
    version: String,
    schema_dir: Option<PathBuf>,
}

impl SpdxJsonLd {
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            schema_dir: None,
        }
    }

    #[must_use]
    pub fn with_schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = Some(dir.into());
        self
    }

    fn context_url(&self) -> String {
        format!("https://spdx.org/rdf/{}/spdx-context.jsonld", self.version)
    }

    /// Shapes from the schema directory, or the built-in set. Problems
    /// reading the schema are reported as warnings.
    fn node_shapes(&self, result: &mut ValidationResult) -> NodeShapes {
        let Some(dir) = &self.schema_dir else {
            return builtin_shapes();
        };
        let path = dir.join(format!("spdx-{}.json", self.version));
        match load_shapes(&path) {
            Ok(shapes) => {
                result.set_metadata("schema", path.display().to_string());
                shapes
            }
            Err(message) => {
                result.add_warning(message);
                builtin_shapes()
            }
        }
    }
}

fn load_shapes(path: &Path) -> std::result::Result<NodeShapes, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Schema {} not available: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("Schema {} is unusable: {e}", path.display()))
}

/// Local part of an element IRI: `https://x/doc#SPDXRef-app` gives `app`.
fn local_id(iri: &str) -> &str {
    let tail = iri.rsplit_once('#').map_or(iri, |(_, tail)| tail);
    tail.strip_prefix("SPDXRef-").unwrap_or(tail)
}

fn node_type(node: &Map<String, Value>) -> Option<&str> {
    node.get("type").or_else(|| node.get("@type")).and_then(Value::as_str)
}

fn purpose_for(component_type: &str) -> &'static str {
    match component_type {
        "application" => "application",
        "library" => "library",
        "firmware" => "firmware",
        "file" => "file",
        _ => "other",
    }
}

impl FormatHandler for SpdxJsonLd {
    fn format_name(&self) -> &'static str {
        "SPDX"
    }

    fn format_version(&self) -> &str {
        &self.version
    }

    fn file_extension(&self) -> &'static str {
        "spdx.json"
    }

    fn supports_feature(&self, feature: &str) -> bool {
        matches!(
            feature.to_ascii_lowercase().as_str(),
            "json_ld" | "relationships" | "checksums"
        )
    }

    fn generate(&self, components: &[SbomComponent], metadata: &DocumentMetadata) -> Result<String> {
        let namespace = metadata.namespace_or_generated();
        let element = |local: &str| format!("{namespace}#{local}");
        let package_id = |id: &str| element(&format!("SPDXRef-{}", sanitize_id(id)));
        let tool_id = element("SPDXRef-Tool");

        let mut graph = vec![
            json!({
                "type": "CreationInfo",
                "@id": CREATION_INFO_ID,
                "specVersion": self.version,
                "created": metadata.timestamp(),
                "createdBy": [tool_id],
                "createdUsing": [tool_id],
            }),
            json!({
                "type": "Tool",
                "spdxId": tool_id,
                "name": format!("{TOOL_NAME}-{TOOL_VERSION}"),
                "creationInfo": CREATION_INFO_ID,
            }),
        ];

        let mut elements: Vec<String> = vec![tool_id.clone()];
        let mut relationships = Vec::new();
        let mut relationship_count = 0usize;
        let mut next_relationship = |from: String, to: Vec<String>, kind: &str| {
            relationship_count += 1;
            json!({
                "type": "Relationship",
                "spdxId": element(&format!("SPDXRef-Relationship-{relationship_count}")),
                "from": from,
                "to": to,
                "relationshipType": kind,
                "creationInfo": CREATION_INFO_ID,
            })
        };

        for (index, component) in components.iter().enumerate() {
            let id = package_id(&component.id);
            let mut node = Map::new();
            node.insert("type".into(), json!("software_Package"));
            node.insert("spdxId".into(), json!(id));
            node.insert("name".into(), json!(component.name));
            node.insert("creationInfo".into(), json!(CREATION_INFO_ID));
            if !component.version.is_empty() {
                node.insert("software_packageVersion".into(), json!(component.version));
            }
            if !component.purl.is_empty() {
                node.insert("software_packageUrl".into(), json!(component.purl));
            }
            if let Some(location) = component.properties.get("download_location") {
                node.insert("software_downloadLocation".into(), json!(location));
            }
            if !component.component_type.is_empty() {
                node.insert(
                    "software_primaryPurpose".into(),
                    json!(purpose_for(&component.component_type)),
                );
            }
            if let Some(sha) = component.sha256() {
                node.insert(
                    "verifiedUsing".into(),
                    json!([{ "type": "Hash", "algorithm": "sha256", "hashValue": sha }]),
                );
            }
            graph.push(Value::Object(node));
            elements.push(id.clone());

            if !component.license.is_empty() {
                let license_id = element(&format!("SPDXRef-License-{}", index + 1));
                graph.push(json!({
                    "type": "simplelicensing_LicenseExpression",
                    "spdxId": license_id,
                    "simplelicensing_licenseExpression": component.license,
                    "creationInfo": CREATION_INFO_ID,
                }));
                elements.push(license_id.clone());
                relationships.push(next_relationship(id.clone(), vec![license_id], "hasConcludedLicense"));
            }
            if !component.dependencies().is_empty() {
                let to = component.dependencies().iter().map(|d| package_id(d)).collect();
                relationships.push(next_relationship(id, to, "dependsOn"));
            }
        }

        for relationship in &relationships {
            if let Some(id) = relationship.get("spdxId").and_then(Value::as_str) {
                elements.push(id.to_string());
            }
        }
        let roots: Vec<String> = components.iter().map(|c| package_id(&c.id)).collect();
        graph.push(json!({
            "type": "SpdxDocument",
            "spdxId": element("SPDXRef-DOCUMENT"),
            "name": metadata.name,
            "creationInfo": CREATION_INFO_ID,
            "dataLicense": "https://spdx.org/licenses/CC0-1.0",
            "profileConformance": ["core", "software", "simpleLicensing"],
            "rootElement": roots,
            "element": elements,
        }));
        graph.extend(relationships);

        let document = json!({
            "@context": self.context_url(),
            "@graph": graph,
        });
        tracing::debug!(components = components.len(), version = %self.version, "Generated SPDX JSON-LD document");
        Ok(serde_json::to_string_pretty(&document)?)
    }

    fn validate(&self, content: &str) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.set_metadata("format", "SPDX");

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

        match root.get("@context") {
            None => result.add_error("Missing required field: @context"),
            Some(context) => {
                let urls: Vec<&str> = match context {
                    Value::String(url) => vec![url.as_str()],
                    Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
                    _ => Vec::new(),
                };
                let detected = urls.iter().find_map(|url| {
                    ["3.0.0", "3.0.1"].into_iter().find(|v| {
                        *url == format!("https://spdx.org/rdf/{v}/spdx-context.jsonld")
                    })
                });
                match detected {
                    Some(version) => {
                        result.set_metadata("version", version);
                        if version != self.version {
                            result.add_warning(format!(
                                "Document declares SPDX {version}, handler expects {}",
                                self.version
                            ));
                        }
                    }
                    None => result.add_error("Unrecognized @context"),
                }
            }
        }

        let Some(graph) = root.get("@graph") else {
            result.add_error("Missing required field: @graph");
            return result;
        };
        let Some(nodes) = graph.as_array() else {
            result.add_error("@graph is not an array");
            return result;
        };

        let shapes = self.node_shapes(&mut result);
        let mut documents = 0usize;
        let mut packages = 0usize;
        for (index, node) in nodes.iter().enumerate() {
            let Some(node) = node.as_object() else {
                result.add_error(format!("@graph[{index}] is not an object"));
                continue;
            };
            let Some(kind) = node_type(node) else {
                result.add_error(format!("@graph[{index}] has no type"));
                continue;
            };
            match kind {
                "SpdxDocument" => documents += 1,
                "software_Package" => packages += 1,
                _ => {}
            }
            if let Some(required) = shapes.get(kind) {
                for property in required {
                    if !node.contains_key(property) {
                        result.add_error(format!(
                            "@graph[{index}] ({kind}): missing required property '{property}'"
                        ));
                    }
                }
            }
        }
        if documents == 0 {
            result.add_error("@graph has no SpdxDocument node");
        }
        if packages == 0 {
            result.add_warning("Document describes no packages");
        }
        result.set_metadata("packages", packages.to_string());

        if !result.is_valid {
            tracing::debug!(errors = result.errors.len(), "SPDX JSON-LD validation failed");
        }
        result
    }

    fn parse_components(&self, content: &str) -> Vec<SbomComponent> {
        let Ok(root) = serde_json::from_str::<Value>(content) else {
            return Vec::new();
        };
        let Some(nodes) = root.get("@graph").and_then(Value::as_array) else {
            return Vec::new();
        };
        let nodes: Vec<&Map<String, Value>> = nodes.iter().filter_map(Value::as_object).collect();

        let licenses: HashMap<&str, &str> = nodes
            .iter()
            .filter(|n| node_type(n) == Some("simplelicensing_LicenseExpression"))
            .filter_map(|n| {
                let id = n.get("spdxId")?.as_str()?;
                let expr = n.get("simplelicensing_licenseExpression")?.as_str()?;
                Some((id, expr))
            })
            .collect();

        let mut depends_on: HashMap<&str, Vec<String>> = HashMap::new();
        let mut concluded: HashMap<&str, &str> = HashMap::new();
        for node in nodes.iter().filter(|n| node_type(n) == Some("Relationship")) {
            let Some(from) = node.get("from").and_then(Value::as_str) else {
                continue;
            };
            let to: Vec<&str> = node
                .get("to")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            match node.get("relationshipType").and_then(Value::as_str) {
                Some("dependsOn") => depends_on
                    .entry(from)
                    .or_default()
                    .extend(to.iter().map(|t| local_id(t).to_string())),
                Some("hasConcludedLicense") => {
                    if let Some(expr) = to.first().and_then(|t| licenses.get(t)) {
                        concluded.insert(from, *expr);
                    }
                }
                _ => {}
            }
        }

        let text = |node: &Map<String, Value>, key: &str| {
            node.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
        };
        nodes
            .iter()
            .filter(|n| node_type(n) == Some("software_Package"))
            .map(|node| {
                let spdx_id = node.get("spdxId").and_then(Value::as_str).unwrap_or_default();
                let mut component = SbomComponent::new(
                    local_id(spdx_id),
                    text(node, "name"),
                    text(node, "software_packageVersion"),
                )
                .with_type(text(node, "software_primaryPurpose"))
                .with_purl(text(node, "software_packageUrl"))
                .with_license(concluded.get(spdx_id).copied().unwrap_or_default());
                if let Some(location) = node.get("software_downloadLocation").and_then(Value::as_str) {
                    component = component.with_property("download_location", location);
                }
                let sha = node
                    .get("verifiedUsing")
                    .and_then(Value::as_array)
                    .and_then(|hashes| {
                        hashes.iter().find(|h| h.get("algorithm").and_then(Value::as_str) == Some("sha256"))
                    })
                    .and_then(|h| h.get("hashValue").and_then(Value::as_str));
                if let Some(sha) = sha {
                    component = component.with_property("sha256", sha);
                }
                match depends_on.get(spdx_id) {
                    Some(deps) => component.with_dependencies(deps.iter().cloned()),
                    None => component,
                }
            })
            .collect()
    }
}
