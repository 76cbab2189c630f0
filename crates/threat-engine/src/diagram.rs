use serde::{Deserialize, Serialize};

/// A data-flow diagram: a titled, ordered collection of nodes.
///
/// The node array is required; a payload without it fails deserialization and
/// never reaches the engine.  `cells` is accepted as a legacy alias for the
/// array key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(alias = "cells")]
    pub nodes: Vec<Cell>,
}

/// The kind of a diagram node.  `Other` absorbs unrecognized type strings so
/// that foreign diagrams still deserialize; such nodes match none of the type
/// predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Actor,
    Process,
    Store,
    Flow,
    Other,
}

impl CellType {
    fn as_str(&self) -> &'static str {
        match self {
            CellType::Actor => "Actor",
            CellType::Process => "Process",
            CellType::Store => "Store",
            CellType::Flow => "Flow",
            CellType::Other => "Other",
        }
    }
}

impl std::fmt::Display for CellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CellType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CellType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(match tag.as_str() {
            "Actor" => CellType::Actor,
            "Process" => CellType::Process,
            "Store" => CellType::Store,
            "Flow" => CellType::Flow,
            _ => CellType::Other,
        })
    }
}

/// A single diagram node (cell): actor, process, data store, or flow.
///
/// Flags default to `false` and the finding list to empty, so sparse diagram
/// payloads deserialize cleanly.  Attributes outside the known shape are kept
/// in `extra` and remain reachable through `hasProperty(...)` match
/// expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub id: String,
    #[serde(rename = "type")]
    pub cell_type: CellType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Source node id; flows only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Target node id; flows only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default)]
    pub is_public_network: bool,
    #[serde(default)]
    pub is_public_facing: bool,
    /// Out-of-scope nodes are never analyzed and keep whatever findings they
    /// already carry.
    #[serde(default)]
    pub out_of_scope: bool,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub has_open_findings: bool,
    /// Any additional attributes present in the payload.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Cell {
    /// Create a bare cell of the given type with all flags unset.
    pub fn new(id: impl Into<String>, cell_type: CellType) -> Self {
        Self {
            id: id.into(),
            cell_type,
            name: None,
            description: None,
            source: None,
            target: None,
            is_encrypted: false,
            is_public_network: false,
            is_public_facing: false,
            out_of_scope: false,
            findings: Vec::new(),
            has_open_findings: false,
            extra: serde_json::Map::new(),
        }
    }

    /// Look up an attribute by its wire name, falling through to the `extra`
    /// map for attributes outside the known shape.  Returns `None` when the
    /// attribute is undefined.
    pub fn property(&self, name: &str) -> Option<serde_json::Value> {
        use serde_json::Value;

        match name {
            "id" => Some(Value::String(self.id.clone())),
            "type" => Some(Value::String(self.cell_type.to_string())),
            "name" => self.name.clone().map(Value::String),
            "description" => self.description.clone().map(Value::String),
            "source" => self.source.clone().map(Value::String),
            "target" => self.target.clone().map(Value::String),
            "isEncrypted" => Some(Value::Bool(self.is_encrypted)),
            "isPublicNetwork" => Some(Value::Bool(self.is_public_network)),
            "isPublicFacing" => Some(Value::Bool(self.is_public_facing)),
            "outOfScope" => Some(Value::Bool(self.out_of_scope)),
            "hasOpenFindings" => Some(Value::Bool(self.has_open_findings)),
            other => self.extra.get(other).cloned(),
        }
    }
}

/// A structured security observation attached to a node by a matched rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// STRIDE-style classification.
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mitigation: String,
    /// The node's name, or its type tag when unnamed.
    #[serde(default)]
    pub subject_type: String,
    /// Name of the rule that produced this finding.
    #[serde(default)]
    pub origin: String,
    /// True for engine-generated findings; hand-entered findings deserialize
    /// to `false` and survive re-analysis.
    #[serde(default)]
    pub synthetic: bool,
}

fn default_status() -> String {
    "Open".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_sparse_cell() {
        let json = r#"{ "id": "p1", "type": "Process" }"#;
        let cell: Cell = serde_json::from_str(json).unwrap();
        assert_eq!(cell.id, "p1");
        assert_eq!(cell.cell_type, CellType::Process);
        assert!(!cell.is_encrypted);
        assert!(!cell.out_of_scope);
        assert!(cell.findings.is_empty());
        assert!(!cell.has_open_findings);
    }

    #[test]
    fn unknown_type_string_becomes_other() {
        let json = r#"{ "id": "b1", "type": "Boundary" }"#;
        let cell: Cell = serde_json::from_str(json).unwrap();
        assert_eq!(cell.cell_type, CellType::Other);
    }

    #[test]
    fn extra_attributes_are_captured() {
        let json = r#"{ "id": "s1", "type": "Store", "storesCredentials": "true", "tier": 3 }"#;
        let cell: Cell = serde_json::from_str(json).unwrap();
        assert_eq!(
            cell.extra.get("storesCredentials"),
            Some(&serde_json::Value::String("true".to_string()))
        );
        assert_eq!(cell.extra.get("tier"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn property_lookup_covers_typed_fields_and_extras() {
        let mut cell = Cell::new("f1", CellType::Flow);
        cell.name = Some("payment".to_string());
        cell.source = Some("p1".to_string());
        cell.is_encrypted = true;
        cell.extra
            .insert("protocol".to_string(), serde_json::json!("https"));

        assert_eq!(cell.property("id"), Some(serde_json::json!("f1")));
        assert_eq!(cell.property("type"), Some(serde_json::json!("Flow")));
        assert_eq!(cell.property("name"), Some(serde_json::json!("payment")));
        assert_eq!(cell.property("source"), Some(serde_json::json!("p1")));
        assert_eq!(cell.property("isEncrypted"), Some(serde_json::json!(true)));
        assert_eq!(cell.property("protocol"), Some(serde_json::json!("https")));
        // Undefined attributes.
        assert_eq!(cell.property("description"), None);
        assert_eq!(cell.property("target"), None);
        assert_eq!(cell.property("nonexistent"), None);
    }

    #[test]
    fn diagram_accepts_cells_alias() {
        let json = r#"{ "title": "legacy", "cells": [ { "id": "a", "type": "Actor" } ] }"#;
        let diagram: Diagram = serde_json::from_str(json).unwrap();
        assert_eq!(diagram.nodes.len(), 1);
    }

    #[test]
    fn diagram_without_node_array_is_rejected() {
        let json = r#"{ "title": "broken" }"#;
        assert!(serde_json::from_str::<Diagram>(json).is_err());
    }

    #[test]
    fn finding_serializes_camel_case() {
        let finding = Finding {
            id: "x".to_string(),
            title: "t".to_string(),
            category: "Spoofing".to_string(),
            status: "Open".to_string(),
            severity: "High".to_string(),
            description: String::new(),
            mitigation: String::new(),
            subject_type: "Actor".to_string(),
            origin: "some-rule".to_string(),
            synthetic: true,
        };
        let value = serde_json::to_value(&finding).unwrap();
        assert_eq!(value["subjectType"], "Actor");
        assert_eq!(value["origin"], "some-rule");
        assert_eq!(value["synthetic"], true);
    }

    #[test]
    fn hand_entered_finding_defaults_to_not_synthetic() {
        let json = r#"{ "title": "manually recorded" }"#;
        let finding: Finding = serde_json::from_str(json).unwrap();
        assert!(!finding.synthetic);
        assert_eq!(finding.status, "Open");
    }
}
