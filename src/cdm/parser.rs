//! Document-kind detection and entity-schema loading (§4.G).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParseError;

/// The kind of CDM document a file or in-memory value represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdmDocumentKind {
    Manifest,
    EntitySchema,
    ModelJson,
}

/// Detect document kind by filename first, falling back to content shape.
pub fn detect_document_kind(path: Option<&Path>, body: &Value) -> Result<CdmDocumentKind, ParseError> {
    if let Some(path) = path {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_lowercase();
        if name.ends_with(".manifest.cdm.json") {
            return Ok(CdmDocumentKind::Manifest);
        }
        if name == "model.json" {
            return Ok(CdmDocumentKind::ModelJson);
        }
        if name.ends_with(".cdm.json") {
            return Ok(CdmDocumentKind::EntitySchema);
        }
    }

    if body.get("entities").is_some() && body.get("relationships").is_some() {
        return Ok(CdmDocumentKind::ModelJson);
    }
    if body.get("definitions").is_some() && body.get("imports").is_some() {
        return Ok(CdmDocumentKind::Manifest);
    }
    if body.get("definitions").is_some() {
        return Ok(CdmDocumentKind::EntitySchema);
    }

    Err(ParseError::UnknownDocumentKind(
        path.map(|p| p.display().to_string()).unwrap_or_else(|| "<in-memory>".to_string()),
    ))
}

/// A single entity definition inside a `.cdm.json` entity-schema document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdmAttribute {
    pub name: String,
    #[serde(rename = "dataType")]
    pub data_type: Option<String>,
    #[serde(rename = "entity")]
    pub entity_reference: Option<Value>,
    pub purpose: Option<String>,
    #[serde(default)]
    pub applied_traits: Vec<Value>,
}

impl CdmAttribute {
    /// `true` when this attribute's type is `entity`/`entityReference`,
    /// meaning it denotes a relationship rather than a scalar property (§4.G).
    pub fn is_entity_reference(&self) -> bool {
        self.entity_reference.is_some()
            || self.data_type.as_deref() == Some("entity")
            || self.data_type.as_deref() == Some("entityReference")
    }

    fn has_trait(&self, name: &str) -> bool {
        self.applied_traits.iter().any(|t| match t {
            Value::String(s) => s == name,
            Value::Object(map) => map.get("traitReference").and_then(|v| v.as_str()) == Some(name),
            _ => false,
        })
    }

    pub fn is_primary_key(&self) -> bool {
        self.purpose.as_deref() == Some("identifiedBy") || self.has_trait("means.identity.entityId")
    }

    pub fn is_display_name(&self) -> bool {
        self.purpose.as_deref() == Some("namedBy") || self.has_trait("means.identity.name")
    }

    pub fn relationship_verb_phrase(&self) -> Option<String> {
        self.applied_traits.iter().find_map(|t| match t {
            Value::Object(map) if map.get("traitReference").and_then(|v| v.as_str()) == Some("means.relationship.verbPhrase") => {
                map.get("arguments")
                    .and_then(|a| a.as_array())
                    .and_then(|arr| arr.first())
                    .and_then(|v| v.get("value"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
            }
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdmEntityDefinition {
    #[serde(rename = "entityName")]
    pub entity_name: String,
    #[serde(rename = "extendsEntity")]
    pub extends_entity: Option<String>,
    #[serde(default)]
    pub attributes: Vec<CdmAttribute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdmEntitySchema {
    #[serde(default)]
    pub definitions: Vec<CdmEntityDefinition>,
}

/// Parse a `.cdm.json` entity-schema document from bytes.
pub fn load_entity_schema(bytes: &[u8]) -> Result<CdmEntitySchema, ParseError> {
    serde_json::from_slice(bytes).map_err(|e| ParseError::InvalidSyntax {
        format: "cdm".to_string(),
        reason: e.to_string(),
    })
}

/// Resolve a corpus path of the form `Folder/File.cdm.json/EntityName`
/// against `base_dir`, tracking already-loaded files in `loaded` to prevent
/// recursive reloads (§4.G).
pub fn resolve_corpus_path(
    corpus_path: &str,
    base_dir: &Path,
    loaded: &mut HashSet<PathBuf>,
) -> Result<(PathBuf, String), ParseError> {
    let (file_part, entity_name) = corpus_path
        .rsplit_once('/')
        .ok_or_else(|| ParseError::UnresolvedCorpusPath(corpus_path.to_string()))?;

    let resolved = base_dir.join(file_part);
    let canonical = resolved
        .canonicalize()
        .map_err(|_| ParseError::UnresolvedCorpusPath(corpus_path.to_string()))?;

    if !loaded.insert(canonical.clone()) {
        return Err(ParseError::UnresolvedCorpusPath(format!(
            "'{corpus_path}' was already loaded in this conversion (recursive reference)"
        )));
    }

    Ok((canonical, entity_name.to_string()))
}
