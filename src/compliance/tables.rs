//! Static support tables and DTDL structural limits (§4.I).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportLevel {
    Full,
    Partial,
    Metadata,
    None,
}

/// RDF/OWL construct support table.
pub fn owl_construct_support(construct: &str) -> Option<SupportLevel> {
    Some(match construct {
        "owl:Class" => SupportLevel::Full,
        "owl:DatatypeProperty" => SupportLevel::Full,
        "owl:ObjectProperty" => SupportLevel::Full,
        "owl:Restriction" => SupportLevel::None,
        "owl:FunctionalProperty" => SupportLevel::None,
        "owl:TransitiveProperty" => SupportLevel::None,
        "owl:SymmetricProperty" => SupportLevel::None,
        "owl:inverseOf" => SupportLevel::None,
        "owl:equivalentClass" => SupportLevel::Metadata,
        "owl:imports" => SupportLevel::None,
        _ => return None,
    })
}

/// DTDL content-element support table.
pub fn dtdl_feature_support(feature: &str) -> Option<SupportLevel> {
    Some(match feature {
        "Property" => SupportLevel::Full,
        "Relationship" => SupportLevel::Full,
        "Telemetry" => SupportLevel::Partial,
        "Command" => SupportLevel::None,
        "Component" => SupportLevel::Partial,
        _ => return None,
    })
}

/// Structural ceilings a DTDL document must respect (§4.I).
#[derive(Debug, Clone, Copy)]
pub struct DtdlLimits {
    pub max_name_length: usize,
    pub max_description_length: usize,
    pub max_extends: usize,
    pub max_extends_depth: usize,
    pub max_inheritance_hierarchy: usize,
    pub max_contents: usize,
    pub max_schema_depth: usize,
}

pub const DTDL_LIMITS: DtdlLimits = DtdlLimits {
    max_name_length: 512,
    max_description_length: 512,
    max_extends: 2,
    max_extends_depth: 12,
    max_inheritance_hierarchy: 1024,
    max_contents: 100_000,
    max_schema_depth: 8,
};
