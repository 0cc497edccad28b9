//! Fabric → Turtle export (§C), the inverse of RDF ingestion.
//!
//! Entity types become `owl:Class`, scalar properties become
//! `owl:DatatypeProperty` with `rdfs:domain`/`rdfs:range`, and relationship
//! types become `owl:ObjectProperty` with `rdfs:domain`/`rdfs:range` pointing
//! at the endpoint entity types. Fabric doesn't retain a source IRI, so
//! exported terms are minted under a caller-supplied base namespace.

use crate::model::{ConversionResult, ValueType};

const DEFAULT_BASE: &str = "http://example.org/fabric#";

fn xsd_type_for(value_type: ValueType) -> &'static str {
    match value_type {
        ValueType::String => "xsd:string",
        ValueType::Boolean => "xsd:boolean",
        ValueType::DateTime => "xsd:dateTime",
        ValueType::BigInt => "xsd:long",
        ValueType::Double => "xsd:double",
        ValueType::Decimal => "xsd:decimal",
    }
}

/// Render a `ConversionResult` as Turtle text under `base`, one class per
/// entity type, one datatype property per scalar property, and one object
/// property per relationship type.
pub fn export_turtle(result: &ConversionResult, base: &str) -> String {
    let base = if base.is_empty() { DEFAULT_BASE } else { base };
    let mut out = String::new();

    out.push_str("@prefix owl: <http://www.w3.org/2002/07/owl#> .\n");
    out.push_str("@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .\n");
    out.push_str("@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .\n");
    out.push_str(&format!("@prefix : <{base}> .\n\n"));

    for entity in &result.entity_types {
        out.push_str(&format!(":{} a owl:Class", entity.name));
        if let Some(parent_id) = &entity.base_entity_type_id {
            if let Some(parent) = result.find_entity(parent_id) {
                out.push_str(&format!(" ;\n    rdfs:subClassOf :{}", parent.name));
            }
        }
        out.push_str(" .\n");

        for property in entity.all_properties() {
            out.push_str(&format!(
                ":{} a owl:DatatypeProperty ;\n    rdfs:domain :{} ;\n    rdfs:range {} .\n",
                property.name,
                entity.name,
                xsd_type_for(property.value_type),
            ));
        }
        out.push('\n');
    }

    for relationship in &result.relationship_types {
        let source_name = result.find_entity(&relationship.source.entity_type_id).map(|e| e.name.as_str()).unwrap_or(&relationship.source.entity_type_id);
        let target_name = result.find_entity(&relationship.target.entity_type_id).map(|e| e.name.as_str()).unwrap_or(&relationship.target.entity_type_id);
        out.push_str(&format!(
            ":{} a owl:ObjectProperty ;\n    rdfs:domain :{} ;\n    rdfs:range :{} .\n",
            relationship.name, source_name, target_name,
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityType, EntityTypeProperty, NamespaceInfo, RelationshipEnd, RelationshipType};

    #[test]
    fn exports_a_class_with_a_datatype_property() {
        let mut result = ConversionResult::new();
        let mut person = EntityType::new("1", "Person");
        person.properties.push(EntityTypeProperty::new("1/name", "name", ValueType::String));
        result.entity_types.push(person);

        let turtle = export_turtle(&result, "");
        assert!(turtle.contains(":Person a owl:Class"));
        assert!(turtle.contains(":name a owl:DatatypeProperty"));
        assert!(turtle.contains("rdfs:range xsd:string"));
    }

    #[test]
    fn exports_subclass_relationship() {
        let mut result = ConversionResult::new();
        result.entity_types.push(EntityType::new("1", "Animal"));
        let mut dog = EntityType::new("2", "Dog");
        dog.base_entity_type_id = Some("1".to_string());
        result.entity_types.push(dog);

        let turtle = export_turtle(&result, "http://example.org/demo#");
        assert!(turtle.contains(":Dog a owl:Class ;\n    rdfs:subClassOf :Animal ."));
    }

    #[test]
    fn exports_object_property_for_relationship_type() {
        let mut result = ConversionResult::new();
        result.entity_types.push(EntityType::new("1", "Person"));
        result.entity_types.push(EntityType::new("2", "Company"));
        result.relationship_types.push(RelationshipType {
            id: "worksFor".to_string(),
            name: "worksFor".to_string(),
            source: RelationshipEnd { entity_type_id: "1".to_string() },
            target: RelationshipEnd { entity_type_id: "2".to_string() },
            namespace: NamespaceInfo::default(),
            was_inferred: false,
        });

        let turtle = export_turtle(&result, "");
        assert!(turtle.contains(":worksFor a owl:ObjectProperty"));
        assert!(turtle.contains("rdfs:domain :Person"));
        assert!(turtle.contains("rdfs:range :Company"));
    }
}
