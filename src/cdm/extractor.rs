//! CDM entity/relationship extraction into the intermediate model (§4.G).

use std::collections::HashMap;

use crate::cdm::parser::{CdmAttribute, CdmEntityDefinition, CdmEntitySchema};
use crate::model::{
    ConversionResult, ConversionWarning, EntityType, EntityTypeProperty, NamespaceInfo,
    RelationshipEnd, RelationshipType, WarningSeverity,
};
use crate::typemap::map_cdm_type;

#[derive(Debug, Clone, Default)]
pub struct CdmExtractOptions {
    /// Inline ancestor attributes into children, child overrides by name (§4.G).
    pub flatten_inheritance: bool,
}

fn entity_id(entity_name: &str) -> String {
    entity_name.to_string()
}

fn scalar_properties(attributes: &[CdmAttribute], entity_name: &str, warnings: &mut Vec<ConversionWarning>) -> Vec<EntityTypeProperty> {
    attributes
        .iter()
        .filter(|a| !a.is_entity_reference())
        .map(|a| {
            let data_type = a.data_type.as_deref().unwrap_or("string");
            let value_type = map_cdm_type(data_type).unwrap_or_else(|| {
                warnings.push(ConversionWarning {
                    severity: WarningSeverity::ConvertedWithLimitations,
                    construct: format!("{entity_name}.{}", a.name),
                    message: format!("unrecognized CDM dataType '{data_type}'; defaulted to String"),
                    workaround: None,
                });
                crate::model::ValueType::String
            });
            EntityTypeProperty::new(format!("{entity_name}/{}", a.name), a.name.clone(), value_type)
        })
        .collect()
}

/// Extract a parsed entity schema's definitions into entities and
/// entityReference-derived relationships.
pub fn extract(schema: &CdmEntitySchema, options: &CdmExtractOptions) -> ConversionResult {
    let mut result = ConversionResult::new();
    let by_name: HashMap<String, &CdmEntityDefinition> =
        schema.definitions.iter().map(|d| (d.entity_name.clone(), d)).collect();

    for definition in &schema.definitions {
        let mut entity = EntityType::new(entity_id(&definition.entity_name), definition.entity_name.clone());
        entity.namespace = NamespaceInfo::default();

        let mut attributes = definition.attributes.clone();
        if options.flatten_inheritance {
            if let Some(parent_name) = &definition.extends_entity {
                if let Some(parent) = by_name.get(parent_name) {
                    let mut inherited: Vec<CdmAttribute> = parent.attributes.clone();
                    let own_names: std::collections::HashSet<&str> =
                        attributes.iter().map(|a| a.name.as_str()).collect();
                    inherited.retain(|a| !own_names.contains(a.name.as_str()));
                    let mut merged = inherited;
                    merged.extend(attributes);
                    attributes = merged;
                }
            }
        } else {
            entity.base_entity_type_id = definition
                .extends_entity
                .as_ref()
                .filter(|p| by_name.contains_key(p.as_str()))
                .map(|p| entity_id(p));
        }

        entity.properties = scalar_properties(&attributes, &definition.entity_name, &mut result.warnings);

        // entityIdParts/displayNamePropertyId must reference properties of
        // the types those invariants allow (§3, §4.J); an attribute whose
        // mapped type doesn't qualify is not selected, even if it carries
        // the identity/name trait.
        let property_value_type = |attr_name: &str| {
            entity
                .find_property(&format!("{}/{attr_name}", definition.entity_name))
                .map(|p| p.value_type)
        };

        if let Some(pk) = attributes.iter().find(|a| {
            a.is_primary_key()
                && !a.is_entity_reference()
                && property_value_type(&a.name).is_some_and(|t| t.is_key_eligible())
        }) {
            entity.entity_id_parts = vec![format!("{}/{}", definition.entity_name, pk.name)];
        }

        if let Some(display) = attributes.iter().find(|a| {
            a.is_display_name()
                && !a.is_entity_reference()
                && property_value_type(&a.name) == Some(crate::model::ValueType::String)
        }) {
            entity.display_name_property_id = Some(format!("{}/{}", definition.entity_name, display.name));
        } else if let Some(id_part) = entity.entity_id_parts.first() {
            if entity.find_property(id_part).map(|p| p.value_type) == Some(crate::model::ValueType::String) {
                entity.display_name_property_id = Some(id_part.clone());
            }
        }

        for reference in attributes.iter().filter(|a| a.is_entity_reference()) {
            let target = reference
                .entity_reference
                .as_ref()
                .and_then(|v| v.get("entityReference"))
                .and_then(|v| v.as_str())
                .unwrap_or(&reference.name)
                .to_string();

            let name = reference
                .relationship_verb_phrase()
                .unwrap_or_else(|| format!("{}_to_{}", definition.entity_name, target));

            result.relationship_types.push(RelationshipType {
                id: format!("{}/{}", definition.entity_name, reference.name),
                name,
                source: RelationshipEnd { entity_type_id: entity_id(&definition.entity_name) },
                target: RelationshipEnd { entity_type_id: entity_id(&target) },
                namespace: NamespaceInfo::default(),
                was_inferred: false,
            });

            result.warnings.push(ConversionWarning {
                severity: WarningSeverity::ConvertedWithLimitations,
                construct: format!("{}.{}", definition.entity_name, reference.name),
                message: format!(
                    "entityReference attribute '{}' promoted to a relationship per CDM semantics",
                    reference.name
                ),
                workaround: None,
            });
        }

        result.entity_types.push(entity);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema_from(value: serde_json::Value) -> CdmEntitySchema {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn primary_key_attribute_populates_entity_id_parts() {
        let schema = schema_from(json!({
            "definitions": [{
                "entityName": "Customer",
                "attributes": [
                    {"name": "customerId", "dataType": "string", "purpose": "identifiedBy"},
                    {"name": "fullName", "dataType": "string", "purpose": "namedBy"}
                ]
            }]
        }));

        let result = extract(&schema, &CdmExtractOptions::default());
        let customer = &result.entity_types[0];
        assert_eq!(customer.entity_id_parts, vec!["Customer/customerId".to_string()]);
        assert_eq!(customer.display_name_property_id, Some("Customer/fullName".to_string()));
    }

    #[test]
    fn non_key_eligible_primary_key_attribute_is_not_selected() {
        let schema = schema_from(json!({
            "definitions": [{
                "entityName": "Reading",
                "attributes": [
                    {"name": "measuredValue", "dataType": "double", "purpose": "identifiedBy"}
                ]
            }]
        }));

        let result = extract(&schema, &CdmExtractOptions::default());
        let reading = &result.entity_types[0];
        assert!(reading.entity_id_parts.is_empty());
    }

    #[test]
    fn non_string_display_name_attribute_is_not_selected() {
        let schema = schema_from(json!({
            "definitions": [{
                "entityName": "Account",
                "attributes": [
                    {"name": "accountId", "dataType": "string", "purpose": "identifiedBy"},
                    {"name": "balance", "dataType": "decimal", "purpose": "namedBy"}
                ]
            }]
        }));

        let result = extract(&schema, &CdmExtractOptions::default());
        let account = &result.entity_types[0];
        // falls back to the String id property since the namedBy attribute isn't String
        assert_eq!(account.display_name_property_id, Some("Account/accountId".to_string()));
    }

    #[test]
    fn entity_reference_becomes_relationship_with_default_name() {
        let schema = schema_from(json!({
            "definitions": [{
                "entityName": "Order",
                "attributes": [
                    {"name": "placedBy", "entity": {"entityReference": "Customer"}}
                ]
            }]
        }));

        let result = extract(&schema, &CdmExtractOptions::default());
        assert!(result.entity_types[0].properties.is_empty());
        assert_eq!(result.relationship_types.len(), 1);
        assert_eq!(result.relationship_types[0].name, "Order_to_Customer");
    }

    #[test]
    fn flatten_inheritance_inlines_parent_attributes() {
        let schema = schema_from(json!({
            "definitions": [
                {
                    "entityName": "Animal",
                    "attributes": [{"name": "species", "dataType": "string"}]
                },
                {
                    "entityName": "Dog",
                    "extendsEntity": "Animal",
                    "attributes": [{"name": "breed", "dataType": "string"}]
                }
            ]
        }));

        let result = extract(&schema, &CdmExtractOptions { flatten_inheritance: true });
        let dog = result.entity_types.iter().find(|e| e.name == "Dog").unwrap();
        assert_eq!(dog.properties.len(), 2);
        assert!(dog.base_entity_type_id.is_none());
    }
}
