//! Fabric quota enforcement and definition validation (§4.J).

use crate::error::LimitError;
use crate::model::{ConversionResult, ConversionWarning, ValueType, WarningSeverity};

const MAX_NAME_LENGTH: usize = 256;
const MAX_PROPERTIES_PER_ENTITY: usize = 100;
const MAX_ENTITY_TYPES: usize = 1000;
const MAX_RELATIONSHIP_TYPES: usize = 500;
const MAX_ENTITY_ID_PARTS: usize = 10;
const MAX_DEFINITION_SIZE_BYTES: usize = 1024 * 1024;
const DEFINITION_WARN_THRESHOLD_BYTES: usize = 800 * 1024;
const QUOTA_WARN_FRACTION: f64 = 0.9;

fn quota_warning(what: &str, actual: usize, limit: usize) -> Option<ConversionWarning> {
    if limit == 0 {
        return None;
    }
    let ratio = actual as f64 / limit as f64;
    if ratio >= QUOTA_WARN_FRACTION && ratio < 1.0 {
        Some(ConversionWarning {
            severity: WarningSeverity::ConvertedWithLimitations,
            construct: what.to_string(),
            message: format!("{what} at {actual}/{limit} ({:.0}% of quota)", ratio * 100.0),
            workaround: Some("reduce the number of items or split the ontology".to_string()),
        })
    } else {
        None
    }
}

/// Enforce count/length/size quotas. Returns warnings for items crossing 90%
/// of a quota; returns `Err` for anything at or past 100%, unless `force`.
pub fn check_quotas(
    result: &ConversionResult,
    definition_size_bytes: usize,
    force: bool,
) -> Result<Vec<ConversionWarning>, LimitError> {
    let mut warnings = Vec::new();

    if result.entity_types.len() > MAX_ENTITY_TYPES && !force {
        return Err(LimitError::CountExceeded {
            what: "entity types",
            actual: result.entity_types.len(),
            limit: MAX_ENTITY_TYPES,
        });
    }
    if let Some(w) = quota_warning("entity type count", result.entity_types.len(), MAX_ENTITY_TYPES) {
        warnings.push(w);
    }

    if result.relationship_types.len() > MAX_RELATIONSHIP_TYPES && !force {
        return Err(LimitError::CountExceeded {
            what: "relationship types",
            actual: result.relationship_types.len(),
            limit: MAX_RELATIONSHIP_TYPES,
        });
    }
    if let Some(w) = quota_warning(
        "relationship type count",
        result.relationship_types.len(),
        MAX_RELATIONSHIP_TYPES,
    ) {
        warnings.push(w);
    }

    for entity in &result.entity_types {
        if entity.name.len() > MAX_NAME_LENGTH && !force {
            return Err(LimitError::NameTooLong {
                what: "entity type name",
                name: entity.name.clone(),
                actual: entity.name.len(),
                limit: MAX_NAME_LENGTH,
            });
        }

        let property_count = entity.properties.len() + entity.timeseries_properties.len();
        if property_count > MAX_PROPERTIES_PER_ENTITY && !force {
            return Err(LimitError::CountExceeded {
                what: "properties per entity",
                actual: property_count,
                limit: MAX_PROPERTIES_PER_ENTITY,
            });
        }
        if let Some(w) = quota_warning(
            &format!("properties on '{}'", entity.name),
            property_count,
            MAX_PROPERTIES_PER_ENTITY,
        ) {
            warnings.push(w);
        }

        if entity.entity_id_parts.len() > MAX_ENTITY_ID_PARTS && !force {
            return Err(LimitError::CountExceeded {
                what: "entityIdParts",
                actual: entity.entity_id_parts.len(),
                limit: MAX_ENTITY_ID_PARTS,
            });
        }

        for property in entity.all_properties() {
            if property.name.len() > MAX_NAME_LENGTH && !force {
                return Err(LimitError::NameTooLong {
                    what: "property name",
                    name: property.name.clone(),
                    actual: property.name.len(),
                    limit: MAX_NAME_LENGTH,
                });
            }
        }
    }

    for relationship in &result.relationship_types {
        if relationship.name.len() > MAX_NAME_LENGTH && !force {
            return Err(LimitError::NameTooLong {
                what: "relationship name",
                name: relationship.name.clone(),
                actual: relationship.name.len(),
                limit: MAX_NAME_LENGTH,
            });
        }
    }

    if definition_size_bytes > MAX_DEFINITION_SIZE_BYTES && !force {
        return Err(LimitError::SizeExceeded {
            actual: definition_size_bytes,
            limit: MAX_DEFINITION_SIZE_BYTES,
        });
    }
    if definition_size_bytes >= DEFINITION_WARN_THRESHOLD_BYTES {
        warnings.push(ConversionWarning {
            severity: WarningSeverity::ConvertedWithLimitations,
            construct: "definition size".to_string(),
            message: format!(
                "definition is {definition_size_bytes} bytes, past the {DEFINITION_WARN_THRESHOLD_BYTES}-byte warning threshold"
            ),
            workaround: Some("split the ontology into multiple bundles".to_string()),
        });
    }

    Ok(warnings)
}

/// Cross-reference validation independent of quotas: every reference must
/// resolve within the bundle, and no entity may inherit from itself (§4.J).
pub fn validate_definition(result: &ConversionResult) -> Result<Vec<ConversionWarning>, LimitError> {
    let mut warnings = Vec::new();
    let entities = result.entities_by_id();

    for entity in &result.entity_types {
        if let Some(base_id) = &entity.base_entity_type_id {
            if base_id == &entity.id {
                return Err(LimitError::SelfInheritance(entity.id.clone()));
            }
            if !entities.contains_key(base_id.as_str()) {
                return Err(LimitError::DanglingReference {
                    what: "baseEntityTypeId",
                    id: base_id.clone(),
                });
            }
        }

        if let Some(display_id) = &entity.display_name_property_id {
            match entity.find_property(display_id) {
                None => {
                    return Err(LimitError::DanglingReference {
                        what: "displayNamePropertyId",
                        id: display_id.clone(),
                    });
                }
                Some(property) if property.value_type != ValueType::String => {
                    return Err(LimitError::InvalidValueType {
                        what: "displayNamePropertyId",
                        id: display_id.clone(),
                        value_type: property.value_type,
                    });
                }
                Some(_) => {}
            }
        }

        for part_id in &entity.entity_id_parts {
            match entity.find_property(part_id) {
                None => {
                    return Err(LimitError::DanglingReference {
                        what: "entityIdParts",
                        id: part_id.clone(),
                    });
                }
                Some(property) if !property.value_type.is_key_eligible() => {
                    return Err(LimitError::InvalidValueType {
                        what: "entityIdParts",
                        id: part_id.clone(),
                        value_type: property.value_type,
                    });
                }
                Some(_) => {}
            }
        }
    }

    for relationship in &result.relationship_types {
        if !entities.contains_key(relationship.source.entity_type_id.as_str()) {
            return Err(LimitError::DanglingReference {
                what: "relationship source",
                id: relationship.source.entity_type_id.clone(),
            });
        }
        if !entities.contains_key(relationship.target.entity_type_id.as_str()) {
            return Err(LimitError::DanglingReference {
                what: "relationship target",
                id: relationship.target.entity_type_id.clone(),
            });
        }
        if relationship.source.entity_type_id == relationship.target.entity_type_id {
            warnings.push(ConversionWarning {
                severity: WarningSeverity::ConvertedWithLimitations,
                construct: relationship.name.clone(),
                message: format!("relationship '{}' is self-referential", relationship.name),
                workaround: None,
            });
        }
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityType, EntityTypeProperty, RelationshipEnd, RelationshipType, ValueType};

    #[test]
    fn rejects_self_inheritance() {
        let mut result = ConversionResult::new();
        let mut entity = EntityType::new("1", "Loop");
        entity.base_entity_type_id = Some("1".to_string());
        result.entity_types.push(entity);

        let err = validate_definition(&result).unwrap_err();
        assert!(matches!(err, LimitError::SelfInheritance(_)));
    }

    #[test]
    fn rejects_entity_id_part_referencing_non_key_eligible_property() {
        let mut result = ConversionResult::new();
        let mut entity = EntityType::new("1", "Reading");
        entity.properties.push(EntityTypeProperty::new("1/value", "value", ValueType::Double));
        entity.entity_id_parts = vec!["1/value".to_string()];
        result.entity_types.push(entity);

        let err = validate_definition(&result).unwrap_err();
        assert!(matches!(err, LimitError::InvalidValueType { what: "entityIdParts", .. }));
    }

    #[test]
    fn rejects_display_name_property_that_is_not_string() {
        let mut result = ConversionResult::new();
        let mut entity = EntityType::new("1", "Reading");
        entity.properties.push(EntityTypeProperty::new("1/count", "count", ValueType::BigInt));
        entity.display_name_property_id = Some("1/count".to_string());
        result.entity_types.push(entity);

        let err = validate_definition(&result).unwrap_err();
        assert!(matches!(err, LimitError::InvalidValueType { what: "displayNamePropertyId", .. }));
    }

    #[test]
    fn rejects_dangling_display_name_property() {
        let mut result = ConversionResult::new();
        let mut entity = EntityType::new("1", "Person");
        entity.display_name_property_id = Some("missing".to_string());
        result.entity_types.push(entity);

        let err = validate_definition(&result).unwrap_err();
        assert!(matches!(err, LimitError::DanglingReference { .. }));
    }

    #[test]
    fn self_referential_relationship_warns_but_passes() {
        let mut result = ConversionResult::new();
        result.entity_types.push(EntityType::new("1", "Person"));
        result.relationship_types.push(RelationshipType {
            id: "r1".to_string(),
            name: "knows".to_string(),
            source: RelationshipEnd { entity_type_id: "1".to_string() },
            target: RelationshipEnd { entity_type_id: "1".to_string() },
            namespace: Default::default(),
            was_inferred: false,
        });

        let warnings = validate_definition(&result).unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn entity_count_over_limit_rejected_without_force() {
        let mut result = ConversionResult::new();
        for i in 0..(MAX_ENTITY_TYPES + 1) {
            result.entity_types.push(EntityType::new(i.to_string(), format!("E{i}")));
        }
        let err = check_quotas(&result, 0, false).unwrap_err();
        assert!(matches!(err, LimitError::CountExceeded { .. }));
    }

    #[test]
    fn entity_count_over_limit_allowed_with_force() {
        let mut result = ConversionResult::new();
        for i in 0..(MAX_ENTITY_TYPES + 1) {
            result.entity_types.push(EntityType::new(i.to_string(), format!("E{i}")));
        }
        assert!(check_quotas(&result, 0, true).is_ok());
    }

    #[test]
    fn properties_near_quota_warn() {
        let mut entity = EntityType::new("1", "Big");
        for i in 0..95 {
            entity
                .properties
                .push(EntityTypeProperty::new(i.to_string(), format!("p{i}"), ValueType::String));
        }
        let mut result = ConversionResult::new();
        result.entity_types.push(entity);

        let warnings = check_quotas(&result, 0, false).unwrap();
        assert!(warnings.iter().any(|w| w.construct.contains("properties on 'Big'")));
    }
}
