//! `compare_ontologies` (§8): reports set differences between two converted
//! ontologies by entity-type name, property name, and relationship name.
//! Fabric's model carries no original source IRI, so identity is the
//! sanitized name the converter assigned, consistent with the round-trip
//! guarantee in §8 ("names may be sanitized").

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::ConversionResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetDiff {
    pub only_in_left: Vec<String>,
    pub only_in_right: Vec<String>,
    pub common: Vec<String>,
}

impl SetDiff {
    fn compute(left: &BTreeSet<String>, right: &BTreeSet<String>) -> Self {
        Self {
            only_in_left: left.difference(right).cloned().collect(),
            only_in_right: right.difference(left).cloned().collect(),
            common: left.intersection(right).cloned().collect(),
        }
    }

    pub fn is_identical(&self) -> bool {
        self.only_in_left.is_empty() && self.only_in_right.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OntologyComparison {
    pub entity_types: SetDiff,
    pub properties: SetDiff,
    pub relationship_types: SetDiff,
}

impl OntologyComparison {
    pub fn is_identical(&self) -> bool {
        self.entity_types.is_identical() && self.properties.is_identical() && self.relationship_types.is_identical()
    }
}

fn entity_names(result: &ConversionResult) -> BTreeSet<String> {
    result.entity_types.iter().map(|e| e.name.clone()).collect()
}

fn property_names(result: &ConversionResult) -> BTreeSet<String> {
    result
        .entity_types
        .iter()
        .flat_map(|e| e.all_properties().map(|p| format!("{}.{}", e.name, p.name)))
        .collect()
}

fn relationship_names(result: &ConversionResult) -> BTreeSet<String> {
    result.relationship_types.iter().map(|r| r.name.clone()).collect()
}

/// Compare two converted ontologies, typically a source-derived result and
/// the same result round-tripped through `export_turtle` and back.
pub fn compare_ontologies(left: &ConversionResult, right: &ConversionResult) -> OntologyComparison {
    OntologyComparison {
        entity_types: SetDiff::compute(&entity_names(left), &entity_names(right)),
        properties: SetDiff::compute(&property_names(left), &property_names(right)),
        relationship_types: SetDiff::compute(&relationship_names(left), &relationship_names(right)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityType, EntityTypeProperty, ValueType};

    #[test]
    fn identical_results_compare_equal() {
        let mut result = ConversionResult::new();
        let mut person = EntityType::new("1", "Person");
        person.properties.push(EntityTypeProperty::new("1/name", "name", ValueType::String));
        result.entity_types.push(person);

        let comparison = compare_ontologies(&result, &result.clone());
        assert!(comparison.is_identical());
    }

    #[test]
    fn reports_entities_missing_on_one_side() {
        let mut left = ConversionResult::new();
        left.entity_types.push(EntityType::new("1", "Person"));
        left.entity_types.push(EntityType::new("2", "Company"));

        let mut right = ConversionResult::new();
        right.entity_types.push(EntityType::new("1", "Person"));

        let comparison = compare_ontologies(&left, &right);
        assert!(!comparison.is_identical());
        assert_eq!(comparison.entity_types.only_in_left, vec!["Company".to_string()]);
        assert!(comparison.entity_types.only_in_right.is_empty());
    }
}
