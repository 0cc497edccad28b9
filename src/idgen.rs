//! Identifier generation (§4.D).
//!
//! Two strategies: a monotonic counter seeded at a configurable prefix for
//! formats with no stable natural key (RDF/CDM), and a deterministic
//! DTMI-derived ID for DTDL, so re-converting the same model twice assigns
//! the same entity IDs.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::model::ConversionResult;

const ID_MODULUS: u64 = 1_000_000_000_000; // 10^12

/// Monotonic counter seeded at `prefix` (default `10^12`). Collisions within
/// a bundle are impossible because each call advances the counter.
#[derive(Debug, Clone)]
pub struct SequentialIdGenerator {
    next: u64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: u64) -> Self {
        Self { next: prefix }
    }

    pub fn next_id(&mut self) -> String {
        let id = self.next;
        self.next += 1;
        id.to_string()
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new(ID_MODULUS)
    }
}

/// Deterministic ID for a DTMI: `prefix + (sha256(canonical_dtmi)[:8] mod 10^12)`.
pub fn dtmi_derived_id(prefix: u64, canonical_dtmi: &str) -> String {
    let digest = Sha256::digest(canonical_dtmi.as_bytes());
    let mut first_eight = [0u8; 8];
    first_eight.copy_from_slice(&digest[..8]);
    let truncated = u64::from_be_bytes(first_eight);
    (prefix + (truncated % ID_MODULUS)).to_string()
}

/// Rewrite every `EntityType.id`/`RelationshipType.id` in `result` to an
/// opaque ID produced by `next_id`, and every reference to an old entity ID
/// (`baseEntityTypeId`, relationship endpoints) to match (§3, §4.D).
/// Property IDs are left untouched; nothing in the spec constrains their
/// format, and `entityIdParts`/`displayNamePropertyId`/`redefines` key off
/// them, not off entity IDs.
fn renumber(result: &mut ConversionResult, mut next_id: impl FnMut(&str) -> String) {
    let entity_map: HashMap<String, String> =
        result.entity_types.iter().map(|e| (e.id.clone(), next_id(&e.id))).collect();

    for entity in &mut result.entity_types {
        if let Some(base) = entity.base_entity_type_id.take() {
            entity.base_entity_type_id = Some(entity_map.get(&base).cloned().unwrap_or(base));
        }
        entity.id = entity_map[&entity.id].clone();
    }

    for relationship in &mut result.relationship_types {
        if let Some(mapped) = entity_map.get(&relationship.source.entity_type_id) {
            relationship.source.entity_type_id = mapped.clone();
        }
        if let Some(mapped) = entity_map.get(&relationship.target.entity_type_id) {
            relationship.target.entity_type_id = mapped.clone();
        }
        relationship.id = next_id(&relationship.id);
    }
}

/// Assign numeric IDs via a monotonic counter seeded at `prefix`, for
/// formats with no stable natural key (RDF, CDM). Entity IDs are assigned in
/// `result.entity_types` order (already deterministic per extractor), so
/// re-converting the same model assigns the same IDs.
pub fn assign_sequential_ids(result: &mut ConversionResult, prefix: u64) {
    let mut generator = SequentialIdGenerator::new(prefix);
    renumber(result, |_old_id| generator.next_id());
}

/// Assign numeric IDs derived deterministically from each construct's
/// original natural key (its canonical DTMI, or `{dtmi}/{name}` for a
/// relationship), for DTDL.
pub fn assign_dtmi_derived_ids(result: &mut ConversionResult, prefix: u64) {
    renumber(result, |old_id| dtmi_derived_id(prefix, old_id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityType, RelationshipEnd, RelationshipType};

    #[test]
    fn sequential_ids_are_unique_and_monotonic() {
        let mut gen = SequentialIdGenerator::new(10_000);
        assert_eq!(gen.next_id(), "10000");
        assert_eq!(gen.next_id(), "10001");
        assert_eq!(gen.next_id(), "10002");
    }

    #[test]
    fn dtmi_derived_id_is_deterministic() {
        let dtmi = "dtmi:com:example:Thermostat;1";
        let a = dtmi_derived_id(ID_MODULUS, dtmi);
        let b = dtmi_derived_id(ID_MODULUS, dtmi);
        assert_eq!(a, b);
    }

    #[test]
    fn dtmi_derived_id_differs_for_different_dtmis() {
        let a = dtmi_derived_id(ID_MODULUS, "dtmi:com:example:Thermostat;1");
        let b = dtmi_derived_id(ID_MODULUS, "dtmi:com:example:HumiditySensor;1");
        assert_ne!(a, b);
    }

    #[test]
    fn assign_sequential_ids_rewrites_base_and_relationship_endpoints() {
        let mut result = ConversionResult::new();
        let mut dog = EntityType::new("http://example.org/Dog", "Dog");
        dog.base_entity_type_id = Some("http://example.org/Animal".to_string());
        result.entity_types.push(EntityType::new("http://example.org/Animal", "Animal"));
        result.entity_types.push(dog);
        result.relationship_types.push(RelationshipType {
            id: "http://example.org/owns".to_string(),
            name: "owns".to_string(),
            source: RelationshipEnd { entity_type_id: "http://example.org/Dog".to_string() },
            target: RelationshipEnd { entity_type_id: "http://example.org/Animal".to_string() },
            namespace: Default::default(),
            was_inferred: false,
        });

        assign_sequential_ids(&mut result, 1_000_000_000_000);

        let animal = &result.entity_types[0];
        let dog = &result.entity_types[1];
        assert_eq!(animal.id, "1000000000000");
        assert_eq!(dog.id, "1000000000001");
        assert_eq!(dog.base_entity_type_id.as_deref(), Some("1000000000000"));

        let relationship = &result.relationship_types[0];
        assert_eq!(relationship.id, "1000000000002");
        assert_eq!(relationship.source.entity_type_id, "1000000000001");
        assert_eq!(relationship.target.entity_type_id, "1000000000000");
    }

    #[test]
    fn assign_dtmi_derived_ids_is_stable_across_conversions() {
        let mut first = ConversionResult::new();
        first.entity_types.push(EntityType::new("dtmi:com:example:Thermostat;1", "Thermostat"));
        let mut second = ConversionResult::new();
        second.entity_types.push(EntityType::new("dtmi:com:example:Thermostat;1", "Thermostat"));

        assign_dtmi_derived_ids(&mut first, ID_MODULUS);
        assign_dtmi_derived_ids(&mut second, ID_MODULUS);

        assert_eq!(first.entity_types[0].id, second.entity_types[0].id);
    }
}
