//! Bundle serialization (§4.K): turns a `ConversionResult` into the ordered,
//! base64-encoded `parts` array the Fabric API expects.

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::json;

use crate::model::{Bundle, BundlePart, ConversionResult, EntityType};

/// Order entity types so a parent's part always precedes its children's,
/// via Kahn's algorithm over the `base_entity_type_id` edges. Ties are
/// broken by entity ID so the order is deterministic across runs.
fn topological_order(entities: &[EntityType]) -> Vec<&EntityType> {
    let by_id: HashMap<&str, &EntityType> = entities.iter().map(|e| (e.id.as_str(), e)).collect();

    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut indegree: HashMap<&str, usize> = entities.iter().map(|e| (e.id.as_str(), 0)).collect();

    for entity in entities {
        if let Some(parent_id) = entity.base_entity_type_id.as_deref() {
            if by_id.contains_key(parent_id) {
                children.entry(parent_id).or_default().push(entity.id.as_str());
                *indegree.get_mut(entity.id.as_str()).unwrap() += 1;
            }
        }
    }

    let mut roots: Vec<&str> = indegree.iter().filter(|(_, &deg)| deg == 0).map(|(id, _)| *id).collect();
    roots.sort_unstable();
    let mut queue: VecDeque<&str> = roots.into();

    let mut order = Vec::with_capacity(entities.len());
    let mut visited = HashSet::new();

    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        order.push(by_id[id]);

        if let Some(kids) = children.get(id) {
            let mut sorted_kids = kids.clone();
            sorted_kids.sort_unstable();
            for kid in sorted_kids {
                let deg = indegree.get_mut(kid).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(kid);
                }
            }
        }
    }

    // Any entity not reached (cyclic or orphaned base reference) is still
    // emitted, in ID order, so the bundle stays complete even if the
    // extractor failed to fully resolve inheritance.
    if order.len() < entities.len() {
        let mut leftover: Vec<&EntityType> = entities.iter().filter(|e| !visited.contains(e.id.as_str())).collect();
        leftover.sort_by(|a, b| a.id.cmp(&b.id));
        order.extend(leftover);
    }

    order
}

/// Build the `.platform` metadata part.
fn platform_part(display_name: &str, description: &str) -> BundlePart {
    let metadata = json!({
        "metadata": {
            "type": "Ontology",
            "displayName": display_name,
            "description": description,
        }
    });
    BundlePart::from_json_bytes(".platform", metadata.to_string().as_bytes())
}

/// Serialize a `ConversionResult` into the ordered `parts` bundle (§4.K).
pub fn serialize_bundle(result: &ConversionResult, display_name: &str, description: &str) -> Bundle {
    let mut bundle = Bundle::new();
    bundle.push(platform_part(display_name, description));
    bundle.push(BundlePart::from_json_bytes("definition.json", b"{}"));

    for entity in topological_order(&result.entity_types) {
        let payload = serde_json::to_vec(entity).expect("EntityType serializes infallibly");
        bundle.push(BundlePart::from_json_bytes(format!("EntityTypes/{}/definition.json", entity.id), &payload));
    }

    for relationship in &result.relationship_types {
        let payload = serde_json::to_vec(relationship).expect("RelationshipType serializes infallibly");
        bundle.push(BundlePart::from_json_bytes(
            format!("RelationshipTypes/{}/definition.json", relationship.id),
            &payload,
        ));
    }

    bundle
}
