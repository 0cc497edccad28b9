//! Multi-pass RDF/OWL extraction into the intermediate model (§4.E).

use std::collections::{HashMap, HashSet};

use oxigraph::model::{NamedNode, NamedOrBlankNode, Subject, Term};
use oxigraph::store::Store;

use crate::model::{
    ConversionResult, ConversionWarning, EntityType, EntityTypeProperty, NamespaceInfo,
    RelationshipEnd, RelationshipType, SkippedItem, SkippedKind, WarningSeverity,
};
use crate::rdf::ClassResolver;
use crate::typemap::{map_xsd_type, resolve_union};

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const RDFS_CLASS: &str = "http://www.w3.org/2000/01/rdf-schema#Class";
const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
const OWL_DATATYPE_PROPERTY: &str = "http://www.w3.org/2002/07/owl#DatatypeProperty";
const OWL_OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#ObjectProperty";
const RDF_PROPERTY: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#Property";
const RDFS_DOMAIN: &str = "http://www.w3.org/2000/01/rdf-schema#domain";
const RDFS_RANGE: &str = "http://www.w3.org/2000/01/rdf-schema#range";
const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
const OWL_UNION_OF: &str = "http://www.w3.org/2002/07/owl#unionOf";
const RDF_FIRST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first";
const RDF_REST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest";
const RDF_NIL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil";
const XSD_PREFIX: &str = "http://www.w3.org/2001/XMLSchema#";

fn nn(iri: &str) -> NamedNode {
    NamedNode::new_unchecked(iri)
}

fn local_name(uri: &str) -> String {
    uri.rsplit(['#', '/']).next().unwrap_or(uri).to_string()
}

fn subjects_with_type(store: &Store, type_uri: &str) -> Vec<String> {
    store
        .quads_for_pattern(None, Some((&nn(RDF_TYPE)).into()), Some((&nn(type_uri)).into()), None)
        .filter_map(|q| q.ok())
        .filter_map(|q| match q.subject {
            Subject::NamedNode(n) => Some(n.as_str().to_string()),
            _ => None,
        })
        .collect()
}

fn single_object(store: &Store, subject: &str, predicate: &str) -> Option<Term> {
    store
        .quads_for_pattern(
            Some((&nn(subject)).into()),
            Some((&nn(predicate)).into()),
            None,
            None,
        )
        .next()
        .and_then(|q| q.ok())
        .map(|q| q.object)
}

fn all_objects(store: &Store, subject: &str, predicate: &str) -> Vec<Term> {
    store
        .quads_for_pattern(
            Some((&nn(subject)).into()),
            Some((&nn(predicate)).into()),
            None,
            None,
        )
        .filter_map(|q| q.ok())
        .map(|q| q.object)
        .collect()
}

/// Run the five-phase extraction described in §4.E and converge on a
/// `ConversionResult`.
pub fn extract(store: &Store) -> ConversionResult {
    let mut result = ConversionResult::new();
    result.triple_count = store.len().unwrap_or(0) as u64;

    // Phase 1: class discovery.
    let mut class_uris: HashSet<String> = HashSet::new();
    class_uris.extend(subjects_with_type(store, OWL_CLASS));
    class_uris.extend(subjects_with_type(store, RDFS_CLASS));
    class_uris.extend(
        store
            .quads_for_pattern(None, Some((&nn(RDFS_SUBCLASS_OF)).into()), None, None)
            .filter_map(|q| q.ok())
            .filter_map(|q| match q.subject {
                Subject::NamedNode(n) => Some(n.as_str().to_string()),
                _ => None,
            }),
    );

    let mut class_uris: Vec<String> = class_uris.into_iter().collect();
    class_uris.sort();

    for uri in &class_uris {
        result
            .entity_types
            .push(EntityType::new(uri.clone(), local_name(uri)));
    }

    // Phase 2: inheritance wiring, with DFS cycle detection.
    let class_set: HashSet<String> = class_uris.iter().cloned().collect();
    let mut parent_of: HashMap<String, String> = HashMap::new();
    for uri in &class_uris {
        for object in all_objects(store, uri, RDFS_SUBCLASS_OF) {
            if let Term::NamedNode(parent) = object {
                if class_set.contains(parent.as_str()) {
                    parent_of.insert(uri.clone(), parent.as_str().to_string());
                    break;
                }
            }
        }
    }

    for uri in &class_uris {
        if has_inheritance_cycle(uri, &parent_of) {
            result.warnings.push(ConversionWarning {
                severity: WarningSeverity::Lost,
                construct: uri.clone(),
                message: format!("'{}' has a cyclic rdfs:subClassOf chain; parent dropped", local_name(uri)),
                workaround: Some("break the cycle in the source ontology".to_string()),
            });
            if let Some(parent) = parent_of.get(uri) {
                result.skipped_items.push(SkippedItem::new(
                    SkippedKind::InheritanceEdge,
                    format!("{} subClassOf {}", local_name(uri), local_name(parent)),
                    "dropped to break a cyclic rdfs:subClassOf chain",
                    Some(uri.clone()),
                ));
            }
            continue;
        }
        if let Some(parent) = parent_of.get(uri) {
            if let Some(entity) = result.entity_types.iter_mut().find(|e| &e.id == uri) {
                entity.base_entity_type_id = Some(parent.clone());
            }
        }
    }

    // Phase 3: data property extraction.
    let resolver = ClassResolver::new(store);
    let mut datatype_props: Vec<String> = subjects_with_type(store, OWL_DATATYPE_PROPERTY);
    for candidate in subjects_with_type(store, RDF_PROPERTY) {
        if let Some(Term::NamedNode(range)) = single_object(store, &candidate, RDFS_RANGE) {
            if range.as_str().starts_with(XSD_PREFIX) {
                datatype_props.push(candidate);
            }
        }
    }
    datatype_props.sort();
    datatype_props.dedup();

    for prop_uri in &datatype_props {
        let prop_name = local_name(prop_uri);
        let is_timeseries = single_object(store, prop_uri, RDFS_COMMENT)
            .map(|t| term_literal_value(&t).contains("(timeseries)"))
            .unwrap_or(false);

        let value_type = match single_object(store, prop_uri, RDFS_RANGE) {
            Some(Term::NamedNode(n)) => map_xsd_type(n.as_str()).unwrap_or(crate::model::ValueType::String),
            Some(Term::BlankNode(b)) => {
                let node = NamedOrBlankNode::BlankNode(b);
                match object_of_node(store, &node, OWL_UNION_OF) {
                    Some(list_head) => {
                        let members = rdf_list_named_nodes(store, &list_head);
                        let (resolved, warning) = resolve_union(&members);
                        if let Some(warning) = warning {
                            result.warnings.push(warning);
                        }
                        resolved
                    }
                    None => crate::model::ValueType::String,
                }
            }
            _ => crate::model::ValueType::String,
        };

        let domains = resolve_domains(store, &resolver, prop_uri);
        if domains.is_empty() {
            result.skipped_items.push(SkippedItem::new(
                SkippedKind::DataProperty,
                prop_name,
                "missing domain and/or range",
                Some(prop_uri.clone()),
            ));
            continue;
        }

        for domain_uri in domains {
            if let Some(entity) = result.entity_types.iter_mut().find(|e| e.id == domain_uri) {
                let property = EntityTypeProperty::new(prop_uri.clone(), prop_name.clone(), value_type);
                if is_timeseries {
                    entity.timeseries_properties.push(property);
                } else {
                    entity.properties.push(property);
                }
            }
        }
    }

    // Phase 4: object property extraction.
    let mut object_props: Vec<String> = subjects_with_type(store, OWL_OBJECT_PROPERTY);
    for candidate in subjects_with_type(store, RDF_PROPERTY) {
        if let Some(Term::NamedNode(range)) = single_object(store, &candidate, RDFS_RANGE) {
            if !range.as_str().starts_with(XSD_PREFIX) {
                object_props.push(candidate);
            }
        }
    }
    object_props.sort();
    object_props.dedup();

    for prop_uri in &object_props {
        let prop_name = local_name(prop_uri);
        let mut pairs: Vec<(String, String)> = Vec::new();

        let domains = resolve_domains(store, &resolver, prop_uri);
        let ranges: Vec<String> = all_objects(store, prop_uri, RDFS_RANGE)
            .into_iter()
            .flat_map(|t| match t {
                Term::NamedNode(n) => resolver.resolve(&NamedOrBlankNode::NamedNode(n)),
                Term::BlankNode(b) => resolver.resolve(&NamedOrBlankNode::BlankNode(b)),
                _ => Vec::new(),
            })
            .filter(|uri| class_set.contains(uri))
            .collect();

        if !domains.is_empty() && !ranges.is_empty() {
            for domain in &domains {
                for range in &ranges {
                    pairs.push((domain.clone(), range.clone()));
                }
            }
        } else {
            pairs = infer_domain_range_pairs(store, prop_uri, &class_set);
        }

        if pairs.is_empty() {
            result.skipped_items.push(SkippedItem::new(
                SkippedKind::ObjectProperty,
                prop_name,
                "missing domain and/or range",
                Some(prop_uri.clone()),
            ));
            continue;
        }

        pairs.sort();
        pairs.dedup();
        for (domain, range) in pairs {
            result.relationship_types.push(RelationshipType {
                id: format!("{prop_uri}#{domain}->{range}"),
                name: prop_name.clone(),
                source: RelationshipEnd { entity_type_id: domain },
                target: RelationshipEnd { entity_type_id: range },
                namespace: NamespaceInfo::default(),
                was_inferred: false,
            });
        }
    }

    // Phase 5: identifier assignment.
    for entity in &mut result.entity_types {
        assign_identifiers(entity);
    }

    result
}

fn object_of_node(store: &Store, subject: &NamedOrBlankNode, predicate: &str) -> Option<Term> {
    let subject_node: Subject = subject.clone().into();
    store
        .quads_for_pattern(Some((&subject_node).into()), Some((&nn(predicate)).into()), None, None)
        .next()
        .and_then(|q| q.ok())
        .map(|q| q.object)
}

/// Walk an `rdf:first`/`rdf:rest` list, collecting the URI of each named-node
/// member (used to read an `owl:unionOf` member list for datatype-range
/// union resolution, §4.C).
fn rdf_list_named_nodes(store: &Store, head: &Term) -> Vec<String> {
    let mut items = Vec::new();
    let mut visited = HashSet::new();
    let mut current = head.clone();
    loop {
        let node = match &current {
            Term::NamedNode(n) => NamedOrBlankNode::NamedNode(n.clone()),
            Term::BlankNode(b) => NamedOrBlankNode::BlankNode(b.clone()),
            _ => break,
        };
        if !visited.insert(node.clone()) {
            break;
        }
        if let Some(Term::NamedNode(first)) = object_of_node(store, &node, RDF_FIRST) {
            items.push(first.as_str().to_string());
        }
        match object_of_node(store, &node, RDF_REST) {
            Some(Term::NamedNode(n)) if n.as_str() == RDF_NIL => break,
            Some(next) => current = next,
            _ => break,
        }
    }
    items
}

fn term_literal_value(term: &Term) -> String {
    match term {
        Term::Literal(lit) => lit.value().to_string(),
        _ => String::new(),
    }
}

fn resolve_domains(store: &Store, resolver: &ClassResolver<'_>, prop_uri: &str) -> Vec<String> {
    all_objects(store, prop_uri, RDFS_DOMAIN)
        .into_iter()
        .flat_map(|t| match t {
            Term::NamedNode(n) => resolver.resolve(&NamedOrBlankNode::NamedNode(n)),
            Term::BlankNode(b) => resolver.resolve(&NamedOrBlankNode::BlankNode(b)),
            _ => Vec::new(),
        })
        .collect()
}

/// DFS-detect a cycle in the `parent_of` chain starting at `start`.
fn has_inheritance_cycle(start: &str, parent_of: &HashMap<String, String>) -> bool {
    let mut seen = HashSet::new();
    let mut current = start.to_string();
    loop {
        if !seen.insert(current.clone()) {
            return true;
        }
        match parent_of.get(&current) {
            Some(parent) => current = parent.clone(),
            None => return false,
        }
    }
}

/// When no explicit domain/range is declared, infer it by scanning actual
/// subject/object class usage for this predicate and picking the most common
/// type on each side (§4.E phase 4).
fn infer_domain_range_pairs(store: &Store, prop_uri: &str, class_set: &HashSet<String>) -> Vec<(String, String)> {
    let mut domain_counts: HashMap<String, usize> = HashMap::new();
    let mut range_counts: HashMap<String, usize> = HashMap::new();

    for quad in store
        .quads_for_pattern(None, Some((&nn(prop_uri)).into()), None, None)
        .filter_map(|q| q.ok())
    {
        if let Subject::NamedNode(subject) = &quad.subject {
            for t in all_objects(store, subject.as_str(), RDF_TYPE) {
                if let Term::NamedNode(class) = t {
                    if class_set.contains(class.as_str()) {
                        *domain_counts.entry(class.as_str().to_string()).or_insert(0) += 1;
                    }
                }
            }
        }
        if let Term::NamedNode(object) = &quad.object {
            for t in all_objects(store, object.as_str(), RDF_TYPE) {
                if let Term::NamedNode(class) = t {
                    if class_set.contains(class.as_str()) {
                        *range_counts.entry(class.as_str().to_string()).or_insert(0) += 1;
                    }
                }
            }
        }
    }

    let best_domain = domain_counts.into_iter().max_by_key(|(_, count)| *count).map(|(uri, _)| uri);
    let best_range = range_counts.into_iter().max_by_key(|(_, count)| *count).map(|(uri, _)| uri);

    match (best_domain, best_range) {
        (Some(d), Some(r)) => vec![(d, r)],
        _ => Vec::new(),
    }
}

/// Pick `entityIdParts`/`displayNamePropertyId` per the naming heuristic in
/// §4.E phase 5.
fn assign_identifiers(entity: &mut EntityType) {
    use crate::model::ValueType;

    let id_by_name = entity
        .properties
        .iter()
        .find(|p| p.name.to_lowercase().contains("id") && p.value_type.is_key_eligible())
        .map(|p| p.id.clone());

    let id_property = id_by_name.or_else(|| {
        entity
            .properties
            .iter()
            .find(|p| p.value_type.is_key_eligible())
            .map(|p| p.id.clone())
    });

    if let Some(id) = &id_property {
        entity.entity_id_parts = vec![id.clone()];
    }

    let name_property = entity
        .properties
        .iter()
        .find(|p| p.name.to_lowercase().contains("name") && p.value_type == ValueType::String)
        .map(|p| p.id.clone());

    entity.display_name_property_id = name_property.or(id_property);
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::io::RdfFormat;

    fn store_from_turtle(ttl: &str) -> Store {
        let store = Store::new().unwrap();
        store.load_from_reader(RdfFormat::Turtle, ttl.as_bytes()).unwrap();
        store
    }

    #[test]
    fn discovers_classes_and_subclass_relationship() {
        let ttl = r#"
            @prefix ex: <http://example.org/> .
            @prefix owl: <http://www.w3.org/2002/07/owl#> .
            @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
            ex:Animal a owl:Class .
            ex:Dog a owl:Class ; rdfs:subClassOf ex:Animal .
        "#;
        let store = store_from_turtle(ttl);
        let result = extract(&store);

        assert_eq!(result.entity_types.len(), 2);
        let dog = result.find_entity("http://example.org/Dog").unwrap();
        assert_eq!(dog.base_entity_type_id.as_deref(), Some("http://example.org/Animal"));
    }

    #[test]
    fn extracts_data_property_with_explicit_domain() {
        let ttl = r#"
            @prefix ex: <http://example.org/> .
            @prefix owl: <http://www.w3.org/2002/07/owl#> .
            @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
            @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
            ex:Person a owl:Class .
            ex:age a owl:DatatypeProperty ; rdfs:domain ex:Person ; rdfs:range xsd:integer .
        "#;
        let store = store_from_turtle(ttl);
        let result = extract(&store);

        let person = result.find_entity("http://example.org/Person").unwrap();
        assert_eq!(person.properties.len(), 1);
        assert_eq!(person.properties[0].name, "age");
    }

    #[test]
    fn skips_object_property_with_no_domain_or_range() {
        let ttl = r#"
            @prefix ex: <http://example.org/> .
            @prefix owl: <http://www.w3.org/2002/07/owl#> .
            ex:orphanProp a owl:ObjectProperty .
        "#;
        let store = store_from_turtle(ttl);
        let result = extract(&store);

        assert_eq!(result.skipped_items.len(), 1);
        assert_eq!(result.skipped_items[0].reason, "missing domain and/or range");
    }

    #[test]
    fn cyclic_subclass_chain_is_dropped_and_recorded_as_skipped() {
        let ttl = r#"
            @prefix ex: <http://example.org/> .
            @prefix owl: <http://www.w3.org/2002/07/owl#> .
            @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
            ex:A a owl:Class ; rdfs:subClassOf ex:B .
            ex:B a owl:Class ; rdfs:subClassOf ex:A .
        "#;
        let store = store_from_turtle(ttl);
        let result = extract(&store);

        assert!(result.entity_types.iter().all(|e| e.base_entity_type_id.is_none()));
        assert!(result.skipped_items.iter().any(|s| s.kind == SkippedKind::InheritanceEdge));
    }

    #[test]
    fn datatype_property_with_union_range_resolves_most_restrictive_type() {
        let ttl = r#"
            @prefix ex: <http://example.org/> .
            @prefix owl: <http://www.w3.org/2002/07/owl#> .
            @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
            @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
            ex:Person a owl:Class .
            ex:score a owl:DatatypeProperty ;
                rdfs:domain ex:Person ;
                rdfs:range [ owl:unionOf (xsd:integer xsd:string) ] .
        "#;
        let store = store_from_turtle(ttl);
        let result = extract(&store);

        let person = result.find_entity("http://example.org/Person").unwrap();
        assert_eq!(person.properties.len(), 1);
        assert_eq!(person.properties[0].value_type, crate::model::ValueType::BigInt);
    }

    #[test]
    fn assigns_id_and_display_name_properties() {
        let mut entity = EntityType::new("1", "Person");
        entity.properties.push(EntityTypeProperty::new("p1", "personId", crate::model::ValueType::String));
        entity.properties.push(EntityTypeProperty::new("p2", "fullName", crate::model::ValueType::String));
        assign_identifiers(&mut entity);

        assert_eq!(entity.entity_id_parts, vec!["p1".to_string()]);
        assert_eq!(entity.display_name_property_id, Some("p2".to_string()));
    }
}
