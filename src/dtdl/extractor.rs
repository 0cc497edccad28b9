//! Interface/content extraction into the intermediate model (§4.F).

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::Value;

use crate::dtdl::parser::{DtdlDocument, validate_dtmi};
use crate::model::{
    ConversionResult, ConversionWarning, EntityType, EntityTypeProperty, NamespaceInfo,
    RelationshipEnd, RelationshipType, SkippedItem, SkippedKind, ValueType, WarningSeverity,
};
use crate::typemap::{collapse_complex_type, map_dtdl_primitive};

const MAX_INHERITANCE_DEPTH: usize = 12;

/// How a `Component` content element is represented (§4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentMode {
    /// Inline the referenced interface's properties, prefixed `{name}_`.
    Flatten,
    /// Keep only a reference marker; the referenced interface converts separately.
    Reference,
}

/// How a `Command` content element is represented (§4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandMode {
    Skip,
    SyntheticStringProperty,
}

#[derive(Debug, Clone)]
pub struct DtdlExtractOptions {
    pub component_mode: ComponentMode,
    pub command_mode: CommandMode,
}

impl Default for DtdlExtractOptions {
    fn default() -> Self {
        Self {
            component_mode: ComponentMode::Reference,
            command_mode: CommandMode::Skip,
        }
    }
}

fn dtmi_of(body: &Value) -> Option<String> {
    body.get("@id").and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn display_name_of(body: &Value, dtmi: &str) -> String {
    body.get("displayName")
        .and_then(|v| v.as_str().map(|s| s.to_string()).or_else(|| {
            v.as_object()
                .and_then(|m| m.values().next())
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        }))
        .unwrap_or_else(|| dtmi.rsplit(':').next().unwrap_or(dtmi).split(';').next().unwrap_or(dtmi).to_string())
}

fn extends_list(body: &Value) -> Vec<String> {
    match body.get("extends") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect(),
        _ => Vec::new(),
    }
}

fn contents_of(body: &Value) -> Vec<Value> {
    match body.get("contents") {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

fn content_type(content: &Value) -> String {
    match content.get("@type") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str()).next().unwrap_or("").to_string(),
        _ => String::new(),
    }
}

fn schema_value_type(schema: &Value, construct_name: &str, warnings: &mut Vec<ConversionWarning>) -> ValueType {
    match schema {
        Value::String(s) => {
            let (mapped, warning) = map_dtdl_primitive(s);
            if let Some(w) = warning {
                warnings.push(w);
            }
            mapped.unwrap_or(ValueType::String)
        }
        Value::Object(map) => {
            let kind = map
                .get("@type")
                .and_then(|v| v.as_str())
                .unwrap_or("Object");
            warnings.push(collapse_complex_type(construct_name, kind));
            ValueType::String
        }
        _ => ValueType::String,
    }
}

/// Extract a single interface's own properties/telemetry/relationships,
/// without yet resolving inheritance or name conflicts across ancestors.
fn extract_interface(
    doc: &DtdlDocument,
    options: &DtdlExtractOptions,
    result: &mut ConversionResult,
    pending_components: &mut Vec<(String, String, String)>,
) -> Option<EntityType> {
    let dtmi = dtmi_of(&doc.body)?;
    if validate_dtmi(&dtmi, true).is_err() {
        result.skipped_items.push(SkippedItem::new(
            SkippedKind::Interface,
            dtmi.clone(),
            "malformed DTMI",
            Some(dtmi),
        ));
        return None;
    }

    let display_name = display_name_of(&doc.body, &dtmi);
    let mut entity = EntityType::new(dtmi.clone(), display_name);
    entity.namespace = NamespaceInfo::default();

    for content in contents_of(&doc.body) {
        let kind = content_type(&content);
        let name = content
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("unnamed")
            .to_string();

        match kind.as_str() {
            "Property" => {
                let schema = content.get("schema").cloned().unwrap_or(Value::String("string".to_string()));
                let value_type = schema_value_type(&schema, &name, &mut result.warnings);
                entity.properties.push(EntityTypeProperty::new(format!("{dtmi}/{name}"), name, value_type));
            }
            "Telemetry" => {
                let schema = content.get("schema").cloned().unwrap_or(Value::String("string".to_string()));
                let value_type = schema_value_type(&schema, &name, &mut result.warnings);
                entity
                    .timeseries_properties
                    .push(EntityTypeProperty::new(format!("{dtmi}/{name}"), name, value_type));
            }
            "Relationship" => {
                let max_multiplicity = content.get("maxMultiplicity").and_then(|v| v.as_u64());
                if max_multiplicity == Some(0) {
                    result.skipped_items.push(SkippedItem::new(
                        SkippedKind::Relationship,
                        name,
                        "maxMultiplicity must be >= 1",
                        Some(dtmi.clone()),
                    ));
                    continue;
                }
                match content.get("target").and_then(|v| v.as_str()) {
                    Some(target) => {
                        result.relationship_types.push(RelationshipType {
                            id: format!("{dtmi}/{name}"),
                            name,
                            source: RelationshipEnd { entity_type_id: dtmi.clone() },
                            target: RelationshipEnd { entity_type_id: target.to_string() },
                            namespace: NamespaceInfo::default(),
                            was_inferred: false,
                        });
                    }
                    None => {
                        result.skipped_items.push(SkippedItem::new(
                            SkippedKind::Relationship,
                            name,
                            "relationship has no target",
                            Some(dtmi.clone()),
                        ));
                    }
                }
            }
            "Component" => match options.component_mode {
                ComponentMode::Flatten => {
                    // The referenced interface may not be parsed yet, so
                    // flattening itself happens in a later pass once every
                    // interface in this conversion is known.
                    match content.get("schema").and_then(|v| v.as_str()) {
                        Some(target) => pending_components.push((dtmi.clone(), name, target.to_string())),
                        None => {
                            result.skipped_items.push(SkippedItem::new(
                                SkippedKind::Component,
                                name,
                                "component has no schema to flatten",
                                Some(dtmi.clone()),
                            ));
                        }
                    }
                }
                ComponentMode::Reference => {
                    result.skipped_items.push(SkippedItem::new(
                        SkippedKind::Component,
                        name,
                        "represented by reference, not flattened",
                        Some(dtmi.clone()),
                    ));
                }
            },
            "Command" => match options.command_mode {
                CommandMode::Skip => {
                    result.skipped_items.push(SkippedItem::new(
                        SkippedKind::Command,
                        name,
                        "commands are not convertible",
                        Some(dtmi.clone()),
                    ));
                }
                CommandMode::SyntheticStringProperty => {
                    entity.properties.push(EntityTypeProperty::new(
                        format!("{dtmi}/command_{name}"),
                        format!("command_{name}"),
                        ValueType::String,
                    ));
                }
            },
            other => {
                result.skipped_items.push(SkippedItem::new(
                    SkippedKind::Attribute,
                    name,
                    format!("unsupported content kind '{other}'"),
                    Some(dtmi.clone()),
                ));
            }
        }
    }

    Some(entity)
}

/// Resolve single-parent inheritance, enforcing the depth cap and applying
/// name-conflict suffixing across the ancestor chain (§4.F).
fn wire_inheritance(
    entities: &mut HashMap<String, EntityType>,
    extends: &HashMap<String, Vec<String>>,
    warnings: &mut Vec<ConversionWarning>,
) {
    let mut base_of: HashMap<String, String> = HashMap::new();

    for (dtmi, parents) in extends {
        if parents.is_empty() {
            continue;
        }
        let chosen = &parents[0];
        if parents.len() > 1 {
            warnings.push(ConversionWarning {
                severity: WarningSeverity::ConvertedWithLimitations,
                construct: dtmi.clone(),
                message: format!("'{dtmi}' extends {} interfaces; only the first is kept", parents.len()),
                workaround: Some("model additional parents as relationships".to_string()),
            });
        }
        if entities.contains_key(chosen) {
            base_of.insert(dtmi.clone(), chosen.clone());
        } else {
            warnings.push(ConversionWarning {
                severity: WarningSeverity::ConvertedWithLimitations,
                construct: dtmi.clone(),
                message: format!("'{dtmi}' extends '{chosen}', which is outside the loaded set"),
                workaround: Some("load the parent interface in the same conversion".to_string()),
            });
        }
    }

    for (dtmi, _) in extends.iter() {
        let mut depth = 0;
        let mut current = dtmi.clone();
        let mut chain = Vec::new();
        while let Some(parent) = base_of.get(&current) {
            depth += 1;
            chain.push(current.clone());
            if depth > MAX_INHERITANCE_DEPTH || chain.contains(parent) {
                warnings.push(ConversionWarning {
                    severity: WarningSeverity::Lost,
                    construct: dtmi.clone(),
                    message: format!(
                        "'{dtmi}' inheritance chain exceeds the maximum depth of {MAX_INHERITANCE_DEPTH} or is cyclic"
                    ),
                    workaround: Some("flatten or shorten the extends chain".to_string()),
                });
                base_of.remove(dtmi);
                break;
            }
            current = parent.clone();
        }
    }

    for (dtmi, parent) in &base_of {
        if let Some(entity) = entities.get_mut(dtmi) {
            entity.base_entity_type_id = Some(parent.clone());
        }
    }

    // Name-conflict resolution: suffix a property that collides in name with
    // an ancestor's but differs in Fabric type.
    let dtmis: Vec<String> = entities.keys().cloned().collect();
    for dtmi in dtmis {
        let mut ancestor_types: HashMap<String, ValueType> = HashMap::new();
        let mut ancestor = base_of.get(&dtmi).cloned();
        while let Some(current) = ancestor {
            if let Some(parent_entity) = entities.get(&current) {
                for prop in parent_entity.all_properties() {
                    ancestor_types.entry(prop.name.clone()).or_insert(prop.value_type);
                }
            }
            ancestor = base_of.get(&current).cloned();
        }

        if let Some(entity) = entities.get_mut(&dtmi) {
            for prop in entity.properties.iter_mut().chain(entity.timeseries_properties.iter_mut()) {
                if let Some(ancestor_type) = ancestor_types.get(&prop.name) {
                    if *ancestor_type != prop.value_type {
                        let suffix = prop.value_type.as_str().to_lowercase();
                        warnings.push(ConversionWarning {
                            severity: WarningSeverity::ConvertedWithLimitations,
                            construct: prop.name.clone(),
                            message: format!(
                                "property '{}' on '{dtmi}' conflicts in type with an ancestor; renamed to '{}_{suffix}'",
                                prop.name, prop.name
                            ),
                            workaround: None,
                        });
                        prop.name = format!("{}_{suffix}", prop.name);
                    }
                }
            }
        }
    }
}

/// Inline each pending `Component`'s referenced interface properties into the
/// owning entity, each renamed `{component_name}_{property_name}` (§4.F).
/// Runs after inheritance wiring so an interface's own ancestor-derived
/// properties are available to flatten too.
fn flatten_components(
    entities: &mut HashMap<String, EntityType>,
    pending: &[(String, String, String)],
    skipped_items: &mut Vec<SkippedItem>,
) {
    for (owner_dtmi, component_name, target_dtmi) in pending {
        let Some(target_properties) = entities
            .get(target_dtmi)
            .map(|target| target.all_properties().cloned().collect::<Vec<_>>())
        else {
            skipped_items.push(SkippedItem::new(
                SkippedKind::Component,
                component_name.clone(),
                format!("referenced interface '{target_dtmi}' is outside the loaded set; component not flattened"),
                Some(owner_dtmi.clone()),
            ));
            continue;
        };

        if let Some(owner) = entities.get_mut(owner_dtmi) {
            for prop in target_properties {
                let flattened_name = format!("{component_name}_{}", prop.name);
                let flattened_id = format!("{owner_dtmi}/{flattened_name}");
                owner.properties.push(EntityTypeProperty::new(flattened_id, flattened_name, prop.value_type));
            }
        }
    }
}

/// Kahn's-algorithm topological sort over `extends`, parents before children.
fn topological_order(entities: &HashMap<String, EntityType>) -> Vec<String> {
    let mut in_degree: HashMap<String, usize> = entities.keys().map(|k| (k.clone(), 0)).collect();
    let mut children: HashMap<String, Vec<String>> = HashMap::new();

    for (dtmi, entity) in entities {
        if let Some(parent) = &entity.base_entity_type_id {
            if entities.contains_key(parent) {
                *in_degree.get_mut(dtmi).unwrap() += 1;
                children.entry(parent.clone()).or_default().push(dtmi.clone());
            }
        }
    }

    let mut roots: Vec<String> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(k, _)| k.clone())
        .collect();
    roots.sort();
    let mut queue: VecDeque<String> = roots.into();
    let mut ordered = Vec::new();

    while let Some(dtmi) = queue.pop_front() {
        ordered.push(dtmi.clone());
        if let Some(kids) = children.get(&dtmi) {
            let mut ready = Vec::new();
            for kid in kids {
                let degree = in_degree.get_mut(kid).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    ready.push(kid.clone());
                }
            }
            ready.sort();
            for kid in ready {
                queue.push_back(kid);
            }
        }
    }

    ordered
}

/// Extract every interface in `documents` into entities/relationships,
/// wiring inheritance and emitting them in topological order.
pub fn extract(documents: &[DtdlDocument], options: &DtdlExtractOptions) -> ConversionResult {
    let mut result = ConversionResult::new();
    let mut entities: HashMap<String, EntityType> = HashMap::new();
    let mut extends: HashMap<String, Vec<String>> = HashMap::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut pending_components: Vec<(String, String, String)> = Vec::new();

    for doc in documents {
        if content_type(&doc.body) != "Interface" {
            continue;
        }
        let parents = extends_list(&doc.body);
        if let Some(entity) = extract_interface(doc, options, &mut result, &mut pending_components) {
            if !seen.insert(entity.id.clone()) {
                continue;
            }
            extends.insert(entity.id.clone(), parents);
            entities.insert(entity.id.clone(), entity);
        }
    }

    wire_inheritance(&mut entities, &extends, &mut result.warnings);
    flatten_components(&mut entities, &pending_components, &mut result.skipped_items);

    let order = topological_order(&entities);
    for dtmi in order {
        if let Some(entity) = entities.remove(&dtmi) {
            result.entity_types.push(entity);
        }
    }

    result
}
