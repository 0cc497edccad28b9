//! Type mapping from source-format primitives to Fabric `ValueType` (§4.C).

use std::collections::BTreeSet;

use crate::model::{ConversionWarning, ValueType, WarningSeverity};

/// Map an XSD datatype URI or local name to a Fabric value type.
pub fn map_xsd_type(xsd_type: &str) -> Option<ValueType> {
    let local = xsd_type.rsplit(['#', '/']).next().unwrap_or(xsd_type);
    match local {
        "string" | "anyURI" | "time" | "normalizedString" | "token" | "language" => {
            Some(ValueType::String)
        }
        "integer" | "int" | "long" | "short" | "byte" | "nonNegativeInteger"
        | "nonPositiveInteger" | "negativeInteger" | "positiveInteger"
        | "unsignedLong" | "unsignedInt" | "unsignedShort" | "unsignedByte" => {
            Some(ValueType::BigInt)
        }
        "float" | "double" | "decimal" => Some(ValueType::Double),
        "boolean" => Some(ValueType::Boolean),
        "date" | "dateTime" | "dateTimeStamp" | "gYear" | "gYearMonth" | "gMonth"
        | "gMonthDay" | "gDay" => Some(ValueType::DateTime),
        _ => None,
    }
}

/// Map a DTDL primitive schema name to a Fabric value type. Returns the
/// value type plus an optional warning for schemas that lose fidelity
/// (`scaledDecimal`, geospatial schemas) per §4.C.
pub fn map_dtdl_primitive(schema: &str) -> (Option<ValueType>, Option<ConversionWarning>) {
    match schema {
        "string" | "duration" | "uri" => (Some(ValueType::String), None),
        "byte" | "short" | "integer" | "long" | "unsignedByte" | "unsignedShort"
        | "unsignedInteger" | "unsignedLong" => (Some(ValueType::BigInt), None),
        "float" | "double" | "decimal" => (Some(ValueType::Double), None),
        "boolean" => (Some(ValueType::Boolean), None),
        "date" | "dateTime" | "time" => (Some(ValueType::DateTime), None),
        "scaledDecimal" => (
            Some(ValueType::String),
            Some(ConversionWarning {
                severity: WarningSeverity::ConvertedWithLimitations,
                construct: "scaledDecimal".to_string(),
                message: "scaledDecimal has no Fabric equivalent; JSON-encoded as String"
                    .to_string(),
                workaround: Some("read the String value back as a decimal pair".to_string()),
            }),
        ),
        "point" | "multiPoint" | "lineString" | "multiLineString" | "polygon"
        | "multiPolygon" => (
            Some(ValueType::String),
            Some(ConversionWarning {
                severity: WarningSeverity::ConvertedWithLimitations,
                construct: schema.to_string(),
                message: format!("geospatial schema '{schema}' has no Fabric equivalent; JSON-encoded as String"),
                workaround: None,
            }),
        ),
        _ => (None, None),
    }
}

/// CDM primitive type mapping: mirrors XSD, plus CDM's named semantic types.
pub fn map_cdm_type(cdm_type: &str) -> Option<ValueType> {
    match cdm_type {
        "string" | "guid" => Some(ValueType::String),
        "int64" | "integer" => Some(ValueType::BigInt),
        "double" | "decimal" | "float" => Some(ValueType::Double),
        "boolean" => Some(ValueType::Boolean),
        "dateTime" | "dateTimeOffset" | "date" | "time" => Some(ValueType::DateTime),
        other => map_xsd_type(other),
    }
}

/// The tier hierarchy used to resolve an `owl:unionOf` of datatypes, most
/// restrictive first (§4.C).
const UNION_HIERARCHY: [ValueType; 5] = [
    ValueType::Boolean,
    ValueType::BigInt,
    ValueType::Double,
    ValueType::DateTime,
    ValueType::String,
];

/// Resolve a union of XSD member types to the most restrictive covering
/// Fabric type. Falls through to `String` with a warning if no member maps.
pub fn resolve_union(member_xsd_types: &[String]) -> (ValueType, Option<ConversionWarning>) {
    let mapped: BTreeSet<ValueType> = member_xsd_types
        .iter()
        .filter_map(|t| map_xsd_type(t))
        .collect();

    if mapped.is_empty() {
        return (
            ValueType::String,
            Some(ConversionWarning {
                severity: WarningSeverity::ConvertedWithLimitations,
                construct: "owl:unionOf".to_string(),
                message: format!(
                    "no union member type resolved to a known Fabric type: {member_xsd_types:?}"
                ),
                workaround: None,
            }),
        );
    }

    for candidate in UNION_HIERARCHY {
        if mapped.contains(&candidate) {
            return (candidate, None);
        }
    }
    (ValueType::String, None)
}

/// Collapse a complex-structure schema (Object, Array, Map, Enum) to a
/// String property, attaching a limited-conversion warning rather than
/// storing the structure on the property itself (§4.C).
pub fn collapse_complex_type(construct_name: &str, schema_kind: &str) -> ConversionWarning {
    ConversionWarning {
        severity: WarningSeverity::ConvertedWithLimitations,
        construct: construct_name.to_string(),
        message: format!(
            "{schema_kind} schema on '{construct_name}' collapsed to a JSON-encoded String property"
        ),
        workaround: Some("parse the String value as JSON to recover the structure".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_xsd_integer_family_to_bigint() {
        assert_eq!(map_xsd_type("http://www.w3.org/2001/XMLSchema#integer"), Some(ValueType::BigInt));
        assert_eq!(map_xsd_type("nonNegativeInteger"), Some(ValueType::BigInt));
    }

    #[test]
    fn maps_xsd_date_family_to_datetime() {
        assert_eq!(map_xsd_type("dateTime"), Some(ValueType::DateTime));
        assert_eq!(map_xsd_type("dateTimeStamp"), Some(ValueType::DateTime));
    }

    #[test]
    fn dtdl_scaled_decimal_warns_and_collapses_to_string() {
        let (ty, warning) = map_dtdl_primitive("scaledDecimal");
        assert_eq!(ty, Some(ValueType::String));
        assert!(warning.is_some());
    }

    #[test]
    fn union_resolution_prefers_boolean_over_string() {
        let (ty, warning) = resolve_union(&["boolean".to_string(), "string".to_string()]);
        assert_eq!(ty, ValueType::Boolean);
        assert!(warning.is_none());
    }

    #[test]
    fn union_resolution_falls_through_to_string_on_unknown_members() {
        let (ty, warning) = resolve_union(&["geo:polygon".to_string()]);
        assert_eq!(ty, ValueType::String);
        assert!(warning.is_some());
    }

    #[test]
    fn cdm_named_semantic_types_resolve() {
        assert_eq!(map_cdm_type("guid"), Some(ValueType::String));
        assert_eq!(map_cdm_type("int64"), Some(ValueType::BigInt));
    }
}
