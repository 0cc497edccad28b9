//! DTDL document loading: single file, array, `@graph`, or directory (§4.F).

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::ParseError;

const INTERFACE_DTMI_MAX_LEN: usize = 128;
const OTHER_DTMI_MAX_LEN: usize = 2048;
const SUPPORTED_CONTEXTS: &[&str] = &["dtmi:dtdl:context;2", "dtmi:dtdl:context;3", "dtmi:dtdl:context;4"];

static DTMI_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^dtmi:[A-Za-z][A-Za-z0-9_]*(:[A-Za-z_][A-Za-z0-9_]*)*(;[1-9]\d{0,8}(\.[1-9]\d{0,5})?)?$")
        .expect("DTMI regex is a fixed, known-valid pattern")
});

/// Validate a DTMI string against the format and length rules in §4.F.
/// `is_interface` tightens the length cap to 128 characters.
pub fn validate_dtmi(dtmi: &str, is_interface: bool) -> Result<(), ParseError> {
    if !DTMI_REGEX.is_match(dtmi) {
        return Err(ParseError::InvalidDtmi(dtmi.to_string()));
    }
    let max = if is_interface { INTERFACE_DTMI_MAX_LEN } else { OTHER_DTMI_MAX_LEN };
    if dtmi.len() > max {
        return Err(ParseError::DtmiTooLong {
            dtmi: dtmi.to_string(),
            max,
        });
    }
    Ok(())
}

/// A single DTDL interface document, JSON `Value` plus its declared context.
#[derive(Debug, Clone)]
pub struct DtdlDocument {
    pub body: Value,
    pub context: String,
}

fn context_string(value: &Value) -> Option<String> {
    match value.get("@context") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(items)) => items.iter().find_map(|v| v.as_str()).map(|s| s.to_string()),
        _ => None,
    }
}

fn is_supported_context(context: &str) -> bool {
    SUPPORTED_CONTEXTS.iter().any(|c| context.starts_with(c))
}

/// Flatten one parsed JSON value into zero or more interface documents,
/// unwrapping a top-level array or a `@graph`-wrapped JSON-LD expansion.
fn flatten(value: Value) -> Result<Vec<DtdlDocument>, ParseError> {
    match value {
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                out.extend(flatten(item)?);
            }
            Ok(out)
        }
        Value::Object(ref map) if map.contains_key("@graph") => {
            let graph = map.get("@graph").cloned().unwrap_or(Value::Null);
            flatten(graph)
        }
        Value::Object(_) => {
            let context = context_string(&value).unwrap_or_default();
            if !context.is_empty() && !is_supported_context(&context) {
                return Err(ParseError::InvalidSyntax {
                    format: "dtdl".to_string(),
                    reason: format!("unsupported context '{context}'"),
                });
            }
            Ok(vec![DtdlDocument {
                body: value,
                context,
            }])
        }
        other => Err(ParseError::InvalidSyntax {
            format: "dtdl".to_string(),
            reason: format!("expected a JSON object or array, found {other}"),
        }),
    }
}

/// Parse DTDL from raw bytes (a single file's content).
pub fn parse_bytes(bytes: &[u8]) -> Result<Vec<DtdlDocument>, ParseError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| ParseError::InvalidSyntax {
        format: "dtdl".to_string(),
        reason: e.to_string(),
    })?;
    flatten(value)
}

/// Load DTDL documents from a path: a single file, or a directory of
/// `.json`/`.dtdl` files (optionally recursive).
pub fn load_documents(path: &Path, recursive: bool) -> Result<Vec<DtdlDocument>, ParseError> {
    if path.is_file() {
        let bytes = std::fs::read(path).map_err(|e| ParseError::InvalidSyntax {
            format: "dtdl".to_string(),
            reason: e.to_string(),
        })?;
        return parse_bytes(&bytes);
    }

    let mut documents = Vec::new();
    let walker = if recursive {
        walkdir::WalkDir::new(path)
    } else {
        walkdir::WalkDir::new(path).max_depth(1)
    };

    let mut entries: Vec<_> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("dtdl"))
                .unwrap_or(false)
        })
        .collect();
    entries.sort_by_key(|e| e.path().to_path_buf());

    for entry in entries {
        let bytes = std::fs::read(entry.path()).map_err(|e| ParseError::InvalidSyntax {
            format: "dtdl".to_string(),
            reason: e.to_string(),
        })?;
        documents.extend(parse_bytes(&bytes)?);
    }

    if documents.is_empty() {
        return Err(ParseError::EmptyGraph);
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_dtmi() {
        assert!(validate_dtmi("dtmi:com:example:Thermostat;1", true).is_ok());
    }

    #[test]
    fn rejects_malformed_dtmi() {
        assert!(validate_dtmi("not-a-dtmi", true).is_err());
    }

    #[test]
    fn rejects_interface_dtmi_over_128_chars() {
        let long_segment = "a".repeat(130);
        let dtmi = format!("dtmi:com:example:{long_segment};1");
        let err = validate_dtmi(&dtmi, true).unwrap_err();
        assert!(matches!(err, ParseError::DtmiTooLong { .. }));
    }

    #[test]
    fn flattens_array_of_interfaces() {
        let json = br#"[
            {"@context": "dtmi:dtdl:context;3", "@id": "dtmi:com:example:A;1"},
            {"@context": "dtmi:dtdl:context;3", "@id": "dtmi:com:example:B;1"}
        ]"#;
        let docs = parse_bytes(json).unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn flattens_graph_wrapped_document() {
        let json = br#"{
            "@context": "dtmi:dtdl:context;3",
            "@graph": [
                {"@context": "dtmi:dtdl:context;3", "@id": "dtmi:com:example:A;1"}
            ]
        }"#;
        let docs = parse_bytes(json).unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn rejects_unsupported_context() {
        let json = br#"{"@context": "dtmi:dtdl:context;1", "@id": "dtmi:com:example:A;1"}"#;
        let err = parse_bytes(json).unwrap_err();
        assert!(matches!(err, ParseError::InvalidSyntax { .. }));
    }
}
