//! Format detection and store loading for RDF/OWL sources (§4.E).

use std::path::Path;

use oxigraph::io::RdfFormat;
use oxigraph::store::Store;

use crate::error::ParseError;

/// The concrete serialization a source document was (or was declared to be)
/// written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfSourceFormat {
    Turtle,
    RdfXml,
    JsonLd,
    NTriples,
    NQuads,
    TriG,
    TriX,
    Hext,
    Notation3,
    Rdfa,
}

impl RdfSourceFormat {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "ttl" => Some(Self::Turtle),
            "rdf" | "owl" | "xml" => Some(Self::RdfXml),
            "jsonld" | "json-ld" => Some(Self::JsonLd),
            "nt" => Some(Self::NTriples),
            "nq" => Some(Self::NQuads),
            "trig" => Some(Self::TriG),
            "trix" => Some(Self::TriX),
            "hext" | "ndjson" => Some(Self::Hext),
            "n3" => Some(Self::Notation3),
            "html" | "xhtml" | "htm" => Some(Self::Rdfa),
            _ => None,
        }
    }

    pub(crate) fn to_oxigraph(self) -> RdfFormat {
        match self {
            Self::Turtle => RdfFormat::Turtle,
            Self::RdfXml => RdfFormat::RdfXml,
            Self::JsonLd => RdfFormat::JsonLd,
            Self::NTriples => RdfFormat::NTriples,
            Self::NQuads => RdfFormat::NQuads,
            Self::TriG => RdfFormat::TriG,
            Self::TriX => RdfFormat::TriX,
            Self::Hext => RdfFormat::N3, // oxigraph has no native Hext reader; closest line-oriented fallback
            Self::Notation3 => RdfFormat::N3,
            Self::Rdfa => RdfFormat::RdfXml, // RDFa is pre-extracted to RDF/XML upstream of this parser
        }
    }
}

/// Choose a format: explicit hint first, then file extension, defaulting to
/// Turtle (§4.E).
pub fn sniff_format(hint: Option<&str>, path: Option<&Path>) -> RdfSourceFormat {
    if let Some(hint) = hint {
        if let Some(format) = RdfSourceFormat::from_extension(hint) {
            return format;
        }
    }
    if let Some(path) = path {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if let Some(format) = RdfSourceFormat::from_extension(ext) {
                return format;
            }
        }
    }
    RdfSourceFormat::Turtle
}

/// Parse `bytes` as `format` into a fresh in-memory store.
pub fn load_store(bytes: &[u8], format: RdfSourceFormat) -> Result<Store, ParseError> {
    let store = Store::new().map_err(|e| ParseError::InvalidSyntax {
        format: format!("{format:?}"),
        reason: e.to_string(),
    })?;

    store
        .load_from_reader(format.to_oxigraph(), bytes)
        .map_err(|e| ParseError::InvalidSyntax {
            format: format!("{format:?}"),
            reason: e.to_string(),
        })?;

    if store.len().unwrap_or(0) == 0 {
        return Err(ParseError::EmptyGraph);
    }

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn sniffs_turtle_from_extension() {
        let path = PathBuf::from("model.ttl");
        assert_eq!(sniff_format(None, Some(&path)), RdfSourceFormat::Turtle);
    }

    #[test]
    fn hint_takes_priority_over_extension() {
        let path = PathBuf::from("model.ttl");
        assert_eq!(sniff_format(Some("nt"), Some(&path)), RdfSourceFormat::NTriples);
    }

    #[test]
    fn defaults_to_turtle_when_unknown() {
        assert_eq!(sniff_format(None, None), RdfSourceFormat::Turtle);
    }

    #[test]
    fn loads_simple_turtle_graph() {
        let ttl = b"@prefix ex: <http://example.org/> . ex:Person a ex:Class .";
        let store = load_store(ttl, RdfSourceFormat::Turtle).unwrap();
        assert!(store.len().unwrap() > 0);
    }

    #[test]
    fn rejects_empty_graph() {
        let err = load_store(b"", RdfSourceFormat::Turtle).unwrap_err();
        assert!(matches!(err, ParseError::EmptyGraph));
    }
}
