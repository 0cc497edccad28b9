//! The wire-format `Bundle` (§3, §6): an ordered list of base64-encoded
//! parts ready for upload to the Fabric ontology API.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadType {
    InlineBase64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundlePart {
    pub path: String,
    pub payload: String,
    #[serde(rename = "payloadType")]
    pub payload_type: PayloadType,
}

impl BundlePart {
    /// Build a part from raw JSON bytes, base64-encoding the payload.
    pub fn from_json_bytes(path: impl Into<String>, json: &[u8]) -> Self {
        Self {
            path: path.into(),
            payload: BASE64.encode(json),
            payload_type: PayloadType::InlineBase64,
        }
    }

    /// Decode and parse this part's payload back to a JSON value.
    pub fn decode_json(&self) -> Result<serde_json::Value, anyhow::Error> {
        let bytes = BASE64.decode(&self.payload)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// The ordered `parts` array that makes up the upload body (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bundle {
    pub parts: Vec<BundlePart>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, part: BundlePart) {
        self.parts.push(part);
    }

    pub fn find(&self, path: &str) -> Option<&BundlePart> {
        self.parts.iter().find(|p| p.path == path)
    }

    /// Index of `needle`'s part within `parts`, used to test the
    /// parent-before-child ordering invariant (§8).
    pub fn position_of(&self, path: &str) -> Option<usize> {
        self.parts.iter().position(|p| p.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_json_payload() {
        let json = br#"{"metadata":{"type":"Ontology","displayName":"demo"}}"#;
        let part = BundlePart::from_json_bytes(".platform", json);
        let decoded = part.decode_json().unwrap();
        assert_eq!(decoded["metadata"]["displayName"], "demo");
    }

    #[test]
    fn position_of_finds_parts_in_order() {
        let mut bundle = Bundle::new();
        bundle.push(BundlePart::from_json_bytes(".platform", b"{}"));
        bundle.push(BundlePart::from_json_bytes("EntityTypes/1/definition.json", b"{}"));
        bundle.push(BundlePart::from_json_bytes("EntityTypes/2/definition.json", b"{}"));

        assert_eq!(bundle.position_of(".platform"), Some(0));
        assert!(
            bundle.position_of("EntityTypes/1/definition.json").unwrap()
                < bundle.position_of("EntityTypes/2/definition.json").unwrap()
        );
    }
}
