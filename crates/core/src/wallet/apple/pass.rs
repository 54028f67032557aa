//! Serde model of `pass.json`.
//!
//! Only the keys this crate edits are typed. Everything else a designer put in
//! a bundle's `pass.json` round-trips through the `extra` maps untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const BARCODE_FORMAT_QR: &str = "PKBarcodeFormatQR";

/// Text encoding declared for barcode payloads.
pub const BARCODE_MESSAGE_ENCODING: &str = "iso-8859-1";

/// Top-level pass definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pass {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    #[serde(default)]
    pub pass_type_identifier: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub team_identifier: String,
    #[serde(default)]
    pub organization_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub barcodes: Vec<Barcode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_ticket: Option<PassStructure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boarding_pass: Option<PassStructure>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_format_version() -> u32 {
    1
}

impl Pass {
    pub fn new() -> Self {
        Self {
            format_version: default_format_version(),
            ..Default::default()
        }
    }

    /// Parse a designer-authored `pass.json`.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

/// One barcode entry of `barcodes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Barcode {
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub message_encoding: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Barcode {
    /// QR barcode carrying `message` verbatim.
    pub fn qr(message: &str) -> Self {
        Self {
            format: BARCODE_FORMAT_QR.to_string(),
            message: message.to_string(),
            message_encoding: BARCODE_MESSAGE_ENCODING.to_string(),
            ..Default::default()
        }
    }
}

/// Field groups of a pass style (`eventTicket`, `boardingPass`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassStructure {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub header_fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary_fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auxiliary_fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub back_fields: Vec<Field>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single labelled value on the pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Field {
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Field {
    pub fn new(key: &str, label: &str, value: impl Into<Value>) -> Self {
        Self {
            key: key.to_string(),
            label: Some(label.to_string()),
            value: value.into(),
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let raw = br##"{
            "formatVersion": 1,
            "passTypeIdentifier": "pass.old",
            "backgroundColor": "rgb(10, 20, 30)",
            "eventTicket": {
                "secondaryFields": [
                    {"key": "attendee", "label": "ATTENDEE", "value": "", "textAlignment": "PKTextAlignmentLeft"}
                ],
                "headerFields": [{"key": "gate", "value": 4}]
            }
        }"##;

        let pass = Pass::from_json(raw).unwrap();
        assert_eq!(pass.extra["backgroundColor"], "rgb(10, 20, 30)");

        let out: Value = serde_json::from_slice(&pass.to_json().unwrap()).unwrap();
        assert_eq!(out["backgroundColor"], "rgb(10, 20, 30)");
        assert_eq!(
            out["eventTicket"]["secondaryFields"][0]["textAlignment"],
            "PKTextAlignmentLeft"
        );
        assert_eq!(out["eventTicket"]["headerFields"][0]["value"], 4);
    }

    #[test]
    fn test_qr_barcode_defaults() {
        let barcode = Barcode::qr("BR-1");
        let json = serde_json::to_value(&barcode).unwrap();
        assert_eq!(json["format"], BARCODE_FORMAT_QR);
        assert_eq!(json["messageEncoding"], "iso-8859-1");
        assert!(json.get("altText").is_none());
    }
}
