//! JSON <-> transaction metadata.
//!
//! Encoding follows the "no conversions" JSON schema: objects become maps
//! with text keys, strings become text, integers become ints and arrays
//! become lists. Anything else (floats, booleans, null) has no metadata
//! representation and is rejected.

use std::collections::BTreeMap;

use quicknotes_core::payload::MAX_METADATA_TEXT_BYTES;
use serde_cbor::Value;

use crate::cbor;
use crate::error::TxError;

/// Convert a JSON value into a metadatum.
pub fn json_to_metadatum(json: &serde_json::Value) -> Result<Value, TxError> {
    match json {
        serde_json::Value::String(s) => text(s),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Integer(i128::from(i)))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::Integer(i128::from(u)))
            } else {
                Err(TxError::Metadata(format!("non-integer number {n}")))
            }
        }
        serde_json::Value::Array(items) => items
            .iter()
            .map(json_to_metadatum)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        serde_json::Value::Object(fields) => {
            let mut map = BTreeMap::new();
            for (key, value) in fields {
                map.insert(text(key)?, json_to_metadatum(value)?);
            }
            Ok(Value::Map(map))
        }
        serde_json::Value::Bool(_) | serde_json::Value::Null => Err(TxError::Metadata(
            "booleans and null have no metadata encoding".to_string(),
        )),
    }
}

fn text(s: &str) -> Result<Value, TxError> {
    if s.len() > MAX_METADATA_TEXT_BYTES {
        return Err(TxError::Metadata(format!(
            "text of {} bytes exceeds the {MAX_METADATA_TEXT_BYTES} byte limit",
            s.len()
        )));
    }
    Ok(Value::Text(s.to_string()))
}

/// Convert a metadatum back into JSON. Byte strings render as hex.
pub fn metadatum_to_json(value: &Value) -> Option<serde_json::Value> {
    match value {
        Value::Text(s) => Some(serde_json::Value::String(s.clone())),
        Value::Integer(i) => i64::try_from(*i)
            .ok()
            .map(serde_json::Value::from)
            .or_else(|| u64::try_from(*i).ok().map(serde_json::Value::from)),
        Value::Bytes(b) => Some(serde_json::Value::String(hex::encode(b))),
        Value::Array(items) => items
            .iter()
            .map(metadatum_to_json)
            .collect::<Option<Vec<_>>>()
            .map(serde_json::Value::Array),
        Value::Map(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    Value::Text(s) => s.clone(),
                    other => metadatum_to_json(other)?.to_string(),
                };
                obj.insert(key, metadatum_to_json(v)?);
            }
            Some(serde_json::Value::Object(obj))
        }
        _ => None,
    }
}

/// Build auxiliary data holding `payload` under `label`.
pub fn auxiliary_data(label: u64, payload: &serde_json::Value) -> Result<Value, TxError> {
    let mut metadata = BTreeMap::new();
    metadata.insert(Value::Integer(i128::from(label)), json_to_metadatum(payload)?);
    Ok(Value::Map(metadata))
}

/// Read the JSON stored under `label` from raw auxiliary data bytes.
///
/// Understands both the plain metadata map and the Alonzo-era
/// `{0: metadata, ...}` map that is wrapped in tag 259.
pub fn read_label(aux: &[u8], label: u64) -> Option<serde_json::Value> {
    let value = cbor::decode(aux).ok()?;
    let direct = cbor::map_get(&value, label);
    let nested = cbor::map_get(&value, 0).and_then(|m| cbor::map_get(m, label));
    direct.or(nested).and_then(metadatum_to_json)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn object_round_trips() {
        let payload = json!({ "action": "CREATE_NOTE", "noteId": 7, "tags": ["a", "b"] });
        let datum = json_to_metadatum(&payload).unwrap();
        assert_eq!(metadatum_to_json(&datum).unwrap(), payload);
    }

    #[test]
    fn long_text_rejected() {
        let payload = json!({ "title": "x".repeat(65) });
        assert_matches!(json_to_metadatum(&payload), Err(TxError::Metadata(_)));
    }

    #[test]
    fn floats_and_bools_rejected() {
        assert_matches!(json_to_metadatum(&json!(1.5)), Err(TxError::Metadata(_)));
        assert_matches!(json_to_metadatum(&json!(true)), Err(TxError::Metadata(_)));
        assert_matches!(json_to_metadatum(&json!(null)), Err(TxError::Metadata(_)));
    }

    #[test]
    fn label_is_readable_from_encoded_aux_data() {
        let payload = json!({ "action": "CREATE_NOTE", "title": "Hello" });
        let aux = auxiliary_data(674, &payload).unwrap();
        let bytes = cbor::encode(&aux).unwrap();
        assert_eq!(read_label(&bytes, 674).unwrap(), payload);
        assert!(read_label(&bytes, 1337).is_none());
    }
}
