//! Signed transaction assembly.
//!
//! The witness set returned by the wallet is spliced into the unsigned
//! transaction at the byte level. The body is copied verbatim: re-encoding
//! it, even to semantically equal CBOR, would change the transaction id and
//! invalidate every signature over it.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_cbor::Value;

use crate::cbor;
use crate::error::TxError;

/// Body key of the auxiliary data hash.
const BODY_AUX_DATA_HASH: u64 = 7;

/// Raw byte spans of a transaction's four top-level items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxParts<'a> {
    pub body: &'a [u8],
    pub witness_set: &'a [u8],
    pub is_valid: &'a [u8],
    pub aux: &'a [u8],
}

/// Split a transaction into body, witness set, validity flag and auxiliary data.
///
/// Accepts a full 4-item transaction, a legacy 3-item one (no validity
/// flag), or a bare body map, for which the remaining parts default to an
/// empty witness set, `true` and `null`. A bare body that commits to
/// auxiliary data (key 7) is refused, since the data itself is missing.
pub fn split_transaction(bytes: &[u8]) -> Result<TxParts<'_>, TxError> {
    match cbor::major_type(bytes) {
        Some(5) => {
            if cbor::map_get(&cbor::decode(bytes)?, BODY_AUX_DATA_HASH).is_some() {
                return Err(TxError::MalformedTransaction(
                    "body carries an auxiliary data hash but no auxiliary data".to_string(),
                ));
            }
            Ok(TxParts {
                body: bytes,
                witness_set: cbor::EMPTY_MAP,
                is_valid: cbor::TRUE,
                aux: cbor::NULL,
            })
        }
        Some(4) => {
            let items = cbor::split_array(bytes)?;
            let parts = match items.as_slice() {
                [body, witness_set, is_valid, aux] => TxParts {
                    body,
                    witness_set,
                    is_valid,
                    aux,
                },
                [body, witness_set, aux] => TxParts {
                    body,
                    witness_set,
                    is_valid: cbor::TRUE,
                    aux,
                },
                other => {
                    return Err(TxError::MalformedTransaction(format!(
                        "expected a 4-item transaction, found {} items",
                        other.len()
                    )))
                }
            };
            if cbor::major_type(parts.body) != Some(5) {
                return Err(TxError::MalformedTransaction(
                    "transaction body is not a map".to_string(),
                ));
            }
            if cbor::major_type(parts.witness_set) != Some(5) {
                return Err(TxError::MalformedTransaction(
                    "witness set is not a map".to_string(),
                ));
            }
            Ok(parts)
        }
        _ => Err(TxError::MalformedTransaction(
            "expected a transaction array or body map".to_string(),
        )),
    }
}

/// A transaction ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub cbor_hex: String,
    pub tx_id: String,
}

/// Combine an unsigned transaction with a wallet-produced witness set.
///
/// If the unsigned transaction carries no witnesses the wallet's set is
/// embedded byte for byte. Otherwise the two sets are merged per witness
/// kind, the wallet's entries appended after the existing ones.
pub fn assemble(unsigned_hex: &str, witness_set_hex: &str) -> Result<SignedTransaction, TxError> {
    let unsigned = cbor::decode_hex("unsignedTxHex", unsigned_hex)?;
    let witnesses = cbor::decode_hex("witnessSetHex", witness_set_hex)?;

    let parts = split_transaction(&unsigned)?;
    let provided = match cbor::decode(&witnesses)? {
        Value::Map(map) => map,
        _ => {
            return Err(TxError::MalformedTransaction(
                "witness set is not a map".to_string(),
            ))
        }
    };
    if provided.is_empty() {
        return Err(TxError::SigningRejected(
            "wallet returned an empty witness set".to_string(),
        ));
    }

    let merged;
    let witness_set: &[u8] = if parts.witness_set == cbor::EMPTY_MAP {
        &witnesses
    } else {
        merged = merge_witness_sets(parts.witness_set, provided)?;
        &merged
    };

    let signed = cbor::concat_array(&[parts.body, witness_set, parts.is_valid, parts.aux]);
    let tx = SignedTransaction {
        cbor_hex: hex::encode(&signed),
        tx_id: cbor::tx_id(parts.body),
    };

    tracing::debug!(tx_id = %tx.tx_id, size = signed.len(), "Assembled signed transaction");

    Ok(tx)
}

fn merge_witness_sets(
    existing: &[u8],
    provided: BTreeMap<Value, Value>,
) -> Result<Vec<u8>, TxError> {
    let mut merged = match cbor::decode(existing)? {
        Value::Map(map) => map,
        _ => {
            return Err(TxError::MalformedTransaction(
                "witness set is not a map".to_string(),
            ))
        }
    };
    for (kind, witnesses) in provided {
        match (merged.get_mut(&kind), witnesses) {
            (Some(Value::Array(current)), Value::Array(extra)) => {
                for witness in extra {
                    if !current.contains(&witness) {
                        current.push(witness);
                    }
                }
            }
            (Some(_), _) => {
                return Err(TxError::MalformedTransaction(format!(
                    "cannot merge witness kind {kind:?}"
                )))
            }
            (None, witnesses) => {
                merged.insert(kind, witnesses);
            }
        }
    }
    cbor::encode(&Value::Map(merged))
}

/// Transaction id of a serialized transaction (or bare body), from its hex.
pub fn transaction_id(tx_hex: &str) -> Result<String, TxError> {
    let bytes = cbor::decode_hex("transaction", tx_hex)?;
    let parts = split_transaction(&bytes)?;
    Ok(cbor::tx_id(parts.body))
}

/// Metadata stored under `label` in a serialized transaction, as JSON.
pub fn read_metadata(tx_hex: &str, label: u64) -> Result<Option<serde_json::Value>, TxError> {
    let bytes = cbor::decode_hex("transaction", tx_hex)?;
    let parts = split_transaction(&bytes)?;
    Ok(crate::metadata::read_label(parts.aux, label))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use quicknotes_core::payload::{NoteAction, NotePayload, NOTE_METADATA_LABEL};

    use super::*;
    use crate::builder::TransactionBuilder;
    use crate::indexer::Utxo;
    use crate::testing::{fake_witness_set, test_address, test_tx_hash, SimulatedIndexer};

    async fn build_unsigned() -> crate::UnsignedTransaction {
        let indexer = SimulatedIndexer::new();
        let at = chrono::Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let payload = NotePayload::new(NoteAction::CreateNote, 1, "Hello", None, None, at);
        TransactionBuilder::new(&indexer)
            .build(
                &test_address(),
                &[Utxo {
                    tx_hash: test_tx_hash(0xab),
                    output_index: 0,
                    lovelace: 5_000_000,
                }],
                &payload.to_json(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn body_bytes_survive_assembly() {
        let unsigned = build_unsigned().await;
        let witnesses = hex::encode(fake_witness_set(7));
        let signed = assemble(&unsigned.cbor_hex, &witnesses).unwrap();

        let before = hex::decode(&unsigned.cbor_hex).unwrap();
        let after = hex::decode(&signed.cbor_hex).unwrap();
        let before = split_transaction(&before).unwrap();
        let after = split_transaction(&after).unwrap();

        assert_eq!(before.body, after.body);
        assert_eq!(before.aux, after.aux);
        assert_eq!(after.witness_set, fake_witness_set(7).as_slice());
        assert_eq!(signed.tx_id, unsigned.tx_id);
    }

    #[tokio::test]
    async fn note_metadata_survives_assembly() {
        let unsigned = build_unsigned().await;
        let signed = assemble(&unsigned.cbor_hex, &hex::encode(fake_witness_set(1))).unwrap();

        let stored = read_metadata(&signed.cbor_hex, NOTE_METADATA_LABEL)
            .unwrap()
            .expect("label present");
        assert_eq!(stored["action"], "CREATE_NOTE");
        assert_eq!(stored["noteId"], 1);
        assert_eq!(stored["title"], "Hello");
        assert_eq!(transaction_id(&signed.cbor_hex).unwrap(), unsigned.tx_id);
    }

    #[test]
    fn body_only_input_gets_null_aux() {
        // {0: [], 1: [], 2: 0}
        let body: [u8; 7] = [0xa3, 0x00, 0x80, 0x01, 0x80, 0x02, 0x00];
        let signed = assemble(&hex::encode(body), &hex::encode(fake_witness_set(2))).unwrap();
        let bytes = hex::decode(&signed.cbor_hex).unwrap();
        let parts = split_transaction(&bytes).unwrap();
        assert_eq!(parts.body, &body[..]);
        assert_eq!(parts.is_valid, cbor::TRUE);
        assert_eq!(parts.aux, cbor::NULL);
    }

    #[test]
    fn body_only_input_with_aux_hash_is_malformed() {
        // {2: 0, 7: h'00..00'}
        let mut body = vec![0xa2, 0x02, 0x00, 0x07, 0x58, 0x20];
        body.extend_from_slice(&[0u8; 32]);
        assert_matches!(
            assemble(&hex::encode(&body), &hex::encode(fake_witness_set(2))),
            Err(TxError::MalformedTransaction(msg)) if msg.contains("auxiliary data")
        );
    }

    #[test]
    fn existing_witnesses_are_merged() {
        let body: [u8; 3] = [0xa1, 0x02, 0x00];
        let first = fake_witness_set(1);
        let second = fake_witness_set(2);
        let tx = cbor::concat_array(&[&body[..], first.as_slice(), cbor::TRUE, cbor::NULL]);

        let signed = assemble(&hex::encode(&tx), &hex::encode(&second)).unwrap();
        let bytes = hex::decode(&signed.cbor_hex).unwrap();
        let parts = split_transaction(&bytes).unwrap();
        let set = cbor::decode(parts.witness_set).unwrap();
        match cbor::map_get(&set, 0) {
            Some(Value::Array(vkeys)) => assert_eq!(vkeys.len(), 2),
            other => panic!("unexpected vkey witnesses: {other:?}"),
        }
    }

    #[test]
    fn invalid_hex_is_malformed() {
        assert_matches!(
            assemble("zz", "a0"),
            Err(TxError::MalformedTransaction(_))
        );
    }

    #[test]
    fn non_map_witness_set_is_malformed() {
        let body = hex::encode([0xa1u8, 0x02, 0x00]);
        assert_matches!(
            assemble(&body, "80"),
            Err(TxError::MalformedTransaction(_))
        );
    }

    #[test]
    fn empty_witness_set_is_rejected() {
        let body = hex::encode([0xa1u8, 0x02, 0x00]);
        assert_matches!(assemble(&body, "a0"), Err(TxError::SigningRejected(_)));
    }

    #[test]
    fn wrong_item_count_is_malformed() {
        let tx = cbor::concat_array(&[cbor::EMPTY_MAP, cbor::EMPTY_MAP]);
        assert_matches!(
            split_transaction(&tx),
            Err(TxError::MalformedTransaction(_))
        );
    }
}
