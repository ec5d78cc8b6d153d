//! Unsigned transaction builder.
//!
//! Produces a full, unsigned transaction `[body, {}, true, aux_data]` that
//! spends one input back to the sender and carries the note payload as
//! auxiliary metadata. The builder never signs and never sees keys.
//!
//! Steps, in order:
//!
//! 1. Fetch protocol parameters and the chain tip (fresh, never cached).
//! 2. Select the first UTXO with a positive lovelace amount.
//! 3. Add a minimal self-addressed output sized from the per-byte UTXO cost.
//! 4. Encode the (already truncated) payload as metadata under the label.
//! 5. Set the TTL to the tip slot plus a fixed horizon.
//! 6. Compute the linear fee and add a change output if the leftover is
//!    large enough to stand as an output of its own.
//! 7. Check the transaction and each output value against the size limits.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_cbor::Value;

use crate::address::Address;
use crate::cbor;
use crate::error::TxError;
use crate::indexer::{ChainIndexer, ChainTip, ProtocolParameters, Utxo};
use crate::metadata;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Slots added to the chain tip to form the TTL.
pub const DEFAULT_TTL_SLOTS: u64 = 2000;

/// Size, in bytes, charged per output when deriving the minimum output value.
pub const UTXO_OUTPUT_OVERHEAD_BYTES: u64 = 160;

/// Flat reserve added on top of the per-byte minimum.
pub const MIN_OUTPUT_RESERVE_LOVELACE: u64 = 1_000_000;

/// Bytes a single vkey witness adds to an empty witness set.
const VKEY_WITNESS_ALLOWANCE: u64 = 128;

/// Fee used while estimating size. Encodes in the widest form any real fee uses.
const FEE_PLACEHOLDER: u64 = u32::MAX as u64;

// Transaction body map keys.
const BODY_INPUTS: u64 = 0;
const BODY_OUTPUTS: u64 = 1;
const BODY_FEE: u64 = 2;
const BODY_TTL: u64 = 3;
const BODY_AUX_DATA_HASH: u64 = 7;

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Pick the first UTXO holding a strictly positive lovelace amount.
pub fn select_input(utxos: &[Utxo]) -> Result<&Utxo, TxError> {
    utxos
        .iter()
        .find(|u| u.lovelace > 0)
        .ok_or(TxError::NoSpendableInput)
}

/// Minimum lovelace for the self-addressed output.
pub fn min_output_lovelace(params: &ProtocolParameters) -> u64 {
    params
        .coins_per_utxo_byte
        .saturating_mul(UTXO_OUTPUT_OVERHEAD_BYTES)
        .saturating_add(MIN_OUTPUT_RESERVE_LOVELACE)
}

/// Linear fee for a transaction of `size` bytes.
pub fn linear_fee(params: &ProtocolParameters, size: u64) -> u64 {
    params
        .min_fee_a
        .saturating_mul(size)
        .saturating_add(params.min_fee_b)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A serialized, unsigned transaction ready for a wallet's `signTx`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    /// Hex CBOR of the full transaction with an empty witness set.
    pub cbor_hex: String,
    /// Hash of the body; becomes the transaction hash once submitted.
    pub tx_id: String,
    pub input: Utxo,
    pub fee: u64,
    pub ttl: u64,
    /// Lovelace in the minimal self-addressed output.
    pub self_output: u64,
    /// Lovelace in the change output, if one was added.
    pub change: Option<u64>,
}

struct Draft<'a> {
    input: &'a Utxo,
    input_hash: Vec<u8>,
    address: &'a [u8],
    self_output: u64,
    change: Option<u64>,
    fee: u64,
    ttl: u64,
    aux_hash: [u8; 32],
}

impl Draft<'_> {
    fn output(&self, coin: u64) -> Value {
        Value::Array(vec![
            Value::Bytes(self.address.to_vec()),
            Value::Integer(i128::from(coin)),
        ])
    }

    fn body(&self) -> Value {
        let input = Value::Array(vec![
            Value::Bytes(self.input_hash.clone()),
            Value::Integer(i128::from(self.input.output_index)),
        ]);
        let mut outputs = vec![self.output(self.self_output)];
        if let Some(change) = self.change {
            outputs.push(self.output(change));
        }

        let mut body = BTreeMap::new();
        body.insert(int(BODY_INPUTS), Value::Array(vec![input]));
        body.insert(int(BODY_OUTPUTS), Value::Array(outputs));
        body.insert(int(BODY_FEE), int(self.fee));
        body.insert(int(BODY_TTL), int(self.ttl));
        body.insert(int(BODY_AUX_DATA_HASH), Value::Bytes(self.aux_hash.to_vec()));
        Value::Map(body)
    }

    /// Fail if any output's serialized value exceeds `max_val_size`.
    fn check_value_sizes(&self, max_val_size: u64) -> Result<(), TxError> {
        for coin in std::iter::once(self.self_output).chain(self.change) {
            let size = cbor::encode(&int(coin))?.len() as u64;
            if size > max_val_size {
                return Err(TxError::ValueTooLarge {
                    size,
                    max: max_val_size,
                });
            }
        }
        Ok(())
    }

    /// Serialize as `(body_bytes, tx_bytes)`.
    fn encode(&self, aux: &[u8]) -> Result<(Vec<u8>, Vec<u8>), TxError> {
        let body = cbor::encode(&self.body())?;
        let tx = cbor::concat_array(&[body.as_slice(), cbor::EMPTY_MAP, cbor::TRUE, aux]);
        Ok((body, tx))
    }
}

fn int(n: u64) -> Value {
    Value::Integer(i128::from(n))
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds unsigned note transactions against a [`ChainIndexer`].
pub struct TransactionBuilder<'a> {
    indexer: &'a dyn ChainIndexer,
    ttl_slots: u64,
    label: u64,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(indexer: &'a dyn ChainIndexer) -> Self {
        Self {
            indexer,
            ttl_slots: DEFAULT_TTL_SLOTS,
            label: quicknotes_core::payload::NOTE_METADATA_LABEL,
        }
    }

    pub fn with_ttl_slots(mut self, ttl_slots: u64) -> Self {
        self.ttl_slots = ttl_slots;
        self
    }

    /// Build an unsigned transaction spending one of `utxos` back to `sender`
    /// with `payload` attached as metadata.
    ///
    /// `payload` is expected to be truncated already (see
    /// [`quicknotes_core::payload::NotePayload`]); oversized text is rejected
    /// rather than silently cut here.
    pub async fn build(
        &self,
        sender: &Address,
        utxos: &[Utxo],
        payload: &serde_json::Value,
    ) -> Result<UnsignedTransaction, TxError> {
        let (params, tip) = self.chain_state().await?;
        self.build_with(&params, tip.slot, sender, utxos, payload)
    }

    /// Like [`build`](Self::build), with the sender's UTXOs read from the
    /// indexer after the protocol parameters.
    pub async fn build_from_chain(
        &self,
        sender: &Address,
        payload: &serde_json::Value,
    ) -> Result<UnsignedTransaction, TxError> {
        let (params, tip) = self.chain_state().await?;
        let utxos = self
            .indexer
            .address_utxos(sender)
            .await
            .map_err(TxError::ParameterFetch)?;
        self.build_with(&params, tip.slot, sender, &utxos, payload)
    }

    async fn chain_state(&self) -> Result<(ProtocolParameters, ChainTip), TxError> {
        let params = self
            .indexer
            .latest_epoch_parameters()
            .await
            .map_err(TxError::ParameterFetch)?;
        let tip = self
            .indexer
            .latest_block()
            .await
            .map_err(TxError::ParameterFetch)?;
        Ok((params, tip))
    }

    fn build_with(
        &self,
        params: &ProtocolParameters,
        tip_slot: u64,
        sender: &Address,
        utxos: &[Utxo],
        payload: &serde_json::Value,
    ) -> Result<UnsignedTransaction, TxError> {
        let input = select_input(utxos)?;
        let input_hash = hex::decode(&input.tx_hash)
            .ok()
            .filter(|h| h.len() == 32)
            .ok_or_else(|| {
                TxError::MalformedTransaction(format!(
                    "UTXO {}#{} has an invalid transaction hash",
                    input.tx_hash, input.output_index
                ))
            })?;

        let aux = cbor::encode(&metadata::auxiliary_data(self.label, payload)?)?;
        let aux_hash = cbor::blake2b_256(&aux);

        let self_output = min_output_lovelace(params);
        let ttl = tip_slot.saturating_add(self.ttl_slots);

        // Size an upper-bound draft: widest fee, change as large as it can be.
        let mut draft = Draft {
            input,
            input_hash,
            address: sender.as_bytes(),
            self_output,
            change: Some(input.lovelace),
            fee: FEE_PLACEHOLDER,
            ttl,
            aux_hash,
        };
        let (_, estimate) = draft.encode(&aux)?;
        let estimated_size = estimate.len() as u64 + VKEY_WITNESS_ALLOWANCE;
        let fee = linear_fee(params, estimated_size);

        let required = self_output.saturating_add(fee);
        if input.lovelace < required {
            return Err(TxError::InsufficientFunds {
                available: input.lovelace,
                required,
            });
        }
        let leftover = input.lovelace - required;

        // Dust change would itself fall below the minimum output; pay it as fee.
        if leftover >= self_output {
            draft.change = Some(leftover);
            draft.fee = fee;
        } else {
            draft.change = None;
            draft.fee = fee + leftover;
        }

        draft.check_value_sizes(params.max_val_size)?;
        let (body, tx) = draft.encode(&aux)?;
        let final_size = tx.len() as u64 + VKEY_WITNESS_ALLOWANCE;
        if final_size > params.max_tx_size {
            return Err(TxError::TooLarge {
                size: final_size,
                max: params.max_tx_size,
            });
        }

        let unsigned = UnsignedTransaction {
            cbor_hex: hex::encode(&tx),
            tx_id: cbor::tx_id(&body),
            input: input.clone(),
            fee: draft.fee,
            ttl,
            self_output,
            change: draft.change,
        };

        tracing::debug!(
            tx_id = %unsigned.tx_id,
            fee = unsigned.fee,
            ttl,
            size = tx.len(),
            "Built unsigned transaction"
        );

        Ok(unsigned)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::assembler::split_transaction;
    use crate::testing::{test_address, test_tx_hash, SimulatedIndexer};

    fn utxo(tag: u8, index: u32, lovelace: u64) -> Utxo {
        Utxo {
            tx_hash: test_tx_hash(tag),
            output_index: index,
            lovelace,
        }
    }

    fn payload() -> serde_json::Value {
        json!({ "action": "CREATE_NOTE", "noteId": 1, "title": "Hello" })
    }

    #[test]
    fn select_first_positive() {
        let utxos = vec![utxo(1, 0, 0), utxo(2, 3, 10), utxo(3, 0, 99)];
        let chosen = select_input(&utxos).unwrap();
        assert_eq!(chosen.output_index, 3);
        assert_eq!(chosen.lovelace, 10);
    }

    #[test]
    fn select_fails_without_positive_value() {
        assert_matches!(select_input(&[]), Err(TxError::NoSpendableInput));
        assert_matches!(select_input(&[utxo(1, 0, 0)]), Err(TxError::NoSpendableInput));
    }

    #[test]
    fn min_output_formula() {
        let params = SimulatedIndexer::default_parameters();
        assert_eq!(
            min_output_lovelace(&params),
            params.coins_per_utxo_byte * UTXO_OUTPUT_OVERHEAD_BYTES + MIN_OUTPUT_RESERVE_LOVELACE
        );
    }

    #[tokio::test]
    async fn builds_balanced_transaction() {
        let indexer = SimulatedIndexer::new();
        let builder = TransactionBuilder::new(&indexer);
        let unsigned = builder
            .build(&test_address(), &[utxo(0xab, 0, 5_000_000)], &payload())
            .await
            .unwrap();

        assert!(!unsigned.cbor_hex.is_empty());
        assert_eq!(unsigned.ttl, SimulatedIndexer::DEFAULT_TIP_SLOT + DEFAULT_TTL_SLOTS);
        let change = unsigned.change.expect("5 ADA leaves room for change");
        assert_eq!(unsigned.self_output + unsigned.fee + change, 5_000_000);

        let bytes = hex::decode(&unsigned.cbor_hex).unwrap();
        let parts = split_transaction(&bytes).unwrap();
        assert_eq!(cbor::tx_id(parts.body), unsigned.tx_id);
        assert_eq!(parts.witness_set, cbor::EMPTY_MAP);

        let body = cbor::decode(parts.body).unwrap();
        assert_eq!(cbor::map_get(&body, BODY_FEE).and_then(cbor::as_u64), Some(unsigned.fee));
        assert_eq!(cbor::map_get(&body, BODY_TTL).and_then(cbor::as_u64), Some(unsigned.ttl));
        let aux_hash = cbor::map_get(&body, BODY_AUX_DATA_HASH).unwrap();
        assert_eq!(aux_hash, &Value::Bytes(cbor::blake2b_256(parts.aux).to_vec()));

        let stored = metadata::read_label(parts.aux, 674).unwrap();
        assert_eq!(stored["action"], "CREATE_NOTE");
    }

    #[tokio::test]
    async fn fee_covers_linear_minimum() {
        let indexer = SimulatedIndexer::new();
        let params = SimulatedIndexer::default_parameters();
        let unsigned = TransactionBuilder::new(&indexer)
            .build(&test_address(), &[utxo(1, 0, 5_000_000)], &payload())
            .await
            .unwrap();
        let size = hex::decode(&unsigned.cbor_hex).unwrap().len() as u64;
        assert!(unsigned.fee >= linear_fee(&params, size + 100));
    }

    #[tokio::test]
    async fn dust_leftover_goes_to_fee() {
        let indexer = SimulatedIndexer::new();
        let params = SimulatedIndexer::default_parameters();
        let lovelace = min_output_lovelace(&params) + 400_000;
        let unsigned = TransactionBuilder::new(&indexer)
            .build(&test_address(), &[utxo(1, 0, lovelace)], &payload())
            .await
            .unwrap();
        assert!(unsigned.change.is_none());
        assert_eq!(unsigned.self_output + unsigned.fee, lovelace);
    }

    #[tokio::test]
    async fn insufficient_input_rejected() {
        let indexer = SimulatedIndexer::new();
        let err = TransactionBuilder::new(&indexer)
            .build(&test_address(), &[utxo(1, 0, 1_000)], &payload())
            .await
            .unwrap_err();
        assert_matches!(err, TxError::InsufficientFunds { available: 1_000, .. });
    }

    #[tokio::test]
    async fn empty_utxo_list_yields_no_bytes() {
        let indexer = SimulatedIndexer::new();
        let err = TransactionBuilder::new(&indexer)
            .build(&test_address(), &[], &payload())
            .await
            .unwrap_err();
        assert_matches!(err, TxError::NoSpendableInput);
    }

    #[tokio::test]
    async fn parameter_outage_is_parameter_fetch_error() {
        let indexer = SimulatedIndexer::new();
        indexer.set_fail_parameters(true);
        let err = TransactionBuilder::new(&indexer)
            .build(&test_address(), &[utxo(1, 0, 5_000_000)], &payload())
            .await
            .unwrap_err();
        assert_matches!(err, TxError::ParameterFetch(_));
    }

    #[tokio::test]
    async fn oversized_metadata_text_rejected() {
        let indexer = SimulatedIndexer::new();
        let err = TransactionBuilder::new(&indexer)
            .build(
                &test_address(),
                &[utxo(1, 0, 5_000_000)],
                &json!({ "title": "x".repeat(200) }),
            )
            .await
            .unwrap_err();
        assert_matches!(err, TxError::Metadata(_));
    }

    #[test]
    fn output_value_above_limit_rejected() {
        let indexer = SimulatedIndexer::new();
        let params = ProtocolParameters {
            max_val_size: 4,
            ..SimulatedIndexer::default_parameters()
        };
        let err = TransactionBuilder::new(&indexer)
            .build_with(&params, 1_000, &test_address(), &[utxo(1, 0, 5_000_000)], &payload())
            .unwrap_err();
        // 1_689_600 lovelace encodes in 5 bytes.
        assert_matches!(err, TxError::ValueTooLarge { size: 5, max: 4 });
    }

    #[test]
    fn transaction_above_limit_rejected() {
        let indexer = SimulatedIndexer::new();
        let params = ProtocolParameters {
            max_tx_size: 100,
            ..SimulatedIndexer::default_parameters()
        };
        let err = TransactionBuilder::new(&indexer)
            .build_with(&params, 1_000, &test_address(), &[utxo(1, 0, 5_000_000)], &payload())
            .unwrap_err();
        assert_matches!(err, TxError::TooLarge { max: 100, .. });
    }

    #[tokio::test]
    async fn invalid_utxo_hash_rejected() {
        let indexer = SimulatedIndexer::new();
        let bad = Utxo {
            tx_hash: "abc".into(),
            output_index: 0,
            lovelace: 5_000_000,
        };
        let err = TransactionBuilder::new(&indexer)
            .build(&test_address(), &[bad], &payload())
            .await
            .unwrap_err();
        assert_matches!(err, TxError::MalformedTransaction(_));
    }

    #[tokio::test]
    async fn build_from_chain_reads_indexer_utxos() {
        let address = test_address();
        let indexer = SimulatedIndexer::new().with_utxos(&address, vec![utxo(9, 1, 8_000_000)]);
        let unsigned = TransactionBuilder::new(&indexer)
            .build_from_chain(&address, &payload())
            .await
            .unwrap();
        assert_eq!(unsigned.input, utxo(9, 1, 8_000_000));
    }

    #[tokio::test]
    async fn build_from_chain_without_funds() {
        let indexer = SimulatedIndexer::new();
        let err = TransactionBuilder::new(&indexer)
            .build_from_chain(&test_address(), &payload())
            .await
            .unwrap_err();
        assert_matches!(err, TxError::NoSpendableInput);
    }

    #[tokio::test]
    async fn custom_ttl_horizon() {
        let indexer = SimulatedIndexer::new();
        let unsigned = TransactionBuilder::new(&indexer)
            .with_ttl_slots(10)
            .build(&test_address(), &[utxo(1, 0, 5_000_000)], &payload())
            .await
            .unwrap();
        assert_eq!(unsigned.ttl, SimulatedIndexer::DEFAULT_TIP_SLOT + 10);
    }
}
