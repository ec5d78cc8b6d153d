//! Wallet bridge contract.
//!
//! The signing wallet lives outside the server (a CIP-30 browser extension
//! in production). Consumers get an explicit [`WalletSession`] from
//! [`WalletBridge::enable`] and pass it into each operation; there is no
//! global connection state. Values cross the boundary in the wallet's own
//! hex-encoded CBOR forms, decoded here.

use async_trait::async_trait;
use serde_cbor::Value;

use crate::address::Address;
use crate::cbor;
use crate::error::TxError;
use crate::indexer::Utxo;

/// Errors reported by a wallet.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// No wallet is installed, or the user refused to connect it.
    #[error("Wallet unavailable: {0}")]
    Unavailable(String),

    /// The user declined the request.
    #[error("User rejected the request: {0}")]
    Rejected(String),

    /// The wallet answered with something that could not be decoded.
    #[error("Invalid wallet response: {0}")]
    InvalidResponse(String),

    #[error("Wallet error: {0}")]
    Internal(String),
}

impl From<WalletError> for TxError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::InvalidResponse(msg) => TxError::MalformedTransaction(msg),
            other => TxError::SigningRejected(other.to_string()),
        }
    }
}

/// Entry point to a wallet: grants a session.
#[async_trait]
pub trait WalletBridge: Send + Sync {
    async fn enable(&self) -> Result<Box<dyn WalletSession>, WalletError>;
}

/// An enabled wallet connection.
#[async_trait]
pub trait WalletSession: Send + Sync {
    /// Address change should be returned to, hex encoded.
    async fn change_address(&self) -> Result<String, WalletError>;

    async fn used_addresses(&self) -> Result<Vec<String>, WalletError>;

    async fn unused_addresses(&self) -> Result<Vec<String>, WalletError>;

    /// Unspent outputs as `TransactionUnspentOutput` CBOR hex.
    async fn utxos(&self) -> Result<Vec<String>, WalletError>;

    /// Total balance as CBOR `value` hex.
    async fn balance(&self) -> Result<String, WalletError>;

    /// Ask the user to sign. Returns the witness set as CBOR hex.
    async fn sign_tx(&self, unsigned_hex: &str, partial: bool) -> Result<String, WalletError>;

    /// Submit through the wallet's own backend. Returns the transaction hash.
    async fn submit_tx(&self, signed_hex: &str) -> Result<String, WalletError>;

    async fn disconnect(&self) {}

    /// The address this session transacts from: the change address.
    async fn address(&self) -> Result<Address, WalletError> {
        let hex = self.change_address().await?;
        Address::parse(&hex).map_err(|e| WalletError::InvalidResponse(e.to_string()))
    }

    /// Balance in lovelace. Native assets are ignored.
    async fn lovelace_balance(&self) -> Result<u64, WalletError> {
        let hex = self.balance().await?;
        decode_balance(&hex).map_err(|e| WalletError::InvalidResponse(e.to_string()))
    }

    /// Decoded UTXOs, in wallet order.
    async fn spendable_utxos(&self) -> Result<Vec<Utxo>, WalletError> {
        self.utxos()
            .await?
            .iter()
            .map(|hex| parse_utxo_cbor(hex).map_err(|e| WalletError::InvalidResponse(e.to_string())))
            .collect()
    }
}

/// Lovelace held by a CBOR `value`: either a bare coin or `[coin, assets]`.
pub fn decode_value(value: &Value) -> Result<u64, TxError> {
    let coin = match value {
        Value::Integer(_) => cbor::as_u64(value),
        Value::Array(items) => items.first().and_then(cbor::as_u64),
        _ => None,
    };
    coin.ok_or_else(|| {
        TxError::MalformedTransaction("value is neither a coin nor [coin, assets]".into())
    })
}

/// Decode a wallet balance from its CBOR `value` hex.
pub fn decode_balance(hex: &str) -> Result<u64, TxError> {
    let bytes = cbor::decode_hex("balance", hex)?;
    decode_value(&cbor::decode(&bytes)?)
}

/// Decode a `TransactionUnspentOutput` (`[input, output]`) from CBOR hex.
///
/// Both the legacy array output `[address, value, ...]` and the map output
/// `{0: address, 1: value, ...}` are accepted.
pub fn parse_utxo_cbor(hex: &str) -> Result<Utxo, TxError> {
    let malformed = |what: &str| TxError::MalformedTransaction(format!("UTXO {what}"));

    let bytes = cbor::decode_hex("utxo", hex)?;
    let (input, output) = match cbor::decode(&bytes)? {
        Value::Array(mut pair) if pair.len() == 2 => {
            let output = pair.pop().ok_or_else(|| malformed("is missing its output"))?;
            let input = pair.pop().ok_or_else(|| malformed("is missing its input"))?;
            (input, output)
        }
        _ => return Err(malformed("is not an [input, output] pair")),
    };

    let (tx_hash, output_index) = match &input {
        Value::Array(parts) => match parts.as_slice() {
            [Value::Bytes(hash), index] if hash.len() == 32 => (
                hex::encode(hash),
                cbor::as_u64(index)
                    .and_then(|i| u32::try_from(i).ok())
                    .ok_or_else(|| malformed("output index is invalid"))?,
            ),
            _ => return Err(malformed("input is not [hash, index]")),
        },
        _ => return Err(malformed("input is not an array")),
    };

    let value = match &output {
        Value::Array(fields) => fields.get(1),
        Value::Map(_) => cbor::map_get(&output, 1),
        _ => None,
    }
    .ok_or_else(|| malformed("output has no value"))?;

    Ok(Utxo {
        tx_hash,
        output_index,
        lovelace: decode_value(value)?,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_matches::assert_matches;

    use super::*;

    fn encode_hex(value: Value) -> String {
        hex::encode(cbor::encode(&value).unwrap())
    }

    fn input(tag: u8, index: i128) -> Value {
        Value::Array(vec![Value::Bytes(vec![tag; 32]), Value::Integer(index)])
    }

    #[test]
    fn balance_from_plain_coin() {
        // 1_000_000 as a CBOR uint.
        assert_eq!(decode_balance("1a000f4240").unwrap(), 1_000_000);
    }

    #[test]
    fn balance_from_multi_asset_value() {
        let value = Value::Array(vec![Value::Integer(2_500_000), Value::Map(BTreeMap::new())]);
        assert_eq!(decode_balance(&encode_hex(value)).unwrap(), 2_500_000);
    }

    #[test]
    fn balance_rejects_text() {
        assert_matches!(
            decode_balance(&encode_hex(Value::Text("5".into()))),
            Err(TxError::MalformedTransaction(_))
        );
    }

    #[test]
    fn utxo_with_array_output() {
        let output = Value::Array(vec![Value::Bytes(vec![0x60; 29]), Value::Integer(3_000_000)]);
        let utxo = parse_utxo_cbor(&encode_hex(Value::Array(vec![input(0xcd, 2), output]))).unwrap();
        assert_eq!(utxo.tx_hash, "cd".repeat(32));
        assert_eq!(utxo.output_index, 2);
        assert_eq!(utxo.lovelace, 3_000_000);
    }

    #[test]
    fn utxo_with_map_output() {
        let mut output = BTreeMap::new();
        output.insert(Value::Integer(0), Value::Bytes(vec![0x60; 29]));
        output.insert(
            Value::Integer(1),
            Value::Array(vec![Value::Integer(7_000_000), Value::Map(BTreeMap::new())]),
        );
        let utxo =
            parse_utxo_cbor(&encode_hex(Value::Array(vec![input(1, 0), Value::Map(output)]))).unwrap();
        assert_eq!(utxo.lovelace, 7_000_000);
    }

    #[test]
    fn utxo_rejects_short_hash() {
        let bad_input = Value::Array(vec![Value::Bytes(vec![1; 4]), Value::Integer(0)]);
        let output = Value::Array(vec![Value::Bytes(vec![0x60; 29]), Value::Integer(1)]);
        assert_matches!(
            parse_utxo_cbor(&encode_hex(Value::Array(vec![bad_input, output]))),
            Err(TxError::MalformedTransaction(_))
        );
    }

    #[test]
    fn wallet_errors_map_to_tx_errors() {
        assert_matches!(
            TxError::from(WalletError::Rejected("declined".into())),
            TxError::SigningRejected(_)
        );
        assert_matches!(
            TxError::from(WalletError::InvalidResponse("junk".into())),
            TxError::MalformedTransaction(_)
        );
    }
}
