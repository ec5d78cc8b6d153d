//! CBOR helpers for transaction envelopes.
//!
//! Values are built and inspected with [`serde_cbor::Value`], but a signed
//! transaction must embed the body exactly as it was signed. These helpers
//! therefore work on raw byte spans: [`split_array`] cuts a top-level array
//! into its items without re-encoding anything, and [`concat_array`] glues
//! raw items back together.

use serde::Deserialize;
use serde_cbor::Value;

use crate::error::TxError;

/// CBOR encoding of `true`.
pub const TRUE: &[u8] = &[0xf5];

/// CBOR encoding of `null`.
pub const NULL: &[u8] = &[0xf6];

/// CBOR encoding of an empty map.
pub const EMPTY_MAP: &[u8] = &[0xa0];

/// Major type of the first data item in `bytes`.
pub fn major_type(bytes: &[u8]) -> Option<u8> {
    bytes.first().map(|b| b >> 5)
}

fn malformed(msg: impl Into<String>) -> TxError {
    TxError::MalformedTransaction(msg.into())
}

/// Parse a definite-length array header. Returns `(item_count, header_len)`.
fn array_header(bytes: &[u8]) -> Result<(u64, usize), TxError> {
    let first = *bytes.first().ok_or_else(|| malformed("empty input"))?;
    if first >> 5 != 4 {
        return Err(malformed("expected a CBOR array"));
    }
    let extra = |n: usize| -> Result<u64, TxError> {
        let arg = bytes
            .get(1..1 + n)
            .ok_or_else(|| malformed("truncated array header"))?;
        Ok(arg.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    };
    match first & 0x1f {
        n @ 0..=23 => Ok((u64::from(n), 1)),
        24 => Ok((extra(1)?, 2)),
        25 => Ok((extra(2)?, 3)),
        26 => Ok((extra(4)?, 5)),
        27 => Ok((extra(8)?, 9)),
        _ => Err(malformed("indefinite-length arrays are not supported")),
    }
}

/// Encode a definite-length array header for `len` items.
fn encode_array_header(len: usize, out: &mut Vec<u8>) {
    let len = len as u64;
    match len {
        0..=23 => out.push(0x80 | len as u8),
        24..=0xff => out.extend_from_slice(&[0x98, len as u8]),
        0x100..=0xffff => {
            out.push(0x99);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0x9a);
            out.extend_from_slice(&(len as u32).to_be_bytes());
        }
        _ => {
            out.push(0x9b);
            out.extend_from_slice(&len.to_be_bytes());
        }
    }
}

/// Split a top-level definite-length array into the raw bytes of its items.
///
/// Each item is parsed once by serde_cbor, whose byte offset marks where
/// the item ends. The whole input must be consumed; trailing bytes are an
/// error.
pub fn split_array(bytes: &[u8]) -> Result<Vec<&[u8]>, TxError> {
    let (len, header_len) = array_header(bytes)?;
    let rest = &bytes[header_len..];
    let mut de = serde_cbor::Deserializer::from_slice(rest);
    let mut items = Vec::new();
    let mut start = 0;
    for index in 0..len {
        if start == rest.len() {
            return Err(malformed(format!("array ends after {index} of {len} items")));
        }
        Value::deserialize(&mut de).map_err(|e| malformed(format!("array item {index}: {e}")))?;
        let end = de.byte_offset();
        items.push(&rest[start..end]);
        start = end;
    }
    if start != rest.len() {
        return Err(TxError::MalformedTransaction(format!(
            "{} trailing bytes after array",
            rest.len() - start
        )));
    }
    Ok(items)
}

/// Concatenate raw CBOR items into a definite-length array.
pub fn concat_array(items: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(9 + items.iter().map(|i| i.len()).sum::<usize>());
    encode_array_header(items.len(), &mut out);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

/// Decode exactly one CBOR value from `bytes`.
pub fn decode(bytes: &[u8]) -> Result<Value, TxError> {
    serde_cbor::from_slice(bytes).map_err(|e| TxError::MalformedTransaction(e.to_string()))
}

/// Encode a value.
pub fn encode(value: &Value) -> Result<Vec<u8>, TxError> {
    serde_cbor::to_vec(value).map_err(|e| TxError::MalformedTransaction(e.to_string()))
}

/// Decode a hex string, naming the field in the error.
pub fn decode_hex(field: &str, input: &str) -> Result<Vec<u8>, TxError> {
    hex::decode(input.trim())
        .map_err(|e| TxError::MalformedTransaction(format!("{field} is not valid hex: {e}")))
}

/// Blake2b-256 digest.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let hash = blake2b_simd::Params::new().hash_length(32).hash(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(hash.as_bytes());
    out
}

/// Transaction id: hex Blake2b-256 of the raw body bytes.
pub fn tx_id(body: &[u8]) -> String {
    hex::encode(blake2b_256(body))
}

/// Unsigned integer accessor for CBOR values.
pub fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Integer(i) => u64::try_from(*i).ok(),
        _ => None,
    }
}

/// Integer-keyed map lookup.
pub fn map_get(value: &Value, key: u64) -> Option<&Value> {
    match value {
        Value::Map(map) => map.get(&Value::Integer(i128::from(key))),
        _ => None,
    }
}
