//! Shelley-era addresses.
//!
//! Wallets hand addresses over as raw hex (CIP-30) while indexers expect
//! bech32. [`Address`] accepts either and always renders as bech32.

use std::fmt;

use bech32::{FromBase32, ToBase32, Variant};

use crate::error::TxError;

/// Raw address bytes (header byte followed by payload).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    bytes: Vec<u8>,
}

impl Address {
    /// Parse a bech32 (`addr...` / `addr_test...`) or hex encoded address.
    pub fn parse(input: &str) -> Result<Self, TxError> {
        let input = input.trim();
        if input.starts_with("addr") {
            let (hrp, data, _variant) = bech32::decode(input)
                .map_err(|e| TxError::InvalidAddress(format!("bad bech32: {e}")))?;
            if hrp != "addr" && hrp != "addr_test" {
                return Err(TxError::InvalidAddress(format!(
                    "unexpected prefix '{hrp}'"
                )));
            }
            let bytes = Vec::<u8>::from_base32(&data)
                .map_err(|e| TxError::InvalidAddress(format!("bad bech32 payload: {e}")))?;
            return Self::from_bytes(bytes);
        }
        let bytes = hex::decode(input)
            .map_err(|e| TxError::InvalidAddress(format!("neither bech32 nor hex: {e}")))?;
        Self::from_bytes(bytes)
    }

    /// Wrap raw address bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, TxError> {
        // Header byte plus at least one 28-byte credential.
        if bytes.len() < 29 {
            return Err(TxError::InvalidAddress(format!(
                "address is {} bytes, expected at least 29",
                bytes.len()
            )));
        }
        // Byron bootstrap addresses (header 0x8_) are base58 CBOR, not supported.
        if bytes[0] >> 4 == 0b1000 {
            return Err(TxError::InvalidAddress(
                "Byron addresses are not supported".to_string(),
            ));
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Network id from the header nibble: 0 for test networks, 1 for mainnet.
    pub fn network_id(&self) -> u8 {
        self.bytes[0] & 0x0f
    }

    pub fn is_testnet(&self) -> bool {
        self.network_id() == 0
    }

    fn hrp(&self) -> &'static str {
        if self.is_testnet() {
            "addr_test"
        } else {
            "addr"
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match bech32::encode(self.hrp(), self.bytes.to_base32(), Variant::Bech32) {
            Ok(encoded) => f.write_str(&encoded),
            Err(_) => f.write_str(&self.to_hex()),
        }
    }
}
