//! # Hex Identifiers
//!
//! Account addresses, ciphertext handles and transaction hashes. All three
//! are `0x`-prefixed hex strings on the wire; they are validated once at the
//! boundary and carried as newtypes afterwards.

use crate::utils::constants::ZERO_HANDLE;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Returns true if `s` is `0x` followed by exactly `len` hex digits.
pub fn is_hex_of_len(s: &str, len: usize) -> bool {
    match s.strip_prefix("0x") {
        Some(body) => body.len() == len && body.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// A 20-byte account or contract address.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Parses `0x` + 40 hex digits. Case is preserved as given.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        is_hex_of_len(raw, 40).then(|| Address(raw.to_string()))
    }

    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        Address(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Addresses compare case-insensitively on chain.
    pub fn same_as(&self, other: &Address) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }

    pub fn canonical(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 32-byte ciphertext handle as stored by the token contract.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    pub fn zero() -> Self {
        Handle(ZERO_HANDLE.to_string())
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Handle(format!("0x{}", hex::encode(bytes)))
    }

    pub fn parse(raw: &str) -> Option<Self> {
        is_hex_of_len(raw, 64).then(|| Handle(raw.to_ascii_lowercase()))
    }

    /// The zero sentinel means "no ciphertext written yet".
    pub fn is_zero(&self) -> bool {
        self.0 == ZERO_HANDLE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash identifying a submitted transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        TxHash(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
