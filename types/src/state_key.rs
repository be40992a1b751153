// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Separates the contract name from the key, and the key from an optional field, in the flat
/// storage encoding of a state key.
pub const CONTRACT_STORE_SEPARATOR: u8 = b'#';

/// Maximum length of a contract name, a key or a field, in bytes.
pub const MAX_KEY_LEN: usize = 64;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("contract name must not be empty")]
    EmptyContractName,
    #[error("key must not be empty")]
    EmptyKey,
    #[error("{kind} length {len} exceeds the limit of {MAX_KEY_LEN} bytes")]
    TooLong { kind: &'static str, len: usize },
    #[error("{kind} contains invalid byte {byte:#04x}")]
    InvalidByte { kind: &'static str, byte: u8 },
}

/// A logical key, always qualified by the contract that owns it so that two contracts can never
/// collide on key space.
///
/// Ordering is by `(contract_name, key)`, which is the composite-key order used when read and
/// write sets are sorted for hashing.
#[derive(Clone, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct StateKey {
    contract_name: String,
    #[serde(with = "serde_bytes")]
    key: Vec<u8>,
}

impl StateKey {
    pub fn new(contract_name: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            contract_name: contract_name.into(),
            key: key.into(),
        }
    }

    /// Key of the `key#field` sub-field model. An empty field addresses the bare key.
    pub fn with_field(contract_name: impl Into<String>, key: &[u8], field: &[u8]) -> Self {
        Self::new(contract_name, compose_key_field(key, field))
    }

    /// Key-less entry used for SQL record writes. All records of one contract share it.
    pub fn record(contract_name: impl Into<String>) -> Self {
        Self::new(contract_name, Vec::new())
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn is_record(&self) -> bool {
        self.key.is_empty()
    }

    /// Flat encoding used by the durable store: `contract_name#key`.
    pub fn encode(&self) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(self.contract_name.len() + 1 + self.key.len());
        encoded.extend_from_slice(self.contract_name.as_bytes());
        encoded.push(CONTRACT_STORE_SEPARATOR);
        encoded.extend_from_slice(&self.key);
        encoded
    }

    /// Strips the `contract_name#` prefix from a flat store key. Returns `None` if the key does
    /// not belong to `contract_name`.
    pub fn decode(contract_name: &str, encoded: &[u8]) -> Option<Self> {
        if check_contract_name(contract_name).is_err() {
            return None;
        }
        let prefix_len = contract_name.len() + 1;
        if encoded.len() < prefix_len
            || &encoded[..contract_name.len()] != contract_name.as_bytes()
            || encoded[contract_name.len()] != CONTRACT_STORE_SEPARATOR
        {
            return None;
        }
        Some(Self::new(contract_name, encoded[prefix_len..].to_vec()))
    }

    /// Checks the key against the naming rules applied to every ordinary state access.
    pub fn validate(&self) -> Result<(), KeyError> {
        check_contract_name(&self.contract_name)?;
        if self.key.is_empty() {
            return Err(KeyError::EmptyKey);
        }
        // A composed `key#field` is checked part by part.
        let mut parts = self.key.splitn(2, |b| *b == CONTRACT_STORE_SEPARATOR);
        let key = parts.next().unwrap_or_default();
        let field = parts.next().unwrap_or_default();
        check_key_field(key, field)
    }
}

/// Validates a contract name. Names never contain the separator, which keeps the flat encoding
/// of distinct keys distinct.
pub fn check_contract_name(contract_name: &str) -> Result<(), KeyError> {
    if contract_name.is_empty() {
        return Err(KeyError::EmptyContractName);
    }
    check_part("contract name", contract_name.as_bytes())
}

/// Validates a key and an optional field of the sub-field model.
pub fn check_key_field(key: &[u8], field: &[u8]) -> Result<(), KeyError> {
    if key.is_empty() {
        return Err(KeyError::EmptyKey);
    }
    check_part("key", key)?;
    check_part("field", field)
}

fn check_part(kind: &'static str, part: &[u8]) -> Result<(), KeyError> {
    if part.len() > MAX_KEY_LEN {
        return Err(KeyError::TooLong {
            kind,
            len: part.len(),
        });
    }
    match part.iter().find(|b| !is_key_byte(**b)) {
        Some(byte) => Err(KeyError::InvalidByte { kind, byte: *byte }),
        None => Ok(()),
    }
}

fn is_key_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'.' | b'-' | b'/')
}

fn compose_key_field(key: &[u8], field: &[u8]) -> Vec<u8> {
    if field.is_empty() {
        return key.to_vec();
    }
    let mut composed = Vec::with_capacity(key.len() + 1 + field.len());
    composed.extend_from_slice(key);
    composed.push(CONTRACT_STORE_SEPARATOR);
    composed.extend_from_slice(field);
    composed
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}#{}",
            self.contract_name,
            String::from_utf8_lossy(&self.key)
        )
    }
}

impl fmt::Debug for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "StateKey({})", self)
    }
}
