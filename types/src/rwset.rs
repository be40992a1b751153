// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Read and write evidence produced by executing one transaction. Every node that executes the
//! same ordered transaction list against the same prior state must produce byte-identical
//! read/write sets, so everything here is sorted and canonically encoded before hashing.

use crate::{
    hash::{merkle_root, HashValue},
    state_key::StateKey,
    TxnIndex,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a recorded read was resolved from.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum ReadVersion {
    /// The durable store, i.e. the state as of the previous block.
    Storage,
    /// The write of an earlier transaction of the same block.
    InBlock(TxnIndex),
}

#[derive(Clone, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct TxRead {
    pub key: StateKey,
    pub value: Option<Vec<u8>>,
    pub version: ReadVersion,
}

impl TxRead {
    pub fn new(key: StateKey, value: Option<Vec<u8>>, version: ReadVersion) -> Self {
        Self {
            key,
            value,
            version,
        }
    }
}

impl fmt::Debug for TxRead {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "TxRead({} = {}, {:?})",
            self.key,
            display_value(self.value.as_deref()),
            self.version
        )
    }
}

/// A write to a state key. A `None` value denotes a deletion. Record writes produced by SQL
/// statements carry a key-less [`StateKey::record`].
#[derive(Clone, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct TxWrite {
    pub key: StateKey,
    pub value: Option<Vec<u8>>,
}

impl TxWrite {
    pub fn new(key: StateKey, value: Option<Vec<u8>>) -> Self {
        Self { key, value }
    }

    pub fn is_deletion(&self) -> bool {
        self.value.is_none()
    }

    pub fn is_record(&self) -> bool {
        self.key.is_record()
    }
}

impl fmt::Debug for TxWrite {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "TxWrite({} = {})",
            self.key,
            display_value(self.value.as_deref())
        )
    }
}

fn display_value(value: Option<&[u8]>) -> String {
    match value {
        Some(bytes) => format!("0x{}", hex::encode(bytes)),
        None => "<none>".to_string(),
    }
}

/// Read and write evidence of one transaction.
///
/// `tx_reads` are sorted by key. `tx_writes` holds the key-value writes sorted by key, followed
/// by the SQL record writes in the order the statements were issued. Records are never sorted
/// among themselves or into the key-value writes, since statement order is part of their
/// meaning.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TxRWSet {
    pub tx_id: String,
    pub tx_reads: Vec<TxRead>,
    pub tx_writes: Vec<TxWrite>,
}

impl TxRWSet {
    pub fn new(tx_id: impl Into<String>, tx_reads: Vec<TxRead>, tx_writes: Vec<TxWrite>) -> Self {
        Self {
            tx_id: tx_id.into(),
            tx_reads,
            tx_writes,
        }
    }

    pub fn empty(tx_id: impl Into<String>) -> Self {
        Self::new(tx_id, vec![], vec![])
    }

    pub fn is_empty(&self) -> bool {
        self.tx_reads.is_empty() && self.tx_writes.is_empty()
    }

    pub fn read_keys(&self) -> impl Iterator<Item = &StateKey> {
        self.tx_reads.iter().map(|read| &read.key)
    }

    /// Written keys, including the contract-scoped key of record writes.
    pub fn write_keys(&self) -> impl Iterator<Item = &StateKey> {
        self.tx_writes.iter().map(|write| &write.key)
    }

    /// Canonical encoding hashed into the block.
    pub fn to_bytes(&self) -> Vec<u8> {
        bcs::to_bytes(self).expect("TxRWSet is always BCS serializable")
    }

    pub fn hash(&self) -> HashValue {
        HashValue::sha3_256_of(&self.to_bytes())
    }
}

/// Merkle root over the hashes of a block's read/write sets, in block order.
pub fn rwset_root(rwsets: &[TxRWSet]) -> HashValue {
    let leaves: Vec<HashValue> = rwsets.iter().map(TxRWSet::hash).collect();
    merkle_root(&leaves)
}
