// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::fmt;

/// Output value of the SHA3-256 digest used for read/write set commitments.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct HashValue([u8; HashValue::LENGTH]);

impl HashValue {
    pub const LENGTH: usize = 32;

    pub const fn new(hash: [u8; Self::LENGTH]) -> Self {
        HashValue(hash)
    }

    pub const fn zero() -> Self {
        HashValue([0; Self::LENGTH])
    }

    pub fn sha3_256_of(buffer: &[u8]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(buffer);
        HashValue(hasher.finalize().into())
    }

    /// Hash of the concatenation of two hashes, used for interior Merkle nodes.
    pub fn combine(left: &HashValue, right: &HashValue) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(left.0);
        hasher.update(right.0);
        HashValue(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }
}

impl AsRef<[u8]> for HashValue {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HashValue({})", self.to_hex())
    }
}

/// Binary Merkle root over `leaves`. An unpaired node is promoted to the next level unchanged,
/// and an empty input hashes to the digest of the empty byte string.
pub fn merkle_root(leaves: &[HashValue]) -> HashValue {
    if leaves.is_empty() {
        return HashValue::sha3_256_of(&[]);
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => HashValue::combine(left, right),
                [single] => *single,
                _ => unreachable!("chunks(2) yields one or two elements"),
            })
            .collect();
    }
    level[0]
}
