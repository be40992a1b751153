// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::hash::HashValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The block a snapshot is anchored at.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub hash: HashValue,
}

impl BlockInfo {
    pub fn new(height: u64, hash: HashValue) -> Self {
        Self { height, hash }
    }

    pub fn genesis() -> Self {
        Self::new(0, HashValue::zero())
    }
}

impl fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[height: {}, hash: {}]", self.height, self.hash)
    }
}
