// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

mod iterator_registry_test;
mod query_context_test;
mod snapshot_test;

use crate::{call_chain::CallLimits, snapshot::Snapshot};
use std::sync::Arc;
use weave_state_view::InMemoryStore;
use weave_types::{block_info::BlockInfo, hash::HashValue, state_key::StateKey};

pub(crate) fn state_key(contract: &str, key: &str) -> StateKey {
    StateKey::new(contract, key.as_bytes())
}

/// A store holding `(contract, key, value)` triples.
pub(crate) fn store_with(values: &[(&str, &str, &str)]) -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::from_values(values.iter().map(
        |(contract, key, value)| (state_key(contract, key), value.as_bytes().to_vec()),
    )))
}

pub(crate) fn snapshot_of(store: &Arc<InMemoryStore>) -> Snapshot {
    Snapshot::new(
        BlockInfo::new(7, HashValue::sha3_256_of(b"block 6")),
        store.clone(),
    )
}

pub(crate) fn limits(max_call_depth: usize, gas_limit: u64) -> CallLimits {
    CallLimits {
        max_call_depth,
        gas_limit,
    }
}
