// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::errors::SnapshotError;
use parking_lot::{Mutex, RwLock};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tracing::debug;
use weave_state_view::{DurableStore, StateIterator};
use weave_types::{
    block_info::BlockInfo,
    rwset::{ReadVersion, TxRWSet, TxWrite},
    state_key::StateKey,
    transaction::TxResult,
    TxnIndex,
};

/// Pending writes of the transaction issuing a read, keyed by the written state key. `None`
/// values are deletions.
pub type OwnWrites = BTreeMap<StateKey, Option<Vec<u8>>>;

/// How a [`Snapshot::get`] was resolved.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReadOutcome {
    /// Served from the caller's own pending writes. Such reads are not part of the read set.
    OwnWrite(Option<Vec<u8>>),
    /// Served from the in-block cache or the durable store, tagged with the version observed.
    Versioned(Option<Vec<u8>>, ReadVersion),
}

impl ReadOutcome {
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            ReadOutcome::OwnWrite(value) | ReadOutcome::Versioned(value, _) => value.as_deref(),
        }
    }
}

/// A block-scoped read view: the durable store as of the anchor block, overlaid with the writes
/// of the transactions of this block merged so far.
///
/// Reads are served concurrently to every executing transaction. The in-block cache is only
/// mutated by the commit coordinator, one transaction at a time and in index order.
pub struct Snapshot {
    block_info: BlockInfo,
    store: Arc<dyn DurableStore>,
    // key -> (index of the last merged writer, value written)
    provisional: RwLock<HashMap<StateKey, (TxnIndex, Option<Vec<u8>>)>>,
    results: Mutex<Vec<TxResult>>,
    sealed: AtomicBool,
}

impl Snapshot {
    pub fn new(block_info: BlockInfo, store: Arc<dyn DurableStore>) -> Self {
        Self {
            block_info,
            store,
            provisional: RwLock::new(HashMap::new()),
            results: Mutex::new(Vec::new()),
            sealed: AtomicBool::new(false),
        }
    }

    pub fn block_info(&self) -> &BlockInfo {
        &self.block_info
    }

    pub fn height(&self) -> u64 {
        self.block_info.height
    }

    pub fn store(&self) -> &Arc<dyn DurableStore> {
        &self.store
    }

    /// Resolves `key` against the caller's own writes, then the in-block cache, then the durable
    /// store. Never the reverse.
    pub fn get(&self, key: &StateKey, own_writes: &OwnWrites) -> Result<ReadOutcome, SnapshotError> {
        if let Some(value) = own_writes.get(key) {
            return Ok(ReadOutcome::OwnWrite(value.clone()));
        }
        if let Some((txn_idx, value)) = self.provisional.read().get(key) {
            return Ok(ReadOutcome::Versioned(
                value.clone(),
                ReadVersion::InBlock(*txn_idx),
            ));
        }
        let value = self
            .store
            .read_object(key.contract_name(), key.key())
            .map_err(SnapshotError::storage)?;
        Ok(ReadOutcome::Versioned(value, ReadVersion::Storage))
    }

    /// Half-open range `[start_key, limit_key)` of the durable store. In-block writes are not
    /// layered over the returned cursor.
    pub fn select(
        &self,
        contract_name: &str,
        start_key: &[u8],
        limit_key: &[u8],
    ) -> Result<Box<dyn StateIterator>, SnapshotError> {
        self.store
            .select_object(contract_name, start_key, limit_key)
            .map_err(SnapshotError::storage)
    }

    pub fn contract_bytecode(&self, contract_name: &str) -> Result<Option<Vec<u8>>, SnapshotError> {
        self.store
            .get_contract_bytecode(contract_name)
            .map_err(SnapshotError::storage)
    }

    /// The version a read of `key` would observe right now.
    pub fn current_version(&self, key: &StateKey) -> ReadVersion {
        self.provisional
            .read()
            .get(key)
            .map_or(ReadVersion::Storage, |(txn_idx, _)| {
                ReadVersion::InBlock(*txn_idx)
            })
    }

    /// Merges the ordinary writes of a finalized transaction into the in-block cache. Record
    /// writes are left to the relational commit path.
    pub fn apply_write_set(&self, txn_idx: TxnIndex, rwset: &TxRWSet) -> Result<(), SnapshotError> {
        if self.is_sealed() {
            return Err(SnapshotError::Sealed(self.block_info.height));
        }
        let mut provisional = self.provisional.write();
        for write in rwset.tx_writes.iter().filter(|write| !write.is_record()) {
            provisional.insert(write.key.clone(), (txn_idx, write.value.clone()));
        }
        debug!(
            txn_idx = txn_idx,
            num_writes = rwset.tx_writes.len(),
            "merged write set into snapshot"
        );
        Ok(())
    }

    pub fn record_result(&self, result: TxResult) {
        self.results.lock().push(result);
    }

    pub fn committed_results(&self) -> Vec<TxResult> {
        self.results.lock().clone()
    }

    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// The block's net effect on key-value state: the last merged write of every key, sorted.
    pub fn final_writes(&self) -> Vec<TxWrite> {
        let mut writes: Vec<TxWrite> = self
            .provisional
            .read()
            .iter()
            .map(|(key, (_, value))| TxWrite::new(key.clone(), value.clone()))
            .collect();
        writes.sort_by(|a, b| a.key.cmp(&b.key));
        writes
    }
}
