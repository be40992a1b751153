// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::snapshot::OwnWrites;
use std::collections::BTreeMap;
use weave_types::{
    rwset::{TxRWSet, TxRead, TxWrite},
    state_key::StateKey,
};

/// Kind of a SQL statement recorded through `put_record`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SqlKind {
    /// Row-level statement. Discarded with the rest of the write set if the transaction fails.
    Dml,
    /// Schema definition statement. Survives a failed transaction, since every node already
    /// applied it while executing.
    Ddl,
}

/// Read and write evidence captured while one transaction executes.
pub(crate) struct RWSetRecorder {
    tx_id: String,
    reads: BTreeMap<StateKey, TxRead>,
    writes: OwnWrites,
    sql_records: Vec<TxWrite>,
    ddl_records: Vec<TxWrite>,
}

impl RWSetRecorder {
    pub(crate) fn new(tx_id: impl Into<String>) -> Self {
        Self {
            tx_id: tx_id.into(),
            reads: BTreeMap::new(),
            writes: BTreeMap::new(),
            sql_records: vec![],
            ddl_records: vec![],
        }
    }

    pub(crate) fn pending_write(&self, key: &StateKey) -> Option<&Option<Vec<u8>>> {
        self.writes.get(key)
    }

    pub(crate) fn cached_read(&self, key: &StateKey) -> Option<&TxRead> {
        self.reads.get(key)
    }

    pub(crate) fn writes(&self) -> &OwnWrites {
        &self.writes
    }

    /// Only the first read of a key is kept; later reads are served from the cache.
    pub(crate) fn record_read(&mut self, read: TxRead) {
        self.reads.entry(read.key.clone()).or_insert(read);
    }

    pub(crate) fn put(&mut self, key: StateKey, value: Option<Vec<u8>>) {
        self.writes.insert(key, value);
    }

    pub(crate) fn put_record(&mut self, contract_name: &str, statement: Vec<u8>, kind: SqlKind) {
        let record = TxWrite::new(StateKey::record(contract_name), Some(statement));
        if kind == SqlKind::Ddl {
            self.ddl_records.push(record.clone());
        }
        self.sql_records.push(record);
    }

    /// Every read performed, sorted by key. Reported even for failed transactions, whose
    /// outcome depended on them as much as a successful one's.
    pub(crate) fn observed_reads(&self) -> Vec<TxRead> {
        self.reads.values().cloned().collect()
    }

    /// On success, sorted reads and sorted writes followed by the SQL records in issue order,
    /// across all contracts. On failure, only the schema definition records.
    pub(crate) fn into_rwset(self, success: bool) -> TxRWSet {
        if !success {
            return TxRWSet::new(self.tx_id, vec![], self.ddl_records);
        }
        let tx_reads = self.reads.into_values().collect();
        let tx_writes = self
            .writes
            .into_iter()
            .map(|(key, value)| TxWrite::new(key, value))
            .chain(self.sql_records)
            .collect();
        TxRWSet::new(self.tx_id, tx_reads, tx_writes)
    }

    /// Informational set of a query: everything on success, nothing on failure.
    pub(crate) fn into_query_rwset(self, success: bool) -> TxRWSet {
        if !success {
            return TxRWSet::empty(self.tx_id);
        }
        self.into_rwset(true)
    }
}
