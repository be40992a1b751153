// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! This crate defines [`trait DurableStore`](DurableStore), the read-only contract between the
//! execution engine and the persisted chain state.
//!
//! The engine never writes through these traits. Committed state changes reach the store through
//! the block commit pipeline after consensus.

use anyhow::Result;
use std::collections::BTreeMap;
use weave_types::state_key::StateKey;

mod in_memory;

pub use in_memory::InMemoryStore;

/// A key-value pair yielded by a range cursor. The key is already stripped of the contract
/// prefix used by the flat storage encoding.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Kv {
    pub key: StateKey,
    pub value: Vec<u8>,
}

/// Cursor over a half-open key range of one contract.
pub trait StateIterator: Send {
    /// Whether a call to `next` would yield an entry. Does not advance the cursor.
    fn has_next(&mut self) -> bool;

    fn next(&mut self) -> Result<Option<Kv>>;

    /// Frees the underlying storage resources. Afterwards the cursor is exhausted.
    fn release(&mut self);
}

/// A row of a relational query, keyed by column name.
pub type SqlRow = BTreeMap<String, Vec<u8>>;

/// Cursor over the rows of a relational query.
pub trait SqlRows: Send {
    fn has_next(&mut self) -> bool;

    fn next(&mut self) -> Result<Option<SqlRow>>;

    fn close(&mut self);
}

/// Query surface of the relational backend variant.
pub trait RelationalStore: Send + Sync {
    fn query_single(&self, contract_name: &str, sql: &str) -> Result<Option<SqlRow>>;

    fn query_multi(&self, contract_name: &str, sql: &str) -> Result<Box<dyn SqlRows>>;
}

/// Read access to the durable state as of the block a snapshot is anchored at.
pub trait DurableStore: Send + Sync {
    /// Gets the value of `key` owned by `contract_name`, `None` if it does not exist.
    fn read_object(&self, contract_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Returns a cursor over `[start_key, limit_key)` of `contract_name`.
    fn select_object(
        &self,
        contract_name: &str,
        start_key: &[u8],
        limit_key: &[u8],
    ) -> Result<Box<dyn StateIterator>>;

    /// Gets the deployed byte code of a contract.
    fn get_contract_bytecode(&self, contract_name: &str) -> Result<Option<Vec<u8>>>;

    /// The relational query surface, if this backend is the relational variant.
    fn relational(&self) -> Option<&dyn RelationalStore> {
        None
    }
}

/// Cursor over entries materialized when the range was selected.
pub struct VecStateIterator {
    entries: std::vec::IntoIter<Kv>,
    peeked: Option<Kv>,
}

impl VecStateIterator {
    pub fn new(entries: Vec<Kv>) -> Self {
        Self {
            entries: entries.into_iter(),
            peeked: None,
        }
    }
}

impl StateIterator for VecStateIterator {
    fn has_next(&mut self) -> bool {
        if self.peeked.is_none() {
            self.peeked = self.entries.next();
        }
        self.peeked.is_some()
    }

    fn next(&mut self) -> Result<Option<Kv>> {
        Ok(self.peeked.take().or_else(|| self.entries.next()))
    }

    fn release(&mut self) {
        self.peeked = None;
        self.entries = Vec::new().into_iter();
    }
}

/// Rows materialized when the query ran.
pub struct VecSqlRows {
    rows: std::vec::IntoIter<SqlRow>,
    peeked: Option<SqlRow>,
}

impl VecSqlRows {
    pub fn new(rows: Vec<SqlRow>) -> Self {
        Self {
            rows: rows.into_iter(),
            peeked: None,
        }
    }
}

impl SqlRows for VecSqlRows {
    fn has_next(&mut self) -> bool {
        if self.peeked.is_none() {
            self.peeked = self.rows.next();
        }
        self.peeked.is_some()
    }

    fn next(&mut self) -> Result<Option<SqlRow>> {
        Ok(self.peeked.take().or_else(|| self.rows.next()))
    }

    fn close(&mut self) {
        self.peeked = None;
        self.rows = Vec::new().into_iter();
    }
}
