// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    DurableStore, Kv, RelationalStore, SqlRow, SqlRows, StateIterator, VecSqlRows,
    VecStateIterator,
};
use anyhow::Result;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use weave_types::{
    rwset::TxWrite,
    state_key::{check_contract_name, StateKey},
};

/// A [`DurableStore`] held entirely in memory, keyed by the flat `contract#key` encoding.
///
/// The relational variant ignores statement text: a query returns every row registered for the
/// contract with [`InMemoryStore::insert_rows`].
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    byte_codes: RwLock<HashMap<String, Vec<u8>>>,
    rows: Option<RwLock<HashMap<String, Vec<SqlRow>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_relational() -> Self {
        Self {
            rows: Some(RwLock::new(HashMap::new())),
            ..Self::default()
        }
    }

    pub fn from_values(values: impl IntoIterator<Item = (StateKey, Vec<u8>)>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write();
            for (key, value) in values {
                state.insert(key.encode(), value);
            }
        }
        store
    }

    pub fn set_value(&self, key: &StateKey, value: Vec<u8>) {
        self.state.write().insert(key.encode(), value);
    }

    pub fn deploy_contract(&self, contract_name: impl Into<String>, byte_code: Vec<u8>) {
        self.byte_codes.write().insert(contract_name.into(), byte_code);
    }

    /// Registers rows for a contract. A no-op unless the store is relational.
    pub fn insert_rows(&self, contract_name: impl Into<String>, rows: Vec<SqlRow>) {
        if let Some(tables) = &self.rows {
            tables
                .write()
                .entry(contract_name.into())
                .or_default()
                .extend(rows);
        }
    }

    /// Persists the key-value writes of a committed block. Record writes belong to the
    /// relational backend and are skipped.
    pub fn apply_write_set<'a>(&self, writes: impl IntoIterator<Item = &'a TxWrite>) {
        let mut state = self.state.write();
        for write in writes.into_iter().filter(|write| !write.is_record()) {
            match &write.value {
                Some(value) => state.insert(write.key.encode(), value.clone()),
                None => state.remove(&write.key.encode()),
            };
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }
}

impl DurableStore for InMemoryStore {
    fn read_object(&self, contract_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        check_contract_name(contract_name)?;
        let encoded = StateKey::new(contract_name, key).encode();
        Ok(self.state.read().get(&encoded).cloned())
    }

    fn select_object(
        &self,
        contract_name: &str,
        start_key: &[u8],
        limit_key: &[u8],
    ) -> Result<Box<dyn StateIterator>> {
        check_contract_name(contract_name)?;
        if start_key >= limit_key {
            return Ok(Box::new(VecStateIterator::new(vec![])));
        }
        let start = StateKey::new(contract_name, start_key).encode();
        let limit = StateKey::new(contract_name, limit_key).encode();
        let entries = self
            .state
            .read()
            .range(start..limit)
            .filter_map(|(encoded, value)| {
                StateKey::decode(contract_name, encoded).map(|key| Kv {
                    key,
                    value: value.clone(),
                })
            })
            .collect();
        Ok(Box::new(VecStateIterator::new(entries)))
    }

    fn get_contract_bytecode(&self, contract_name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.byte_codes.read().get(contract_name).cloned())
    }

    fn relational(&self) -> Option<&dyn RelationalStore> {
        self.rows.as_ref().map(|_| self as &dyn RelationalStore)
    }
}

impl RelationalStore for InMemoryStore {
    fn query_single(&self, contract_name: &str, _sql: &str) -> Result<Option<SqlRow>> {
        Ok(self.rows.as_ref().and_then(|tables| {
            tables
                .read()
                .get(contract_name)
                .and_then(|rows| rows.first().cloned())
        }))
    }

    fn query_multi(&self, contract_name: &str, _sql: &str) -> Result<Box<dyn SqlRows>> {
        let rows = self
            .rows
            .as_ref()
            .and_then(|tables| tables.read().get(contract_name).cloned())
            .unwrap_or_default();
        Ok(Box::new(VecSqlRows::new(rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::{assert_err, assert_ok_eq, assert_some};

    // `assert_err!` formats the `Ok` value, so the boxed cursor needs `Debug` in tests.
    impl std::fmt::Debug for dyn StateIterator {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("dyn StateIterator")
        }
    }

    fn key(contract: &str, key: &str) -> StateKey {
        StateKey::new(contract, key.as_bytes())
    }

    fn drain(mut iter: Box<dyn StateIterator>) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = vec![];
        while iter.has_next() {
            let kv = assert_some!(iter.next().unwrap());
            out.push((kv.key.key().to_vec(), kv.value));
        }
        out
    }

    #[test]
    fn read_is_contract_scoped() {
        let store = InMemoryStore::from_values(vec![
            (key("a", "k"), b"1".to_vec()),
            (key("b", "k"), b"2".to_vec()),
        ]);
        assert_ok_eq!(store.read_object("a", b"k"), Some(b"1".to_vec()));
        assert_ok_eq!(store.read_object("b", b"k"), Some(b"2".to_vec()));
        assert_ok_eq!(store.read_object("c", b"k"), None);
    }

    #[test]
    fn contract_names_cannot_reach_into_other_contracts() {
        let store = InMemoryStore::from_values(vec![
            (key("bank", "x#balance"), b"100".to_vec()),
            (key("bank", "x#owner"), b"alice".to_vec()),
        ]);
        assert_err!(store.read_object("bank#x", b"balance"));
        assert_err!(store.select_object("bank#x", b"a", b"z"));
        assert_ok_eq!(store.read_object("bank", b"x#balance"), Some(b"100".to_vec()));

        // A name that only shares a prefix sees none of the other contract's keys.
        let entries = drain(store.select_object("ban", b"a", b"z").unwrap());
        assert!(entries.is_empty());
        assert_eq!(drain(store.select_object("bank", b"x", b"y").unwrap()).len(), 2);
    }

    #[test]
    fn select_is_half_open() {
        let store = InMemoryStore::from_values(vec![
            (key("c", "k1"), b"1".to_vec()),
            (key("c", "k2"), b"2".to_vec()),
            (key("c", "k3"), b"3".to_vec()),
            (key("d", "k2"), b"x".to_vec()),
        ]);
        let entries = drain(store.select_object("c", b"k1", b"k3").unwrap());
        assert_eq!(entries, vec![
            (b"k1".to_vec(), b"1".to_vec()),
            (b"k2".to_vec(), b"2".to_vec()),
        ]);
        assert!(drain(store.select_object("c", b"k3", b"k1").unwrap()).is_empty());
    }

    #[test]
    fn released_iterator_is_exhausted() {
        let store = InMemoryStore::from_values(vec![(key("c", "k1"), b"1".to_vec())]);
        let mut iter = store.select_object("c", b"k0", b"k9").unwrap();
        assert!(iter.has_next());
        iter.release();
        assert!(!iter.has_next());
        assert_ok_eq!(iter.next(), None);
    }

    #[test]
    fn apply_write_set_skips_records() {
        let store = InMemoryStore::from_values(vec![(key("c", "gone"), b"1".to_vec())]);
        let writes = vec![
            TxWrite::new(key("c", "new"), Some(b"2".to_vec())),
            TxWrite::new(key("c", "gone"), None),
            TxWrite::new(StateKey::record("c"), Some(b"INSERT".to_vec())),
        ];
        store.apply_write_set(&writes);
        assert_ok_eq!(store.read_object("c", b"new"), Some(b"2".to_vec()));
        assert_ok_eq!(store.read_object("c", b"gone"), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn relational_surface_is_optional() {
        let store = InMemoryStore::new();
        assert!(store.relational().is_none());

        let store = InMemoryStore::new_relational();
        let row: SqlRow = [("id".to_string(), b"1".to_vec())].into_iter().collect();
        store.insert_rows("c", vec![row.clone()]);
        let relational = assert_some!(store.relational());
        let mut rows = relational.query_multi("c", "SELECT * FROM t").unwrap();
        assert!(rows.has_next());
        assert_ok_eq!(rows.next(), Some(row));
        assert!(!rows.has_next());
    }

    #[test]
    fn byte_code_lookup() {
        let store = InMemoryStore::new();
        store.deploy_contract("c", vec![0xab]);
        assert_ok_eq!(store.get_contract_bytecode("c"), Some(vec![0xab]));
        assert_ok_eq!(store.get_contract_bytecode("missing"), None);
    }
}
