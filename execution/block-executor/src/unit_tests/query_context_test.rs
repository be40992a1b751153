// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use super::{limits, state_key, store_with};
use crate::{
    errors::SimContextError,
    mock_vm::{mock_txn, MockOp, MockVm},
    query_context::QueryContext,
    sim_context::TxSimContext,
};
use claims::{assert_matches, assert_ok_eq};
use std::sync::Arc;
use weave_state_view::{InMemoryStore, SqlRow};
use weave_types::{
    rwset::{ReadVersion, TxRead, TxWrite},
    transaction::{TxStatusCode, TxType},
};

#[test]
fn query_reads_the_durable_store() {
    let store = store_with(&[("c", "k", "v1")]);
    let txn = mock_txn("q0", "c", "lookup").with_type(TxType::QueryContract);
    let vm = MockVm::new().with_script("c", "lookup", vec![
        MockOp::get("c", "k"),
        MockOp::put("c", "scratch", "x"),
    ]);

    let output = QueryContext::new(&txn, &*store, &vm, 9, limits(5, 100)).execute();
    assert_eq!(output.code, TxStatusCode::Success);
    assert_eq!(output.result.result, b"v1".to_vec());
    assert_eq!(output.finalized.rwset.tx_reads, vec![TxRead::new(
        state_key("c", "k"),
        Some(b"v1".to_vec()),
        ReadVersion::Storage
    )]);
    assert_eq!(output.finalized.rwset.tx_writes, vec![TxWrite::new(
        state_key("c", "scratch"),
        Some(b"x".to_vec())
    )]);

    // Query writes never reach the store.
    assert_eq!(store.len(), 1);
}

#[test]
fn query_rejects_separator_in_contract_names() {
    let store = Arc::new(InMemoryStore::new_relational());
    store.set_value(&state_key("bank", "x#balance"), b"100".to_vec());
    let txn = mock_txn("q0", "bank", "lookup").with_type(TxType::QueryContract);
    let vm = MockVm::new();
    let mut ctx = QueryContext::new(&txn, &*store, &vm, 9, limits(5, 100));

    assert_matches!(ctx.get("bank#x", b"balance"), Err(SimContextError::InvalidKey(_)));
    assert_matches!(ctx.select("bank#x", b"a", b"z"), Err(SimContextError::InvalidKey(_)));
    assert_matches!(ctx.query_multi("bank#x", "SELECT 1"), Err(SimContextError::InvalidKey(_)));
    assert_ok_eq!(ctx.get("bank", b"x#balance"), Some(b"100".to_vec()));
}

#[test]
fn failed_query_has_an_empty_rwset() {
    let store = store_with(&[("c", "k", "v1")]);
    let txn = mock_txn("q0", "c", "lookup").with_type(TxType::QueryContract);
    let vm = MockVm::new().with_script("c", "lookup", vec![
        MockOp::get("c", "k"),
        MockOp::ddl("c", "CREATE TABLE t (id INT)"),
        MockOp::Fail("not found".to_string()),
    ]);

    let output = QueryContext::new(&txn, &*store, &vm, 9, limits(5, 100)).execute();
    assert_eq!(output.code, TxStatusCode::ContractFail);
    assert!(output.finalized.rwset.is_empty());
    assert_eq!(output.finalized.observed_reads.len(), 1);
}

#[test]
fn query_enforces_call_limits() {
    let store = store_with(&[]);
    let txn = mock_txn("q0", "a", "run").with_type(TxType::QueryContract);
    let vm = MockVm::new()
        .with_script("a", "run", vec![MockOp::call("b", "run")])
        .with_script("b", "run", vec![]);

    let output = QueryContext::new(&txn, &*store, &vm, 9, limits(1, 100)).execute();
    assert_eq!(output.code, TxStatusCode::ContractTooDeep);
    assert_eq!(vm.invocations("b", "run"), 0);
}

#[test]
fn query_iterates_relational_rows() {
    let store = Arc::new(InMemoryStore::new_relational());
    let rows: Vec<SqlRow> = (0..2)
        .map(|id| {
            let mut row = SqlRow::new();
            row.insert("id".to_string(), vec![id]);
            row
        })
        .collect();
    store.insert_rows("c", rows.clone());

    let txn = mock_txn("q0", "c", "lookup").with_type(TxType::QueryContract);
    let vm = MockVm::new();
    let mut ctx = QueryContext::new(&txn, &*store, &vm, 9, limits(5, 100));
    assert_eq!(ctx.block_height(), 9);

    let handle = ctx.query_multi("c", "SELECT id FROM t").unwrap();
    let mut seen = vec![];
    while ctx.sql_has_next(handle).unwrap() {
        seen.push(ctx.sql_next(handle).unwrap().unwrap());
    }
    assert_eq!(seen, rows);
    assert_ok_eq!(ctx.sql_next(handle), None);

    let finalized = ctx.finalize(true);
    assert_eq!(finalized.leaked_handles, vec![handle]);
}
