// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use super::state_key;
use crate::{errors::IteratorError, iterator_registry::IteratorRegistry};
use claims::{assert_err_eq, assert_ok, assert_ok_eq};
use std::collections::BTreeMap;
use weave_state_view::{Kv, SqlRow, VecSqlRows, VecStateIterator};

fn kv_cursor(keys: &[&str]) -> Box<VecStateIterator> {
    Box::new(VecStateIterator::new(
        keys.iter()
            .map(|key| Kv {
                key: state_key("c", key),
                value: key.as_bytes().to_vec(),
            })
            .collect(),
    ))
}

fn sql_cursor(num_rows: usize) -> Box<VecSqlRows> {
    Box::new(VecSqlRows::new(
        (0..num_rows)
            .map(|id| {
                let mut row = SqlRow::new();
                row.insert("id".to_string(), id.to_string().into_bytes());
                row
            })
            .collect(),
    ))
}

#[test]
fn handles_start_at_one_and_are_never_reused() {
    let mut registry = IteratorRegistry::new();
    assert_ok_eq!(registry.open_kv(kv_cursor(&[])), 1);
    assert_ok_eq!(registry.open_sql(sql_cursor(0)), 2);
    assert_ok!(registry.close(1));
    assert_ok!(registry.close(2));
    assert_eq!(registry.num_open(), 0);

    assert_ok_eq!(registry.open_kv(kv_cursor(&[])), 3);
}

#[test]
fn drains_kv_cursor() {
    let mut registry = IteratorRegistry::new();
    let handle = registry.open_kv(kv_cursor(&["a", "b"])).unwrap();

    let mut keys = vec![];
    while registry.kv_has_next(handle).unwrap() {
        keys.push(registry.kv_next(handle).unwrap().unwrap().key);
    }
    assert_eq!(keys, vec![state_key("c", "a"), state_key("c", "b")]);
    assert_ok_eq!(registry.kv_next(handle), None);
}

#[test]
fn drains_sql_cursor() {
    let mut registry = IteratorRegistry::new();
    let handle = registry.open_sql(sql_cursor(3)).unwrap();

    let mut ids = vec![];
    while registry.sql_has_next(handle).unwrap() {
        let row: BTreeMap<String, Vec<u8>> = registry.sql_next(handle).unwrap().unwrap();
        ids.push(row["id"].clone());
    }
    assert_eq!(ids, vec![b"0".to_vec(), b"1".to_vec(), b"2".to_vec()]);
}

#[test]
fn misuse_is_reported() {
    let mut registry = IteratorRegistry::new();
    assert_err_eq!(registry.kv_has_next(42), IteratorError::UnknownHandle(42));
    assert_err_eq!(registry.close(42), IteratorError::UnknownHandle(42));

    let kv = registry.open_kv(kv_cursor(&["a"])).unwrap();
    let sql = registry.open_sql(sql_cursor(1)).unwrap();
    assert_err_eq!(registry.sql_next(kv), IteratorError::KindMismatch {
        handle: kv,
        expected: "sql",
    });
    assert_err_eq!(registry.kv_has_next(sql), IteratorError::KindMismatch {
        handle: sql,
        expected: "key-value",
    });

    // Double close.
    assert_ok!(registry.close(kv));
    assert_err_eq!(registry.close(kv), IteratorError::UnknownHandle(kv));
    assert_err_eq!(registry.kv_next(kv), IteratorError::UnknownHandle(kv));
    assert_eq!(registry.num_open(), 1);
}

#[test]
fn release_all_reports_open_handles() {
    let mut registry = IteratorRegistry::new();
    let first = registry.open_kv(kv_cursor(&["a"])).unwrap();
    let second = registry.open_sql(sql_cursor(1)).unwrap();
    let third = registry.open_kv(kv_cursor(&["b"])).unwrap();
    assert_ok!(registry.close(second));

    assert_eq!(registry.release_all(), vec![first, third]);
    assert_eq!(registry.num_open(), 0);
    assert!(registry.release_all().is_empty());
}
