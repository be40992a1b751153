// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use super::{snapshot_of, state_key, store_with};
use crate::{
    errors::SnapshotError,
    snapshot::{OwnWrites, ReadOutcome},
};
use claims::{assert_err, assert_matches, assert_ok};
use weave_types::rwset::{ReadVersion, TxRWSet, TxWrite};

fn write_set(tx_id: &str, writes: Vec<TxWrite>) -> TxRWSet {
    TxRWSet::new(tx_id, vec![], writes)
}

fn put(key: &str, value: &str) -> TxWrite {
    TxWrite::new(state_key("c", key), Some(value.as_bytes().to_vec()))
}

#[test]
fn reads_resolve_own_writes_then_block_then_store() {
    let store = store_with(&[("c", "k1", "stored"), ("c", "k2", "stored")]);
    let snapshot = snapshot_of(&store);
    let no_writes = OwnWrites::new();

    assert_eq!(
        snapshot.get(&state_key("c", "k1"), &no_writes).unwrap(),
        ReadOutcome::Versioned(Some(b"stored".to_vec()), ReadVersion::Storage)
    );

    assert_ok!(snapshot.apply_write_set(0, &write_set("t0", vec![put("k1", "merged")])));
    assert_eq!(
        snapshot.get(&state_key("c", "k1"), &no_writes).unwrap(),
        ReadOutcome::Versioned(Some(b"merged".to_vec()), ReadVersion::InBlock(0))
    );

    let mut own_writes = OwnWrites::new();
    own_writes.insert(state_key("c", "k1"), Some(b"mine".to_vec()));
    let outcome = snapshot.get(&state_key("c", "k1"), &own_writes).unwrap();
    assert_eq!(outcome, ReadOutcome::OwnWrite(Some(b"mine".to_vec())));
    assert_eq!(outcome.value(), Some(&b"mine"[..]));

    // Untouched keys still come from the store.
    assert_eq!(
        snapshot.current_version(&state_key("c", "k2")),
        ReadVersion::Storage
    );
}

#[test]
fn deletions_shadow_the_store() {
    let store = store_with(&[("c", "k1", "stored")]);
    let snapshot = snapshot_of(&store);
    assert_ok!(snapshot.apply_write_set(
        3,
        &write_set("t3", vec![TxWrite::new(state_key("c", "k1"), None)])
    ));

    let outcome = snapshot
        .get(&state_key("c", "k1"), &OwnWrites::new())
        .unwrap();
    assert_eq!(outcome, ReadOutcome::Versioned(None, ReadVersion::InBlock(3)));
    assert_eq!(outcome.value(), None);
}

#[test]
fn record_writes_are_not_merged() {
    let store = store_with(&[]);
    let snapshot = snapshot_of(&store);
    let record = TxWrite::new(
        weave_types::state_key::StateKey::record("c"),
        Some(b"CREATE TABLE t (id INT)".to_vec()),
    );
    assert_ok!(snapshot.apply_write_set(0, &write_set("t0", vec![record, put("k", "v")])));

    let final_writes = snapshot.final_writes();
    assert_eq!(final_writes, vec![put("k", "v")]);
}

#[test]
fn final_writes_keep_the_last_writer_sorted() {
    let store = store_with(&[("c", "k0", "stored")]);
    let snapshot = snapshot_of(&store);
    assert_ok!(snapshot.apply_write_set(0, &write_set("t0", vec![put("k2", "a"), put("k1", "a")])));
    assert_ok!(snapshot.apply_write_set(1, &write_set("t1", vec![put("k2", "b")])));

    assert_eq!(snapshot.final_writes(), vec![put("k1", "a"), put("k2", "b")]);
    assert_eq!(
        snapshot.current_version(&state_key("c", "k2")),
        ReadVersion::InBlock(1)
    );
    // The store itself is never written by the snapshot.
    assert_eq!(store.len(), 1);
}

#[test]
fn sealed_snapshot_rejects_merges() {
    let store = store_with(&[]);
    let snapshot = snapshot_of(&store);
    assert!(!snapshot.is_sealed());
    snapshot.seal();
    assert!(snapshot.is_sealed());

    let error = assert_err!(snapshot.apply_write_set(0, &write_set("t0", vec![put("k", "v")])));
    assert_matches!(error, SnapshotError::Sealed(7));
    assert!(snapshot.final_writes().is_empty());
}

#[test]
fn select_is_half_open() {
    let store = store_with(&[("c", "a1", "1"), ("c", "a2", "2"), ("c", "a3", "3"), ("d", "a2", "x")]);
    let snapshot = snapshot_of(&store);

    let mut iter = snapshot.select("c", b"a1", b"a3").unwrap();
    let mut values = vec![];
    while iter.has_next() {
        values.push(iter.next().unwrap().unwrap().value);
    }
    assert_eq!(values, vec![b"1".to_vec(), b"2".to_vec()]);

    let mut empty = snapshot.select("c", b"a3", b"a1").unwrap();
    assert!(!empty.has_next());
}
