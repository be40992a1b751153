// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::mock_vm::{mock_txn, MockOp, MockVm};
use proptest::{collection::vec, prelude::*};
use std::collections::BTreeMap;
use weave_state_view::InMemoryStore;
use weave_types::{state_key::StateKey, transaction::Transaction};

pub(crate) const CONTRACT: &str = "c";
pub(crate) const KEY_UNIVERSE: usize = 6;

pub(crate) fn key(idx: usize) -> StateKey {
    StateKey::new(CONTRACT, key_name(idx).into_bytes())
}

fn key_name(idx: usize) -> String {
    format!("k{}", idx)
}

/// Value written by operation `op_idx` of transaction `txn_idx`. Unique per write, so that the
/// baseline can tell every writer apart.
pub(crate) fn written_value(txn_idx: usize, op_idx: usize) -> Vec<u8> {
    format!("{}-{}", txn_idx, op_idx).into_bytes()
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum GenOp {
    Read(usize),
    Write(usize),
    Delete(usize),
}

#[derive(Clone, Debug)]
pub(crate) struct TransactionGen {
    pub(crate) ops: Vec<GenOp>,
    /// The contract fails once every operation has run.
    pub(crate) fails: bool,
}

fn gen_op() -> impl Strategy<Value = GenOp> {
    prop_oneof![
        3 => (0..KEY_UNIVERSE).prop_map(GenOp::Read),
        2 => (0..KEY_UNIVERSE).prop_map(GenOp::Write),
        1 => (0..KEY_UNIVERSE).prop_map(GenOp::Delete),
    ]
}

pub(crate) fn transaction_gen() -> impl Strategy<Value = TransactionGen> {
    (vec(gen_op(), 1..6), proptest::bool::weighted(0.15))
        .prop_map(|(ops, fails)| TransactionGen { ops, fails })
}

pub(crate) fn initial_store(populated: &[bool]) -> InMemoryStore {
    InMemoryStore::from_values(initial_values(populated))
}

/// Contents of the store before the block, `true` meaning the key holds a value.
pub(crate) fn initial_values(populated: &[bool]) -> BTreeMap<StateKey, Vec<u8>> {
    populated
        .iter()
        .enumerate()
        .filter(|(_, populated)| **populated)
        .map(|(idx, _)| (key(idx), format!("init-{}", idx).into_bytes()))
        .collect()
}

/// Turns the generated transactions into a block and the VM scripting it.
pub(crate) fn materialize(txn_gens: &[TransactionGen]) -> (Vec<Transaction>, MockVm) {
    let mut vm = MockVm::new();
    let mut block = Vec::with_capacity(txn_gens.len());
    for (txn_idx, txn_gen) in txn_gens.iter().enumerate() {
        let method = format!("m{}", txn_idx);
        let mut ops: Vec<MockOp> = txn_gen
            .ops
            .iter()
            .enumerate()
            .map(|(op_idx, op)| match op {
                GenOp::Read(k) => MockOp::get(CONTRACT, &key_name(*k)),
                GenOp::Write(k) => MockOp::Put {
                    contract: CONTRACT.to_string(),
                    key: key_name(*k).into_bytes(),
                    value: written_value(txn_idx, op_idx),
                },
                GenOp::Delete(k) => MockOp::del(CONTRACT, &key_name(*k)),
            })
            .collect();
        if txn_gen.fails {
            ops.push(MockOp::Fail("abort".to_string()));
        }
        vm = vm.with_script(CONTRACT, &method, ops);
        block.push(mock_txn(&format!("t{}", txn_idx), CONTRACT, &method));
    }
    (block, vm)
}
