// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sequential model of a block: every transaction runs to completion, in index order, before the
//! next one starts. The parallel executor must be indistinguishable from it.

use crate::{
    executor::BlockOutput,
    proptest_types::types::{key, written_value, GenOp, TransactionGen},
};
use std::collections::BTreeMap;
use weave_types::{
    rwset::{ReadVersion, TxRWSet, TxRead, TxWrite},
    state_key::StateKey,
    transaction::TxStatusCode,
    TxnIndex,
};

pub(crate) struct BaselineOutput {
    rwsets: Vec<TxRWSet>,
    /// Contract result of every transaction, `None` for transactions that fail.
    results: Vec<Option<Vec<u8>>>,
    final_writes: Vec<TxWrite>,
}

impl BaselineOutput {
    pub(crate) fn generate(initial: &BTreeMap<StateKey, Vec<u8>>, txn_gens: &[TransactionGen]) -> Self {
        let mut state: BTreeMap<StateKey, (ReadVersion, Option<Vec<u8>>)> = initial
            .iter()
            .map(|(key, value)| (key.clone(), (ReadVersion::Storage, Some(value.clone()))))
            .collect();
        let mut block_writes: BTreeMap<StateKey, Option<Vec<u8>>> = BTreeMap::new();
        let mut rwsets = Vec::with_capacity(txn_gens.len());
        let mut results = Vec::with_capacity(txn_gens.len());

        for (txn_idx, txn_gen) in txn_gens.iter().enumerate() {
            let tx_id = format!("t{}", txn_idx);
            let mut own_writes: BTreeMap<StateKey, Option<Vec<u8>>> = BTreeMap::new();
            let mut reads: BTreeMap<StateKey, TxRead> = BTreeMap::new();
            let mut output = vec![];

            for (op_idx, op) in txn_gen.ops.iter().enumerate() {
                match op {
                    GenOp::Read(k) => {
                        let key = key(*k);
                        let value = match own_writes.get(&key) {
                            Some(value) => value.clone(),
                            None => reads
                                .entry(key.clone())
                                .or_insert_with(|| {
                                    let (version, value) = state
                                        .get(&key)
                                        .cloned()
                                        .unwrap_or((ReadVersion::Storage, None));
                                    TxRead::new(key.clone(), value, version)
                                })
                                .value
                                .clone(),
                        };
                        output = value.unwrap_or_default();
                    },
                    GenOp::Write(k) => {
                        own_writes.insert(key(*k), Some(written_value(txn_idx, op_idx)));
                    },
                    GenOp::Delete(k) => {
                        own_writes.insert(key(*k), None);
                    },
                }
            }

            if txn_gen.fails {
                rwsets.push(TxRWSet::empty(tx_id));
                results.push(None);
                continue;
            }
            for (key, value) in &own_writes {
                state.insert(
                    key.clone(),
                    (ReadVersion::InBlock(txn_idx as TxnIndex), value.clone()),
                );
                block_writes.insert(key.clone(), value.clone());
            }
            rwsets.push(TxRWSet::new(
                tx_id,
                reads.into_values().collect(),
                own_writes
                    .into_iter()
                    .map(|(key, value)| TxWrite::new(key, value))
                    .collect(),
            ));
            results.push(Some(output));
        }

        Self {
            rwsets,
            results,
            final_writes: block_writes
                .into_iter()
                .map(|(key, value)| TxWrite::new(key, value))
                .collect(),
        }
    }

    pub(crate) fn assert_output(&self, output: &BlockOutput, final_writes: &[TxWrite]) {
        assert!(output.deferred.is_empty());
        assert_eq!(output.tx_rwsets, self.rwsets);
        assert_eq!(output.results.len(), self.results.len());
        for (result, expected) in output.results.iter().zip(&self.results) {
            match expected {
                Some(value) => {
                    assert_eq!(result.code, TxStatusCode::Success);
                    assert_eq!(&result.contract_result.result, value);
                },
                None => assert_eq!(result.code, TxStatusCode::ContractFail),
            }
            assert_eq!(result.leaked_iterators, 0);
        }
        assert_eq!(final_writes, self.final_writes.as_slice());
    }
}
