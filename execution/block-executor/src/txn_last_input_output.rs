// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::sim_context::FinalizedContext;
use arc_swap::ArcSwapOption;
use crossbeam::utils::CachePadded;
use std::sync::Arc;
use weave_types::{
    rwset::{TxRWSet, TxRead},
    transaction::{ContractResult, TxStatusCode},
    TxnIndex,
};

/// Everything the commit coordinator needs from one execution of a transaction.
#[derive(Clone, Debug)]
pub(crate) struct TxnOutput {
    pub(crate) rwset: TxRWSet,
    pub(crate) observed_reads: Vec<TxRead>,
    pub(crate) result: ContractResult,
    pub(crate) code: TxStatusCode,
    pub(crate) gas_used: u64,
    pub(crate) leaked_iterators: u32,
    /// Executions it took to produce this output, governance retries included.
    pub(crate) attempts: usize,
}

impl TxnOutput {
    pub(crate) fn new(result: ContractResult, code: TxStatusCode, finalized: FinalizedContext) -> Self {
        Self {
            rwset: finalized.rwset,
            observed_reads: finalized.observed_reads,
            result,
            code,
            gas_used: finalized.gas_used,
            leaked_iterators: finalized.leaked_handles.len() as u32,
            attempts: 1,
        }
    }
}

/// Latest speculative output of every transaction of the block, indexed by position.
pub(crate) struct TxnLastInputOutput {
    outputs: Vec<CachePadded<ArcSwapOption<TxnOutput>>>, // txn_idx -> output.
}

impl TxnLastInputOutput {
    pub(crate) fn new(num_txns: TxnIndex) -> Self {
        Self {
            outputs: (0..num_txns)
                .map(|_| CachePadded::new(ArcSwapOption::empty()))
                .collect(),
        }
    }

    pub(crate) fn record(&self, txn_idx: TxnIndex, output: TxnOutput) {
        self.outputs[txn_idx as usize].store(Some(Arc::new(output)));
    }

    /// Removes and returns the output of `txn_idx`, if it has been executed.
    pub(crate) fn take_output(&self, txn_idx: TxnIndex) -> Option<TxnOutput> {
        self.outputs[txn_idx as usize]
            .swap(None)
            .map(|output| Arc::try_unwrap(output).unwrap_or_else(|output| (*output).clone()))
    }
}
