// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

pub struct DeferReason;

impl DeferReason {
    pub const CONFLICT: &'static str = "conflict";
    pub const TIMEOUT: &'static str = "timeout";
}

/// Count of transaction executions, speculative and inline re-executions alike.
pub static TXN_EXECUTED_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "weave_execution_txn_executed_count",
        "Number of transaction executions"
    )
    .unwrap()
});

/// Count of transactions re-executed because an earlier merge invalidated their reads.
pub static TXN_REEXECUTED_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "weave_execution_txn_reexecuted_count",
        "Number of transactions re-executed after a read conflict"
    )
    .unwrap()
});

pub static TXN_DEFERRED_COUNT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "weave_execution_txn_deferred_count",
        "Number of transactions excluded from a block and left for a later one",
        &["reason"]
    )
    .unwrap()
});

pub static GOVERNANCE_RETRY_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "weave_execution_governance_retry_count",
        "Number of governance transaction retries after an internal error"
    )
    .unwrap()
});

/// Iterator handles that contracts left open until the end of their transaction.
pub static LEAKED_ITERATOR_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "weave_execution_leaked_iterator_count",
        "Number of iterator handles released at transaction end instead of by the contract"
    )
    .unwrap()
});

pub static BLOCK_EXECUTION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "weave_execution_block_execution_seconds",
        "Time spent scheduling and merging one block, in seconds"
    )
    .unwrap()
});

pub static BLOCK_REPLAY_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "weave_execution_block_replay_seconds",
        "Time spent replaying a proposed block along its dag, in seconds"
    )
    .unwrap()
});

pub static TASK_EXECUTE_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "weave_execution_task_execute_seconds",
        "Time spent executing a single transaction, in seconds"
    )
    .unwrap()
});
