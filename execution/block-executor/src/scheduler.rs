// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crossbeam::utils::CachePadded;
use std::{
    sync::atomic::{AtomicBool, AtomicU32, Ordering},
    time::{Duration, Instant},
};
use weave_types::TxnIndex;

/// A holder for a potential task returned from the Scheduler. NoTask holds no task (similar to
/// None if tasks were wrapped in Option), and Done implies that the scheduling round is over.
#[derive(Debug, Eq, PartialEq)]
pub enum SchedulerTask {
    ExecutionTask(TxnIndex),
    NoTask,
    Done,
}

pub struct Scheduler {
    /// Number of txns to execute, immutable.
    num_txns: TxnIndex,

    /// A shared index of the next transaction to execute speculatively. Threads increment it to
    /// claim transactions, so every transaction is handed out exactly once.
    execution_idx: AtomicU32,

    /// Next transaction to merge into the snapshot. Only the thread holding the commit lock
    /// advances it, strictly by one.
    commit_idx: CachePadded<AtomicU32>,

    /// Set once every transaction is merged, the deadline passed, or the round was aborted.
    done_marker: CachePadded<AtomicBool>,

    deadline: Instant,
}

impl Scheduler {
    pub fn new(num_txns: TxnIndex, timeout: Duration) -> Self {
        Self {
            num_txns,
            execution_idx: AtomicU32::new(0),
            commit_idx: CachePadded::new(AtomicU32::new(0)),
            done_marker: CachePadded::new(AtomicBool::new(num_txns == 0)),
            deadline: Instant::now() + timeout,
        }
    }

    pub fn num_txns(&self) -> TxnIndex {
        self.num_txns
    }

    pub fn next_task(&self) -> SchedulerTask {
        if self.done() {
            return SchedulerTask::Done;
        }
        // Avoid pointlessly spinning the index once every transaction was handed out.
        if self.execution_idx.load(Ordering::Acquire) >= self.num_txns || self.timed_out() {
            return SchedulerTask::NoTask;
        }
        let idx_to_execute = self.execution_idx.fetch_add(1, Ordering::SeqCst);
        if idx_to_execute < self.num_txns {
            SchedulerTask::ExecutionTask(idx_to_execute)
        } else {
            SchedulerTask::NoTask
        }
    }

    pub fn commit_idx(&self) -> TxnIndex {
        self.commit_idx.load(Ordering::Acquire)
    }

    /// Must only be called by the thread holding the commit lock.
    pub fn advance_commit(&self) {
        let next = self.commit_idx.fetch_add(1, Ordering::AcqRel) + 1;
        if next >= self.num_txns {
            self.halt();
        }
    }

    pub fn timed_out(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Ends the round. Returns true if this call ended it.
    pub fn halt(&self) -> bool {
        !self.done_marker.swap(true, Ordering::SeqCst)
    }

    pub fn done(&self) -> bool {
        self.done_marker.load(Ordering::Acquire)
    }
}
