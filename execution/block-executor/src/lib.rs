// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

/*!
The block executor turns the ordered transaction list of a block into the artifacts consensus
signs: one read/write set per transaction, the dependency dag between them, and per-transaction
status and gas metadata.

## Snapshot and simulation contexts

Every block executes against a [`Snapshot`](snapshot::Snapshot) anchored at the previous block.
A snapshot layers the writes of the transactions of the block merged so far over the durable
store. Each transaction runs inside its own [`SimContext`](sim_context::SimContext), which
mediates every state access of the contract: reads resolve against the transaction's own
writes, then its read cache, then the snapshot, and the first snapshot read of a key is recorded
together with the version it observed. Nested contract calls go through the context as well, so
that the call depth and gas limits are enforced before the VM is ever reached.

## Scheduling

Worker threads claim transactions from a shared index and execute them speculatively. Whoever
holds the commit lock merges finished transactions strictly in block order: the recorded read
versions are validated against the snapshot, and a transaction whose reads were invalidated by
an earlier merge is re-executed against the updated snapshot, or deferred to a later block,
depending on the configured conflict policy. Because the merge order is the block order and only
validated reads are ever merged, the result does not depend on the number of workers or on the
order in which executions finish.

While merging, the coordinator builds the dag: an edge `i -> j` exists whenever `j` reads or
writes a key `i` wrote, or writes a key `i` read, reduced to direct dependencies. Validators
replay a proposed block level by level along this dag and compare the re-derived read/write set
root with the proposal.
*/

pub mod call_chain;
pub mod counters;
pub mod dag_builder;
pub mod errors;
pub mod executor;
pub mod iterator_registry;
#[cfg(any(test, feature = "testing"))]
pub mod mock_vm;
#[cfg(test)]
mod proptest_types;
pub mod query_context;
mod rwset_recorder;
pub mod scheduler;
pub mod sim_context;
pub mod snapshot;
pub mod task;
mod txn_last_input_output;
#[cfg(test)]
mod unit_tests;

pub use rwset_recorder::SqlKind;
