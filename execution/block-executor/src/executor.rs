// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    call_chain::{invoke_transaction, CallLimits},
    counters,
    counters::{
        DeferReason, BLOCK_EXECUTION_SECONDS, BLOCK_REPLAY_SECONDS, TASK_EXECUTE_SECONDS,
    },
    dag_builder::DagBuilder,
    errors::*,
    scheduler::{Scheduler, SchedulerTask},
    sim_context::SimContext,
    snapshot::Snapshot,
    task::{Accesses, VmManager},
    txn_last_input_output::{TxnLastInputOutput, TxnOutput},
};
use parking_lot::Mutex;
use rayon::{prelude::*, ThreadPool};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info, warn};
use weave_config::config::{ConfigSanitizer, ConflictPolicy, ExecutionConfig};
use weave_types::{
    dag::Dag,
    hash::HashValue,
    rwset::{rwset_root, ReadVersion, TxRWSet},
    state_key::StateKey,
    transaction::{Transaction, TxResult, TxStatusCode},
    TxnIndex,
};

/// The artifacts of a scheduled block, consumed by consensus and by the storage commit pipeline.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlockOutput {
    /// Read/write sets of the included transactions, in block order.
    pub tx_rwsets: Vec<TxRWSet>,
    /// Dependency graph over the included transactions, addressed by their position in
    /// `tx_rwsets`.
    pub dag: Dag,
    pub results: Vec<TxResult>,
    /// Indices, in the input list, of the transactions left for a later block.
    pub deferred: Vec<TxnIndex>,
    pub rwset_root: HashValue,
}

impl BlockOutput {
    fn empty() -> Self {
        Self {
            tx_rwsets: vec![],
            dag: Dag::default(),
            results: vec![],
            deferred: vec![],
            rwset_root: rwset_root(&[]),
        }
    }
}

/// State owned by whichever worker currently coordinates commits.
#[derive(Default)]
struct CommitState {
    dag_builder: DagBuilder,
    // Block index -> vertex of the merged transaction.
    vertexes: HashMap<TxnIndex, TxnIndex>,
    tx_rwsets: Vec<TxRWSet>,
    results: Vec<TxResult>,
    deferred: Vec<TxnIndex>,
    error: Option<BlockExecutionError>,
}

impl CommitState {
    /// Merges an accepted output into the snapshot and the dag.
    fn merge(
        &mut self,
        txn_idx: TxnIndex,
        mut output: TxnOutput,
        snapshot: &Snapshot,
    ) -> BlockExecutionResult<()> {
        snapshot.apply_write_set(txn_idx, &output.rwset)?;

        let accesses = Accesses {
            keys_read: output
                .observed_reads
                .iter()
                .map(|read| read.key.clone())
                .collect::<Vec<StateKey>>(),
            keys_written: output.rwset.write_keys().cloned().collect(),
        };
        let vertex = self.dag_builder.add(&accesses);
        self.vertexes.insert(txn_idx, vertex);

        // Version hints are published relative to the included transactions, so that a replay of
        // the block observes identical read/write sets.
        for read in output.rwset.tx_reads.iter_mut() {
            if let ReadVersion::InBlock(writer) = read.version {
                if let Some(writer_vertex) = self.vertexes.get(&writer) {
                    read.version = ReadVersion::InBlock(*writer_vertex);
                }
            }
        }

        let result = tx_result(&output);
        snapshot.record_result(result.clone());
        self.results.push(result);
        self.tx_rwsets.push(output.rwset);
        Ok(())
    }

    fn into_output(self) -> BlockExecutionResult<BlockOutput> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let rwset_root = rwset_root(&self.tx_rwsets);
        Ok(BlockOutput {
            tx_rwsets: self.tx_rwsets,
            dag: self.dag_builder.build(),
            results: self.results,
            deferred: self.deferred,
            rwset_root,
        })
    }
}

fn tx_result(output: &TxnOutput) -> TxResult {
    TxResult {
        tx_id: output.rwset.tx_id.clone(),
        code: output.code,
        contract_result: output.result.clone(),
        rwset_hash: output.rwset.hash(),
        gas_used: output.gas_used,
        leaked_iterators: output.leaked_iterators,
    }
}

pub struct BlockExecutor {
    config: ExecutionConfig,
    vm: Arc<dyn VmManager>,
    executor_thread_pool: Arc<ThreadPool>,
}

impl BlockExecutor {
    pub fn new(config: ExecutionConfig, vm: Arc<dyn VmManager>) -> BlockExecutionResult<Self> {
        config.sanitize()?;
        let executor_thread_pool = Arc::new(
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.concurrency_level)
                .thread_name(|index| format!("block_executor_{}", index))
                .build()
                .map_err(|error| BlockExecutionError::ThreadPool(error.to_string()))?,
        );
        Ok(Self {
            config,
            vm,
            executor_thread_pool,
        })
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    fn execute(&self, txn_idx: TxnIndex, txn: &Transaction, snapshot: &Snapshot) -> TxnOutput {
        let _timer = TASK_EXECUTE_SECONDS.start_timer();
        counters::TXN_EXECUTED_COUNT.inc();

        let mut context = SimContext::new(
            txn_idx,
            txn,
            snapshot,
            self.vm.as_ref(),
            CallLimits::from(&self.config),
        );
        let (result, code) = invoke_transaction(&mut context);
        let finalized = context.finalize(code.is_success());
        TxnOutput::new(result, code, finalized)
    }

    /// Executes a transaction, retrying governance transactions that hit an internal error.
    fn execute_with_retry(
        &self,
        txn_idx: TxnIndex,
        txn: &Transaction,
        snapshot: &Snapshot,
    ) -> TxnOutput {
        let mut output = self.execute(txn_idx, txn, snapshot);
        let mut attempts = 1;
        while txn.tx_type.is_governance()
            && output.code == TxStatusCode::InternalError
            && attempts <= self.config.max_governance_retries
        {
            counters::GOVERNANCE_RETRY_COUNT.inc();
            warn!(
                tx_id = %txn.tx_id,
                attempt = attempts,
                message = %output.result.message,
                "retrying governance transaction after an internal error"
            );
            output = self.execute(txn_idx, txn, snapshot);
            attempts += 1;
        }
        output.attempts = attempts;
        output
    }

    fn check_governance(txn: &Transaction, output: &TxnOutput) -> BlockExecutionResult<()> {
        if txn.tx_type.is_governance() && output.code == TxStatusCode::InternalError {
            return Err(BlockExecutionError::GovernanceAborted {
                tx_id: txn.tx_id.clone(),
                attempts: output.attempts,
                message: output.result.message.clone(),
            });
        }
        Ok(())
    }

    /// Whether every read of the output still observes the version it was served from.
    fn validate(output: &TxnOutput, snapshot: &Snapshot) -> bool {
        output
            .observed_reads
            .iter()
            .all(|read| snapshot.current_version(&read.key) == read.version)
    }

    /// Merges executed transactions in index order for as long as their outputs are available.
    fn commit_ready_txns(
        &self,
        block: &[Transaction],
        snapshot: &Snapshot,
        last_input_output: &TxnLastInputOutput,
        scheduler: &Scheduler,
        commit_state: &mut CommitState,
    ) {
        while !scheduler.done() {
            let txn_idx = scheduler.commit_idx();
            if scheduler.timed_out() {
                let deferred: Vec<TxnIndex> = (txn_idx..scheduler.num_txns()).collect();
                counters::TXN_DEFERRED_COUNT
                    .with_label_values(&[DeferReason::TIMEOUT])
                    .inc_by(deferred.len() as u64);
                info!(
                    merged = txn_idx,
                    deferred = deferred.len(),
                    "block scheduling timed out, deferring the remaining transactions"
                );
                commit_state.deferred.extend(deferred);
                scheduler.halt();
                return;
            }

            let Some(output) = last_input_output.take_output(txn_idx) else {
                // Not executed yet.
                return;
            };
            let txn = &block[txn_idx as usize];

            let output = if Self::validate(&output, snapshot) {
                Some(output)
            } else {
                match self.config.conflict_policy {
                    ConflictPolicy::Reexecute => {
                        counters::TXN_REEXECUTED_COUNT.inc();
                        debug!(txn_idx = txn_idx, "read conflict, re-executing");
                        Some(self.execute_with_retry(txn_idx, txn, snapshot))
                    },
                    ConflictPolicy::Defer => {
                        counters::TXN_DEFERRED_COUNT
                            .with_label_values(&[DeferReason::CONFLICT])
                            .inc();
                        debug!(txn_idx = txn_idx, "read conflict, deferring");
                        commit_state.deferred.push(txn_idx);
                        None
                    },
                }
            };

            if let Some(output) = output {
                let merged = Self::check_governance(txn, &output)
                    .and_then(|_| commit_state.merge(txn_idx, output, snapshot));
                if let Err(error) = merged {
                    warn!(txn_idx = txn_idx, error = %error, "aborting block scheduling round");
                    commit_state.error = Some(error);
                    scheduler.halt();
                    return;
                }
            }
            scheduler.advance_commit();
        }
    }

    fn worker_loop(
        &self,
        block: &[Transaction],
        snapshot: &Snapshot,
        last_input_output: &TxnLastInputOutput,
        scheduler: &Scheduler,
        shared_commit_state: &Mutex<CommitState>,
    ) {
        loop {
            // Prioritize committing, whoever gets the lock coordinates.
            if let Some(mut commit_state) = shared_commit_state.try_lock() {
                self.commit_ready_txns(
                    block,
                    snapshot,
                    last_input_output,
                    scheduler,
                    &mut commit_state,
                );
            }

            match scheduler.next_task() {
                SchedulerTask::ExecutionTask(txn_idx) => {
                    let output =
                        self.execute_with_retry(txn_idx, &block[txn_idx as usize], snapshot);
                    last_input_output.record(txn_idx, output);
                },
                SchedulerTask::NoTask => std::thread::yield_now(),
                SchedulerTask::Done => break,
            }
        }
    }

    /// Schedules `block` against `snapshot` and seals the snapshot, also when the round aborts.
    ///
    /// Transactions execute speculatively on the worker pool and are merged strictly in block
    /// order. The output is identical for every pool size as long as the round neither times out
    /// nor defers conflicting transactions.
    pub fn execute_block(
        &self,
        block: &[Transaction],
        snapshot: &Snapshot,
    ) -> BlockExecutionResult<BlockOutput> {
        let _timer = BLOCK_EXECUTION_SECONDS.start_timer();
        if block.is_empty() {
            snapshot.seal();
            return Ok(BlockOutput::empty());
        }

        let num_txns = block.len() as TxnIndex;
        let last_input_output = TxnLastInputOutput::new(num_txns);
        let scheduler = Scheduler::new(num_txns, self.config.schedule_timeout());
        let shared_commit_state = Mutex::new(CommitState::default());

        self.executor_thread_pool.scope(|s| {
            for _ in 0..self.config.concurrency_level {
                s.spawn(|_| {
                    self.worker_loop(
                        block,
                        snapshot,
                        &last_input_output,
                        &scheduler,
                        &shared_commit_state,
                    );
                });
            }
        });

        // An aborted round still seals: its partial merges must not be built upon.
        let output = shared_commit_state.into_inner().into_output();
        snapshot.seal();
        let output = output?;
        info!(
            height = snapshot.height(),
            included = output.tx_rwsets.len(),
            deferred = output.deferred.len(),
            dag_edges = output.dag.num_edges(),
            "block scheduled"
        );
        Ok(output)
    }

    /// Executes and merges the levels of `dag` in order. Stops at the first governance abort.
    fn replay_levels(
        &self,
        block: &[Transaction],
        dag: &Dag,
        snapshot: &Snapshot,
    ) -> BlockExecutionResult<Vec<Option<TxnOutput>>> {
        let mut outputs: Vec<Option<TxnOutput>> = (0..block.len()).map(|_| None).collect();
        for level in dag.levels() {
            let level_outputs: Vec<(TxnIndex, TxnOutput)> = self.executor_thread_pool.install(|| {
                level
                    .par_iter()
                    .map(|txn_idx| {
                        let txn = &block[*txn_idx as usize];
                        (*txn_idx, self.execute_with_retry(*txn_idx, txn, snapshot))
                    })
                    .collect()
            });
            for (txn_idx, output) in level_outputs {
                Self::check_governance(&block[txn_idx as usize], &output)?;
                snapshot.apply_write_set(txn_idx, &output.rwset)?;
                outputs[txn_idx as usize] = Some(output);
            }
        }
        Ok(outputs)
    }

    /// Replays a proposed block level by level along `dag`: the transactions of one level run in
    /// parallel and are merged in index order before the next level starts.
    pub fn execute_with_dag(
        &self,
        block: &[Transaction],
        dag: &Dag,
        snapshot: &Snapshot,
    ) -> BlockExecutionResult<BlockOutput> {
        let _timer = BLOCK_REPLAY_SECONDS.start_timer();
        if dag.num_vertexes() != block.len() {
            return Err(BlockExecutionError::InvalidDag(format!(
                "dag has {} vertexes for {} transactions",
                dag.num_vertexes(),
                block.len()
            )));
        }
        if !dag.is_well_formed() {
            return Err(BlockExecutionError::InvalidDag(
                "dependencies must be ascending and point to earlier transactions".to_string(),
            ));
        }

        let replayed = self.replay_levels(block, dag, snapshot);
        snapshot.seal();
        let outputs = replayed?;

        let mut commit_state = CommitState::default();
        for (txn_idx, output) in outputs.into_iter().enumerate() {
            let output = output.ok_or_else(|| {
                BlockExecutionError::InvalidDag(format!("transaction {} was never replayed", txn_idx))
            })?;
            let accesses = Accesses {
                keys_read: output
                    .observed_reads
                    .iter()
                    .map(|read| read.key.clone())
                    .collect(),
                keys_written: output.rwset.write_keys().cloned().collect(),
            };
            commit_state.dag_builder.add(&accesses);
            let result = tx_result(&output);
            snapshot.record_result(result.clone());
            commit_state.results.push(result);
            commit_state.tx_rwsets.push(output.rwset);
        }
        commit_state.into_output()
    }

    /// Re-derives a proposed block and checks it against the proposal's dag and read/write set
    /// root.
    pub fn verify_block(
        &self,
        block: &[Transaction],
        dag: &Dag,
        expected_root: HashValue,
        snapshot: &Snapshot,
    ) -> BlockExecutionResult<BlockOutput> {
        let output = self.execute_with_dag(block, dag, snapshot)?;
        if output.dag != *dag {
            return Err(BlockExecutionError::VerificationMismatch {
                field: "dag",
                expected: format!("{:?}", dag.edges().collect::<Vec<_>>()),
                actual: format!("{:?}", output.dag.edges().collect::<Vec<_>>()),
            });
        }
        if output.rwset_root != expected_root {
            return Err(BlockExecutionError::VerificationMismatch {
                field: "rwset_root",
                expected: expected_root.to_hex(),
                actual: output.rwset_root.to_hex(),
            });
        }
        Ok(output)
    }
}
