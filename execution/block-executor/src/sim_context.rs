// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    call_chain::{self, CallChain, CallChainEntry, CallFrames, CallLimits},
    counters::LEAKED_ITERATOR_COUNT,
    errors::SimContextError,
    iterator_registry::IteratorRegistry,
    rwset_recorder::{RWSetRecorder, SqlKind},
    snapshot::{ReadOutcome, Snapshot},
    task::VmManager,
};
use tracing::warn;
use weave_state_view::{Kv, SqlRow};
use weave_types::{
    contract::Contract,
    rwset::{TxRWSet, TxRead},
    state_key::{check_contract_name, StateKey},
    transaction::{ContractResult, Parameters, Transaction, TxStatusCode},
    TxnIndex,
};

/// The only interface through which a contract touches state while it executes.
pub trait TxSimContext {
    /// Resolves the key against this transaction's writes, then its read cache, then the
    /// underlying state. The first state read of a key is recorded in the read set.
    fn get(&mut self, contract_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>, SimContextError>;

    fn put(&mut self, contract_name: &str, key: &[u8], value: Vec<u8>)
        -> Result<(), SimContextError>;

    fn del(&mut self, contract_name: &str, key: &[u8]) -> Result<(), SimContextError>;

    fn put_record(&mut self, contract_name: &str, statement: Vec<u8>, kind: SqlKind);

    /// Opens a cursor over `[start_key, limit_key)` and returns its handle.
    fn select(
        &mut self,
        contract_name: &str,
        start_key: &[u8],
        limit_key: &[u8],
    ) -> Result<i32, SimContextError>;

    /// Runs a query against the relational store variant and returns a handle over its rows.
    fn query_multi(&mut self, contract_name: &str, sql: &str) -> Result<i32, SimContextError>;

    fn kv_has_next(&mut self, handle: i32) -> Result<bool, SimContextError>;

    fn kv_next(&mut self, handle: i32) -> Result<Option<Kv>, SimContextError>;

    fn sql_has_next(&mut self, handle: i32) -> Result<bool, SimContextError>;

    fn sql_next(&mut self, handle: i32) -> Result<Option<SqlRow>, SimContextError>;

    fn close_iterator(&mut self, handle: i32) -> Result<(), SimContextError>;

    /// Invokes another contract. Fails without reaching the VM if the call would exceed the
    /// maximum call depth, or if the gas used so far already exceeds the gas limit. Empty byte
    /// code is loaded from the deployed contract.
    fn call_contract(
        &mut self,
        contract: &Contract,
        method: &str,
        byte_code: Vec<u8>,
        parameters: Parameters,
        gas_used: u64,
    ) -> (ContractResult, TxStatusCode);

    /// Result bytes of the most recently returned contract call.
    fn current_result(&self) -> &[u8];

    fn depth(&self) -> usize;

    fn gas_used(&self) -> u64;

    fn tx(&self) -> &Transaction;

    fn block_height(&self) -> u64;

    fn contract_bytecode(&self, contract_name: &str) -> Result<Option<Vec<u8>>, SimContextError>;
}

/// What remains of a context once its transaction is over.
#[derive(Clone, Debug)]
pub struct FinalizedContext {
    pub rwset: TxRWSet,
    /// Every read performed, including those of a failed transaction that are not part of
    /// `rwset`.
    pub observed_reads: Vec<TxRead>,
    pub call_chain: Vec<CallChainEntry>,
    pub leaked_handles: Vec<i32>,
    pub gas_used: u64,
}

pub(crate) fn checked_key(contract_name: &str, key: &[u8]) -> Result<StateKey, SimContextError> {
    let state_key = StateKey::new(contract_name, key);
    state_key.validate()?;
    Ok(state_key)
}

pub(crate) fn release_iterators(tx_id: &str, iterators: &mut IteratorRegistry) -> Vec<i32> {
    let leaked_handles = iterators.release_all();
    if !leaked_handles.is_empty() {
        warn!(
            tx_id = tx_id,
            leaked = leaked_handles.len(),
            "transaction ended with open iterator handles"
        );
        LEAKED_ITERATOR_COUNT.inc_by(leaked_handles.len() as u64);
    }
    leaked_handles
}

/// Sandbox of one transaction executing against a block [`Snapshot`]. Private to the
/// transaction, so nothing here needs locking.
pub struct SimContext<'a> {
    txn_idx: TxnIndex,
    tx: &'a Transaction,
    snapshot: &'a Snapshot,
    vm: &'a dyn VmManager,
    limits: CallLimits,
    rwset: RWSetRecorder,
    call_chain: CallChain,
    iterators: IteratorRegistry,
}

impl<'a> SimContext<'a> {
    pub fn new(
        txn_idx: TxnIndex,
        tx: &'a Transaction,
        snapshot: &'a Snapshot,
        vm: &'a dyn VmManager,
        limits: CallLimits,
    ) -> Self {
        Self {
            txn_idx,
            tx,
            snapshot,
            vm,
            limits,
            rwset: RWSetRecorder::new(tx.tx_id.clone()),
            call_chain: CallChain::default(),
            iterators: IteratorRegistry::new(),
        }
    }

    pub fn txn_idx(&self) -> TxnIndex {
        self.txn_idx
    }

    /// Ends the transaction. Open iterator handles are released and reported as leaked.
    pub fn finalize(mut self, success: bool) -> FinalizedContext {
        let leaked_handles = release_iterators(&self.tx.tx_id, &mut self.iterators);
        let observed_reads = self.rwset.observed_reads();
        let gas_used = self.call_chain.gas_used();
        FinalizedContext {
            rwset: self.rwset.into_rwset(success),
            observed_reads,
            call_chain: self.call_chain.into_entries(),
            leaked_handles,
            gas_used,
        }
    }
}

impl CallFrames for SimContext<'_> {
    fn call_chain_mut(&mut self) -> &mut CallChain {
        &mut self.call_chain
    }

    fn call_limits(&self) -> CallLimits {
        self.limits
    }
}

impl TxSimContext for SimContext<'_> {
    fn get(&mut self, contract_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>, SimContextError> {
        let state_key = checked_key(contract_name, key)?;
        // The read cache only applies to keys this transaction has not written since.
        if !self.rwset.writes().contains_key(&state_key) {
            if let Some(read) = self.rwset.cached_read(&state_key) {
                return Ok(read.value.clone());
            }
        }
        match self.snapshot.get(&state_key, self.rwset.writes())? {
            ReadOutcome::OwnWrite(value) => Ok(value),
            ReadOutcome::Versioned(value, version) => {
                self.rwset
                    .record_read(TxRead::new(state_key, value.clone(), version));
                Ok(value)
            },
        }
    }

    fn put(
        &mut self,
        contract_name: &str,
        key: &[u8],
        value: Vec<u8>,
    ) -> Result<(), SimContextError> {
        let state_key = checked_key(contract_name, key)?;
        self.rwset.put(state_key, Some(value));
        Ok(())
    }

    fn del(&mut self, contract_name: &str, key: &[u8]) -> Result<(), SimContextError> {
        let state_key = checked_key(contract_name, key)?;
        self.rwset.put(state_key, None);
        Ok(())
    }

    fn put_record(&mut self, contract_name: &str, statement: Vec<u8>, kind: SqlKind) {
        self.rwset.put_record(contract_name, statement, kind);
    }

    fn select(
        &mut self,
        contract_name: &str,
        start_key: &[u8],
        limit_key: &[u8],
    ) -> Result<i32, SimContextError> {
        check_contract_name(contract_name)?;
        let iter = self.snapshot.select(contract_name, start_key, limit_key)?;
        Ok(self.iterators.open_kv(iter)?)
    }

    fn query_multi(&mut self, contract_name: &str, sql: &str) -> Result<i32, SimContextError> {
        check_contract_name(contract_name)?;
        let relational = self
            .snapshot
            .store()
            .relational()
            .ok_or(SimContextError::RelationalUnsupported)?;
        let rows = relational
            .query_multi(contract_name, sql)
            .map_err(SimContextError::storage)?;
        Ok(self.iterators.open_sql(rows)?)
    }

    fn kv_has_next(&mut self, handle: i32) -> Result<bool, SimContextError> {
        Ok(self.iterators.kv_has_next(handle)?)
    }

    fn kv_next(&mut self, handle: i32) -> Result<Option<Kv>, SimContextError> {
        Ok(self.iterators.kv_next(handle)?)
    }

    fn sql_has_next(&mut self, handle: i32) -> Result<bool, SimContextError> {
        Ok(self.iterators.sql_has_next(handle)?)
    }

    fn sql_next(&mut self, handle: i32) -> Result<Option<SqlRow>, SimContextError> {
        Ok(self.iterators.sql_next(handle)?)
    }

    fn close_iterator(&mut self, handle: i32) -> Result<(), SimContextError> {
        Ok(self.iterators.close(handle)?)
    }

    fn call_contract(
        &mut self,
        contract: &Contract,
        method: &str,
        byte_code: Vec<u8>,
        parameters: Parameters,
        gas_used: u64,
    ) -> (ContractResult, TxStatusCode) {
        let vm = self.vm;
        call_chain::call_contract(self, vm, contract, method, byte_code, parameters, gas_used)
    }

    fn current_result(&self) -> &[u8] {
        self.call_chain.current_result()
    }

    fn depth(&self) -> usize {
        self.call_chain.depth()
    }

    fn gas_used(&self) -> u64 {
        self.call_chain.gas_used()
    }

    fn tx(&self) -> &Transaction {
        self.tx
    }

    fn block_height(&self) -> u64 {
        self.snapshot.height()
    }

    fn contract_bytecode(&self, contract_name: &str) -> Result<Option<Vec<u8>>, SimContextError> {
        Ok(self.snapshot.contract_bytecode(contract_name)?)
    }
}
