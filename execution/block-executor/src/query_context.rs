// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    call_chain::{self, invoke_transaction, CallChain, CallFrames, CallLimits},
    errors::SimContextError,
    iterator_registry::IteratorRegistry,
    rwset_recorder::{RWSetRecorder, SqlKind},
    sim_context::{checked_key, release_iterators, FinalizedContext, TxSimContext},
    task::VmManager,
};
use weave_state_view::{DurableStore, Kv, SqlRow};
use weave_types::{
    contract::Contract,
    rwset::{ReadVersion, TxRead},
    state_key::check_contract_name,
    transaction::{ContractResult, Parameters, Transaction, TxStatusCode},
};

/// Outcome of a query. The read/write set is informational and never hashed into a block.
#[derive(Clone, Debug)]
pub struct QueryOutput {
    pub result: ContractResult,
    pub code: TxStatusCode,
    pub finalized: FinalizedContext,
}

/// Context for lookups issued outside of block execution. Reads go straight to the durable
/// store, writes stay local to the query and nothing takes part in a dag.
pub struct QueryContext<'a> {
    tx: &'a Transaction,
    store: &'a dyn DurableStore,
    vm: &'a dyn VmManager,
    block_height: u64,
    limits: CallLimits,
    rwset: RWSetRecorder,
    call_chain: CallChain,
    iterators: IteratorRegistry,
}

impl<'a> QueryContext<'a> {
    pub fn new(
        tx: &'a Transaction,
        store: &'a dyn DurableStore,
        vm: &'a dyn VmManager,
        block_height: u64,
        limits: CallLimits,
    ) -> Self {
        Self {
            tx,
            store,
            vm,
            block_height,
            limits,
            rwset: RWSetRecorder::new(tx.tx_id.clone()),
            call_chain: CallChain::default(),
            iterators: IteratorRegistry::new(),
        }
    }

    /// Runs the query's entry call and finalizes the context.
    pub fn execute(mut self) -> QueryOutput {
        let (result, code) = invoke_transaction(&mut self);
        let finalized = self.finalize(code.is_success());
        QueryOutput {
            result,
            code,
            finalized,
        }
    }

    /// On success, the sorted reads and writes. On failure, nothing: queries never carry schema
    /// changes.
    pub fn finalize(mut self, success: bool) -> FinalizedContext {
        let leaked_handles = release_iterators(&self.tx.tx_id, &mut self.iterators);
        let observed_reads = self.rwset.observed_reads();
        let gas_used = self.call_chain.gas_used();
        FinalizedContext {
            rwset: self.rwset.into_query_rwset(success),
            observed_reads,
            call_chain: self.call_chain.into_entries(),
            leaked_handles,
            gas_used,
        }
    }
}

impl CallFrames for QueryContext<'_> {
    fn call_chain_mut(&mut self) -> &mut CallChain {
        &mut self.call_chain
    }

    fn call_limits(&self) -> CallLimits {
        self.limits
    }
}

impl TxSimContext for QueryContext<'_> {
    fn get(&mut self, contract_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>, SimContextError> {
        let state_key = checked_key(contract_name, key)?;
        if let Some(value) = self.rwset.pending_write(&state_key) {
            return Ok(value.clone());
        }
        if let Some(read) = self.rwset.cached_read(&state_key) {
            return Ok(read.value.clone());
        }
        let value = self
            .store
            .read_object(contract_name, key)
            .map_err(SimContextError::storage)?;
        self.rwset
            .record_read(TxRead::new(state_key, value.clone(), ReadVersion::Storage));
        Ok(value)
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
        let iter = self
            .store
            .select_object(contract_name, start_key, limit_key)
            .map_err(SimContextError::storage)?;
        Ok(self.iterators.open_kv(iter)?)
    }

    fn query_multi(&mut self, contract_name: &str, sql: &str) -> Result<i32, SimContextError> {
        check_contract_name(contract_name)?;
        let relational = self
            .store
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
        self.block_height
    }

    fn contract_bytecode(&self, contract_name: &str) -> Result<Option<Vec<u8>>, SimContextError> {
        self.store
            .get_contract_bytecode(contract_name)
            .map_err(SimContextError::storage)
    }
}
