// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! A scripted [`VmManager`] for tests: every `(contract, method)` pair maps to a fixed list of
//! state operations.

use crate::{
    errors::SimContextError, rwset_recorder::SqlKind, sim_context::TxSimContext, task::VmManager,
};
use parking_lot::Mutex;
use std::{collections::HashMap, time::Duration};
use weave_types::{
    contract::Contract,
    transaction::{ContractResult, Parameters, Transaction, TxStatusCode, TxType},
};

#[derive(Clone, Debug)]
pub enum MockOp {
    /// Reads a key. The value of the last read becomes the contract result.
    Get { contract: String, key: Vec<u8> },
    Put {
        contract: String,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Del { contract: String, key: Vec<u8> },
    PutRecord {
        contract: String,
        statement: Vec<u8>,
        kind: SqlKind,
    },
    /// Calls another scripted contract. Its result becomes the contract result.
    Call { contract: Contract, method: String },
    /// Drains `[start, limit)` into the contract result, closing the handle if `close` is set.
    Scan {
        contract: String,
        start: Vec<u8>,
        limit: Vec<u8>,
        close: bool,
    },
    ConsumeGas(u64),
    Fail(String),
    /// Fails with an internal error on the first `n` invocations of the script.
    FailInternalTimes(usize),
    Sleep(Duration),
}

impl MockOp {
    pub fn get(contract: &str, key: &str) -> Self {
        MockOp::Get {
            contract: contract.to_string(),
            key: key.as_bytes().to_vec(),
        }
    }

    pub fn put(contract: &str, key: &str, value: &str) -> Self {
        MockOp::Put {
            contract: contract.to_string(),
            key: key.as_bytes().to_vec(),
            value: value.as_bytes().to_vec(),
        }
    }

    pub fn del(contract: &str, key: &str) -> Self {
        MockOp::Del {
            contract: contract.to_string(),
            key: key.as_bytes().to_vec(),
        }
    }

    pub fn ddl(contract: &str, statement: &str) -> Self {
        MockOp::PutRecord {
            contract: contract.to_string(),
            statement: statement.as_bytes().to_vec(),
            kind: SqlKind::Ddl,
        }
    }

    pub fn dml(contract: &str, statement: &str) -> Self {
        MockOp::PutRecord {
            contract: contract.to_string(),
            statement: statement.as_bytes().to_vec(),
            kind: SqlKind::Dml,
        }
    }

    pub fn call(contract: &str, method: &str) -> Self {
        MockOp::Call {
            contract: Contract::native(contract),
            method: method.to_string(),
        }
    }

    pub fn scan(contract: &str, start: &str, limit: &str, close: bool) -> Self {
        MockOp::Scan {
            contract: contract.to_string(),
            start: start.as_bytes().to_vec(),
            limit: limit.as_bytes().to_vec(),
            close,
        }
    }
}

type ScriptKey = (String, String);

#[derive(Default)]
pub struct MockVm {
    scripts: HashMap<ScriptKey, Vec<MockOp>>,
    invocations: Mutex<HashMap<ScriptKey, usize>>,
}

/// A native-contract invocation of `method` on `contract`.
pub fn mock_txn(tx_id: &str, contract: &str, method: &str) -> Transaction {
    Transaction::new(tx_id, Contract::native(contract), method, Parameters::new())
}

fn error_status(error: &SimContextError) -> TxStatusCode {
    match error {
        SimContextError::Snapshot(_) | SimContextError::Storage(_) => TxStatusCode::InternalError,
        _ => TxStatusCode::ContractFail,
    }
}

impl MockVm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, contract: &str, method: &str, ops: Vec<MockOp>) -> Self {
        self.scripts
            .insert((contract.to_string(), method.to_string()), ops);
        self
    }

    /// How often the VM was asked to run `method` of `contract`.
    pub fn invocations(&self, contract: &str, method: &str) -> usize {
        self.invocations
            .lock()
            .get(&(contract.to_string(), method.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn run_ops(
        &self,
        ops: &[MockOp],
        invocation: usize,
        ctx: &mut dyn TxSimContext,
        gas: &mut u64,
    ) -> Result<(Vec<u8>, TxStatusCode), (String, TxStatusCode)> {
        let mut output = vec![];
        for op in ops {
            match op {
                MockOp::Get { contract, key } => {
                    output = ctx
                        .get(contract, key)
                        .map_err(|e| (e.to_string(), error_status(&e)))?
                        .unwrap_or_default();
                },
                MockOp::Put {
                    contract,
                    key,
                    value,
                } => ctx
                    .put(contract, key, value.clone())
                    .map_err(|e| (e.to_string(), error_status(&e)))?,
                MockOp::Del { contract, key } => ctx
                    .del(contract, key)
                    .map_err(|e| (e.to_string(), error_status(&e)))?,
                MockOp::PutRecord {
                    contract,
                    statement,
                    kind,
                } => ctx.put_record(contract, statement.clone(), *kind),
                MockOp::Call { contract, method } => {
                    let (result, code) =
                        ctx.call_contract(contract, method, vec![], Parameters::new(), *gas);
                    *gas = (*gas).max(result.gas_used);
                    if !code.is_success() {
                        return Err((result.message, code));
                    }
                    output = ctx.current_result().to_vec();
                },
                MockOp::Scan {
                    contract,
                    start,
                    limit,
                    close,
                } => {
                    let to_error = |e: SimContextError| (e.to_string(), error_status(&e));
                    let handle = ctx.select(contract, start, limit).map_err(to_error)?;
                    output.clear();
                    while ctx.kv_has_next(handle).map_err(to_error)? {
                        if let Some(kv) = ctx.kv_next(handle).map_err(to_error)? {
                            output.extend_from_slice(&kv.value);
                        }
                    }
                    if *close {
                        ctx.close_iterator(handle).map_err(to_error)?;
                    }
                },
                MockOp::ConsumeGas(amount) => *gas += amount,
                MockOp::Fail(message) => {
                    return Err((message.clone(), TxStatusCode::ContractFail));
                },
                MockOp::FailInternalTimes(times) => {
                    if invocation <= *times {
                        return Err((
                            format!("transient failure {} of {}", invocation, times),
                            TxStatusCode::InternalError,
                        ));
                    }
                },
                MockOp::Sleep(duration) => std::thread::sleep(*duration),
            }
        }
        Ok((output, TxStatusCode::Success))
    }
}

impl VmManager for MockVm {
    fn run_contract(
        &self,
        contract: &Contract,
        method: &str,
        _byte_code: &[u8],
        _parameters: &Parameters,
        ctx: &mut dyn TxSimContext,
        gas_used: u64,
        _tx_type: TxType,
    ) -> (ContractResult, TxStatusCode) {
        let script_key = (contract.name.clone(), method.to_string());
        let invocation = {
            let mut invocations = self.invocations.lock();
            let count = invocations.entry(script_key.clone()).or_insert(0);
            *count += 1;
            *count
        };
        let Some(ops) = self.scripts.get(&script_key) else {
            return (
                ContractResult::failure(format!("unknown method {}.{}", contract, method), gas_used),
                TxStatusCode::ContractFail,
            );
        };

        // Every invocation costs one unit on top of what the caller already used.
        let mut gas = gas_used + 1;
        match self.run_ops(ops, invocation, ctx, &mut gas) {
            Ok((output, code)) => (ContractResult::success(output, gas), code),
            Err((message, code)) => (ContractResult::failure(message, gas), code),
        }
    }
}
