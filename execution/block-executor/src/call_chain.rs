// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{sim_context::TxSimContext, task::VmManager};
use tracing::debug;
use weave_config::config::ExecutionConfig;
use weave_types::{
    contract::{Contract, RuntimeType},
    transaction::{ContractResult, Parameters, TxStatusCode},
};

/// Hard limits enforced on every contract call before the VM is invoked.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CallLimits {
    pub max_call_depth: usize,
    pub gas_limit: u64,
}

impl From<&ExecutionConfig> for CallLimits {
    fn from(config: &ExecutionConfig) -> Self {
        Self {
            max_call_depth: config.max_call_depth,
            gas_limit: config.gas_limit,
        }
    }
}

/// A completed call of a transaction's call chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CallChainEntry {
    pub contract: Contract,
    pub method: String,
    pub parameters: Parameters,
    pub depth: usize,
    /// Cumulative gas of the chain when the call returned.
    pub gas_used: u64,
    pub result: Vec<u8>,
}

#[derive(Default)]
pub(crate) struct CallChain {
    depth: usize,
    gas_used: u64,
    current_result: Vec<u8>,
    entries: Vec<CallChainEntry>,
}

impl CallChain {
    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn gas_used(&self) -> u64 {
        self.gas_used
    }

    pub(crate) fn current_result(&self) -> &[u8] {
        &self.current_result
    }

    fn enter(&mut self, gas_used: u64) {
        self.depth += 1;
        self.gas_used = self.gas_used.max(gas_used);
    }

    fn exit(
        &mut self,
        contract: &Contract,
        method: &str,
        parameters: Parameters,
        result: &ContractResult,
    ) {
        self.gas_used = self.gas_used.max(result.gas_used);
        self.current_result = result.result.clone();
        self.entries.push(CallChainEntry {
            contract: contract.clone(),
            method: method.to_string(),
            parameters,
            depth: self.depth,
            gas_used: self.gas_used,
            result: result.result.clone(),
        });
        self.depth -= 1;
    }

    pub(crate) fn into_entries(self) -> Vec<CallChainEntry> {
        self.entries
    }
}

/// Context that owns a call chain. Implemented by both execution contexts so that the depth and
/// gas guard lives in exactly one place.
pub(crate) trait CallFrames: TxSimContext + Sized {
    fn call_chain_mut(&mut self) -> &mut CallChain;

    fn call_limits(&self) -> CallLimits;
}

pub(crate) fn call_contract<C: CallFrames>(
    ctx: &mut C,
    vm: &dyn VmManager,
    contract: &Contract,
    method: &str,
    byte_code: Vec<u8>,
    parameters: Parameters,
    gas_used: u64,
) -> (ContractResult, TxStatusCode) {
    let limits = ctx.call_limits();
    let depth = ctx.depth() + 1;
    if depth > limits.max_call_depth {
        debug!(
            contract = %contract,
            depth = depth,
            "rejected contract call exceeding the maximum depth"
        );
        return (
            ContractResult::failure(
                format!(
                    "CallContract too deep: depth {} exceeds the limit of {}",
                    depth, limits.max_call_depth
                ),
                gas_used,
            ),
            TxStatusCode::ContractTooDeep,
        );
    }

    let gas_used = gas_used.max(ctx.gas_used());
    if gas_used > limits.gas_limit {
        return (
            ContractResult::failure(
                format!(
                    "gas used {} exceeds the limit of {}",
                    gas_used, limits.gas_limit
                ),
                gas_used,
            ),
            TxStatusCode::OutOfGas,
        );
    }

    let byte_code = if byte_code.is_empty() && contract.runtime_type != RuntimeType::Native {
        match ctx.contract_bytecode(&contract.name) {
            Ok(Some(byte_code)) => byte_code,
            Ok(None) => {
                return (
                    ContractResult::failure(
                        format!("no byte code deployed for contract {}", contract),
                        gas_used,
                    ),
                    TxStatusCode::ContractFail,
                );
            },
            Err(error) => {
                return (
                    ContractResult::failure(error.to_string(), gas_used),
                    TxStatusCode::InternalError,
                );
            },
        }
    } else {
        byte_code
    };

    let tx_type = ctx.tx().tx_type;
    ctx.call_chain_mut().enter(gas_used);
    let (result, code) = vm.run_contract(
        contract,
        method,
        &byte_code,
        &parameters,
        ctx,
        gas_used,
        tx_type,
    );
    ctx.call_chain_mut()
        .exit(contract, method, parameters, &result);
    (result, code)
}

/// Runs the transaction's own entry call. A VM success carrying a failed contract result is
/// reported as a contract failure.
pub fn invoke_transaction<C: TxSimContext>(ctx: &mut C) -> (ContractResult, TxStatusCode) {
    let (contract, method, byte_code, parameters) = {
        let tx = ctx.tx();
        (
            tx.contract.clone(),
            tx.method.clone(),
            tx.byte_code.clone(),
            tx.parameters.clone(),
        )
    };
    let (result, code) = ctx.call_contract(&contract, &method, byte_code, parameters, 0);
    if code.is_success() && !result.is_success() {
        (result, TxStatusCode::ContractFail)
    } else {
        (result, code)
    }
}
