// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{contract::Contract, hash::HashValue};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Named call parameters. A `BTreeMap` keeps the iteration order, and therefore every encoding
/// derived from it, identical on every node.
pub type Parameters = BTreeMap<String, Vec<u8>>;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum TxType {
    InvokeContract,
    QueryContract,
    /// Updates the chain configuration. Must never partially apply.
    ChainConfig,
    /// Other chain-governance operations. Must never partially apply.
    Governance,
}

impl TxType {
    pub fn is_governance(&self) -> bool {
        matches!(self, TxType::ChainConfig | TxType::Governance)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_id: String,
    pub tx_type: TxType,
    pub sender: String,
    pub contract: Contract,
    pub method: String,
    pub parameters: Parameters,
    /// Byte code to run. Empty means "load the deployed byte code of `contract`".
    #[serde(with = "serde_bytes")]
    pub byte_code: Vec<u8>,
}

impl Transaction {
    pub fn new(
        tx_id: impl Into<String>,
        contract: Contract,
        method: impl Into<String>,
        parameters: Parameters,
    ) -> Self {
        Self {
            tx_id: tx_id.into(),
            tx_type: TxType::InvokeContract,
            sender: String::new(),
            contract,
            method: method.into(),
            parameters,
            byte_code: vec![],
        }
    }

    pub fn with_type(mut self, tx_type: TxType) -> Self {
        self.tx_type = tx_type;
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    pub fn with_byte_code(mut self, byte_code: Vec<u8>) -> Self {
        self.byte_code = byte_code;
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum TxStatusCode {
    Success,
    /// The contract reported a failure, or the VM rejected the call.
    ContractFail,
    /// A cross-contract call would have exceeded the maximum call depth.
    ContractTooDeep,
    /// The cumulative gas of the call chain would have exceeded the gas limit.
    OutOfGas,
    /// A storage or VM collaborator failed while serving the transaction.
    InternalError,
}

impl TxStatusCode {
    pub fn is_success(&self) -> bool {
        matches!(self, TxStatusCode::Success)
    }
}

impl fmt::Display for TxStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TxStatusCode::Success => "SUCCESS",
            TxStatusCode::ContractFail => "CONTRACT_FAIL",
            TxStatusCode::ContractTooDeep => "CONTRACT_TOO_DEEP_FAILED",
            TxStatusCode::OutOfGas => "OUT_OF_GAS",
            TxStatusCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", name)
    }
}

/// What a contract invocation returned to its caller.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContractResult {
    pub code: u32,
    #[serde(with = "serde_bytes")]
    pub result: Vec<u8>,
    pub message: String,
    pub gas_used: u64,
}

impl ContractResult {
    pub const SUCCESS_CODE: u32 = 0;
    pub const FAILURE_CODE: u32 = 1;

    pub fn success(result: Vec<u8>, gas_used: u64) -> Self {
        Self {
            code: Self::SUCCESS_CODE,
            result,
            message: String::new(),
            gas_used,
        }
    }

    pub fn failure(message: impl Into<String>, gas_used: u64) -> Self {
        Self {
            code: Self::FAILURE_CODE,
            result: vec![],
            message: message.into(),
            gas_used,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Self::SUCCESS_CODE
    }
}

/// Per-transaction status and gas metadata published with the block.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TxResult {
    pub tx_id: String,
    pub code: TxStatusCode,
    pub contract_result: ContractResult,
    pub rwset_hash: HashValue,
    pub gas_used: u64,
    /// Iterator handles the contract left open. They were released when the transaction ended.
    pub leaked_iterators: u32,
}

impl TxResult {
    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }
}
