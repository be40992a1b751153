// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::sim_context::TxSimContext;
use weave_types::{
    contract::Contract,
    transaction::{ContractResult, Parameters, TxStatusCode, TxType},
};

/// Runtime that interprets contract byte code. Implementations must only touch state through the
/// supplied context, and must issue nested contract calls through
/// [`TxSimContext::call_contract`] so that depth and gas limits are enforced.
pub trait VmManager: Send + Sync {
    fn run_contract(
        &self,
        contract: &Contract,
        method: &str,
        byte_code: &[u8],
        parameters: &Parameters,
        ctx: &mut dyn TxSimContext,
        gas_used: u64,
        tx_type: TxType,
    ) -> (ContractResult, TxStatusCode);
}

/// Inference result of a transaction: the keys it observed and the keys it wrote. Conflict
/// detection is a pure function over two of these.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Accesses<K> {
    pub keys_read: Vec<K>,
    pub keys_written: Vec<K>,
}
