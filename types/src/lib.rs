// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Core data model shared by the execution engine, the durable store and consensus:
//! qualified state keys, per-transaction read/write sets, transactions and their results,
//! and the dependency graph attached to every block.

pub mod block_info;
pub mod contract;
pub mod dag;
pub mod hash;
pub mod rwset;
pub mod state_key;
pub mod transaction;

#[cfg(test)]
mod unit_tests;

/// Position of a transaction within the block's ordered transaction list.
pub type TxnIndex = u32;
