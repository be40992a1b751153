// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;
use weave_types::state_key::KeyError;

#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Writes can no longer be merged once the block is finalized.
    #[error("snapshot anchored at height {0} is sealed")]
    Sealed(u64),
    #[error("storage error: {0}")]
    Storage(String),
}

impl SnapshotError {
    pub(crate) fn storage(error: anyhow::Error) -> Self {
        SnapshotError::Storage(format!("{:#}", error))
    }
}

/// Misuse of the handle protocol exposed to contracts. Never tolerated silently.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IteratorError {
    #[error("unknown or closed iterator handle {0}")]
    UnknownHandle(i32),
    #[error("iterator handle {handle} is not a {expected} cursor")]
    KindMismatch { handle: i32, expected: &'static str },
    #[error("iterator handle space exhausted")]
    HandlesExhausted,
    #[error("cursor of handle {handle} failed: {message}")]
    Cursor { handle: i32, message: String },
}

#[derive(Debug, Error)]
pub enum SimContextError {
    #[error(transparent)]
    InvalidKey(#[from] KeyError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Iterator(#[from] IteratorError),
    #[error("relational queries are not supported by the underlying store")]
    RelationalUnsupported,
    #[error("storage error: {0}")]
    Storage(String),
}

impl SimContextError {
    pub(crate) fn storage(error: anyhow::Error) -> Self {
        SimContextError::Storage(format!("{:#}", error))
    }
}

/// If an unrecoverable error occurs, the scheduling round is aborted and the error is propagated
/// back to the caller. Conflicts never surface here.
#[derive(Debug, Error)]
pub enum BlockExecutionError {
    /// A governance transaction kept failing with an internal error. Governance changes must
    /// never partially apply, so the whole round is abandoned.
    #[error("governance transaction {tx_id} aborted the round after {attempts} attempts: {message}")]
    GovernanceAborted {
        tx_id: String,
        attempts: usize,
        message: String,
    },
    #[error("block verification mismatch on {field}: expected {expected}, got {actual}")]
    VerificationMismatch {
        field: &'static str,
        expected: String,
        actual: String,
    },
    #[error("invalid dag: {0}")]
    InvalidDag(String),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Config(#[from] weave_config::config::Error),
    #[error("failed to build the executor thread pool: {0}")]
    ThreadPool(String),
}

pub type BlockExecutionResult<T> = Result<T, BlockExecutionError>;
