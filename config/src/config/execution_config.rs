// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::config::{ConfigSanitizer, Error};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_MAX_CALL_DEPTH: usize = 5;
const DEFAULT_GAS_LIMIT: u64 = 10_000_000_000;
const DEFAULT_SCHEDULE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_GOVERNANCE_RETRIES: usize = 3;

/// What the commit coordinator does with a transaction whose speculative reads were invalidated
/// by an earlier transaction of the same block.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Re-execute against the updated snapshot and keep the transaction in the block.
    #[default]
    Reexecute,
    /// Exclude the transaction from this block so that it can be proposed again later.
    Defer,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Number of worker threads executing transactions speculatively.
    pub concurrency_level: usize,
    /// Maximum depth of nested cross-contract calls. The top-level invocation is depth 1.
    pub max_call_depth: usize,
    /// Maximum cumulative gas of one transaction's call chain.
    pub gas_limit: u64,
    /// Wall-clock budget for scheduling a block. Transactions not merged when it expires are
    /// deferred to a later block.
    pub schedule_timeout_ms: u64,
    pub conflict_policy: ConflictPolicy,
    /// How often a governance transaction ending in an internal error is re-executed before the
    /// whole scheduling round is aborted.
    pub max_governance_retries: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            concurrency_level: num_cpus::get(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            gas_limit: DEFAULT_GAS_LIMIT,
            schedule_timeout_ms: DEFAULT_SCHEDULE_TIMEOUT_MS,
            conflict_policy: ConflictPolicy::default(),
            max_governance_retries: DEFAULT_MAX_GOVERNANCE_RETRIES,
        }
    }
}

impl ExecutionConfig {
    pub fn schedule_timeout(&self) -> Duration {
        Duration::from_millis(self.schedule_timeout_ms)
    }

    pub fn with_concurrency_level(mut self, concurrency_level: usize) -> Self {
        self.concurrency_level = concurrency_level;
        self
    }

    pub fn with_conflict_policy(mut self, conflict_policy: ConflictPolicy) -> Self {
        self.conflict_policy = conflict_policy;
        self
    }
}

impl ConfigSanitizer for ExecutionConfig {
    fn sanitize(&self) -> Result<(), Error> {
        let sanitizer_name = Self::get_sanitizer_name();
        let checks = [
            (self.concurrency_level == 0, "concurrency_level must be at least 1"),
            (self.max_call_depth == 0, "max_call_depth must be at least 1"),
            (self.gas_limit == 0, "gas_limit must be positive"),
            (
                self.schedule_timeout_ms == 0,
                "schedule_timeout_ms must be positive",
            ),
        ];
        match checks.iter().find(|(violated, _)| *violated) {
            Some((_, message)) => Err(Error::ConfigSanitizerFailed(
                sanitizer_name,
                message.to_string(),
            )),
            None => Ok(()),
        }
    }
}
