// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// The virtual machine a contract is deployed to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum RuntimeType {
    Native,
    Wasmer,
    Gasm,
    Wxvm,
    Evm,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub name: String,
    pub version: String,
    pub runtime_type: RuntimeType,
}

impl Contract {
    pub fn new(name: impl Into<String>, version: impl Into<String>, runtime_type: RuntimeType) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            runtime_type,
        }
    }

    pub fn native(name: impl Into<String>) -> Self {
        Self::new(name, "v1", RuntimeType::Native)
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}
