// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::TxnIndex;
use serde::{Deserialize, Serialize};

/// Direct dependencies of one transaction: indices of earlier transactions that must be
/// executed (and validated) before it.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct DagNeighbors {
    pub neighbors: Vec<TxnIndex>,
}

/// Dependency graph over a block's transactions.
///
/// `vertexes[j]` lists, in ascending order, every `i < j` that `j` directly depends on. Because
/// edges only point from lower to higher indices the graph is acyclic by construction.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Dag {
    pub vertexes: Vec<DagNeighbors>,
}

impl Dag {
    pub fn new(num_txns: usize) -> Self {
        Self {
            vertexes: vec![DagNeighbors::default(); num_txns],
        }
    }

    pub fn from_dependencies(dependencies: Vec<Vec<TxnIndex>>) -> Self {
        Self {
            vertexes: dependencies
                .into_iter()
                .map(|neighbors| DagNeighbors { neighbors })
                .collect(),
        }
    }

    pub fn num_vertexes(&self) -> usize {
        self.vertexes.len()
    }

    pub fn dependencies(&self, txn_idx: TxnIndex) -> &[TxnIndex] {
        self.vertexes
            .get(txn_idx as usize)
            .map_or(&[], |vertex| vertex.neighbors.as_slice())
    }

    /// Whether `to` directly depends on `from`.
    pub fn has_edge(&self, from: TxnIndex, to: TxnIndex) -> bool {
        self.dependencies(to).binary_search(&from).is_ok()
    }

    /// All `(from, to)` edges, ordered by `to` and then by `from`.
    pub fn edges(&self) -> impl Iterator<Item = (TxnIndex, TxnIndex)> + '_ {
        self.vertexes.iter().enumerate().flat_map(|(to, vertex)| {
            vertex
                .neighbors
                .iter()
                .map(move |from| (*from, to as TxnIndex))
        })
    }

    pub fn num_edges(&self) -> usize {
        self.vertexes.iter().map(|vertex| vertex.neighbors.len()).sum()
    }

    /// Checks the structural invariant: neighbor lists are strictly ascending and only reference
    /// lower indices.
    pub fn is_well_formed(&self) -> bool {
        self.vertexes.iter().enumerate().all(|(to, vertex)| {
            vertex.neighbors.windows(2).all(|pair| pair[0] < pair[1])
                && vertex
                    .neighbors
                    .last()
                    .map_or(true, |from| (*from as usize) < to)
        })
    }

    /// Groups transactions into waves: every transaction's dependencies live in strictly earlier
    /// waves, so the members of one wave can be replayed in parallel.
    pub fn levels(&self) -> Vec<Vec<TxnIndex>> {
        let mut level_of = Vec::with_capacity(self.vertexes.len());
        let mut levels: Vec<Vec<TxnIndex>> = vec![];
        for (idx, vertex) in self.vertexes.iter().enumerate() {
            let level = vertex
                .neighbors
                .iter()
                .filter_map(|dep| level_of.get(*dep as usize))
                .map(|dep_level: &usize| dep_level + 1)
                .max()
                .unwrap_or(0);
            level_of.push(level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(idx as TxnIndex);
        }
        levels
    }
}
