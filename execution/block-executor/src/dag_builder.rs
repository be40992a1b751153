// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::task::Accesses;
use bitvec::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use weave_types::{dag::Dag, state_key::StateKey, TxnIndex};

/// Whether `later` has to be ordered after `earlier`: it reads what `earlier` writes, writes
/// what `earlier` writes, or writes what `earlier` reads.
pub fn detect_conflict(earlier: &Accesses<StateKey>, later: &Accesses<StateKey>) -> bool {
    let earlier_writes: HashSet<&StateKey> = earlier.keys_written.iter().collect();
    if later
        .keys_read
        .iter()
        .chain(later.keys_written.iter())
        .any(|key| earlier_writes.contains(key))
    {
        return true;
    }
    let earlier_reads: HashSet<&StateKey> = earlier.keys_read.iter().collect();
    later
        .keys_written
        .iter()
        .any(|key| earlier_reads.contains(key))
}

/// Builds the block dag incrementally, one merged transaction at a time in index order.
///
/// Per key it tracks the last writer and the readers since that write, which is enough to find
/// every conflicting earlier transaction without comparing all pairs.
#[derive(Default)]
pub struct DagBuilder {
    last_writer: HashMap<StateKey, TxnIndex>,
    readers_since_write: HashMap<StateKey, Vec<TxnIndex>>,
    dependencies: Vec<BTreeSet<TxnIndex>>,
}

impl DagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_vertexes(&self) -> usize {
        self.dependencies.len()
    }

    /// Adds the next transaction and returns its vertex.
    pub fn add(&mut self, accesses: &Accesses<StateKey>) -> TxnIndex {
        let vertex = self.dependencies.len() as TxnIndex;
        let mut deps = BTreeSet::new();

        // Read-after-write.
        for key in &accesses.keys_read {
            if let Some(writer) = self.last_writer.get(key) {
                deps.insert(*writer);
            }
        }
        for key in &accesses.keys_written {
            // Write-after-write.
            if let Some(writer) = self.last_writer.get(key) {
                deps.insert(*writer);
            }
            // Write-after-read.
            if let Some(readers) = self.readers_since_write.get(key) {
                deps.extend(readers.iter().copied());
            }
        }

        for key in &accesses.keys_read {
            self.readers_since_write
                .entry(key.clone())
                .or_default()
                .push(vertex);
        }
        for key in &accesses.keys_written {
            self.last_writer.insert(key.clone(), vertex);
            self.readers_since_write.remove(key);
        }

        deps.remove(&vertex);
        self.dependencies.push(deps);
        vertex
    }

    /// Finishes the dag, keeping only direct dependencies: an edge `i -> j` is dropped when `j`
    /// already depends on `i` through another of its dependencies.
    pub fn build(self) -> Dag {
        let num_vertexes = self.dependencies.len();
        let mut ancestors: Vec<BitVec> = Vec::with_capacity(num_vertexes);
        let mut reduced = Vec::with_capacity(num_vertexes);

        for deps in self.dependencies {
            let mut covered = bitvec![0; num_vertexes];
            let mut direct = vec![];
            // Highest first: a lower dependency reachable through a higher one is covered.
            for dep in deps.into_iter().rev() {
                if covered[dep as usize] {
                    continue;
                }
                direct.push(dep);
                covered.set(dep as usize, true);
                for ancestor in ancestors[dep as usize].iter_ones() {
                    covered.set(ancestor, true);
                }
            }
            direct.reverse();
            ancestors.push(covered);
            reduced.push(direct);
        }

        Dag::from_dependencies(reduced)
    }
}
