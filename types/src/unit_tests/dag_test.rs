// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::dag::Dag;

#[test]
fn test_edges_and_lookup() {
    let dag = Dag::from_dependencies(vec![vec![], vec![0], vec![1], vec![0]]);
    assert!(dag.is_well_formed());
    assert!(dag.has_edge(0, 1));
    assert!(dag.has_edge(1, 2));
    assert!(!dag.has_edge(0, 2));
    assert_eq!(dag.edges().collect::<Vec<_>>(), vec![(0, 1), (1, 2), (0, 3)]);
    assert_eq!(dag.num_edges(), 3);
    assert!(dag.dependencies(10).is_empty());
}

#[test]
fn test_levels() {
    let dag = Dag::from_dependencies(vec![vec![], vec![0], vec![1], vec![0], vec![]]);
    assert_eq!(dag.levels(), vec![vec![0, 4], vec![1, 3], vec![2]]);
    assert!(Dag::new(0).levels().is_empty());
}

#[test]
fn test_malformed_dags_are_detected() {
    assert!(!Dag::from_dependencies(vec![vec![0]]).is_well_formed());
    assert!(!Dag::from_dependencies(vec![vec![], vec![], vec![1, 0]]).is_well_formed());
    assert!(!Dag::from_dependencies(vec![vec![], vec![2], vec![]]).is_well_formed());
}
