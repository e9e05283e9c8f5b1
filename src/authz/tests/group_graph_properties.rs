//! Property tests for transitive group resolution

use proptest::prelude::*;
use sac_authz::{Backend, GroupGraph, InMemoryBackend};
use std::collections::{BTreeSet, HashMap};

const GROUPS: usize = 12;

fn group(index: usize) -> String {
    format!("g{:02}", index)
}

/// Nesting edges `(parent, child)` with `parent < child`, so the graph is acyclic
fn acyclic_edges() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..GROUPS, 0..GROUPS), 0..40).prop_map(|pairs| {
        pairs
            .into_iter()
            .filter(|(a, b)| a != b)
            .map(|(a, b)| (a.min(b), a.max(b)))
            .collect()
    })
}

/// Edges `(parent, child, child_is_group)` over the same acyclic shape
fn mixed_edges() -> impl Strategy<Value = Vec<(usize, usize, bool)>> {
    prop::collection::vec((0..GROUPS, 0..GROUPS, any::<bool>()), 0..40).prop_map(|triples| {
        triples
            .into_iter()
            .filter(|(a, b, _)| a != b)
            .map(|(a, b, is_group)| (a.min(b), a.max(b), is_group))
            .collect()
    })
}

/// Groups reachable upwards from `start` by repeated depth-first expansion
fn naive_closure(parents: &HashMap<usize, Vec<usize>>, start: &[usize]) -> BTreeSet<String> {
    let mut reached = BTreeSet::new();
    let mut stack: Vec<usize> = start.to_vec();

    while let Some(g) = stack.pop() {
        if reached.insert(g) {
            stack.extend(parents.get(&g).into_iter().flatten().copied());
        }
    }

    reached.into_iter().map(group).collect()
}

proptest! {
    #[test]
    fn test_closure_matches_naive_reachability(
        edges in acyclic_edges(),
        direct in prop::collection::btree_set(0..GROUPS, 0..4)
    ) {
        let graph = GroupGraph::new();
        let mut parents: HashMap<usize, Vec<usize>> = HashMap::new();

        for (parent, child) in &edges {
            graph.assign(&group(*parent), &group(*child), true);
            parents.entry(*child).or_default().push(*parent);
        }
        for g in &direct {
            graph.assign(&group(*g), "alice", false);
        }

        let direct: Vec<usize> = direct.into_iter().collect();
        prop_assert_eq!(graph.transitive_groups("alice"), naive_closure(&parents, &direct));
    }

    #[test]
    fn test_closure_follows_only_nesting_edges(
        edges in mixed_edges(),
        direct in prop::collection::btree_set(0..GROUPS, 0..4)
    ) {
        let graph = GroupGraph::new();
        let mut nesting_parents: HashMap<usize, Vec<usize>> = HashMap::new();

        for (parent, child, is_group) in &edges {
            graph.assign(&group(*parent), &group(*child), *is_group);
        }
        // Later assignments of the same edge never clear the nesting flag
        for (parent, child, is_group) in &edges {
            if *is_group {
                nesting_parents.entry(*child).or_default().push(*parent);
            }
        }
        for g in &direct {
            graph.assign(&group(*g), "alice", false);
        }

        let direct: Vec<usize> = direct.into_iter().collect();
        prop_assert_eq!(graph.transitive_groups("alice"), naive_closure(&nesting_parents, &direct));
    }

    #[test]
    fn test_cycles_terminate_with_every_group_on_the_cycle(len in 2usize..10) {
        let graph = GroupGraph::new();
        for i in 0..len {
            // g(i) nests g(i+1), closing the ring at the end
            graph.assign(&group(i), &group((i + 1) % len), true);
        }
        graph.assign(&group(0), "alice", false);

        let expected: BTreeSet<String> = (0..len).map(group).collect();
        prop_assert_eq!(graph.transitive_groups("alice"), expected);

        let tree = graph.group_tree(&group(0));
        prop_assert_eq!(tree.size(), len);
    }

    #[test]
    fn test_assign_is_idempotent(repeats in 1usize..5) {
        tokio_test::block_on(async {
            let backend = InMemoryBackend::new();
            for _ in 0..repeats {
                backend.assign_principal_to_group("hr", "alice", false).await.unwrap();
            }

            assert_eq!(backend.get_all_principals_for_group("hr").await.unwrap(), vec!["alice"]);
            assert_eq!(backend.get_group_membership("alice").await.unwrap(), vec!["hr"]);
        });
    }

    #[test]
    fn test_unassign_removes_transitive_effect(depth in 1usize..8) {
        let graph = GroupGraph::new();
        for i in 0..depth {
            graph.assign(&group(i), &group(i + 1), true);
        }
        graph.assign(&group(depth), "alice", false);
        prop_assert_eq!(graph.transitive_groups("alice").len(), depth + 1);

        graph.unassign(&group(depth), "alice");
        prop_assert!(graph.transitive_groups("alice").is_empty());
    }
}
