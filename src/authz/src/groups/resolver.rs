//! Cycle-safe traversals over the group membership graph
//!
//! Both traversals are breadth-first with a seen-set, so they terminate in
//! O(V + E) over the group subgraph even when groups nest each other in a
//! cycle. They only need the adjacency reads of [`GroupEdges`], which lets
//! every backend share them.

use sac_core::{GroupId, Node};
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Adjacency reads required by the traversals
pub trait GroupEdges {
    type Error;

    /// Groups that directly contain `principal` (principal → group edges)
    fn parent_groups(&self, principal: &str) -> Result<Vec<GroupId>, Self::Error>;

    /// Groups that nest `group_id`, i.e. edges assigned with `principal_is_group`
    fn nesting_parents(&self, group_id: &str) -> Result<Vec<GroupId>, Self::Error>;

    /// Groups directly nested under `group_id` (group → group edges)
    fn child_groups(&self, group_id: &str) -> Result<Vec<GroupId>, Self::Error>;
}

/// Every group `principal` belongs to, directly or through nesting
///
/// Starts from the direct memberships, then follows nesting edges only: a
/// group that was added to another group as a leaf member does not inherit
/// that group. A group already seen is never re-enqueued.
/// Returns the empty set for a principal without memberships.
pub fn transitive_groups<E>(edges: &E, principal: &str) -> Result<BTreeSet<GroupId>, E::Error>
where
    E: GroupEdges + ?Sized,
{
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::new();

    for group in edges.parent_groups(principal)? {
        if seen.insert(group.clone()) {
            queue.push_back(group);
        }
    }

    while let Some(group) = queue.pop_front() {
        for parent in edges.nesting_parents(&group)? {
            if seen.insert(parent.clone()) {
                queue.push_back(parent);
            }
        }
    }

    Ok(seen)
}

/// Tree of nested groups rooted at `root`
///
/// Groups are marked seen when enqueued, so a group reachable through several
/// parents is attached once, under the first parent (in breadth-first order)
/// that reaches it. Siblings are ordered by id. An unknown root yields a
/// single node without children.
pub fn group_tree<E>(edges: &E, root: &str) -> Result<Node, E::Error>
where
    E: GroupEdges + ?Sized,
{
    // Arena of (name, child indices); BFS order guarantees children sit after their parent.
    let mut arena: Vec<(GroupId, Vec<usize>)> = vec![(root.to_string(), Vec::new())];
    let mut seen: HashSet<GroupId> = HashSet::from([root.to_string()]);
    let mut cursor = 0;

    while cursor < arena.len() {
        let mut children = edges.child_groups(&arena[cursor].0)?;
        children.sort();

        for child in children {
            if seen.insert(child.clone()) {
                arena.push((child, Vec::new()));
                let index = arena.len() - 1;
                arena[cursor].1.push(index);
            }
        }
        cursor += 1;
    }

    // Assemble bottom-up so no recursion depth is tied to the nesting depth
    let mut built: Vec<Option<Node>> = Vec::with_capacity(arena.len());
    built.resize_with(arena.len(), || None);

    for (index, (name, child_indices)) in arena.into_iter().enumerate().rev() {
        let children = child_indices
            .into_iter()
            .filter_map(|child| built[child].take())
            .collect();
        built[index] = Some(Node { name, children });
    }

    Ok(built
        .into_iter()
        .next()
        .flatten()
        .unwrap_or_else(|| Node::leaf(root)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::convert::Infallible;

    /// Adjacency built from (group, member, member_is_group) triples
    #[derive(Default)]
    struct Edges {
        parents: HashMap<String, Vec<String>>,
        nesting: HashMap<String, Vec<String>>,
        children: HashMap<String, Vec<String>>,
    }

    impl Edges {
        fn build(edges: &[(&str, &str, bool)]) -> Self {
            let mut graph = Edges::default();
            for (group, member, is_group) in edges {
                graph
                    .parents
                    .entry(member.to_string())
                    .or_default()
                    .push(group.to_string());
                if *is_group {
                    graph
                        .nesting
                        .entry(member.to_string())
                        .or_default()
                        .push(group.to_string());
                    graph
                        .children
                        .entry(group.to_string())
                        .or_default()
                        .push(member.to_string());
                }
            }
            graph
        }
    }

    impl GroupEdges for Edges {
        type Error = Infallible;

        fn parent_groups(&self, principal: &str) -> Result<Vec<GroupId>, Infallible> {
            Ok(self.parents.get(principal).cloned().unwrap_or_default())
        }

        fn nesting_parents(&self, group_id: &str) -> Result<Vec<GroupId>, Infallible> {
            Ok(self.nesting.get(group_id).cloned().unwrap_or_default())
        }

        fn child_groups(&self, group_id: &str) -> Result<Vec<GroupId>, Infallible> {
            Ok(self.children.get(group_id).cloned().unwrap_or_default())
        }
    }

    fn names(set: BTreeSet<GroupId>) -> Vec<String> {
        set.into_iter().collect()
    }

    #[test]
    fn test_no_memberships() {
        let edges = Edges::default();
        assert!(transitive_groups(&edges, "alice").unwrap().is_empty());
    }

    #[test]
    fn test_nested_membership() {
        // all-employees nests hr, hr contains alice
        let edges = Edges::build(&[("all-employees", "hr", true), ("hr", "alice", false)]);
        assert_eq!(
            names(transitive_groups(&edges, "alice").unwrap()),
            ["all-employees", "hr"]
        );
    }

    #[test]
    fn test_leaf_edge_between_groups_is_not_nesting() {
        // ops was added to all as a plain member, so alice does not inherit all
        let edges = Edges::build(&[("all", "ops", false), ("ops", "alice", false)]);
        assert_eq!(names(transitive_groups(&edges, "alice").unwrap()), ["ops"]);
        assert_eq!(names(transitive_groups(&edges, "ops").unwrap()), ["all"]);
    }

    #[test]
    fn test_cycle_terminates() {
        let edges = Edges::build(&[("a", "b", true), ("b", "a", true), ("a", "alice", false)]);
        assert_eq!(names(transitive_groups(&edges, "alice").unwrap()), ["a", "b"]);
    }

    #[test]
    fn test_diamond_visits_once() {
        let edges = Edges::build(&[
            ("top", "left", true),
            ("top", "right", true),
            ("left", "bottom", true),
            ("right", "bottom", true),
            ("bottom", "alice", false),
        ]);
        assert_eq!(
            names(transitive_groups(&edges, "alice").unwrap()),
            ["bottom", "left", "right", "top"]
        );
    }

    #[test]
    fn test_tree_unknown_root() {
        let tree = group_tree(&Edges::default(), "ghost").unwrap();
        assert_eq!(tree, Node::leaf("ghost"));
    }

    #[test]
    fn test_tree_ignores_leaf_members() {
        let edges = Edges::build(&[("all", "hr", true), ("all", "alice", false)]);
        let tree = group_tree(&edges, "all").unwrap();
        assert_eq!(tree.children, vec![Node::leaf("hr")]);
    }

    #[test]
    fn test_tree_with_cycle_and_shared_child() {
        let edges = Edges::build(&[
            ("all", "hr", true),
            ("all", "it", true),
            ("hr", "payroll", true),
            ("it", "payroll", true),
            ("payroll", "all", true),
        ]);
        let tree = group_tree(&edges, "all").unwrap();

        assert_eq!(tree.size(), 4);
        assert_eq!(tree.children.len(), 2);
        // payroll hangs under hr, the first parent in id order
        assert_eq!(tree.children[0].name, "hr");
        assert_eq!(tree.children[0].children, vec![Node::leaf("payroll")]);
        assert!(tree.children[1].is_leaf());
    }
}
