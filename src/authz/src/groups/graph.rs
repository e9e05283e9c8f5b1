//! In-memory group membership graph
//!
//! Four indices are kept so lookups in either direction are a single map
//! read:
//!
//! - group → every direct principal (leaf members and nested groups)
//! - group → nested groups only
//! - principal → groups that directly contain it
//! - nested group → groups that nest it
//!
//! Each index is a `DashMap`, so concurrent mutations of the same key are
//! serialized by the owning shard lock. Nothing makes an `assign` atomic
//! across the indices: a concurrent reader may see one edge direction
//! before the other.

use dashmap::DashMap;
use sac_core::{GroupAssignment, GroupId, Node, PrincipalId};
use std::collections::BTreeSet;
use std::convert::Infallible;

use super::resolver::{self, GroupEdges};

/// Owner → set of members, one entry per owner with at least one member
pub(crate) type EdgeIndex = DashMap<String, BTreeSet<String>>;

/// Group membership graph with adjacency in both directions
#[derive(Debug, Default)]
pub struct GroupGraph {
    members: EdgeIndex,
    nested: EdgeIndex,
    memberships: EdgeIndex,
    nesting_parents: EdgeIndex,
}

impl GroupGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the edge `group_id → principal`
    ///
    /// With `principal_is_group` the edge also nests `principal` under the
    /// group. Re-assigning an existing edge has no further effect.
    pub fn assign(&self, group_id: &str, principal: &str, principal_is_group: bool) {
        add_edge(&self.members, group_id, principal);
        if principal_is_group {
            add_edge(&self.nested, group_id, principal);
            add_edge(&self.nesting_parents, principal, group_id);
        }
        add_edge(&self.memberships, principal, group_id);
    }

    /// Remove the edge `group_id → principal` from every index
    ///
    /// Callers need not know whether `principal` was a leaf or a nested group.
    pub fn unassign(&self, group_id: &str, principal: &str) {
        remove_edge(&self.members, group_id, principal);
        remove_edge(&self.nested, group_id, principal);
        remove_edge(&self.memberships, principal, group_id);
        remove_edge(&self.nesting_parents, principal, group_id);
    }

    /// Direct leaf members of a group (nested groups excluded)
    pub fn members_of(&self, group_id: &str) -> BTreeSet<PrincipalId> {
        let nested = self.nested_groups_of(group_id);
        self.principals_of(group_id)
            .into_iter()
            .filter(|principal| !nested.contains(principal))
            .collect()
    }

    /// Every direct principal of a group, leaf or nested group
    pub fn principals_of(&self, group_id: &str) -> BTreeSet<PrincipalId> {
        edges_of(&self.members, group_id)
    }

    /// Groups directly nested under a group
    pub fn nested_groups_of(&self, group_id: &str) -> BTreeSet<GroupId> {
        edges_of(&self.nested, group_id)
    }

    /// Groups that directly contain a principal
    pub fn membership_of(&self, principal: &str) -> BTreeSet<GroupId> {
        edges_of(&self.memberships, principal)
    }

    /// Direct edges of a group, flagged by kind
    pub fn assignments_of(&self, group_id: &str) -> Vec<GroupAssignment> {
        let nested = self.nested_groups_of(group_id);
        self.principals_of(group_id)
            .into_iter()
            .map(|principal| {
                if nested.contains(&principal) {
                    GroupAssignment::nested(group_id, principal)
                } else {
                    GroupAssignment::member(group_id, principal)
                }
            })
            .collect()
    }

    /// Transitive group membership of a principal
    pub fn transitive_groups(&self, principal: &str) -> BTreeSet<GroupId> {
        match resolver::transitive_groups(self, principal) {
            Ok(groups) => groups,
            Err(never) => match never {},
        }
    }

    /// Tree of groups nested under `root`
    pub fn group_tree(&self, root: &str) -> Node {
        match resolver::group_tree(self, root) {
            Ok(tree) => tree,
            Err(never) => match never {},
        }
    }
}

impl GroupEdges for GroupGraph {
    type Error = Infallible;

    fn parent_groups(&self, principal: &str) -> Result<Vec<GroupId>, Infallible> {
        Ok(self.membership_of(principal).into_iter().collect())
    }

    fn nesting_parents(&self, group_id: &str) -> Result<Vec<GroupId>, Infallible> {
        Ok(edges_of(&self.nesting_parents, group_id).into_iter().collect())
    }

    fn child_groups(&self, group_id: &str) -> Result<Vec<GroupId>, Infallible> {
        Ok(self.nested_groups_of(group_id).into_iter().collect())
    }
}

pub(crate) fn add_edge(index: &EdgeIndex, owner: &str, member: &str) {
    index
        .entry(owner.to_string())
        .or_default()
        .insert(member.to_string());
}

pub(crate) fn remove_edge(index: &EdgeIndex, owner: &str, member: &str) {
    let now_empty = match index.get_mut(owner) {
        Some(mut set) => {
            set.remove(member);
            set.is_empty()
        }
        None => return,
    };

    // The shard guard is released above; re-check under the lock before dropping the key.
    if now_empty {
        index.remove_if(owner, |_, set| set.is_empty());
    }
}

pub(crate) fn edges_of(index: &EdgeIndex, owner: &str) -> BTreeSet<String> {
    index
        .get(owner)
        .map(|set| set.value().clone())
        .unwrap_or_default()
}
