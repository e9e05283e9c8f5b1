//! In-memory backend

use async_trait::async_trait;
use dashmap::DashMap;
use sac_core::{Group, GroupId, IdentityPolicy, Node, PolicyId, PrincipalId, ResourcePolicy};

use super::Backend;
use crate::error::Result;
use crate::groups::graph::{add_edge, edges_of, remove_edge, EdgeIndex};
use crate::groups::GroupGraph;
use crate::resource_policy::ResourcePolicyIndex;

/// Backend keeping all state in sharded concurrent maps
///
/// Each map shard is locked independently, so mutations of different keys
/// never contend and mutations of the same key are serialized.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    groups: DashMap<GroupId, Group>,
    graph: GroupGraph,
    policies: DashMap<PolicyId, IdentityPolicy>,
    /// principal → directly attached policy ids
    principal_policies: EdgeIndex,
    /// policy id → principals it is attached to
    policy_principals: EdgeIndex,
    resource_policies: ResourcePolicyIndex,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group membership graph
    pub fn graph(&self) -> &GroupGraph {
        &self.graph
    }

    /// Resource policy index
    pub fn resource_policies(&self) -> &ResourcePolicyIndex {
        &self.resource_policies
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn create_group(&self, group: Group) -> Result<()> {
        self.groups.insert(group.id.clone(), group.without_assignments());
        Ok(())
    }

    async fn get_group(&self, id: &str) -> Result<Option<Group>> {
        let Some(group) = self.groups.get(id).map(|g| g.value().clone()) else {
            return Ok(None);
        };
        Ok(Some(group.with_assignments(self.graph.assignments_of(id))))
    }

    async fn update_group(&self, group: Group) -> Result<()> {
        self.create_group(group).await
    }

    async fn delete_group(&self, id: &str) -> Result<()> {
        self.groups.remove(id);
        Ok(())
    }

    async fn assign_principal_to_group(
        &self,
        group_id: &str,
        principal: &str,
        principal_is_group: bool,
    ) -> Result<()> {
        self.graph.assign(group_id, principal, principal_is_group);
        Ok(())
    }

    async fn unassign_principal_from_group(&self, group_id: &str, principal: &str) -> Result<()> {
        self.graph.unassign(group_id, principal);
        Ok(())
    }

    async fn get_all_principals_for_group(&self, group_id: &str) -> Result<Vec<PrincipalId>> {
        Ok(self.graph.members_of(group_id).into_iter().collect())
    }

    async fn get_group_membership(&self, principal: &str) -> Result<Vec<GroupId>> {
        Ok(self.graph.membership_of(principal).into_iter().collect())
    }

    async fn get_group_membership_transitively(&self, principal: &str) -> Result<Vec<GroupId>> {
        Ok(self.graph.transitive_groups(principal).into_iter().collect())
    }

    async fn get_group_tree(&self, root_group_id: &str) -> Result<Node> {
        Ok(self.graph.group_tree(root_group_id))
    }

    async fn create_policy(&self, policy: IdentityPolicy) -> Result<()> {
        self.policies.insert(policy.id.clone(), policy);
        Ok(())
    }

    async fn get_policy(&self, id: &str) -> Result<Option<IdentityPolicy>> {
        Ok(self.policies.get(id).map(|p| p.value().clone()))
    }

    async fn update_policy(&self, policy: IdentityPolicy) -> Result<()> {
        self.create_policy(policy).await
    }

    async fn delete_policy(&self, id: &str) -> Result<()> {
        self.policies.remove(id);
        Ok(())
    }

    async fn assign_policy(&self, policy_id: &str, principal: &str) -> Result<()> {
        add_edge(&self.principal_policies, principal, policy_id);
        add_edge(&self.policy_principals, policy_id, principal);
        Ok(())
    }

    async fn unassign_policy(&self, policy_id: &str, principal: &str) -> Result<()> {
        remove_edge(&self.principal_policies, principal, policy_id);
        remove_edge(&self.policy_principals, policy_id, principal);
        Ok(())
    }

    async fn get_policy_assignments(&self, principal: &str) -> Result<Vec<PolicyId>> {
        Ok(edges_of(&self.principal_policies, principal).into_iter().collect())
    }

    async fn get_principals_for_policy(&self, policy_id: &str) -> Result<Vec<PrincipalId>> {
        Ok(edges_of(&self.policy_principals, policy_id).into_iter().collect())
    }

    async fn load_policies(&self, ids: &[PolicyId]) -> Result<Vec<IdentityPolicy>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.policies.get(id).map(|p| p.value().clone()))
            .collect())
    }

    async fn grant_actions(&self, resource: &str, principal: &str, actions: &[String]) -> Result<()> {
        self.resource_policies.grant_actions(resource, principal, actions);
        Ok(())
    }

    async fn revoke_actions(&self, resource: &str, principal: &str, actions: &[String]) -> Result<()> {
        self.resource_policies.revoke_actions(resource, principal, actions);
        Ok(())
    }

    async fn get_resource_policy(&self, resource: &str) -> Result<Option<ResourcePolicy>> {
        Ok(self.resource_policies.get(resource))
    }

    async fn set_resource_policy_description(
        &self,
        resource: &str,
        description: Option<String>,
    ) -> Result<bool> {
        Ok(self.resource_policies.set_description(resource, description))
    }
}
