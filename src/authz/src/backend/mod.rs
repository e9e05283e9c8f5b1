//! Storage contract consumed by the authorization service
//!
//! Implementations must keep every single mutation atomic per key (two
//! concurrent `assign_principal_to_group` calls on one group must not corrupt
//! its edges). Nothing is transactional across calls: creating a policy and
//! then assigning it are two independent steps, and an `authorize` running in
//! between observes the intermediate state.
//!
//! Unknown ids are never errors. Lookups return `None` or an empty
//! collection, and removals of absent records succeed.

use async_trait::async_trait;
use sac_core::{Group, GroupId, IdentityPolicy, Node, PolicyId, PrincipalId, ResourcePolicy};
use std::collections::HashSet;

use crate::error::Result;

pub mod memory;
#[cfg(feature = "sled-backend")]
pub mod sled_store;

pub use memory::InMemoryBackend;
#[cfg(feature = "sled-backend")]
pub use sled_store::{SledBackend, SledConfig};

/// Group, policy and resource-grant storage
#[async_trait]
pub trait Backend: Send + Sync {
    // Groups

    /// Store a group record, replacing any record with the same id
    ///
    /// `assignments` on the input are ignored; edges are managed separately.
    async fn create_group(&self, group: Group) -> Result<()>;

    /// Group with its direct edges resolved into `assignments`
    async fn get_group(&self, id: &str) -> Result<Option<Group>>;

    async fn update_group(&self, group: Group) -> Result<()>;

    /// Remove the group record; its edges are left in place
    async fn delete_group(&self, id: &str) -> Result<()>;

    async fn assign_principal_to_group(
        &self,
        group_id: &str,
        principal: &str,
        principal_is_group: bool,
    ) -> Result<()>;

    async fn unassign_principal_from_group(&self, group_id: &str, principal: &str) -> Result<()>;

    /// Direct leaf members of a group
    async fn get_all_principals_for_group(&self, group_id: &str) -> Result<Vec<PrincipalId>>;

    /// Groups that directly contain `principal`
    async fn get_group_membership(&self, principal: &str) -> Result<Vec<GroupId>>;

    /// Groups that contain `principal` directly or through nesting
    async fn get_group_membership_transitively(&self, principal: &str) -> Result<Vec<GroupId>>;

    /// Nested groups under `root_group_id`, each appearing once
    async fn get_group_tree(&self, root_group_id: &str) -> Result<Node>;

    // Identity policies

    /// Store a policy, replacing any policy with the same id
    async fn create_policy(&self, policy: IdentityPolicy) -> Result<()>;

    async fn get_policy(&self, id: &str) -> Result<Option<IdentityPolicy>>;

    async fn update_policy(&self, policy: IdentityPolicy) -> Result<()>;

    /// Remove the policy record; assignments naming it are left in place
    async fn delete_policy(&self, id: &str) -> Result<()>;

    /// Attach `policy_id` to a principal or group
    async fn assign_policy(&self, policy_id: &str, principal: &str) -> Result<()>;

    async fn unassign_policy(&self, policy_id: &str, principal: &str) -> Result<()>;

    /// Ids of policies attached directly to `principal`
    async fn get_policy_assignments(&self, principal: &str) -> Result<Vec<PolicyId>>;

    /// Principals and groups that `policy_id` is attached to
    async fn get_principals_for_policy(&self, policy_id: &str) -> Result<Vec<PrincipalId>>;

    /// Load policies by id, in input order
    ///
    /// Unknown ids and records that cannot be decoded are skipped.
    async fn load_policies(&self, ids: &[PolicyId]) -> Result<Vec<IdentityPolicy>>;

    /// Every policy attached to `principal` or to any of its transitive groups
    ///
    /// Ids are de-duplicated keeping the first occurrence: the principal's own
    /// policies first, then those of each group in membership order.
    async fn fetch_identity_policies_transitively_for_principal(
        &self,
        principal: &str,
    ) -> Result<Vec<IdentityPolicy>> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();

        let mut holders = vec![principal.to_string()];
        holders.extend(self.get_group_membership_transitively(principal).await?);

        for holder in &holders {
            for id in self.get_policy_assignments(holder).await? {
                if seen.insert(id.clone()) {
                    ids.push(id);
                }
            }
        }

        self.load_policies(&ids).await
    }

    // Resource policies

    /// Add `actions` to the grant of `principal` on `resource`
    async fn grant_actions(&self, resource: &str, principal: &str, actions: &[String]) -> Result<()>;

    /// Remove `actions` from the grant of `principal` on `resource`
    async fn revoke_actions(&self, resource: &str, principal: &str, actions: &[String]) -> Result<()>;

    async fn get_resource_policy(&self, resource: &str) -> Result<Option<ResourcePolicy>>;

    /// Set the description of an existing resource policy
    ///
    /// Returns `false` when `resource` has no policy; nothing is created.
    async fn set_resource_policy_description(
        &self,
        resource: &str,
        description: Option<String>,
    ) -> Result<bool>;
}
