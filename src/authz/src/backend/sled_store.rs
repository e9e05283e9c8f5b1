//! Persistent backend on the sled embedded store
//!
//! Records (groups, policies, resource policies) are JSON values in one tree
//! per kind. Edges live in one tree per direction under the composite key
//! `<owner>\0<member>` with an empty value, so the members of an owner are a
//! single prefix scan. Ids used in edges therefore must not contain NUL.
//!
//! Edge mutations touching several trees run in one sled transaction.
//! Resource grants use `update_and_fetch`, an atomic read-modify-write of
//! the single resource key.

use async_trait::async_trait;
use sac_core::{Group, GroupAssignment, GroupId, IdentityPolicy, Node, PolicyId, PrincipalId, ResourcePolicy};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{TransactionError, TransactionResult};
use sled::{Db, Transactional, Tree};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::Backend;
use crate::error::{AuthzError, Result};
use crate::groups::resolver::{self, GroupEdges};

/// Tree names for the different record and edge kinds
const TREE_GROUPS: &str = "groups";
const TREE_POLICIES: &str = "policies";
const TREE_RESOURCE_POLICIES: &str = "resource_policies";
const TREE_GROUP_MEMBERS: &str = "group_members";
const TREE_GROUP_NESTING: &str = "group_nesting";
const TREE_PRINCIPAL_GROUPS: &str = "principal_groups";
const TREE_NESTING_PARENTS: &str = "nesting_parents";
const TREE_PRINCIPAL_POLICIES: &str = "principal_policies";
const TREE_POLICY_PRINCIPALS: &str = "policy_principals";

const EDGE_SEPARATOR: u8 = 0;

/// Storage configuration
#[derive(Debug, Clone)]
pub struct SledConfig {
    /// Database directory
    pub path: PathBuf,

    /// Page cache size (bytes)
    pub cache_capacity_bytes: u64,

    /// Background flush interval; `None` flushes only on explicit `flush`
    pub flush_every_ms: Option<u64>,
}

impl Default for SledConfig {
    fn default() -> Self {
        SledConfig {
            path: PathBuf::from("./data/sac"),
            cache_capacity_bytes: 256 * 1024 * 1024, // 256 MB
            flush_every_ms: Some(500),
        }
    }
}

/// Backend persisted in a sled database
pub struct SledBackend {
    db: Db,
    groups: Tree,
    policies: Tree,
    resource_policies: Tree,
    /// group\0principal, every direct principal
    group_members: Tree,
    /// group\0child, nested groups only
    group_nesting: Tree,
    /// principal\0group
    principal_groups: Tree,
    /// child\0group, nested groups only
    nesting_parents: Tree,
    /// principal\0policy
    principal_policies: Tree,
    /// policy\0principal
    policy_principals: Tree,
}

impl SledBackend {
    /// Open or create a database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = SledConfig {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        };
        Self::open_with_config(&config)
    }

    /// Open with custom configuration
    pub fn open_with_config(config: &SledConfig) -> Result<Self> {
        let db = sled::Config::new()
            .path(&config.path)
            .cache_capacity(config.cache_capacity_bytes)
            .flush_every_ms(config.flush_every_ms)
            .open()?;

        debug!("Opened sled database at {}", config.path.display());
        Self::from_db(db)
    }

    /// Database removed when the backend is dropped
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self> {
        Ok(SledBackend {
            groups: db.open_tree(TREE_GROUPS)?,
            policies: db.open_tree(TREE_POLICIES)?,
            resource_policies: db.open_tree(TREE_RESOURCE_POLICIES)?,
            group_members: db.open_tree(TREE_GROUP_MEMBERS)?,
            group_nesting: db.open_tree(TREE_GROUP_NESTING)?,
            principal_groups: db.open_tree(TREE_PRINCIPAL_GROUPS)?,
            nesting_parents: db.open_tree(TREE_NESTING_PARENTS)?,
            principal_policies: db.open_tree(TREE_PRINCIPAL_POLICIES)?,
            policy_principals: db.open_tree(TREE_POLICY_PRINCIPALS)?,
            db,
        })
    }

    /// Underlying database handle
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Flush all pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }

    fn nested_groups_of(&self, group_id: &str) -> Result<BTreeSet<GroupId>> {
        Ok(scan_members(&self.group_nesting, group_id)?.into_iter().collect())
    }
}

fn edge_prefix(owner: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(owner.len() + 1);
    key.extend_from_slice(owner.as_bytes());
    key.push(EDGE_SEPARATOR);
    key
}

fn edge_key(owner: &str, member: &str) -> Result<Vec<u8>> {
    if owner.as_bytes().contains(&EDGE_SEPARATOR) || member.as_bytes().contains(&EDGE_SEPARATOR) {
        return Err(AuthzError::InvalidRequest(format!(
            "ids must not contain NUL: '{}' -> '{}'",
            owner.escape_debug(),
            member.escape_debug()
        )));
    }

    let mut key = edge_prefix(owner);
    key.extend_from_slice(member.as_bytes());
    Ok(key)
}

/// Members recorded under `owner`, in key order
fn scan_members(tree: &Tree, owner: &str) -> Result<Vec<String>> {
    let prefix = edge_prefix(owner);
    let mut members = Vec::new();

    for entry in tree.scan_prefix(&prefix) {
        let (key, _) = entry?;
        match std::str::from_utf8(&key[prefix.len()..]) {
            Ok(member) => members.push(member.to_string()),
            Err(e) => warn!("Skipping non UTF-8 edge under '{}': {}", owner, e),
        }
    }

    Ok(members)
}

fn read_json<T: DeserializeOwned>(tree: &Tree, key: &str) -> Result<Option<T>> {
    let Some(bytes) = tree.get(key.as_bytes())? else {
        return Ok(None);
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Treating malformed '{}' record '{}' as absent: {}", tree_name(tree), key, e);
            Ok(None)
        }
    }
}

fn write_json<T: Serialize>(tree: &Tree, key: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    tree.insert(key.as_bytes(), bytes)?;
    Ok(())
}

fn tree_name(tree: &Tree) -> String {
    String::from_utf8_lossy(&tree.name()).into_owned()
}

fn decode_resource_policy(resource: &str, bytes: &[u8]) -> Option<ResourcePolicy> {
    match serde_json::from_slice(bytes) {
        Ok(policy) => Some(policy),
        Err(e) => {
            warn!("Treating malformed resource policy '{}' as absent: {}", resource, e);
            None
        }
    }
}

fn transaction_error(err: TransactionError<()>) -> AuthzError {
    match err {
        TransactionError::Storage(e) => e.into(),
        TransactionError::Abort(()) => {
            AuthzError::BackendUnavailable("transaction aborted".to_string())
        }
    }
}

impl GroupEdges for SledBackend {
    type Error = AuthzError;

    fn parent_groups(&self, principal: &str) -> Result<Vec<GroupId>> {
        scan_members(&self.principal_groups, principal)
    }

    fn nesting_parents(&self, group_id: &str) -> Result<Vec<GroupId>> {
        scan_members(&self.nesting_parents, group_id)
    }

    fn child_groups(&self, group_id: &str) -> Result<Vec<GroupId>> {
        scan_members(&self.group_nesting, group_id)
    }
}

#[async_trait]
impl Backend for SledBackend {
    async fn create_group(&self, group: Group) -> Result<()> {
        let id = group.id.clone();
        write_json(&self.groups, &id, &group.without_assignments())
    }

    async fn get_group(&self, id: &str) -> Result<Option<Group>> {
        let Some(group) = read_json::<Group>(&self.groups, id)? else {
            return Ok(None);
        };

        let nested = self.nested_groups_of(id)?;
        let assignments = scan_members(&self.group_members, id)?
            .into_iter()
            .map(|principal| {
                if nested.contains(&principal) {
                    GroupAssignment::nested(id, principal)
                } else {
                    GroupAssignment::member(id, principal)
                }
            })
            .collect();

        Ok(Some(group.with_assignments(assignments)))
    }

    async fn update_group(&self, group: Group) -> Result<()> {
        self.create_group(group).await
    }

    async fn delete_group(&self, id: &str) -> Result<()> {
        self.groups.remove(id.as_bytes())?;
        Ok(())
    }

    async fn assign_principal_to_group(
        &self,
        group_id: &str,
        principal: &str,
        principal_is_group: bool,
    ) -> Result<()> {
        let forward = edge_key(group_id, principal)?;
        let reverse = edge_key(principal, group_id)?;

        let result: TransactionResult<()> = (
            &self.group_members,
            &self.group_nesting,
            &self.principal_groups,
            &self.nesting_parents,
        )
            .transaction(|(members, nesting, memberships, nesting_parents)| {
                members.insert(forward.as_slice(), Vec::<u8>::new())?;
                if principal_is_group {
                    nesting.insert(forward.as_slice(), Vec::<u8>::new())?;
                    nesting_parents.insert(reverse.as_slice(), Vec::<u8>::new())?;
                }
                memberships.insert(reverse.as_slice(), Vec::<u8>::new())?;
                Ok(())
            });

        result.map_err(transaction_error)
    }

    async fn unassign_principal_from_group(&self, group_id: &str, principal: &str) -> Result<()> {
        let forward = edge_key(group_id, principal)?;
        let reverse = edge_key(principal, group_id)?;

        let result: TransactionResult<()> = (
            &self.group_members,
            &self.group_nesting,
            &self.principal_groups,
            &self.nesting_parents,
        )
            .transaction(|(members, nesting, memberships, nesting_parents)| {
                members.remove(forward.as_slice())?;
                nesting.remove(forward.as_slice())?;
                memberships.remove(reverse.as_slice())?;
                nesting_parents.remove(reverse.as_slice())?;
                Ok(())
            });

        result.map_err(transaction_error)
    }

    async fn get_all_principals_for_group(&self, group_id: &str) -> Result<Vec<PrincipalId>> {
        let nested = self.nested_groups_of(group_id)?;
        Ok(scan_members(&self.group_members, group_id)?
            .into_iter()
            .filter(|principal| !nested.contains(principal))
            .collect())
    }

    async fn get_group_membership(&self, principal: &str) -> Result<Vec<GroupId>> {
        scan_members(&self.principal_groups, principal)
    }

    async fn get_group_membership_transitively(&self, principal: &str) -> Result<Vec<GroupId>> {
        Ok(resolver::transitive_groups(self, principal)?.into_iter().collect())
    }

    async fn get_group_tree(&self, root_group_id: &str) -> Result<Node> {
        resolver::group_tree(self, root_group_id)
    }

    async fn create_policy(&self, policy: IdentityPolicy) -> Result<()> {
        write_json(&self.policies, &policy.id, &policy)
    }

    async fn get_policy(&self, id: &str) -> Result<Option<IdentityPolicy>> {
        read_json(&self.policies, id)
    }

    async fn update_policy(&self, policy: IdentityPolicy) -> Result<()> {
        self.create_policy(policy).await
    }

    async fn delete_policy(&self, id: &str) -> Result<()> {
        self.policies.remove(id.as_bytes())?;
        Ok(())
    }

    async fn assign_policy(&self, policy_id: &str, principal: &str) -> Result<()> {
        let forward = edge_key(principal, policy_id)?;
        let reverse = edge_key(policy_id, principal)?;

        let result: TransactionResult<()> = (&self.principal_policies, &self.policy_principals)
            .transaction(|(by_principal, by_policy)| {
                by_principal.insert(forward.as_slice(), Vec::<u8>::new())?;
                by_policy.insert(reverse.as_slice(), Vec::<u8>::new())?;
                Ok(())
            });

        result.map_err(transaction_error)
    }

    async fn unassign_policy(&self, policy_id: &str, principal: &str) -> Result<()> {
        let forward = edge_key(principal, policy_id)?;
        let reverse = edge_key(policy_id, principal)?;

        let result: TransactionResult<()> = (&self.principal_policies, &self.policy_principals)
            .transaction(|(by_principal, by_policy)| {
                by_principal.remove(forward.as_slice())?;
                by_policy.remove(reverse.as_slice())?;
                Ok(())
            });

        result.map_err(transaction_error)
    }

    async fn get_policy_assignments(&self, principal: &str) -> Result<Vec<PolicyId>> {
        scan_members(&self.principal_policies, principal)
    }

    async fn get_principals_for_policy(&self, policy_id: &str) -> Result<Vec<PrincipalId>> {
        scan_members(&self.policy_principals, policy_id)
    }

    async fn load_policies(&self, ids: &[PolicyId]) -> Result<Vec<IdentityPolicy>> {
        let mut policies = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(policy) = read_json(&self.policies, id)? {
                policies.push(policy);
            }
        }
        Ok(policies)
    }

    async fn grant_actions(&self, resource: &str, principal: &str, actions: &[String]) -> Result<()> {
        let mut failure = None;

        self.resource_policies
            .update_and_fetch(resource.as_bytes(), |current| {
                let mut policy = current
                    .and_then(|bytes| decode_resource_policy(resource, bytes))
                    .unwrap_or_else(|| ResourcePolicy::new(resource));
                policy.grant(principal, actions.iter().cloned());

                match serde_json::to_vec(&policy) {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        failure = Some(e);
                        current.map(<[u8]>::to_vec)
                    }
                }
            })?;

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    async fn revoke_actions(&self, resource: &str, principal: &str, actions: &[String]) -> Result<()> {
        let mut failure = None;

        self.resource_policies
            .update_and_fetch(resource.as_bytes(), |current| {
                let bytes = current?;
                let Some(mut policy) = decode_resource_policy(resource, bytes) else {
                    return Some(bytes.to_vec());
                };

                policy.revoke(principal, actions);
                if policy.is_empty() {
                    return None;
                }

                match serde_json::to_vec(&policy) {
                    Ok(encoded) => Some(encoded),
                    Err(e) => {
                        failure = Some(e);
                        Some(bytes.to_vec())
                    }
                }
            })?;

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    async fn get_resource_policy(&self, resource: &str) -> Result<Option<ResourcePolicy>> {
        read_json(&self.resource_policies, resource)
    }

    async fn set_resource_policy_description(
        &self,
        resource: &str,
        description: Option<String>,
    ) -> Result<bool> {
        let mut updated = false;
        let mut failure = None;

        self.resource_policies
            .update_and_fetch(resource.as_bytes(), |current| {
                // May run more than once under contention
                updated = false;
                failure = None;

                let bytes = current?;
                let Some(mut policy) = decode_resource_policy(resource, bytes) else {
                    return Some(bytes.to_vec());
                };

                policy.description = description.clone();
                match serde_json::to_vec(&policy) {
                    Ok(encoded) => {
                        updated = true;
                        Some(encoded)
                    }
                    Err(e) => {
                        failure = Some(e);
                        Some(bytes.to_vec())
                    }
                }
            })?;

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(updated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_nested_edges_split_from_members() {
        let backend = SledBackend::temporary().unwrap();
        backend.assign_principal_to_group("all", "hr", true).await.unwrap();
        backend.assign_principal_to_group("all", "bob", false).await.unwrap();

        assert_eq!(backend.get_all_principals_for_group("all").await.unwrap(), vec!["bob"]);
        assert_eq!(backend.get_group_membership("hr").await.unwrap(), vec!["all"]);
        assert_eq!(backend.get_group_tree("all").await.unwrap().children, vec![Node::leaf("hr")]);
    }

    #[tokio::test]
    async fn test_prefix_scan_does_not_leak_between_owners() {
        let backend = SledBackend::temporary().unwrap();
        backend.assign_principal_to_group("hr", "alice", false).await.unwrap();
        backend.assign_principal_to_group("hr-admins", "bob", false).await.unwrap();

        assert_eq!(backend.get_all_principals_for_group("hr").await.unwrap(), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_nul_in_id_is_rejected() {
        let backend = SledBackend::temporary().unwrap();
        let err = backend
            .assign_principal_to_group("hr", "ali\0ce", false)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_malformed_policy_is_absent() {
        let backend = SledBackend::temporary().unwrap();
        backend
            .create_policy(IdentityPolicy::new("good").with_resource("/doc/*", ["read"]))
            .await
            .unwrap();
        backend.policies.insert("bad", b"{not json".to_vec()).unwrap();

        assert!(backend.get_policy("bad").await.unwrap().is_none());
        let loaded = backend
            .load_policies(&["bad".to_string(), "good".to_string()])
            .await
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "good");
    }

    #[tokio::test]
    async fn test_revoke_last_grant_removes_record() {
        let backend = SledBackend::temporary().unwrap();
        let write = vec!["write".to_string()];

        backend.grant_actions("/doc/1", "jill", &write).await.unwrap();
        assert!(backend.get_resource_policy("/doc/1").await.unwrap().is_some());

        backend.revoke_actions("/doc/1", "jill", &write).await.unwrap();
        assert!(backend.get_resource_policy("/doc/1").await.unwrap().is_none());
        assert!(!backend.resource_policies.contains_key("/doc/1").unwrap());
    }
}
