//! Resource-centric grants
//!
//! Resources whose count grows with business data (one entry per document or
//! order) would otherwise need one identity policy each. Indexing the grants
//! by exact resource id keeps the lookup a single map read regardless of how
//! many resources or policies exist.

use dashmap::DashMap;
use sac_core::ResourcePolicy;

/// In-memory index from resource id to its grants
#[derive(Debug, Default)]
pub struct ResourcePolicyIndex {
    policies: DashMap<String, ResourcePolicy>,
}

impl ResourcePolicyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `actions` to the grant of `principal` on `resource`
    ///
    /// The resulting action set is the union of what was granted before and
    /// `actions`. The resource policy is created on first grant.
    pub fn grant_actions(&self, resource: &str, principal: &str, actions: &[String]) {
        self.policies
            .entry(resource.to_string())
            .or_insert_with(|| ResourcePolicy::new(resource))
            .grant(principal, actions.iter().cloned());
    }

    /// Remove `actions` from the grant of `principal` on `resource`
    ///
    /// A principal left without actions loses its entry, and a resource left
    /// without entries loses its policy (a description alone is not kept).
    /// Returns whether any grant changed.
    pub fn revoke_actions(&self, resource: &str, principal: &str, actions: &[String]) -> bool {
        let (changed, now_empty) = match self.policies.get_mut(resource) {
            Some(mut policy) => {
                let changed = policy.revoke(principal, actions);
                (changed, policy.is_empty())
            }
            None => return false,
        };

        if now_empty {
            self.policies.remove_if(resource, |_, policy| policy.is_empty());
        }

        changed
    }

    /// Resource policy for `resource`, if any grant exists
    pub fn get(&self, resource: &str) -> Option<ResourcePolicy> {
        self.policies.get(resource).map(|policy| policy.value().clone())
    }

    /// Set the description of an existing resource policy
    ///
    /// Returns `false` when `resource` has no policy.
    pub fn set_description(&self, resource: &str, description: Option<String>) -> bool {
        match self.policies.get_mut(resource) {
            Some(mut policy) => {
                policy.description = description;
                true
            }
            None => false,
        }
    }

    /// Number of resources with a policy
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn actions(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_grant_unions_actions() {
        let index = ResourcePolicyIndex::new();
        index.grant_actions("/doc/1", "jill", &actions(&["read"]));
        index.grant_actions("/doc/1", "jill", &actions(&["write"]));

        let policy = index.get("/doc/1").unwrap();
        assert_eq!(policy.assignments.len(), 1);
        assert_eq!(policy.assignment("jill").unwrap().actions.len(), 2);
    }

    #[test]
    fn test_revoke_last_grant_removes_policy() {
        let index = ResourcePolicyIndex::new();
        index.grant_actions("/doc/1", "jill", &actions(&["write"]));
        index.set_description("/doc/1", Some("quarterly report".to_string()));

        assert!(index.revoke_actions("/doc/1", "jill", &actions(&["write"])));
        assert!(index.get("/doc/1").is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_revoke_keeps_other_principals() {
        let index = ResourcePolicyIndex::new();
        index.grant_actions("/doc/1", "jill", &actions(&["write"]));
        index.grant_actions("/doc/1", "jack", &actions(&["read"]));

        index.revoke_actions("/doc/1", "jill", &actions(&["write"]));

        let policy = index.get("/doc/1").unwrap();
        assert!(policy.assignment("jill").is_none());
        assert!(policy.assignment("jack").is_some());
    }

    #[test]
    fn test_revoke_unknown_is_noop() {
        let index = ResourcePolicyIndex::new();
        assert!(!index.revoke_actions("/doc/404", "jill", &actions(&["read"])));
        assert!(!index.set_description("/doc/404", None));
    }

    #[test]
    fn test_concurrent_grants_same_resource() {
        let index = Arc::new(ResourcePolicyIndex::new());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        index.grant_actions("/doc/shared", "jill", &[format!("action-{}-{}", worker, i)]);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let policy = index.get("/doc/shared").unwrap();
        assert_eq!(policy.assignment("jill").unwrap().actions.len(), 400);
    }
}
