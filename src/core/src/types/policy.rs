//! Identity and resource policy definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::group::{GroupId, PrincipalId};

/// Unique policy identifier
pub type PolicyId = String;

/// Action entry that matches every action
pub const ACTION_WILDCARD: &str = "*";

/// Effect recorded when a policy is triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyEffect {
    /// Contributes a permit signal
    Permit,
    /// Contributes a deny signal, overriding every permit
    Deny,
}

/// One `{resource, actions}` block of a multi-resource policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBlock {
    /// Resource pattern (`/`-separated, `*` segments are wildcards)
    pub resource: String,

    /// Actions covered by this block
    pub actions: Vec<String>,
}

/// Policy attached to principals, directly or through groups
///
/// A policy describes either a single `resource` pattern with its `actions`,
/// or a list of `resources` blocks. Both forms may be present and are all
/// evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityPolicy {
    /// Policy identifier (unique among policies)
    pub id: PolicyId,

    /// Explicit deny; defaults to a permit effect when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_deny: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Single resource pattern
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Actions for the single resource pattern
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<String>>,

    /// Resource blocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<ResourceBlock>>,
}

impl IdentityPolicy {
    /// Create an empty permit policy
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            effect_deny: None,
            name: None,
            description: None,
            resource: None,
            actions: None,
            resources: None,
        }
    }

    /// Set the single resource pattern and its actions
    pub fn with_resource<I, S>(mut self, resource: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource = Some(resource.into());
        self.actions = Some(actions.into_iter().map(Into::into).collect());
        self
    }

    /// Append a resource block
    pub fn with_resource_block<I, S>(mut self, resource: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources.get_or_insert_with(Vec::new).push(ResourceBlock {
            resource: resource.into(),
            actions: actions.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Mark the policy as an explicit deny
    pub fn deny(mut self) -> Self {
        self.effect_deny = Some(true);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Effect recorded when this policy is triggered
    pub fn effect(&self) -> PolicyEffect {
        if self.effect_deny.unwrap_or(false) {
            PolicyEffect::Deny
        } else {
            PolicyEffect::Permit
        }
    }

    /// Every `(resource pattern, actions)` pair described by the policy
    ///
    /// A single `resource` without `actions` describes nothing.
    pub fn statements(&self) -> impl Iterator<Item = (&str, &[String])> + '_ {
        let single = self.resource.as_deref().zip(self.actions.as_deref());
        let blocks = self
            .resources
            .iter()
            .flatten()
            .map(|block| (block.resource.as_str(), block.actions.as_slice()));

        single.into_iter().chain(blocks)
    }
}

/// Actions granted to one principal on a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePolicyAssignment {
    pub principal: PrincipalId,
    pub actions: BTreeSet<String>,
}

/// Grants attached to a single resource identifier
///
/// Exists only for resources that opt into resource-centric grants. Lookup is
/// by exact resource id, so its cost does not depend on how many policies or
/// resources exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePolicy {
    pub resource: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub assignments: Vec<ResourcePolicyAssignment>,
}

impl ResourcePolicy {
    /// Create a resource policy with no grants
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            description: None,
            assignments: Vec::new(),
        }
    }

    /// Add `actions` to the entry for `principal`, creating it if needed
    pub fn grant<I, S>(&mut self, principal: &str, actions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let actions = actions.into_iter().map(Into::into);
        match self.assignments.iter_mut().find(|a| a.principal == principal) {
            Some(existing) => existing.actions.extend(actions),
            None => self.assignments.push(ResourcePolicyAssignment {
                principal: principal.to_string(),
                actions: actions.collect(),
            }),
        }
    }

    /// Remove `actions` from the entry for `principal`
    ///
    /// An entry left without actions is dropped. Returns whether anything changed.
    pub fn revoke<I, S>(&mut self, principal: &str, actions: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(index) = self.assignments.iter().position(|a| a.principal == principal) else {
            return false;
        };

        let entry = &mut self.assignments[index];
        let before = entry.actions.len();
        for action in actions {
            entry.actions.remove(action.as_ref());
        }
        let changed = entry.actions.len() != before;

        if entry.actions.is_empty() {
            self.assignments.remove(index);
        }

        changed
    }

    /// Entry for `principal`, if any
    pub fn assignment(&self, principal: &str) -> Option<&ResourcePolicyAssignment> {
        self.assignments.iter().find(|a| a.principal == principal)
    }

    /// Whether any entry grants `action` to anyone
    pub fn mentions_action(&self, action: &str) -> bool {
        self.assignments.iter().any(|a| a.actions.contains(action))
    }

    /// First entry granting `action` to `principal` or to one of `groups`
    pub fn granting_assignment(
        &self,
        principal: &str,
        groups: &BTreeSet<GroupId>,
        action: &str,
    ) -> Option<&ResourcePolicyAssignment> {
        self.assignments.iter().find(|a| {
            (a.principal == principal || groups.contains(&a.principal))
                && a.actions.contains(action)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_cover_both_forms() {
        let policy = IdentityPolicy::new("mixed")
            .with_resource("/org/servers/*", ["login"])
            .with_resource_block("/org/printers/*", ["print"])
            .with_resource_block("/org/scanners/*", ["scan"]);

        let statements: Vec<_> = policy.statements().collect();
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0].0, "/org/servers/*");
        assert_eq!(statements[2].1, ["scan".to_string()]);
    }

    #[test]
    fn test_resource_without_actions_describes_nothing() {
        let mut policy = IdentityPolicy::new("incomplete");
        policy.resource = Some("/org/*".to_string());
        assert_eq!(policy.statements().count(), 0);
    }

    #[test]
    fn test_effect_defaults_to_permit() {
        assert_eq!(IdentityPolicy::new("p").effect(), PolicyEffect::Permit);
        assert_eq!(IdentityPolicy::new("p").deny().effect(), PolicyEffect::Deny);

        let explicit: IdentityPolicy =
            serde_json::from_str(r#"{"id":"p","effectDeny":false}"#).unwrap();
        assert_eq!(explicit.effect(), PolicyEffect::Permit);
    }

    #[test]
    fn test_grant_unions_actions() {
        let mut policy = ResourcePolicy::new("/doc/1");
        policy.grant("jill", ["read"]);
        policy.grant("jill", ["write", "read"]);

        assert_eq!(policy.assignments.len(), 1);
        let actions: Vec<_> = policy.assignment("jill").unwrap().actions.iter().collect();
        assert_eq!(actions, ["read", "write"]);
    }

    #[test]
    fn test_revoke_drops_empty_entry() {
        let mut policy = ResourcePolicy::new("/doc/1");
        policy.grant("jill", ["read", "write"]);

        assert!(policy.revoke("jill", ["write"]));
        assert!(policy.assignment("jill").is_some());

        assert!(policy.revoke("jill", ["read"]));
        assert!(policy.is_empty());

        assert!(!policy.revoke("jill", ["read"]));
    }

    #[test]
    fn test_granting_assignment_through_group() {
        let mut policy = ResourcePolicy::new("/doc/1");
        policy.grant("editors", ["write"]);

        let none = BTreeSet::new();
        let groups: BTreeSet<GroupId> = ["editors".to_string()].into_iter().collect();

        assert!(policy.granting_assignment("jill", &none, "write").is_none());
        assert!(policy.granting_assignment("jill", &groups, "write").is_some());
        assert!(policy.granting_assignment("jill", &groups, "delete").is_none());
        assert!(policy.mentions_action("write"));
        assert!(!policy.mentions_action("delete"));
    }
}
