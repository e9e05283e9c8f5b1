//! Groups and group membership edges

use serde::{Deserialize, Serialize};

/// Unique group identifier
pub type GroupId = String;

/// Principal identifier (an individual, or a group when used as a nested member)
pub type PrincipalId = String;

/// A named collection of principals
///
/// A group owns no direct reference to its members. Membership lives in the
/// edge indices of the backend; `assignments` is only populated when a group
/// is read back, and is never persisted with the group record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Group identifier (unique among groups)
    pub id: GroupId,

    /// Display name
    pub name: String,

    /// Optional free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Resolved membership edges
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignments: Option<Vec<GroupAssignment>>,
}

impl Group {
    /// Create a new group without a description
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            assignments: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the resolved assignments
    pub fn with_assignments(mut self, assignments: Vec<GroupAssignment>) -> Self {
        self.assignments = Some(assignments);
        self
    }

    /// Strip resolved assignments, leaving only the record fields
    pub fn without_assignments(mut self) -> Self {
        self.assignments = None;
        self
    }

    /// Whether `principal` is a direct member according to the resolved assignments
    pub fn has_member(&self, principal: &str) -> bool {
        self.assignments
            .iter()
            .flatten()
            .any(|a| a.principal == principal)
    }
}

/// Edge from a group to one of its direct members
///
/// When `principal_is_group` is set the edge nests another group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAssignment {
    pub group_id: GroupId,
    pub principal: PrincipalId,
    #[serde(default)]
    pub principal_is_group: bool,
}

impl GroupAssignment {
    /// Leaf membership edge
    pub fn member(group_id: impl Into<String>, principal: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            principal: principal.into(),
            principal_is_group: false,
        }
    }

    /// Nesting edge (`child` is itself a group)
    pub fn nested(group_id: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            principal: child.into(),
            principal_is_group: true,
        }
    }
}
