//! # SAC Core
//!
//! Shared data model for the simple access control engine: groups and their
//! membership edges, identity and resource policies, authorization requests
//! and responses, and the group tree returned by graph queries.
//!
//! Every type serializes to the camelCase JSON shape used by stored records.

pub mod types;

// Re-export commonly used types
pub use types::{
    AuthorizationRequest, AuthorizationResponse, AuthorizationStatus, Group, GroupAssignment,
    GroupId, IdentityPolicy, Node, PolicyEffect, PolicyId, PrincipalId, ResourceBlock,
    ResourcePolicy, ResourcePolicyAssignment, ACTION_WILDCARD,
};
