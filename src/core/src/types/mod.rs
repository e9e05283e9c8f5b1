//! Data model types

pub mod group;
pub mod policy;
pub mod request;
pub mod tree;

pub use group::{Group, GroupAssignment, GroupId, PrincipalId};
pub use policy::{
    IdentityPolicy, PolicyEffect, PolicyId, ResourceBlock, ResourcePolicy,
    ResourcePolicyAssignment, ACTION_WILDCARD,
};
pub use request::{AuthorizationRequest, AuthorizationResponse, AuthorizationStatus};
pub use tree::Node;
