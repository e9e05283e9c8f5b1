//! # SAC Authorization Engine
//!
//! Decides whether a principal may perform an action on a resource by
//! combining nested group membership, identity policies and resource
//! policies.
//!
//! ## Features
//!
//! - **Nested groups** with cycle-safe transitive resolution
//! - **Identity policies** with `/`-segment wildcards and deny-overrides
//! - **Resource policies** granting actions per resource without a policy scan
//! - **Pluggable storage** behind the async [`Backend`] trait (in-memory or sled)
//!
//! ## Example
//!
//! ```rust
//! use sac_authz::{AuthorizationRequest, AuthorizationService, Group, IdentityPolicy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = AuthorizationService::in_memory();
//!
//!     service.create_group(Group::new("hr", "Human Resources")).await?;
//!     service
//!         .create_policy(
//!             IdentityPolicy::new("manage-pay")
//!                 .with_resource("/org/employees/*/pay", ["increase", "decrease"]),
//!         )
//!         .await?;
//!     service.assign_policy("manage-pay", "hr").await?;
//!     service.assign_principal_to_group("hr", "alice", false).await?;
//!
//!     let request = AuthorizationRequest::new("r1", "alice", "/org/employees/bob/pay", "increase");
//!     let response = service.authorize(&request).await?;
//!
//!     assert!(response.is_permitted());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod groups;
pub mod policy;
pub mod resource_policy;
pub mod telemetry;

pub use backend::{Backend, InMemoryBackend};
#[cfg(feature = "sled-backend")]
pub use backend::{SledBackend, SledConfig};
pub use config::AuthzConfig;
pub use engine::{AuthorizationMetrics, AuthorizationService, PolicyDecisionEngine, ServiceConfig};
pub use error::{AuthzError, Result};
pub use groups::GroupGraph;
pub use resource_policy::ResourcePolicyIndex;

pub use sac_core::{
    AuthorizationRequest, AuthorizationResponse, AuthorizationStatus, Group, GroupAssignment,
    GroupId, IdentityPolicy, Node, PolicyEffect, PolicyId, PrincipalId, ResourceBlock,
    ResourcePolicy, ResourcePolicyAssignment,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
