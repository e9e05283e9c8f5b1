//! Authorization service
//!
//! Combines the resource policy fast path with identity policy evaluation
//! into a single decision per request, and exposes the administrative
//! operations of the backend it wraps.

pub mod decision;
pub mod metrics;

pub use decision::PolicyDecisionEngine;
pub use metrics::{AuthorizationMetrics, MetricsCollector};

use sac_core::{
    AuthorizationRequest, AuthorizationResponse, Group, GroupId, IdentityPolicy, Node, PolicyId,
    PrincipalId, ResourcePolicy,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::{Backend, InMemoryBackend};
use crate::config::AuthzConfig;
use crate::error::{AuthzError, Result};
use crate::policy::DEFAULT_PATTERN_CACHE_CAPACITY;

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Consult resource policies before identity policies
    pub resource_policy_fast_path: bool,

    /// Enable metrics collection
    pub enable_metrics: bool,

    /// Compiled resource patterns kept in memory
    pub pattern_cache_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            resource_policy_fast_path: true,
            enable_metrics: true,
            pattern_cache_capacity: DEFAULT_PATTERN_CACHE_CAPACITY,
        }
    }
}

/// Authorization service over a storage backend
///
/// # Pipeline
///
/// ```text
/// Request → validate → ResourcePolicy ──grant──→ Permitted
///                          │ no grant
///                          ↓
///           transitive groups → identity policies → PolicyDecisionEngine
/// ```
///
/// Every call reads current backend state; nothing is cached between calls,
/// so a revoked membership or grant takes effect on the next request.
pub struct AuthorizationService {
    backend: Arc<dyn Backend>,

    engine: PolicyDecisionEngine,

    metrics: Option<Arc<MetricsCollector>>,

    config: ServiceConfig,
}

impl AuthorizationService {
    /// Create a service over `backend`
    pub fn new(backend: Arc<dyn Backend>, config: ServiceConfig) -> Self {
        let metrics = if config.enable_metrics {
            Some(Arc::new(MetricsCollector::new()))
        } else {
            None
        };

        info!(
            "AuthorizationService initialized with fast_path={}, metrics={}",
            config.resource_policy_fast_path, config.enable_metrics
        );

        Self {
            backend,
            engine: PolicyDecisionEngine::with_pattern_cache_capacity(config.pattern_cache_capacity),
            metrics,
            config,
        }
    }

    /// Service over a fresh in-memory backend with default configuration
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()), ServiceConfig::default())
    }

    /// Service built from a loaded configuration file
    pub fn from_config(config: &AuthzConfig) -> Result<Self> {
        let backend = config.open_backend()?;
        Ok(Self::new(backend, config.service_config()))
    }

    /// Backend this service reads from
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Decide whether the request is permitted
    ///
    /// # Errors
    ///
    /// `InvalidRequest` when a field is empty, before any lookup. Backend
    /// failures propagate unchanged. "Nothing matched" is a `Denied`
    /// response, never an error.
    pub async fn authorize(&self, request: &AuthorizationRequest) -> Result<AuthorizationResponse> {
        let start = Instant::now();

        if let Err(e) = Self::validate_request(request) {
            warn!("Rejected authorization request: {}", e);
            if let Some(metrics) = &self.metrics {
                metrics.record_rejected().await;
            }
            return Err(e);
        }

        debug!(
            "Authorization request {}: principal={}, resource={}, action={}",
            request.id, request.principal, request.resource, request.action
        );

        match self.evaluate(request).await {
            Ok((response, fast_path)) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_latency(start.elapsed()).await;
                    metrics
                        .record_decision(response.is_permitted(), fast_path)
                        .await;
                }
                Ok(response)
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_backend_error().await;
                }
                Err(e)
            }
        }
    }

    /// Decision plus whether it came from the resource policy fast path
    async fn evaluate(&self, request: &AuthorizationRequest) -> Result<(AuthorizationResponse, bool)> {
        // Transitive groups are needed by both paths; resolve them at most once
        let mut groups: Option<BTreeSet<GroupId>> = None;

        if self.config.resource_policy_fast_path {
            if let Some(policy) = self.backend.get_resource_policy(&request.resource).await? {
                let direct = policy.granting_assignment(&request.principal, &BTreeSet::new(), &request.action);

                let grant = match direct {
                    Some(assignment) => Some(assignment.principal.clone()),
                    None if policy.mentions_action(&request.action) => {
                        let resolved = self.transitive_groups(&request.principal).await?;
                        let via_group = policy
                            .granting_assignment(&request.principal, &resolved, &request.action)
                            .map(|assignment| assignment.principal.clone());
                        groups = Some(resolved);
                        via_group
                    }
                    None => None,
                };

                if let Some(grantee) = grant {
                    info!(
                        "Decision: PERMIT request {} by resource policy on '{}' (grantee '{}')",
                        request.id, request.resource, grantee
                    );
                    let response = AuthorizationResponse::permitted(&request.id).with_remarks(format!(
                        "permitted by resource policy on '{}'",
                        request.resource
                    ));
                    return Ok((response, true));
                }

                debug!("Resource policy on '{}' grants nothing to the request", request.resource);
            }
        }

        let groups = match groups {
            Some(groups) => groups,
            None => self.transitive_groups(&request.principal).await?,
        };

        let policy_ids = self.collect_policy_ids(&request.principal, &groups).await?;
        let policies = self.backend.load_policies(&policy_ids).await?;

        debug!(
            "Evaluating {} identity policies ({} assigned) across {} groups",
            policies.len(),
            policy_ids.len(),
            groups.len()
        );

        let response = self.engine.decide(request, &policies);
        info!(
            "Decision: {} request {} ({})",
            if response.is_permitted() { "PERMIT" } else { "DENY" },
            request.id,
            response.remarks.as_deref().unwrap_or_default()
        );

        Ok((response, false))
    }

    async fn transitive_groups(&self, principal: &str) -> Result<BTreeSet<GroupId>> {
        Ok(self
            .backend
            .get_group_membership_transitively(principal)
            .await?
            .into_iter()
            .collect())
    }

    /// Policy ids of the principal and its groups, first occurrence kept
    async fn collect_policy_ids(
        &self,
        principal: &str,
        groups: &BTreeSet<GroupId>,
    ) -> Result<Vec<PolicyId>> {
        let mut seen = BTreeSet::new();
        let mut ids = Vec::new();

        for holder in std::iter::once(principal).chain(groups.iter().map(String::as_str)) {
            for id in self.backend.get_policy_assignments(holder).await? {
                if seen.insert(id.clone()) {
                    ids.push(id);
                }
            }
        }

        Ok(ids)
    }

    fn validate_request(request: &AuthorizationRequest) -> Result<()> {
        let missing = request.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthzError::InvalidRequest(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }

    /// Current metrics, when enabled
    pub async fn get_metrics(&self) -> Option<AuthorizationMetrics> {
        match &self.metrics {
            Some(metrics) => Some(metrics.get_metrics().await),
            None => None,
        }
    }

    /// Prometheus text exposition, when metrics are enabled
    pub async fn export_prometheus(&self) -> Option<String> {
        match &self.metrics {
            Some(metrics) => Some(metrics.export_prometheus().await),
            None => None,
        }
    }

    // Administrative operations

    pub async fn create_group(&self, group: Group) -> Result<()> {
        info!("Creating group '{}'", group.id);
        self.backend.create_group(group).await
    }

    pub async fn get_group(&self, id: &str) -> Result<Option<Group>> {
        self.backend.get_group(id).await
    }

    pub async fn update_group(&self, group: Group) -> Result<()> {
        info!("Updating group '{}'", group.id);
        self.backend.update_group(group).await
    }

    /// Delete a group record; memberships naming it must be unassigned separately
    pub async fn delete_group(&self, id: &str) -> Result<()> {
        info!("Deleting group '{}'", id);
        self.backend.delete_group(id).await
    }

    pub async fn assign_principal_to_group(
        &self,
        group_id: &str,
        principal: &str,
        principal_is_group: bool,
    ) -> Result<()> {
        info!(
            "Assigning {} '{}' to group '{}'",
            if principal_is_group { "group" } else { "principal" },
            principal,
            group_id
        );
        self.backend
            .assign_principal_to_group(group_id, principal, principal_is_group)
            .await
    }

    pub async fn unassign_principal_from_group(&self, group_id: &str, principal: &str) -> Result<()> {
        info!("Unassigning '{}' from group '{}'", principal, group_id);
        self.backend.unassign_principal_from_group(group_id, principal).await
    }

    pub async fn get_all_principals_for_group(&self, group_id: &str) -> Result<Vec<PrincipalId>> {
        self.backend.get_all_principals_for_group(group_id).await
    }

    pub async fn get_group_membership(&self, principal: &str) -> Result<Vec<GroupId>> {
        self.backend.get_group_membership(principal).await
    }

    pub async fn get_group_membership_transitively(&self, principal: &str) -> Result<Vec<GroupId>> {
        self.backend.get_group_membership_transitively(principal).await
    }

    pub async fn get_group_tree(&self, root_group_id: &str) -> Result<Node> {
        self.backend.get_group_tree(root_group_id).await
    }

    pub async fn create_policy(&self, policy: IdentityPolicy) -> Result<()> {
        info!("Creating policy '{}'", policy.id);
        self.backend.create_policy(policy).await
    }

    pub async fn get_policy(&self, id: &str) -> Result<Option<IdentityPolicy>> {
        self.backend.get_policy(id).await
    }

    pub async fn update_policy(&self, policy: IdentityPolicy) -> Result<()> {
        info!("Updating policy '{}'", policy.id);
        self.backend.update_policy(policy).await
    }

    pub async fn delete_policy(&self, id: &str) -> Result<()> {
        info!("Deleting policy '{}'", id);
        self.backend.delete_policy(id).await
    }

    pub async fn assign_policy(&self, policy_id: &str, principal: &str) -> Result<()> {
        info!("Assigning policy '{}' to '{}'", policy_id, principal);
        self.backend.assign_policy(policy_id, principal).await
    }

    pub async fn unassign_policy(&self, policy_id: &str, principal: &str) -> Result<()> {
        info!("Unassigning policy '{}' from '{}'", policy_id, principal);
        self.backend.unassign_policy(policy_id, principal).await
    }

    pub async fn get_principals_for_policy(&self, policy_id: &str) -> Result<Vec<PrincipalId>> {
        self.backend.get_principals_for_policy(policy_id).await
    }

    pub async fn fetch_identity_policies_transitively_for_principal(
        &self,
        principal: &str,
    ) -> Result<Vec<IdentityPolicy>> {
        self.backend
            .fetch_identity_policies_transitively_for_principal(principal)
            .await
    }

    pub async fn grant_actions(&self, resource: &str, principal: &str, actions: &[String]) -> Result<()> {
        info!("Granting {:?} on '{}' to '{}'", actions, resource, principal);
        self.backend.grant_actions(resource, principal, actions).await
    }

    pub async fn revoke_actions(&self, resource: &str, principal: &str, actions: &[String]) -> Result<()> {
        info!("Revoking {:?} on '{}' from '{}'", actions, resource, principal);
        self.backend.revoke_actions(resource, principal, actions).await
    }

    pub async fn get_resource_policy(&self, resource: &str) -> Result<Option<ResourcePolicy>> {
        self.backend.get_resource_policy(resource).await
    }

    pub async fn set_resource_policy_description(
        &self,
        resource: &str,
        description: Option<String>,
    ) -> Result<bool> {
        info!("Describing resource policy on '{}'", resource);
        self.backend
            .set_resource_policy_description(resource, description)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_service_creation() {
        let service = AuthorizationService::in_memory();
        assert!(service.metrics.is_some());
        assert!(service.config.resource_policy_fast_path);
    }

    #[tokio::test]
    async fn test_metrics_disabled() {
        let config = ServiceConfig {
            enable_metrics: false,
            ..Default::default()
        };
        let service = AuthorizationService::new(Arc::new(InMemoryBackend::new()), config);

        let request = AuthorizationRequest::new("r1", "alice", "/doc/1", "read");
        service.authorize(&request).await.unwrap();

        assert!(service.get_metrics().await.is_none());
        assert!(service.export_prometheus().await.is_none());
    }

    #[test]
    fn test_validate_request_lists_missing_fields() {
        let request = AuthorizationRequest::new("", "alice", "", "read");
        let err = AuthorizationService::validate_request(&request).unwrap_err();
        assert_eq!(err.to_string(), "Invalid request: missing required fields: id, resource");
    }
}
