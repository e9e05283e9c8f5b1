//! Deny-overrides evaluation of identity policies

use sac_core::{AuthorizationRequest, AuthorizationResponse, IdentityPolicy, PolicyEffect};
use tracing::debug;

use crate::policy::{policy_triggers, PatternCache, DEFAULT_PATTERN_CACHE_CAPACITY};

/// Decides a request against a candidate policy set
///
/// Every candidate is evaluated. The request is permitted only when some
/// policy permits it and none denies it; otherwise it is denied, including
/// when nothing matches at all. Evaluation performs no I/O and does not
/// depend on policy order.
#[derive(Debug)]
pub struct PolicyDecisionEngine {
    patterns: PatternCache,
}

impl PolicyDecisionEngine {
    pub fn new() -> Self {
        Self::with_pattern_cache_capacity(DEFAULT_PATTERN_CACHE_CAPACITY)
    }

    pub fn with_pattern_cache_capacity(capacity: usize) -> Self {
        Self {
            patterns: PatternCache::new(capacity),
        }
    }

    /// Policies among `policies` that the request triggers, in input order
    pub fn triggered<'a>(
        &self,
        request: &AuthorizationRequest,
        policies: &'a [IdentityPolicy],
    ) -> Vec<&'a IdentityPolicy> {
        policies
            .iter()
            .filter(|policy| policy_triggers(policy, request, &self.patterns))
            .collect()
    }

    /// Final decision for `request`
    pub fn decide(
        &self,
        request: &AuthorizationRequest,
        policies: &[IdentityPolicy],
    ) -> AuthorizationResponse {
        let mut permits = Vec::new();
        let mut denies = Vec::new();

        for policy in self.triggered(request, policies) {
            match policy.effect() {
                PolicyEffect::Permit => permits.push(policy.id.as_str()),
                PolicyEffect::Deny => denies.push(policy.id.as_str()),
            }
        }

        debug!(
            "Request {}: {} candidate policies, {} permit, {} deny",
            request.id,
            policies.len(),
            permits.len(),
            denies.len()
        );

        if !denies.is_empty() {
            AuthorizationResponse::denied(&request.id)
                .with_remarks(format!("denied by policy {}", quoted(&denies)))
        } else if !permits.is_empty() {
            AuthorizationResponse::permitted(&request.id)
                .with_remarks(format!("permitted by policy {}", quoted(&permits)))
        } else {
            AuthorizationResponse::denied(&request.id).with_remarks("no matching policy")
        }
    }
}

impl Default for PolicyDecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn quoted(ids: &[&str]) -> String {
    ids.iter()
        .map(|id| format!("'{}'", id))
        .collect::<Vec<_>>()
        .join(", ")
}
