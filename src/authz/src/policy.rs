//! Identity policy matching

use dashmap::DashMap;
use sac_core::{AuthorizationRequest, IdentityPolicy};
use std::sync::Arc;
use tracing::warn;

pub mod pattern;

pub use pattern::{action_permitted, ResourcePattern};

/// Default number of compiled patterns kept before the cache is cleared
pub const DEFAULT_PATTERN_CACHE_CAPACITY: usize = 10_000;

/// Memoized pattern compilation
///
/// Keyed by pattern text. Once `capacity` entries are held the whole map is
/// cleared before the next insert.
#[derive(Debug)]
pub struct PatternCache {
    compiled: DashMap<String, Arc<ResourcePattern>>,
    capacity: usize,
}

impl PatternCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            compiled: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Compiled matcher for `pattern`, or `None` if it cannot be compiled
    pub fn get_or_compile(&self, pattern: &str) -> Option<Arc<ResourcePattern>> {
        if let Some(hit) = self.compiled.get(pattern) {
            return Some(Arc::clone(hit.value()));
        }

        let compiled = match ResourcePattern::compile(pattern) {
            Ok(compiled) => Arc::new(compiled),
            Err(e) => {
                warn!("Skipping resource pattern '{}': {}", pattern, e);
                return None;
            }
        };

        if self.compiled.len() >= self.capacity {
            self.compiled.clear();
        }
        self.compiled.insert(pattern.to_string(), Arc::clone(&compiled));

        Some(compiled)
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERN_CACHE_CAPACITY)
    }
}

/// Whether any statement of `policy` covers the request's resource and action
///
/// Statements whose pattern fails to compile are skipped.
pub fn policy_triggers(
    policy: &IdentityPolicy,
    request: &AuthorizationRequest,
    patterns: &PatternCache,
) -> bool {
    policy.statements().any(|(resource, actions)| {
        action_permitted(actions, &request.action)
            && patterns
                .get_or_compile(resource)
                .is_some_and(|pattern| pattern.matches(&request.resource))
    })
}
