//! Prometheus metrics for authorization decisions

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Decision counters and latency percentiles
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationMetrics {
    /// Requests that reached a decision
    pub total_requests: u64,

    pub permitted_decisions: u64,

    pub denied_decisions: u64,

    /// Permits granted by a resource policy without identity evaluation
    pub fast_path_grants: u64,

    /// Requests rejected as invalid before any lookup
    pub rejected_requests: u64,

    /// Backend failures surfaced to the caller
    pub backend_errors: u64,

    pub latency_p50_ms: f64,
    pub latency_p90_ms: f64,
    pub latency_p99_ms: f64,
    pub avg_latency_ms: f64,
}

impl AuthorizationMetrics {
    pub fn permit_rate(&self) -> f64 {
        let total = self.permitted_decisions + self.denied_decisions;
        if total == 0 {
            0.0
        } else {
            self.permitted_decisions as f64 / total as f64
        }
    }

    /// Share of permits that came from the resource policy fast path
    pub fn fast_path_rate(&self) -> f64 {
        if self.permitted_decisions == 0 {
            0.0
        } else {
            self.fast_path_grants as f64 / self.permitted_decisions as f64
        }
    }
}

/// Metrics collector with Prometheus-compatible export
pub struct MetricsCollector {
    metrics: Arc<RwLock<AuthorizationMetrics>>,

    /// Recent latency samples in milliseconds
    latency_samples: Arc<RwLock<Vec<f64>>>,

    max_samples: usize,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(AuthorizationMetrics::default())),
            latency_samples: Arc::new(RwLock::new(Vec::with_capacity(10_000))),
            max_samples: 10_000,
        }
    }

    /// Record a final decision
    pub async fn record_decision(&self, permitted: bool, fast_path: bool) {
        let mut metrics = self.metrics.write().await;
        metrics.total_requests += 1;

        if permitted {
            metrics.permitted_decisions += 1;
            if fast_path {
                metrics.fast_path_grants += 1;
            }
        } else {
            metrics.denied_decisions += 1;
        }
    }

    pub async fn record_rejected(&self) {
        self.metrics.write().await.rejected_requests += 1;
    }

    pub async fn record_backend_error(&self) {
        self.metrics.write().await.backend_errors += 1;
    }

    /// Record request latency
    pub async fn record_latency(&self, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        let mut samples = self.latency_samples.write().await;
        samples.push(latency_ms);

        // Keep only recent samples
        if samples.len() > self.max_samples {
            samples.drain(0..1_000);
        }

        let mut metrics = self.metrics.write().await;

        let sum: f64 = samples.iter().sum();
        metrics.avg_latency_ms = sum / samples.len() as f64;

        let mut sorted = samples.clone();
        sorted.sort_by(f64::total_cmp);

        metrics.latency_p50_ms = Self::percentile(&sorted, 0.50);
        metrics.latency_p90_ms = Self::percentile(&sorted, 0.90);
        metrics.latency_p99_ms = Self::percentile(&sorted, 0.99);
    }

    /// Current metrics snapshot
    pub async fn get_metrics(&self) -> AuthorizationMetrics {
        self.metrics.read().await.clone()
    }

    /// Reset all metrics
    pub async fn reset(&self) {
        *self.metrics.write().await = AuthorizationMetrics::default();
        self.latency_samples.write().await.clear();
    }

    /// Export metrics in Prometheus text format
    pub async fn export_prometheus(&self) -> String {
        let metrics = self.metrics.read().await;

        format!(
            r#"# HELP sac_authz_requests_total Authorization requests that reached a decision
# TYPE sac_authz_requests_total counter
sac_authz_requests_total {}

# HELP sac_authz_permitted_total Permitted decisions
# TYPE sac_authz_permitted_total counter
sac_authz_permitted_total {}

# HELP sac_authz_denied_total Denied decisions
# TYPE sac_authz_denied_total counter
sac_authz_denied_total {}

# HELP sac_authz_fast_path_grants_total Permits granted by resource policies
# TYPE sac_authz_fast_path_grants_total counter
sac_authz_fast_path_grants_total {}

# HELP sac_authz_rejected_total Requests rejected as invalid
# TYPE sac_authz_rejected_total counter
sac_authz_rejected_total {}

# HELP sac_authz_backend_errors_total Backend failures
# TYPE sac_authz_backend_errors_total counter
sac_authz_backend_errors_total {}

# HELP sac_authz_latency_seconds Decision latency percentiles
# TYPE sac_authz_latency_seconds summary
sac_authz_latency_seconds{{quantile="0.5"}} {}
sac_authz_latency_seconds{{quantile="0.9"}} {}
sac_authz_latency_seconds{{quantile="0.99"}} {}
"#,
            metrics.total_requests,
            metrics.permitted_decisions,
            metrics.denied_decisions,
            metrics.fast_path_grants,
            metrics.rejected_requests,
            metrics.backend_errors,
            metrics.latency_p50_ms / 1000.0,
            metrics.latency_p90_ms / 1000.0,
            metrics.latency_p99_ms / 1000.0,
        )
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = ((sorted.len() as f64) * p) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
