//! Configuration loading and validation

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::{Backend, InMemoryBackend};
use crate::engine::ServiceConfig;
use crate::error::{AuthzError, Result};
use crate::policy::DEFAULT_PATTERN_CACHE_CAPACITY;

/// Complete configuration
///
/// ```toml
/// [service]
/// resource_policy_fast_path = true
/// log_level = "info"
///
/// [storage]
/// backend = "sled"
/// path = "/var/lib/sac"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthzConfig {
    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub storage: StorageSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceSection {
    #[serde(default = "default_true")]
    pub resource_policy_fast_path: bool,
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
    /// Default tracing directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_pattern_cache_capacity")]
    pub pattern_cache_capacity: usize,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            resource_policy_fast_path: true,
            enable_metrics: true,
            log_level: default_log_level(),
            pattern_cache_capacity: DEFAULT_PATTERN_CACHE_CAPACITY,
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    Memory,
    Sled,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSection {
    #[serde(default)]
    pub backend: StorageBackendKind,
    /// Database directory, required for `sled`
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity_bytes: u64,
    /// Background flush interval; 0 disables it
    #[serde(default = "default_flush_every_ms")]
    pub flush_every_ms: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            path: None,
            cache_capacity_bytes: default_cache_capacity(),
            flush_every_ms: default_flush_every_ms(),
        }
    }
}

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_pattern_cache_capacity() -> usize { DEFAULT_PATTERN_CACHE_CAPACITY }
fn default_cache_capacity() -> u64 { 256 * 1024 * 1024 }
fn default_flush_every_ms() -> u64 { 500 }

impl AuthzConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let config: AuthzConfig =
            toml::from_str(contents).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.service.pattern_cache_capacity == 0 {
            anyhow::bail!("pattern_cache_capacity must be at least 1");
        }

        if self.service.log_level.trim().is_empty() {
            anyhow::bail!("log_level must not be empty");
        }

        if self.storage.backend == StorageBackendKind::Sled {
            if self.storage.path.is_none() {
                anyhow::bail!("storage.path is required for the sled backend");
            }
            if cfg!(not(feature = "sled-backend")) {
                anyhow::bail!("the sled backend is not compiled in (feature 'sled-backend')");
            }
        }

        Ok(())
    }

    /// Install the global tracing subscriber with `service.log_level` as the
    /// fallback filter; `RUST_LOG` still wins when set
    ///
    /// Returns `false` if a subscriber was already installed.
    pub fn init_tracing(&self) -> bool {
        crate::telemetry::init_tracing(&self.service.log_level)
    }

    /// Service settings
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            resource_policy_fast_path: self.service.resource_policy_fast_path,
            enable_metrics: self.service.enable_metrics,
            pattern_cache_capacity: self.service.pattern_cache_capacity,
        }
    }

    /// Open the configured backend
    pub fn open_backend(&self) -> Result<Arc<dyn Backend>> {
        match self.storage.backend {
            StorageBackendKind::Memory => Ok(Arc::new(InMemoryBackend::new())),
            StorageBackendKind::Sled => self.open_sled(),
        }
    }

    #[cfg(feature = "sled-backend")]
    fn open_sled(&self) -> Result<Arc<dyn Backend>> {
        use crate::backend::{SledBackend, SledConfig};

        let path = self.storage.path.clone().ok_or_else(|| {
            AuthzError::Configuration("storage.path is required for the sled backend".to_string())
        })?;

        let config = SledConfig {
            path,
            cache_capacity_bytes: self.storage.cache_capacity_bytes,
            flush_every_ms: match self.storage.flush_every_ms {
                0 => None,
                ms => Some(ms),
            },
        };

        Ok(Arc::new(SledBackend::open_with_config(&config)?))
    }

    #[cfg(not(feature = "sled-backend"))]
    fn open_sled(&self) -> Result<Arc<dyn Backend>> {
        Err(AuthzError::Configuration(
            "the sled backend is not compiled in (feature 'sled-backend')".to_string(),
        ))
    }
}
