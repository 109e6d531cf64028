use std::path::PathBuf;
use std::time::Duration;

use crate::consts::NETWORK_OPERATOR_RESOURCE_NAMESPACE;
use crate::error::ConfigError;

const DEFAULT_MANIFESTS_DIR: &str = "./manifests";
const DEFAULT_REQUEUE_SECONDS: u64 = 30;

/// Runtime configuration for the operator process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Root directory holding one sub-directory of templates per state
    pub manifests_dir: PathBuf,
    /// Namespace rendered sub-resources are placed in
    pub namespace: String,
    /// Delay before a resource is reconciled again when nothing changed
    pub requeue: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            manifests_dir: PathBuf::from(DEFAULT_MANIFESTS_DIR),
            namespace: NETWORK_OPERATOR_RESOURCE_NAMESPACE.to_string(),
            requeue: Duration::from_secs(DEFAULT_REQUEUE_SECONDS),
        }
    }
}

impl OperatorConfig {
    /// Load configuration from `MANIFESTS_DIR`, `OPERATOR_NAMESPACE` and `REQUEUE_SECONDS`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(dir) = lookup("MANIFESTS_DIR") {
            config.manifests_dir = PathBuf::from(dir);
        }

        if let Some(namespace) = lookup("OPERATOR_NAMESPACE") {
            if namespace.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    name: "OPERATOR_NAMESPACE",
                    reason: "must not be empty".to_string(),
                });
            }
            config.namespace = namespace;
        }

        if let Some(seconds) = lookup("REQUEUE_SECONDS") {
            let seconds = seconds.parse::<u64>().map_err(|e| ConfigError::Invalid {
                name: "REQUEUE_SECONDS",
                reason: e.to_string(),
            })?;
            config.requeue = Duration::from_secs(seconds);
        }

        Ok(config)
    }

    /// Template directory of a single state
    pub fn state_manifest_dir(&self, state: &str) -> PathBuf {
        self.manifests_dir.join(state)
    }
}
