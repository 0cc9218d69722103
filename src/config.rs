//! Registry and changeset configuration
//!
//! Provides:
//! - `RegistryConfig`: where the registry documents live and the active namespace
//! - `BuildContext`: explicit inputs for deterministic changeset construction
//! - File-name constants for the four persisted documents

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Project-local directory holding the registry documents
pub const DEFAULT_STATE_DIR: &str = ".treb";

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "default";

/// Deployment ID → Deployment
pub const DEPLOYMENTS_FILE: &str = "deployments.json";
/// Transaction ID → Transaction
pub const TRANSACTIONS_FILE: &str = "transactions.json";
/// Safe tx hash → SafeTransaction
pub const SAFE_TXS_FILE: &str = "safe-txs.json";
/// chain → namespace → `{contract}:{label}` → address
pub const LOOKUP_FILE: &str = "registry.json";

/// Environment variable overriding the state directory
pub const STATE_DIR_ENV_VAR: &str = "REGISTRY_STATE_DIR";
/// Environment variable overriding the namespace
pub const NAMESPACE_ENV_VAR: &str = "DEPLOY_NAMESPACE";

/// Registry location and namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Directory containing the four registry documents
    pub state_dir: PathBuf,
    /// Active deployment namespace (e.g. "staging", "production")
    pub namespace: String,
}

impl RegistryConfig {
    /// Uses `<project_root>/.treb` and the default namespace
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            state_dir: project_root.as_ref().join(DEFAULT_STATE_DIR),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// Like [`RegistryConfig::new`] but honors `REGISTRY_STATE_DIR` and `DEPLOY_NAMESPACE`
    ///
    /// A relative `REGISTRY_STATE_DIR` is resolved against `project_root`.
    pub fn from_env(project_root: impl AsRef<Path>) -> Self {
        let mut config = Self::new(&project_root);
        if let Ok(dir) = std::env::var(STATE_DIR_ENV_VAR) {
            if !dir.is_empty() {
                config.state_dir = project_root.as_ref().join(dir);
            }
        }
        if let Ok(namespace) = std::env::var(NAMESPACE_ENV_VAR) {
            if !namespace.is_empty() {
                config.namespace = namespace;
            }
        }
        config
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = state_dir.into();
        self
    }

    /// Full path of one of the registry documents
    pub fn file(&self, name: &str) -> PathBuf {
        self.state_dir.join(name)
    }
}

/// Inputs to the changeset builder besides the execution itself
///
/// `now` is passed in rather than read from the clock so that building a
/// changeset is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub namespace: String,
    pub now: DateTime<Utc>,
    /// Script that produced the execution, recorded on each artifact
    pub script_path: String,
    /// Git commit of the project at deployment time
    pub git_commit: String,
}

impl BuildContext {
    pub fn new(namespace: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            namespace: namespace.into(),
            now,
            script_path: String::new(),
            git_commit: String::new(),
        }
    }

    pub fn with_script(mut self, script_path: impl Into<String>, git_commit: impl Into<String>) -> Self {
        self.script_path = script_path.into();
        self.git_commit = git_commit.into();
        self
    }
}

impl From<&RegistryConfig> for BuildContext {
    fn from(config: &RegistryConfig) -> Self {
        BuildContext::new(config.namespace.clone(), Utc::now())
    }
}
