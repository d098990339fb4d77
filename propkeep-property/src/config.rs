//! Manager configuration.
//!
//! Read from the `[properties]` table of a TOML file:
//!
//! ```toml
//! [properties]
//! namespace = "my-plugin"
//! drain_timeout_ms = 2000
//! executor = "serial"
//! lock_shards = 1
//! ```
//!
//! Every field is optional.

use crate::error::{PropertyError, PropertyResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Where background writes run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// Tokio blocking pool, no ordering between writes.
    Tokio,
    #[default]
    /// One writer task, writes applied in submission order.
    Serial,
    /// On the calling thread.
    Inline,
}

/// Configuration for a [`PropertyManager`](crate::PropertyManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Namespace for every key the manager creates.
    pub namespace: String,
    /// How long `dispose_and_flush` waits for pending writes (ms).
    pub drain_timeout_ms: u64,
    /// Executor for background writes.
    pub executor: ExecutorKind,
    /// 1 uses the process-wide lock; more builds a private sharded domain.
    pub lock_shards: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            namespace: "propkeep".to_string(),
            drain_timeout_ms: 5_000,
            executor: ExecutorKind::Serial,
            lock_shards: 1,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    properties: ManagerConfig,
}

impl ManagerConfig {
    /// Returns the drain timeout as a `Duration`.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Parses a TOML document and validates it.
    pub fn from_toml_str(contents: &str) -> PropertyResult<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| PropertyError::Config(e.to_string()))?;
        file.properties.validate()?;
        Ok(file.properties)
    }

    /// Loads configuration from a file, falling back to defaults when the
    /// file is missing, unreadable or invalid.
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No property config found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    info!("Loaded property config from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse property config {:?}: {}. Using defaults.", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read property config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub(crate) fn validate(&self) -> PropertyResult<()> {
        if self.lock_shards == 0 {
            return Err(PropertyError::Config("lock_shards must be at least 1".into()));
        }
        propkeep_types::NamespacedKey::new(self.namespace.as_str(), "probe")
            .map_err(|e| PropertyError::Config(format!("namespace: {e}")))?;
        Ok(())
    }
}
