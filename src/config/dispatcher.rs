use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::Error;
use crate::Result;

/// Listener worker pool configuration
///
/// ```toml
/// [dispatcher]
/// worker_pool_size = 2
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DispatcherConfig {
    /// Number of ordered workers invoking listeners
    ///
    /// Events of one path always run on the same worker, so this bounds how
    /// many distinct paths can be served concurrently.
    ///
    /// **Default**: 2
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.worker_pool_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "dispatcher.worker_pool_size must be greater than 0".into(),
            )));
        }

        if self.worker_pool_size > 256 {
            warn!(
                "dispatcher.worker_pool_size ({}) is very large, each worker is a dedicated OS thread",
                self.worker_pool_size
            );
        }

        Ok(())
    }
}

const fn default_worker_pool_size() -> usize {
    2
}
