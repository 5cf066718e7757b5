//! Configuration management for the watch coordinator.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (`WATCHER__` prefix)
//! - Component-wise validation
mod dispatcher;
mod recovery;
pub use dispatcher::*;
pub use recovery::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Prefix of the environment variables overriding configuration values,
/// e.g. `WATCHER__DISPATCHER__WORKER_POOL_SIZE=4`.
const ENV_PREFIX: &str = "WATCHER";

/// Main configuration container
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct WatchKeeperConfig {
    /// Listener worker pool
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// Behaviour of the post-reconnection relisten pass
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

impl WatchKeeperConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Callers MUST call `validate()` before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("WATCHER__DISPATCHER__WORKER_POOL_SIZE", "4");
    /// let cfg = WatchKeeperConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    pub fn validate(self) -> Result<Self> {
        self.dispatcher.validate()?;
        self.recovery.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
