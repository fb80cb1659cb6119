//! Configuration management for the step-down harness.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Environment variable overrides
//! - Configuration file support
//! - Component-wise validation
//!
//! The race timing (step-down delay, write timeout) lives here rather than in
//! the scenario code: only their relative order is fixed, the magnitudes are
//! calibrated per cluster.
mod cluster;
mod logging;
mod scenario;
pub use cluster::*;
pub use logging::*;
pub use scenario::*;
#[cfg(test)]
mod cluster_test;

use std::env;
use std::fmt::Debug;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::CONFIG_ENV_PREFIX;

/// Top-level harness configuration
///
/// Combines all section configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables prefixed `HARNESS__` (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct HarnessConfig {
    /// Shape and timing of the local replica set
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Race timing and write concern
    #[serde(default)]
    pub scenario: ScenarioConfig,
    /// Log destination and filter
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Debug for HarnessConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("HarnessConfig")
            .field("cluster", &self.cluster)
            .field("scenario", &self.scenario)
            .field("logging", &self.logging)
            .finish()
    }
}

impl HarnessConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `HARNESS__` prefix (highest priority)
    ///
    /// # Note
    /// Callers MUST call `validate()` before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("HARNESS__SCENARIO__STEP_DOWN_DELAY_MS", "2500");
    /// let cfg = HarnessConfig::new()?.validate()?;
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

    /// Validates every section plus the rules that span sections.
    ///
    /// Consumes self so the validated instance is the one that gets used.
    pub fn validate(self) -> Result<Self> {
        self.cluster.validate()?;
        self.scenario.validate()?;
        self.logging.validate()?;

        self.scenario.write_concern()?.validate_against(self.cluster.node_count)?;

        // Leader plus the followers that keep replicating while one is frozen.
        let replicating = self.cluster.node_count - 1;
        if self.scenario.acknowledgment_count <= replicating {
            return Err(Error::Config(ConfigError::Message(format!(
                "scenario.acknowledgment_count ({}) must exceed the {} node(s) still replicating \
                 with one follower frozen, otherwise the write can be acknowledged",
                self.scenario.acknowledgment_count, replicating
            ))));
        }

        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(CONFIG_ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
