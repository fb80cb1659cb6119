use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::WriteConcernRequest;

/// Race timing and the write concern of the probed write
///
/// Only the order `step_down_delay_ms < write_timeout_ms` is load-bearing.
/// The magnitudes are calibrated against a cluster's real timing.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScenarioConfig {
    /// Delay between scheduling the step-down and requesting it
    ///
    /// Default: `default_step_down_delay_ms()` (4000)
    #[serde(default = "default_step_down_delay_ms")]
    pub step_down_delay_ms: u64,

    /// `wtimeout` of the probed write
    ///
    /// Default: `default_write_timeout_ms()` (30000)
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// `w` of the probed write, leader included
    #[serde(default = "default_acknowledgment_count")]
    pub acknowledgment_count: usize,

    /// Budget for the baseline write to reach every node
    #[serde(default = "default_replication_wait_ms")]
    pub replication_wait_ms: u64,

    /// Extra time the probe grants the cluster past `write_timeout_ms`
    /// before giving up on a reply
    #[serde(default = "default_probe_grace_ms")]
    pub probe_grace_ms: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            step_down_delay_ms: default_step_down_delay_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            acknowledgment_count: default_acknowledgment_count(),
            replication_wait_ms: default_replication_wait_ms(),
            probe_grace_ms: default_probe_grace_ms(),
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.write_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "write_timeout_ms must be greater than 0".into(),
            )));
        }

        if self.step_down_delay_ms >= self.write_timeout_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "step_down_delay_ms {}ms should be less than write_timeout_ms {}ms",
                self.step_down_delay_ms, self.write_timeout_ms
            ))));
        }

        if self.acknowledgment_count == 0 {
            return Err(Error::Config(ConfigError::Message(
                "acknowledgment_count must be > 0".into(),
            )));
        }

        if self.replication_wait_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "replication_wait_ms cannot be 0".into(),
            )));
        }

        Ok(())
    }

    pub fn step_down_delay(&self) -> Duration {
        Duration::from_millis(self.step_down_delay_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn replication_wait(&self) -> Duration {
        Duration::from_millis(self.replication_wait_ms)
    }

    pub fn probe_grace(&self) -> Duration {
        Duration::from_millis(self.probe_grace_ms)
    }

    pub fn write_concern(&self) -> Result<WriteConcernRequest> {
        WriteConcernRequest::new(self.acknowledgment_count, self.write_timeout_ms)
    }
}

// in ms
fn default_step_down_delay_ms() -> u64 {
    4000
}
fn default_write_timeout_ms() -> u64 {
    30_000
}
fn default_acknowledgment_count() -> usize {
    2
}
fn default_replication_wait_ms() -> u64 {
    30_000
}
fn default_probe_grace_ms() -> u64 {
    1000
}
