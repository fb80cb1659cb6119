use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::NodeId;
use crate::Result;

/// Local replica set parameters
///
/// Field-level defaults use helper functions prefixed with `default_`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClusterConfig {
    /// Number of replica set members, leader included
    ///
    /// Default: `default_node_count()` (2)
    #[serde(default = "default_node_count")]
    pub node_count: usize,

    /// Host part of every member address
    #[serde(default = "default_host")]
    pub host: String,

    /// Port of node 1; node N gets `base_port + N - 1`
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// How often each follower pulls the leader's op log
    #[serde(default = "default_replication_interval_ms")]
    pub replication_interval_ms: u64,

    /// How long the cluster stays leaderless before electing
    #[serde(default = "default_election_timeout_ms")]
    pub election_timeout_ms: u64,

    /// A step-down is refused unless some follower's last applied write is
    /// at most this far behind the leader's last write
    #[serde(default = "default_step_down_catchup_window_ms")]
    pub step_down_catchup_window_ms: u64,

    /// A stepped-down leader cannot be re-elected for this long
    #[serde(default = "default_step_down_ineligible_ms")]
    pub step_down_ineligible_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_count: default_node_count(),
            host: default_host(),
            base_port: default_base_port(),
            replication_interval_ms: default_replication_interval_ms(),
            election_timeout_ms: default_election_timeout_ms(),
            step_down_catchup_window_ms: default_step_down_catchup_window_ms(),
            step_down_ineligible_ms: default_step_down_ineligible_ms(),
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        // A follower must exist to be frozen
        if self.node_count < 2 {
            return Err(Error::Config(ConfigError::Message(
                "node_count must be at least 2 (one leader, one follower)".into(),
            )));
        }

        if self.host.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message("host cannot be empty".into())));
        }

        if self.base_port == 0 {
            return Err(Error::Config(ConfigError::Message(
                "base_port must be a non-zero port".into(),
            )));
        }

        let last_port = self.base_port as usize + self.node_count - 1;
        if last_port > u16::MAX as usize {
            return Err(Error::Config(ConfigError::Message(format!(
                "base_port {} leaves no room for {} nodes",
                self.base_port, self.node_count
            ))));
        }

        if self.replication_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "replication_interval_ms cannot be 0".into(),
            )));
        }

        if self.election_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "election_timeout_ms cannot be 0".into(),
            )));
        }

        if self.step_down_ineligible_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "step_down_ineligible_ms cannot be 0".into(),
            )));
        }

        Ok(())
    }

    /// Member address, `host:port`. Node ids start at 1.
    pub fn node_address(
        &self,
        id: NodeId,
    ) -> String {
        format!("{}:{}", self.host, self.base_port as u32 + id - 1)
    }

    pub fn replication_interval(&self) -> Duration {
        Duration::from_millis(self.replication_interval_ms)
    }

    pub fn election_timeout(&self) -> Duration {
        Duration::from_millis(self.election_timeout_ms)
    }

    pub fn step_down_catchup_window(&self) -> Duration {
        Duration::from_millis(self.step_down_catchup_window_ms)
    }

    pub fn step_down_ineligible(&self) -> Duration {
        Duration::from_millis(self.step_down_ineligible_ms)
    }
}

fn default_node_count() -> usize {
    2
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_base_port() -> u16 {
    31000
}
// in ms
fn default_replication_interval_ms() -> u64 {
    50
}
fn default_election_timeout_ms() -> u64 {
    1000
}
fn default_step_down_catchup_window_ms() -> u64 {
    10_000
}
fn default_step_down_ineligible_ms() -> u64 {
    60_000
}
