use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

pub type NodeId = u32;

/// Role as reported by the cluster. Only the cluster changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Leader,
    Follower,
}

/// Whether a node is applying the leader's writes.
///
/// `Frozen` means the node is fsync-locked and its replication is paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationState {
    Active,
    Frozen,
}

/// Point-in-time view of one cluster member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub address: String,
    pub role: Role,
    pub replication_state: ReplicationState,
    /// Highest op index this node has applied
    pub applied_index: u64,
}

impl NodeInfo {
    pub fn is_leader(&self) -> bool {
        self.role == Role::Leader
    }
}

/// A flat document of integer fields, e.g. `{x: 1}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document(BTreeMap<String, i64>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        field: impl Into<String>,
        value: i64,
    ) -> Self {
        self.0.insert(field.into(), value);
        self
    }

    pub fn get(
        &self,
        field: &str,
    ) -> Option<i64> {
        self.0.get(field).copied()
    }
}

impl fmt::Display for Document {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        write!(f, "}}")
    }
}

/// Acknowledgment of an accepted write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteAck {
    /// Op log position of the acknowledged write
    pub op_index: u64,
    /// Number of nodes (leader included) known to hold the write
    pub acknowledged: usize,
}

/// Opaque token handed out by `fsync_lock`, required to unlock.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDownAck {
    pub node: NodeId,
    /// Term in which the node gave up leadership
    pub term: u64,
}

/// What `shutdown` found while stopping the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Nodes that were still fsync-locked when shutdown began
    pub locked_nodes: Vec<NodeId>,
    /// Background tasks stopped
    pub tasks_stopped: usize,
}

/// Replication requirement for a write: `w` and `wtimeout`.
///
/// Immutable once built. `acknowledgment_count` counts the leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteConcernRequest {
    acknowledgment_count: usize,
    timeout: Duration,
}

impl WriteConcernRequest {
    pub fn new(
        acknowledgment_count: usize,
        timeout_ms: u64,
    ) -> Result<Self> {
        if acknowledgment_count == 0 {
            return Err(Error::Config(ConfigError::Message(
                "write concern acknowledgment_count must be at least 1".into(),
            )));
        }
        if timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "write concern timeout must be greater than 0ms".into(),
            )));
        }
        Ok(Self {
            acknowledgment_count,
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    pub fn acknowledgment_count(&self) -> usize {
        self.acknowledgment_count
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// A concern is only meaningful when `w` does not exceed the node count.
    pub fn validate_against(
        &self,
        node_count: usize,
    ) -> Result<()> {
        if self.acknowledgment_count > node_count {
            return Err(Error::Config(ConfigError::Message(format!(
                "write concern w={} exceeds cluster size {}",
                self.acknowledgment_count, node_count
            ))));
        }
        Ok(())
    }
}

impl fmt::Display for WriteConcernRequest {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "{{w: {}, wtimeout: {}}}",
            self.acknowledgment_count,
            self.timeout.as_millis()
        )
    }
}
