//! Harness Error Hierarchy
//!
//! Separates the three ways a scenario run can end badly:
//! infrastructure failures that abort the run, configuration problems caught
//! before the run starts, and scenario verdicts where the race was reproduced
//! but the cluster answered with something other than a leadership change.
//!
//! Raw errors returned by the cluster itself are [`ClusterError`]; they are
//! wrapped here, never interpreted.

use std::time::Duration;

use config::ConfigError;

use crate::ClusterError;
use crate::NodeId;
use crate::Outcome;
use crate::ScenarioStage;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Cluster unreachable, lock misuse, freeze/unfreeze failures
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),

    /// Harness configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The race ran but the verdict is a failure
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum InfrastructureError {
    /// A cluster command failed outside the probed write
    #[error("Cluster command `{operation}` failed: {source}")]
    Cluster {
        operation: &'static str,
        #[source]
        source: ClusterError,
    },

    /// Second freeze without an intervening release
    #[error("Node {node} is already frozen")]
    AlreadyFrozen { node: NodeId },

    /// Release without a preceding freeze
    #[error("No follower is currently frozen")]
    NotFrozen,

    /// Release addressed to a node other than the frozen one
    #[error("Node {requested} is not frozen (frozen node is {frozen})")]
    FrozenNodeMismatch { requested: NodeId, frozen: NodeId },

    #[error("Cluster has no follower to freeze")]
    NoFollower,

    #[error("Cluster did not reach full replication within {0:?}")]
    ReplicationStalled(Duration),

    #[error("Step-down already scheduled against node {0}")]
    StepDownAlreadyScheduled(NodeId),

    /// Teardown found fsync locks that nobody released
    #[error("Teardown found node(s) {0:?} still fsync-locked")]
    LeakedLocks(Vec<NodeId>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// Anything other than `Failed(LeadershipLost)` came back from the probe
    #[error("Expected the pending write to fail with LeadershipLost, observed {outcome} (raw: {raw})")]
    UnexpectedOutcome { outcome: Outcome, raw: String },

    #[error("Illegal scenario transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ScenarioStage,
        to: ScenarioStage,
    },
}

impl InfrastructureError {
    pub(crate) fn cluster(operation: &'static str) -> impl FnOnce(ClusterError) -> Self {
        move |source| InfrastructureError::Cluster { operation, source }
    }
}

