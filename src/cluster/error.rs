use std::time::Duration;

use super::NodeId;

/// Raw errors as the cluster reports them.
///
/// Nothing in the cluster layer decides what these mean for a scenario;
/// that is the probe's job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterError {
    #[error("node {0} is not the leader")]
    NotLeader(NodeId),

    #[error("cluster has no leader")]
    NoLeader,

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// The node lost leadership while a write was waiting for acknowledgments
    #[error("write on node {node} interrupted due to replication state change (term {previous_term} -> {current_term})")]
    InterruptedDueToStepDown {
        node: NodeId,
        previous_term: u64,
        current_term: u64,
    },

    #[error("timed out after {timeout:?} waiting for replication: acknowledged by {acknowledged} of {required}")]
    WriteConcernTimeout {
        acknowledged: usize,
        required: usize,
        timeout: Duration,
    },

    #[error("write concern w={required} cannot be satisfied by {node_count} node(s)")]
    UnsatisfiableWriteConcern { required: usize, node_count: usize },

    #[error("node {0} is already fsync-locked")]
    AlreadyLocked(NodeId),

    #[error("node {0} is not fsync-locked")]
    NotLocked(NodeId),

    #[error("lock token does not match the lock held on node {0}")]
    LockTokenMismatch(NodeId),

    /// Leader refuses to step down when no follower is caught up
    #[error("no follower within {window:?} of the leader's last write; refusing to step down")]
    NoElectableFollower { window: Duration },

    #[error("cluster unreachable: {0}")]
    Unreachable(String),

    #[error("cluster has been shut down")]
    Shutdown,
}
