//! Client surface of the replicated cluster under test.
//!
//! The harness never looks inside the data store. Everything it does goes
//! through [`ClusterHandle`]: one blocking round trip per call, raw
//! [`ClusterError`]s on failure, no retries.

mod error;
mod local;
mod types;

pub use error::*;
pub use local::*;
pub use types::*;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterHandle: Send + Sync {
    /// Current membership with roles and replication state.
    async fn topology(&self) -> Result<Vec<NodeInfo>, ClusterError>;

    /// The node currently holding leadership.
    async fn leader(&self) -> Result<NodeId, ClusterError>;

    /// Plain insert, acknowledged by the target node alone.
    async fn insert(
        &self,
        node: NodeId,
        document: Document,
    ) -> Result<WriteAck, ClusterError>;

    /// Flush and lock the node against writes; its replication pauses.
    ///
    /// Fails with [`ClusterError::AlreadyLocked`] on a locked node.
    async fn fsync_lock(
        &self,
        node: NodeId,
    ) -> Result<LockToken, ClusterError>;

    async fn fsync_unlock(
        &self,
        node: NodeId,
        token: LockToken,
    ) -> Result<(), ClusterError>;

    /// Waits until every node applied the leader's last write.
    ///
    /// Returns `false` when `timeout` elapses first.
    async fn await_replication(
        &self,
        timeout: std::time::Duration,
    ) -> Result<bool, ClusterError>;

    async fn step_down(
        &self,
        node: NodeId,
    ) -> Result<StepDownAck, ClusterError>;

    /// Waits for the node's most recent write to reach `concern`.
    async fn acknowledged_write(
        &self,
        node: NodeId,
        concern: WriteConcernRequest,
    ) -> Result<WriteAck, ClusterError>;

    /// Insert followed by a wait on `concern`.
    async fn write_with_concern(
        &self,
        node: NodeId,
        document: Document,
        concern: WriteConcernRequest,
    ) -> Result<WriteAck, ClusterError> {
        self.insert(node, document).await?;
        self.acknowledged_write(node, concern).await
    }

    /// Stops the cluster. Calls after shutdown fail with [`ClusterError::Shutdown`].
    async fn shutdown(&self) -> Result<TeardownReport, ClusterError>;
}
