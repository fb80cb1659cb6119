use std::sync::Arc;

use tracing::info;
use tracing::warn;

use crate::ClusterHandle;
use crate::InfrastructureError;
use crate::LockToken;
use crate::NodeId;
use crate::Result;

struct HeldLock {
    node: NodeId,
    token: LockToken,
}

/// Pauses replication on one follower by fsync-locking it.
///
/// At most one node is frozen at a time. The lock is a scoped resource: the
/// owner must call [`release`](Self::release) on every exit path. Dropping the
/// injector while a node is still frozen only logs a warning, it cannot
/// unlock from `Drop`.
pub struct ReplicationLagInjector {
    cluster: Arc<dyn ClusterHandle>,
    held: Option<HeldLock>,
}

impl ReplicationLagInjector {
    pub fn new(cluster: Arc<dyn ClusterHandle>) -> Self {
        Self { cluster, held: None }
    }

    pub fn is_frozen(&self) -> bool {
        self.held.is_some()
    }

    pub fn frozen_node(&self) -> Option<NodeId> {
        self.held.as_ref().map(|h| h.node)
    }

    /// Freezes `node`. Fails without calling the cluster when a node is already frozen.
    pub async fn freeze(
        &mut self,
        node: NodeId,
    ) -> Result<()> {
        if let Some(held) = &self.held {
            return Err(InfrastructureError::AlreadyFrozen { node: held.node }.into());
        }

        let token = self
            .cluster
            .fsync_lock(node)
            .await
            .map_err(InfrastructureError::cluster("fsync_lock"))?;
        info!("node {} frozen", node);
        self.held = Some(HeldLock { node, token });
        Ok(())
    }

    /// Unfreezes `node` with the token stored by [`freeze`](Self::freeze).
    ///
    /// On an unlock failure the token is kept so the node is still reported as frozen.
    pub async fn release(
        &mut self,
        node: NodeId,
    ) -> Result<()> {
        let Some(held) = &self.held else {
            return Err(InfrastructureError::NotFrozen.into());
        };
        if held.node != node {
            return Err(InfrastructureError::FrozenNodeMismatch {
                requested: node,
                frozen: held.node,
            }
            .into());
        }

        self.cluster
            .fsync_unlock(node, held.token.clone())
            .await
            .map_err(InfrastructureError::cluster("fsync_unlock"))?;
        info!("node {} released", node);
        self.held = None;
        Ok(())
    }
}

impl Drop for ReplicationLagInjector {
    fn drop(&mut self) {
        if let Some(held) = &self.held {
            warn!("lag injector dropped while node {} is still frozen", held.node);
        }
    }
}
