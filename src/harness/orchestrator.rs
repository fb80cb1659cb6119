use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;
use tracing::warn;

use crate::utils::async_task::spawn_after;
use crate::ClusterHandle;
use crate::InfrastructureError;
use crate::NodeId;
use crate::Result;

/// Handle to a scheduled step-down.
///
/// The task is detached: dropping this handle does not cancel it, and nothing
/// ever awaits its result. Its effect shows up in the probe's outcome; the
/// handle only exposes diagnostics.
#[derive(Debug)]
pub struct StepDownOperation {
    node: NodeId,
    delay: Duration,
    fires_at: Instant,
    requested: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl StepDownOperation {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Instant at which the step-down request is sent.
    pub fn fires_at(&self) -> Instant {
        self.fires_at
    }

    /// Whether the step-down command has been sent to the cluster.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Schedules the leader's step-down on an independent task.
///
/// One orchestrator schedules at most one step-down.
pub struct FailoverOrchestrator {
    cluster: Arc<dyn ClusterHandle>,
    scheduled: Option<NodeId>,
}

impl FailoverOrchestrator {
    pub fn new(cluster: Arc<dyn ClusterHandle>) -> Self {
        Self {
            cluster,
            scheduled: None,
        }
    }

    /// Sleeps `delay` on a detached task, then asks `node` to step down.
    ///
    /// Returns immediately. The step-down's own result is logged and dropped.
    pub fn schedule_step_down(
        &mut self,
        node: NodeId,
        delay: Duration,
    ) -> Result<StepDownOperation> {
        if let Some(previous) = self.scheduled {
            return Err(InfrastructureError::StepDownAlreadyScheduled(previous).into());
        }
        self.scheduled = Some(node);

        let cluster = self.cluster.clone();
        let requested = Arc::new(AtomicBool::new(false));
        let flag = requested.clone();
        let fires_at = Instant::now() + delay;

        let handle = spawn_after(&format!("step-down-{node}"), delay, move || async move {
            info!("requesting step-down of node {}", node);
            flag.store(true, Ordering::Release);
            match cluster.step_down(node).await {
                Ok(ack) => info!("node {} stepped down in term {}", ack.node, ack.term),
                Err(e) => warn!("step-down of node {} returned: {}", node, e),
            }
        });
        info!("step-down of node {} scheduled in {:?}", node, delay);

        Ok(StepDownOperation {
            node,
            delay,
            fires_at,
            requested,
            handle,
        })
    }
}
