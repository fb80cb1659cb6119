use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio::time::Instant;
use tracing::info;
use tracing::warn;

use crate::ClusterError;
use crate::ClusterHandle;
use crate::FailureReason;
use crate::NodeId;
use crate::Outcome;
use crate::WriteAck;
use crate::WriteConcernRequest;

/// What the probe observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub outcome: Outcome,
    /// Raw cluster reply when it was an error, kept for diagnosis
    pub raw: Option<String>,
    pub elapsed: Duration,
}

/// Issues a quorum write and classifies the reply.
pub struct QuorumWriteProbe {
    cluster: Arc<dyn ClusterHandle>,
    /// Time granted past `wtimeout` before the probe stops waiting itself
    grace: Duration,
}

impl QuorumWriteProbe {
    pub fn new(
        cluster: Arc<dyn ClusterHandle>,
        grace: Duration,
    ) -> Self {
        Self { cluster, grace }
    }

    /// Waits for `node`'s latest write to satisfy `concern`.
    ///
    /// Never blocks much past `concern.timeout()`: a cluster that does not
    /// reply within the timeout plus grace yields [`Outcome::TimedOut`].
    pub async fn run(
        &self,
        node: NodeId,
        concern: WriteConcernRequest,
    ) -> ProbeResult {
        let started = Instant::now();
        let bound = concern.timeout() + self.grace;
        info!("probing node {} with write concern {}", node, concern);

        let (outcome, raw) = match timeout(bound, self.cluster.acknowledged_write(node, concern)).await {
            Ok(reply) => {
                let raw = reply.as_ref().err().map(ToString::to_string);
                (classify(&concern, reply), raw)
            }
            Err(_) => {
                warn!("no reply from node {} within {:?}", node, bound);
                (Outcome::TimedOut, Some(format!("no reply within {bound:?}")))
            }
        };

        let elapsed = started.elapsed();
        info!("probe on node {} finished after {:?}: {}", node, elapsed, outcome);
        ProbeResult {
            outcome,
            raw,
            elapsed,
        }
    }
}

/// Maps a raw `acknowledged_write` reply onto an [`Outcome`].
pub fn classify(
    concern: &WriteConcernRequest,
    reply: Result<WriteAck, ClusterError>,
) -> Outcome {
    match reply {
        Ok(ack) if ack.acknowledged >= concern.acknowledgment_count() => Outcome::Acknowledged(ack.acknowledged),
        Ok(ack) => Outcome::Failed(FailureReason::Other(format!(
            "reply acknowledged by {} node(s), {} required",
            ack.acknowledged,
            concern.acknowledgment_count()
        ))),
        Err(ClusterError::InterruptedDueToStepDown { .. }) | Err(ClusterError::NotLeader(_)) => {
            Outcome::Failed(FailureReason::LeadershipLost)
        }
        Err(ClusterError::WriteConcernTimeout { .. }) => Outcome::TimedOut,
        Err(other) => Outcome::Failed(FailureReason::Other(other.to_string())),
    }
}
