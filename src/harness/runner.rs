//! Scenario sequencing.
//!
//! ## Stages
//! `Init → BaselineWritten → FollowerFrozen → SecondWriteIssued →
//! StepDownScheduled → ProbeIssued → Asserted → TornDown`
//!
//! Each stage requires the previous one. `TornDown` is entered from any stage,
//! and teardown (follower release, cluster shutdown) runs whether the race
//! completed, the verdict failed, or a cluster command errored.

use std::sync::Arc;

use config::ConfigError;
use tokio::time::Instant;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::ClusterHandle;
use crate::Document;
use crate::Error;
use crate::FailoverOrchestrator;
use crate::HarnessConfig;
use crate::InfrastructureError;
use crate::LocalCluster;
use crate::NodeId;
use crate::ProbeResult;
use crate::QuorumWriteProbe;
use crate::ReplicationLagInjector;
use crate::ReplicationState;
use crate::Result;
use crate::Role;
use crate::ScenarioConfig;
use crate::ScenarioError;
use crate::StepDownOperation;
use crate::TeardownReport;
use crate::WriteConcernRequest;
use crate::BASELINE_VALUE;
use crate::EXIT_REPRODUCED;
use crate::EXIT_SCENARIO_FAILED;
use crate::LAGGING_VALUE;
use crate::SCENARIO_FIELD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioStage {
    Init,
    BaselineWritten,
    FollowerFrozen,
    SecondWriteIssued,
    StepDownScheduled,
    ProbeIssued,
    Asserted,
    TornDown,
}

impl ScenarioStage {
    /// Successor on the success path.
    pub fn next(self) -> Option<Self> {
        use ScenarioStage::*;
        match self {
            Init => Some(BaselineWritten),
            BaselineWritten => Some(FollowerFrozen),
            FollowerFrozen => Some(SecondWriteIssued),
            SecondWriteIssued => Some(StepDownScheduled),
            StepDownScheduled => Some(ProbeIssued),
            ProbeIssued => Some(Asserted),
            Asserted => Some(TornDown),
            TornDown => None,
        }
    }
}

/// Everything a successful run observed.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub leader: NodeId,
    pub frozen_follower: NodeId,
    pub probe: ProbeResult,
    /// Whether the step-down command had been sent when the probe returned
    pub step_down_requested: bool,
    pub stages: Vec<ScenarioStage>,
    pub teardown: TeardownReport,
    /// Whether the step-down task was still waiting to fire at teardown
    pub step_down_pending: bool,
}

/// Race observations, before teardown.
struct Observation {
    leader: NodeId,
    follower: NodeId,
    probe: ProbeResult,
    step_down_requested: bool,
    verdict: std::result::Result<(), ScenarioError>,
}

pub struct ScenarioRunner {
    cluster: Arc<dyn ClusterHandle>,
    settings: ScenarioConfig,
    stage: ScenarioStage,
    history: Vec<ScenarioStage>,
    teardown_invoked: bool,
    step_down: Option<StepDownOperation>,
}

impl ScenarioRunner {
    pub fn new(
        cluster: Arc<dyn ClusterHandle>,
        settings: ScenarioConfig,
    ) -> Self {
        Self {
            cluster,
            settings,
            stage: ScenarioStage::Init,
            history: vec![ScenarioStage::Init],
            teardown_invoked: false,
            step_down: None,
        }
    }

    /// Boots a [`LocalCluster`] from `config` and hands it to a new runner.
    pub async fn launch(config: &HarnessConfig) -> Result<Self> {
        let cluster = LocalCluster::start(config.cluster.clone()).await?;
        Ok(Self::new(Arc::new(cluster), config.scenario.clone()))
    }

    pub fn stage(&self) -> ScenarioStage {
        self.stage
    }

    /// Stages entered so far, `Init` first.
    pub fn history(&self) -> &[ScenarioStage] {
        &self.history
    }

    pub fn teardown_invoked(&self) -> bool {
        self.teardown_invoked
    }

    /// Whether a scheduled step-down has not finished yet.
    ///
    /// The task is detached, so it can outlive teardown when its delay
    /// exceeds the write timeout.
    pub fn step_down_pending(&self) -> bool {
        self.step_down.as_ref().is_some_and(|op| !op.is_finished())
    }

    /// Runs the race once and tears the cluster down.
    ///
    /// `Ok` only when the pending write failed with `LeadershipLost`. An
    /// infrastructure error wins over a failed teardown; a failed verdict wins
    /// over a teardown error.
    pub async fn run(&mut self) -> Result<ScenarioReport> {
        let started = Instant::now();
        let mut injector = ReplicationLagInjector::new(self.cluster.clone());

        let race = self.race(&mut injector).await;
        let teardown = self.teardown(&mut injector).await;

        let (observation, teardown) = match (race, teardown) {
            (Err(e), teardown) => {
                if let Err(te) = teardown {
                    error!("teardown after aborted scenario failed: {}", te);
                }
                error!("scenario aborted after stage {:?}: {}", self.last_race_stage(), e);
                return Err(e);
            }
            (Ok(observation), Err(te)) => {
                if let Err(verdict) = observation.verdict {
                    error!("teardown failed as well: {}", te);
                    return Err(verdict.into());
                }
                return Err(te);
            }
            (Ok(observation), Ok(report)) => (observation, report),
        };
        observation.verdict?;

        info!(
            "race reproduced in {:?}: {} (raw: {})",
            started.elapsed(),
            observation.probe.outcome,
            observation.probe.raw.as_deref().unwrap_or("none")
        );
        Ok(ScenarioReport {
            leader: observation.leader,
            frozen_follower: observation.follower,
            probe: observation.probe,
            step_down_requested: observation.step_down_requested,
            stages: self.history.clone(),
            teardown,
            step_down_pending: self.step_down_pending(),
        })
    }

    async fn race(
        &mut self,
        injector: &mut ReplicationLagInjector,
    ) -> Result<Observation> {
        let leader = self.cluster.leader().await.map_err(InfrastructureError::cluster("leader"))?;
        let follower = self.pick_follower().await?;
        info!("leader is node {}, follower to freeze is node {}", leader, follower);

        // The leader refuses to step down unless a follower has caught up
        // with a recent write.
        self.cluster
            .insert(leader, Document::new().with(SCENARIO_FIELD, BASELINE_VALUE))
            .await
            .map_err(InfrastructureError::cluster("insert"))?;
        let replicated = self
            .cluster
            .await_replication(self.settings.replication_wait())
            .await
            .map_err(InfrastructureError::cluster("await_replication"))?;
        if !replicated {
            return Err(InfrastructureError::ReplicationStalled(self.settings.replication_wait()).into());
        }
        self.advance(ScenarioStage::BaselineWritten)?;

        injector.freeze(follower).await?;
        self.advance(ScenarioStage::FollowerFrozen)?;

        self.cluster
            .insert(leader, Document::new().with(SCENARIO_FIELD, LAGGING_VALUE))
            .await
            .map_err(InfrastructureError::cluster("insert"))?;
        self.advance(ScenarioStage::SecondWriteIssued)?;

        let concern = self.settings.write_concern()?;
        self.check_quorum_is_out_of_reach(&concern).await?;

        let mut orchestrator = FailoverOrchestrator::new(self.cluster.clone());
        self.step_down = Some(orchestrator.schedule_step_down(leader, self.settings.step_down_delay())?);
        self.advance(ScenarioStage::StepDownScheduled)?;

        let probe = QuorumWriteProbe::new(self.cluster.clone(), self.settings.probe_grace());
        self.advance(ScenarioStage::ProbeIssued)?;
        let result = probe.run(leader, concern).await;

        let verdict = if result.outcome.is_leadership_lost() {
            info!("pending write failed with a leadership change as expected");
            Ok(())
        } else {
            error!(
                "pending write returned {} instead of Failed(LeadershipLost); raw: {}",
                result.outcome,
                result.raw.as_deref().unwrap_or("none")
            );
            Err(ScenarioError::UnexpectedOutcome {
                outcome: result.outcome.clone(),
                raw: result.raw.clone().unwrap_or_else(|| "none".to_string()),
            })
        };
        self.advance(ScenarioStage::Asserted)?;

        Ok(Observation {
            leader,
            follower,
            step_down_requested: self.step_down.as_ref().is_some_and(StepDownOperation::is_requested),
            probe: result,
            verdict,
        })
    }

    /// Releases the follower if still frozen, then shuts the cluster down.
    ///
    /// Always ends in `TornDown`, whatever fails on the way.
    async fn teardown(
        &mut self,
        injector: &mut ReplicationLagInjector,
    ) -> Result<TeardownReport> {
        self.teardown_invoked = true;
        let mut first_error: Option<Error> = None;

        if let Some(op) = self.step_down.as_ref().filter(|op| !op.is_finished()) {
            warn!(
                "step-down of node {} has not fired yet (due in {:?}); it will reach a stopped cluster",
                op.node(),
                op.fires_at().saturating_duration_since(Instant::now())
            );
        }

        if let Some(node) = injector.frozen_node() {
            if let Err(e) = injector.release(node).await {
                error!("failed to release node {}: {}", node, e);
                first_error = Some(e);
            }
        }

        let report = match self.cluster.shutdown().await {
            Ok(report) => {
                if !report.locked_nodes.is_empty() && first_error.is_none() {
                    first_error = Some(InfrastructureError::LeakedLocks(report.locked_nodes.clone()).into());
                }
                Some(report)
            }
            Err(e) => {
                error!("cluster shutdown failed: {}", e);
                if first_error.is_none() {
                    first_error = Some(InfrastructureError::cluster("shutdown")(e).into());
                }
                None
            }
        };

        self.enter_torn_down();

        match (first_error, report) {
            (Some(e), _) => Err(e),
            (None, Some(report)) => Ok(report),
            (None, None) => Err(Error::Fatal("cluster shutdown produced no report".into())),
        }
    }

    async fn pick_follower(&self) -> Result<NodeId> {
        let nodes = self.cluster.topology().await.map_err(InfrastructureError::cluster("topology"))?;
        nodes
            .iter()
            .find(|n| n.role == Role::Follower)
            .map(|n| n.id)
            .ok_or_else(|| InfrastructureError::NoFollower.into())
    }

    /// The race only means something if `w` exceeds the nodes still replicating.
    async fn check_quorum_is_out_of_reach(
        &self,
        concern: &WriteConcernRequest,
    ) -> Result<()> {
        let acknowledgment_count = concern.acknowledgment_count();
        let nodes = self.cluster.topology().await.map_err(InfrastructureError::cluster("topology"))?;
        let replicating = nodes
            .iter()
            .filter(|n| n.replication_state == ReplicationState::Active)
            .count();
        if acknowledgment_count <= replicating {
            return Err(Error::Config(ConfigError::Message(format!(
                "write concern w={} is reachable by the {} replicating node(s); the write could be acknowledged",
                acknowledgment_count, replicating
            ))));
        }
        concern.validate_against(nodes.len())?;
        Ok(())
    }

    pub(crate) fn advance(
        &mut self,
        to: ScenarioStage,
    ) -> Result<()> {
        if self.stage.next() != Some(to) || to == ScenarioStage::TornDown {
            return Err(ScenarioError::InvalidTransition { from: self.stage, to }.into());
        }
        info!("scenario stage {:?} -> {:?}", self.stage, to);
        self.stage = to;
        self.history.push(to);
        Ok(())
    }

    fn enter_torn_down(&mut self) {
        if self.stage == ScenarioStage::TornDown {
            warn!("scenario already torn down");
            return;
        }
        info!("scenario stage {:?} -> {:?}", self.stage, ScenarioStage::TornDown);
        self.stage = ScenarioStage::TornDown;
        self.history.push(ScenarioStage::TornDown);
    }

    /// Last stage reached before teardown.
    fn last_race_stage(&self) -> ScenarioStage {
        self.history
            .iter()
            .rev()
            .copied()
            .find(|s| *s != ScenarioStage::TornDown)
            .unwrap_or(ScenarioStage::Init)
    }
}

/// Maps a run's result onto the binary's exit code and a one-line diagnostic.
///
/// Failures name what went wrong, including the observed outcome when the
/// race ran but the write did not fail with `LeadershipLost`.
pub fn exit_status(result: &Result<ScenarioReport>) -> (u8, String) {
    match result {
        Ok(report) => (
            EXIT_REPRODUCED,
            format!(
                "reproduced: {} after {:?} (leader {}, frozen follower {})",
                report.probe.outcome, report.probe.elapsed, report.leader, report.frozen_follower
            ),
        ),
        Err(e) => (EXIT_SCENARIO_FAILED, format!("scenario failed: {e}")),
    }
}
