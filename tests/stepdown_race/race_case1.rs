//! Case 1: A step-down requested while a `w:2` write is pending makes that
//! write fail with a leadership error.
//!
//! Scenario:
//!
//! 1. Start a two-node replica set, node 1 leads.
//! 2. Write `{x: 1}` and wait until both nodes have it.
//! 3. Freeze node 2, write `{x: 2}` on node 1.
//! 4. Schedule node 1's step-down in 4s and wait for `{w: 2, wtimeout: 30000}`.
//!
//! Expected Result:
//!
//! - The wait fails with `Failed(LeadershipLost)` well before 30s.
//! - Every stage is visited once, in order.

use std::time::Duration;

use stepdown_harness::FailureReason;
use stepdown_harness::Outcome;
use stepdown_harness::Result;
use stepdown_harness::ScenarioRunner;
use stepdown_harness::ScenarioStage;
use tracing_test::traced_test;

use crate::common::harness_config;

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_pending_quorum_write_fails_on_step_down() -> Result<()> {
    let settings = harness_config(4000, 30_000).validate()?;
    let mut runner = ScenarioRunner::launch(&settings).await?;

    let report = runner.run().await?;

    assert_eq!(report.probe.outcome, Outcome::Failed(FailureReason::LeadershipLost));
    assert!(report.step_down_requested);
    assert!(report.probe.elapsed < Duration::from_millis(30_000));
    assert_eq!(
        report.stages,
        vec![
            ScenarioStage::Init,
            ScenarioStage::BaselineWritten,
            ScenarioStage::FollowerFrozen,
            ScenarioStage::SecondWriteIssued,
            ScenarioStage::StepDownScheduled,
            ScenarioStage::ProbeIssued,
            ScenarioStage::Asserted,
            ScenarioStage::TornDown,
        ]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_outcome_depends_only_on_delay_before_timeout() -> Result<()> {
    for (delay, timeout) in [(1, 50), (500, 2_000), (4_000, 30_000), (25_000, 30_000)] {
        let settings = harness_config(delay, timeout).validate()?;
        let mut runner = ScenarioRunner::launch(&settings).await?;

        let report = runner.run().await?;

        assert!(
            report.probe.outcome.is_leadership_lost(),
            "delay {}ms / timeout {}ms gave {}",
            delay,
            timeout,
            report.probe.outcome
        );
    }
    Ok(())
}
