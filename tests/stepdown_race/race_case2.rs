//! Case 2: A step-down that lands after `wtimeout` cannot turn the pending
//! write into a leadership error.
//!
//! Scenario:
//!
//! 1. Same setup as case 1.
//! 2. Step-down delay 40s, write timeout 30s.
//!
//! Expected Result:
//!
//! - Configuration validation refuses this ordering.
//! - Forced through anyway, the probe reports `TimedOut` and the scenario
//!   fails with the observed outcome, after tearing the cluster down.
//! - The step-down has not fired at teardown and is reported as pending.

use stepdown_harness::Error;
use stepdown_harness::Outcome;
use stepdown_harness::ScenarioError;
use stepdown_harness::ScenarioRunner;
use stepdown_harness::ScenarioStage;
use tracing_test::traced_test;

use crate::common::harness_config;
use crate::common::scenario_config;
use crate::common::start_cluster;

#[test]
fn test_late_step_down_is_rejected_by_configuration() {
    let result = harness_config(40_000, 30_000).validate();
    assert!(matches!(result, Err(Error::Config(_))));

    let result = harness_config(30_000, 30_000).validate();
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_late_step_down_yields_timed_out() -> stepdown_harness::Result<()> {
    let cluster = start_cluster().await?;
    let mut runner = ScenarioRunner::new(cluster.clone(), scenario_config(40_000, 30_000));

    let result = runner.run().await;

    match result {
        Err(Error::Scenario(ScenarioError::UnexpectedOutcome { outcome, raw })) => {
            assert_eq!(outcome, Outcome::TimedOut);
            assert!(raw.contains("timed out"), "raw reply: {raw}");
        }
        other => panic!("expected TimedOut, got {other:?}"),
    }
    assert!(runner.teardown_invoked());
    assert_eq!(runner.stage(), ScenarioStage::TornDown);
    assert!(cluster.is_shut_down());
    assert!(runner.step_down_pending());
    Ok(())
}
