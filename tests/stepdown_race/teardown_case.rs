//! Teardown: whatever the race produced, the follower is released and the
//! cluster stopped.
//!
//! Expected Result:
//!
//! - No node is left fsync-locked at shutdown.
//! - The frozen follower never applied the second write.
//! - The cluster refuses commands once torn down.

use stepdown_harness::ClusterError;
use stepdown_harness::ClusterHandle;
use stepdown_harness::Result;
use stepdown_harness::ScenarioRunner;
use stepdown_harness::BASELINE_VALUE;
use stepdown_harness::SCENARIO_FIELD;
use tracing_test::traced_test;

use crate::common::scenario_config;
use crate::common::start_cluster;

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_teardown_releases_follower_and_stops_cluster() -> Result<()> {
    let cluster = start_cluster().await?;
    let mut runner = ScenarioRunner::new(cluster.clone(), scenario_config(4000, 30_000));

    let report = runner.run().await?;

    assert!(report.teardown.locked_nodes.is_empty());
    assert!(report.teardown.tasks_stopped > 0);
    assert!(runner.teardown_invoked());
    assert!(cluster.is_shut_down());
    assert_eq!(cluster.topology().await, Err(ClusterError::Shutdown));

    let follower_docs = cluster
        .documents_on(report.frozen_follower)
        .map_err(|e| stepdown_harness::Error::Fatal(e.to_string()))?;
    assert_eq!(follower_docs.len(), 1);
    assert_eq!(follower_docs[0].get(SCENARIO_FIELD), Some(BASELINE_VALUE));
    Ok(())
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_runner_tears_down_after_failed_launch_step() -> Result<()> {
    let cluster = start_cluster().await?;
    // A w larger than the replica set fails before the step-down is scheduled
    let mut settings = scenario_config(4000, 30_000);
    settings.acknowledgment_count = 3;
    let mut runner = ScenarioRunner::new(cluster.clone(), settings);

    assert!(runner.run().await.is_err());

    assert!(runner.teardown_invoked());
    assert!(cluster.is_shut_down());
    Ok(())
}
