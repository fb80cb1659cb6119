//! The replica set primitives the race is built from, driven by hand.

use std::time::Duration;

use stepdown_harness::ClusterError;
use stepdown_harness::ClusterHandle;
use stepdown_harness::Document;
use stepdown_harness::ReplicationState;
use stepdown_harness::Result;
use stepdown_harness::Role;
use stepdown_harness::WriteConcernRequest;
use stepdown_harness::SCENARIO_FIELD;
use tracing_test::traced_test;

use crate::common::start_cluster;

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_frozen_follower_blocks_quorum_until_step_down() -> Result<()> {
    let cluster = start_cluster().await?;
    let leader = cluster.leader().await.map_err(fatal)?;

    cluster
        .insert(leader, Document::new().with(SCENARIO_FIELD, 1))
        .await
        .map_err(fatal)?;
    assert!(cluster.await_replication(Duration::from_secs(5)).await.map_err(fatal)?);

    let token = cluster.fsync_lock(2).await.map_err(fatal)?;
    let topology = cluster.topology().await.map_err(fatal)?;
    assert_eq!(topology[1].role, Role::Follower);
    assert_eq!(topology[1].replication_state, ReplicationState::Frozen);

    cluster
        .insert(leader, Document::new().with(SCENARIO_FIELD, 2))
        .await
        .map_err(fatal)?;
    let concern = WriteConcernRequest::new(2, 30_000)?;

    let stepper = cluster.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(4)).await;
        let _ = stepper.step_down(1).await;
    });
    let reply = cluster.acknowledged_write(leader, concern).await;

    assert!(matches!(
        reply,
        Err(ClusterError::InterruptedDueToStepDown { node: 1, .. })
    ));
    assert_eq!(cluster.leader().await, Err(ClusterError::NoLeader));

    cluster.fsync_unlock(2, token).await.map_err(fatal)?;
    let report = cluster.shutdown().await.map_err(fatal)?;
    assert!(report.locked_nodes.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_unreplicated_write_times_out_without_step_down() -> Result<()> {
    let cluster = start_cluster().await?;
    cluster
        .insert(1, Document::new().with(SCENARIO_FIELD, 1))
        .await
        .map_err(fatal)?;
    assert!(cluster.await_replication(Duration::from_secs(5)).await.map_err(fatal)?);
    let token = cluster.fsync_lock(2).await.map_err(fatal)?;

    let reply = cluster
        .write_with_concern(1, Document::new().with(SCENARIO_FIELD, 2), WriteConcernRequest::new(2, 1_000)?)
        .await;

    assert!(matches!(
        reply,
        Err(ClusterError::WriteConcernTimeout {
            acknowledged: 1,
            required: 2,
            ..
        })
    ));
    cluster.fsync_unlock(2, token).await.map_err(fatal)?;
    cluster.shutdown().await.map_err(fatal)?;
    Ok(())
}

fn fatal(e: ClusterError) -> stepdown_harness::Error {
    stepdown_harness::Error::Fatal(e.to_string())
}
