use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::ClusterError;
use crate::Error;
use crate::FailoverOrchestrator;
use crate::InfrastructureError;
use crate::MockClusterHandle;
use crate::StepDownAck;

#[tokio::test(start_paused = true)]
async fn test_step_down_is_requested_after_delay() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut cluster = MockClusterHandle::new();
    cluster.expect_step_down().times(1).returning(move |node| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(StepDownAck { node, term: 1 })
    });
    let mut orchestrator = FailoverOrchestrator::new(Arc::new(cluster));

    let op = orchestrator.schedule_step_down(1, Duration::from_millis(4000)).unwrap();
    assert_eq!(op.node(), 1);
    assert_eq!(op.delay(), Duration::from_millis(4000));

    tokio::time::sleep(Duration::from_millis(3999)).await;
    assert!(!op.is_requested());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert!(op.is_requested());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_schedule_does_not_block_caller() {
    let mut cluster = MockClusterHandle::new();
    cluster.expect_step_down().returning(|node| Ok(StepDownAck { node, term: 1 }));
    let mut orchestrator = FailoverOrchestrator::new(Arc::new(cluster));
    let before = tokio::time::Instant::now();

    let op = orchestrator.schedule_step_down(1, Duration::from_secs(60)).unwrap();

    assert_eq!(tokio::time::Instant::now(), before);
    assert_eq!(op.fires_at(), before + Duration::from_secs(60));
    assert!(!op.is_finished());
}

#[tokio::test(start_paused = true)]
async fn test_step_down_error_is_discarded() {
    let mut cluster = MockClusterHandle::new();
    cluster
        .expect_step_down()
        .times(1)
        .returning(|node| Err(ClusterError::NotLeader(node)));
    let mut orchestrator = FailoverOrchestrator::new(Arc::new(cluster));

    let op = orchestrator.schedule_step_down(1, Duration::from_millis(10)).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(op.is_requested());
    assert!(op.is_finished());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_handle_does_not_cancel_step_down() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut cluster = MockClusterHandle::new();
    cluster.expect_step_down().times(1).returning(move |node| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(StepDownAck { node, term: 1 })
    });
    let mut orchestrator = FailoverOrchestrator::new(Arc::new(cluster));

    drop(orchestrator.schedule_step_down(1, Duration::from_millis(10)).unwrap());
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_operation_is_not_reusable() {
    let mut cluster = MockClusterHandle::new();
    cluster.expect_step_down().returning(|node| Ok(StepDownAck { node, term: 1 }));
    let mut orchestrator = FailoverOrchestrator::new(Arc::new(cluster));
    let _op = orchestrator.schedule_step_down(1, Duration::from_secs(60)).unwrap();

    let second = orchestrator.schedule_step_down(1, Duration::from_secs(60));

    assert!(matches!(
        second,
        Err(Error::Infrastructure(InfrastructureError::StepDownAlreadyScheduled(1)))
    ));
}
