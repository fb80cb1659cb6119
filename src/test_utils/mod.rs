//! Shared fixtures for unit tests: fast cluster settings and scenario documents.
use std::sync::Arc;

use crate::ClusterConfig;
use crate::Document;
use crate::HarnessConfig;
use crate::LocalCluster;
use crate::ScenarioConfig;
use crate::SCENARIO_FIELD;

pub(crate) const TEST_REPLICATION_INTERVAL_MS: u64 = 10;
pub(crate) const TEST_ELECTION_TIMEOUT_MS: u64 = 200;

pub(crate) fn test_cluster_config() -> ClusterConfig {
    ClusterConfig {
        replication_interval_ms: TEST_REPLICATION_INTERVAL_MS,
        election_timeout_ms: TEST_ELECTION_TIMEOUT_MS,
        ..Default::default()
    }
}

pub(crate) fn test_scenario_config(
    step_down_delay_ms: u64,
    write_timeout_ms: u64,
) -> ScenarioConfig {
    ScenarioConfig {
        step_down_delay_ms,
        write_timeout_ms,
        ..Default::default()
    }
}

pub(crate) fn test_harness_config(
    step_down_delay_ms: u64,
    write_timeout_ms: u64,
) -> HarnessConfig {
    HarnessConfig {
        cluster: test_cluster_config(),
        scenario: test_scenario_config(step_down_delay_ms, write_timeout_ms),
        ..Default::default()
    }
}

pub(crate) async fn start_test_cluster() -> Arc<LocalCluster> {
    Arc::new(LocalCluster::start(test_cluster_config()).await.expect("cluster should start"))
}

pub(crate) fn doc(x: i64) -> Document {
    Document::new().with(SCENARIO_FIELD, x)
}
