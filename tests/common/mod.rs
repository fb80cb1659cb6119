use std::sync::Arc;

use stepdown_harness::ClusterConfig;
use stepdown_harness::HarnessConfig;
use stepdown_harness::LocalCluster;
use stepdown_harness::ScenarioConfig;

// Fast replication clock so paused-time runs stay short
pub const REPLICATION_INTERVAL_MS: u64 = 10;
pub const ELECTION_TIMEOUT_MS: u64 = 200;

pub fn cluster_config() -> ClusterConfig {
    ClusterConfig {
        replication_interval_ms: REPLICATION_INTERVAL_MS,
        election_timeout_ms: ELECTION_TIMEOUT_MS,
        ..Default::default()
    }
}

pub fn scenario_config(
    step_down_delay_ms: u64,
    write_timeout_ms: u64,
) -> ScenarioConfig {
    ScenarioConfig {
        step_down_delay_ms,
        write_timeout_ms,
        ..Default::default()
    }
}

pub fn harness_config(
    step_down_delay_ms: u64,
    write_timeout_ms: u64,
) -> HarnessConfig {
    HarnessConfig {
        cluster: cluster_config(),
        scenario: scenario_config(step_down_delay_ms, write_timeout_ms),
        ..Default::default()
    }
}

pub async fn start_cluster() -> stepdown_harness::Result<Arc<LocalCluster>> {
    Ok(Arc::new(LocalCluster::start(cluster_config()).await?))
}
