use crate::ClusterConfig;

#[test]
fn test_single_node_cluster_is_rejected() {
    let config = ClusterConfig {
        node_count: 1,
        ..Default::default()
    };

    assert!(config.validate().is_err());
}

#[test]
fn test_zero_intervals_are_rejected() {
    let mut config = ClusterConfig::default();
    config.replication_interval_ms = 0;
    assert!(config.validate().is_err());

    let mut config = ClusterConfig::default();
    config.election_timeout_ms = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_port_range_must_fit() {
    let config = ClusterConfig {
        node_count: 3,
        base_port: u16::MAX - 1,
        ..Default::default()
    };

    assert!(config.validate().is_err());
}

#[test]
fn test_node_address_follows_base_port() {
    let config = ClusterConfig {
        host: "10.0.0.7".to_string(),
        base_port: 27017,
        ..Default::default()
    };

    assert_eq!(config.node_address(1), "10.0.0.7:27017");
    assert_eq!(config.node_address(2), "10.0.0.7:27018");
}
