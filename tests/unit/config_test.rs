//! Tests for configuration validation and overrides

use prometheus_env_pool::config::{PoolConfig, PoolsConfig, RetryConfig};
use std::collections::HashMap;

fn pools(pools: Vec<PoolConfig>) -> PoolsConfig {
    PoolsConfig {
        identity: "ci-runner".to_string(),
        pools,
    }
}

#[test]
fn test_pool_config_defaults_are_valid() {
    let pool = PoolConfig::new("nightly", "scratch-def");
    assert!(pool.validate().is_ok());
    assert_eq!(pool.retry, RetryConfig::default());
    assert!(pool.setup_concurrency >= 1);
}

#[test]
fn test_pool_config_invalid_batch_size() {
    let pool = PoolConfig::new("nightly", "scratch-def").with_batch_size(0);
    assert!(pool.validate().is_err());
}

#[test]
fn test_pool_config_invalid_setup_concurrency() {
    let pool = PoolConfig::new("nightly", "scratch-def").with_setup_concurrency(0);
    assert!(pool.validate().is_err());
}

#[test]
fn test_pool_config_requires_definition_or_snapshot() {
    let bare = PoolConfig::new("nightly", "");
    assert!(bare.validate().is_err());

    let from_snapshot = PoolConfig::new("nightly", "").with_snapshot_source("golden");
    assert!(from_snapshot.validate().is_ok());
}

#[test]
fn test_pools_config_rejects_duplicate_tags() {
    let cfg = pools(vec![
        PoolConfig::new("nightly", "scratch-def"),
        PoolConfig::new("nightly", "other-def"),
    ]);
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("defined twice"));
}

#[test]
fn test_pools_config_rejects_empty() {
    assert!(pools(Vec::new()).validate().is_err());
}

#[test]
fn test_from_json_applies_defaults() {
    let raw = r#"{
        "pools": [
            {
                "tag": "nightly",
                "max_allocation": 5,
                "batch_size": 3,
                "expiry_days": 2,
                "resource_spec_ref": "scratch-def"
            }
        ]
    }"#;

    let cfg = PoolsConfig::from_json_str(raw).expect("valid config");

    assert_eq!(cfg.identity, "pool-engine");
    let pool = cfg.pool("nightly").expect("pool present");
    assert_eq!(pool.max_allocation, 5);
    assert_eq!(pool.snapshot_source_tag, None);
    assert_eq!(pool.retry.max_attempts, 3);
    assert!(cfg.pool("weekly").is_none());
}

#[test]
fn test_from_json_rejects_invalid_pool() {
    let raw = r#"{"pools": [{"tag": "", "max_allocation": 5, "batch_size": 3,
        "expiry_days": 2, "resource_spec_ref": "scratch-def"}]}"#;
    assert!(PoolsConfig::from_json_str(raw).is_err());
}

#[test]
fn test_overrides_apply_to_every_pool() {
    let mut cfg = pools(vec![
        PoolConfig::new("nightly", "scratch-def"),
        PoolConfig::new("weekly", "scratch-def"),
    ]);
    let env: HashMap<&str, &str> = HashMap::from([
        ("POOL_IDENTITY", "release-bot"),
        ("POOL_SETUP_CONCURRENCY", "2"),
        ("POOL_RETRY_MAX_ATTEMPTS", "5"),
        ("POOL_RETRY_BACKOFF_MS", "50"),
    ]);

    cfg.apply_overrides(|key| env.get(key).map(|v| (*v).to_string()))
        .expect("overrides parse");

    assert_eq!(cfg.identity, "release-bot");
    for pool in &cfg.pools {
        assert_eq!(pool.setup_concurrency, 2);
        assert_eq!(
            pool.retry,
            RetryConfig {
                max_attempts: 5,
                backoff_ms: 50,
            }
        );
    }
}

#[test]
fn test_override_with_bad_number_is_rejected() {
    let mut cfg = pools(vec![PoolConfig::new("nightly", "scratch-def")]);
    let err = cfg
        .apply_overrides(|key| (key == "POOL_RETRY_BACKOFF_MS").then(|| "soon".to_string()))
        .unwrap_err();
    assert!(err.contains("POOL_RETRY_BACKOFF_MS"));
}

#[test]
fn test_load_reads_json_file() {
    let path = std::env::temp_dir().join(format!("pools-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(
        &path,
        r#"{"identity": "nightly-bot", "pools": [{"tag": "nightly", "max_allocation": 4,
            "batch_size": 2, "expiry_days": 1, "resource_spec_ref": "scratch-def",
            "setup_concurrency": 3}]}"#,
    )
    .expect("write temp config");

    let loaded = PoolsConfig::load(&path);
    let _ = std::fs::remove_file(&path);

    let cfg = loaded.expect("config loads");
    assert_eq!(cfg.pools.len(), 1);
    assert_eq!(cfg.pools[0].batch_size, 2);
}

#[test]
fn test_load_reports_missing_file() {
    let err = PoolsConfig::load("/nonexistent/pools.json").unwrap_err();
    assert!(format!("{err:#}").contains("reading pool config"));
}
