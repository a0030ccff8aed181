//! Tests for utility functions

use prometheus_env_pool::util::{expiry_after_days, now_ms, DAY_MS};

#[test]
fn test_expiry_after_days() {
    assert_eq!(expiry_after_days(1_000, 0), 1_000);
    assert_eq!(expiry_after_days(1_000, 3), 1_000 + 3 * DAY_MS);
}

#[test]
fn test_now_ms_is_past_2020() {
    assert!(now_ms() > 1_577_836_800_000);
}

#[test]
fn test_init_tracing_is_idempotent() {
    prometheus_env_pool::util::init_tracing();
    prometheus_env_pool::util::init_tracing();
    tracing::info!("tracing initialized twice without panicking");
}
