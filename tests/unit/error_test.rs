//! Tests for error types

use prometheus_env_pool::core::{
    CredentialError, LeaseError, PlannerError, PoolError, ProvisionError, StoreError,
};

#[test]
fn test_at_capacity_error() {
    let err = PlannerError::AtCapacity {
        tag: "nightly".to_string(),
        active: 5,
        max: 5,
    };
    assert_eq!(format!("{}", err), "pool `nightly` at capacity: 5 active of 5");
}

#[test]
fn test_pool_exhausted_error() {
    let err = LeaseError::PoolExhausted {
        tag: "nightly".to_string(),
    };
    assert_eq!(format!("{}", err), "no resource available for tag nightly");
}

#[test]
fn test_pool_error_is_transparent() {
    let err: PoolError = StoreError::Unreachable("connection refused".to_string()).into();
    assert_eq!(format!("{}", err), "store unreachable: connection refused");

    let err: PoolError = ProvisionError::Unavailable("503".to_string()).into();
    assert_eq!(format!("{}", err), "provisioning backend unavailable: 503");
}

#[test]
fn test_only_transient_store_errors_are_retryable() {
    assert!(StoreError::Transient("timeout".to_string()).is_transient());
    assert!(!StoreError::Conflict("dup".to_string()).is_transient());
    assert!(!StoreError::Unreachable("down".to_string()).is_transient());
}

#[test]
fn test_credential_error_messages() {
    assert_eq!(format!("{}", CredentialError::Empty), "credential secret is empty");
    assert_eq!(
        format!("{}", CredentialError::Exchange("invalid grant".to_string())),
        "session exchange failed: invalid grant"
    );
}
