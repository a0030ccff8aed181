//! Pool configuration structures.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::AppResult;

/// Environment variable overriding the setup concurrency of every pool.
pub const ENV_SETUP_CONCURRENCY: &str = "POOL_SETUP_CONCURRENCY";
/// Environment variable overriding the retry attempt cap.
pub const ENV_RETRY_MAX_ATTEMPTS: &str = "POOL_RETRY_MAX_ATTEMPTS";
/// Environment variable overriding the retry backoff in milliseconds.
pub const ENV_RETRY_BACKOFF_MS: &str = "POOL_RETRY_BACKOFF_MS";
/// Environment variable overriding the engine identity.
pub const ENV_IDENTITY: &str = "POOL_IDENTITY";

/// Record store retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

fn default_setup_concurrency() -> usize {
    num_cpus::get()
}

fn default_identity() -> String {
    "pool-engine".to_string()
}

/// Configuration of one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Pool tag.
    pub tag: String,
    /// Ceiling of active resources for the tag.
    pub max_allocation: u32,
    /// Concurrent create calls.
    pub batch_size: u32,
    /// Lifetime of each resource in days.
    pub expiry_days: u32,
    /// Opaque reference to the resource definition.
    pub resource_spec_ref: String,
    /// Create from this snapshot instead of the definition.
    #[serde(default)]
    pub snapshot_source_tag: Option<String>,
    /// Concurrent post-setup jobs.
    #[serde(default = "default_setup_concurrency")]
    pub setup_concurrency: usize,
    /// Store write retry settings.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl PoolConfig {
    /// Config with defaults for the optional knobs.
    #[must_use]
    pub fn new(tag: impl Into<String>, resource_spec_ref: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            max_allocation: 10,
            batch_size: 5,
            expiry_days: 1,
            resource_spec_ref: resource_spec_ref.into(),
            snapshot_source_tag: None,
            setup_concurrency: default_setup_concurrency(),
            retry: RetryConfig::default(),
        }
    }

    /// Set the active-resource ceiling.
    #[must_use]
    pub const fn with_max_allocation(mut self, max_allocation: u32) -> Self {
        self.max_allocation = max_allocation;
        self
    }

    /// Set the provisioning concurrency.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the setup concurrency.
    #[must_use]
    pub const fn with_setup_concurrency(mut self, setup_concurrency: usize) -> Self {
        self.setup_concurrency = setup_concurrency;
        self
    }

    /// Set the resource lifetime.
    #[must_use]
    pub const fn with_expiry_days(mut self, expiry_days: u32) -> Self {
        self.expiry_days = expiry_days;
        self
    }

    /// Set the retry settings.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Create from a snapshot.
    #[must_use]
    pub fn with_snapshot_source(mut self, tag: impl Into<String>) -> Self {
        self.snapshot_source_tag = Some(tag.into());
        self
    }

    /// Validate pool configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.tag.trim().is_empty() {
            return Err("tag must not be empty".into());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".into());
        }
        if self.setup_concurrency == 0 {
            return Err("setup_concurrency must be greater than 0".into());
        }
        if self.expiry_days == 0 {
            return Err("expiry_days must be greater than 0".into());
        }
        if self.resource_spec_ref.trim().is_empty() && self.snapshot_source_tag.is_none() {
            return Err("resource_spec_ref or snapshot_source_tag is required".into());
        }
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be greater than 0".into());
        }
        Ok(())
    }
}

/// Root configuration: every pool this process manages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolsConfig {
    /// Identity stamped on created records; drives the `mine` delete filter.
    #[serde(default = "default_identity")]
    pub identity: String,
    /// Managed pools.
    pub pools: Vec<PoolConfig>,
}

impl PoolsConfig {
    /// Validate all pools and ensure at least one pool exists.
    pub fn validate(&self) -> Result<(), String> {
        if self.pools.is_empty() {
            return Err("at least one pool must be defined".into());
        }
        if self.identity.trim().is_empty() {
            return Err("identity must not be empty".into());
        }
        let mut seen = HashSet::new();
        for pool in &self.pools {
            pool.validate()
                .map_err(|e| format!("pool `{}` invalid: {e}", pool.tag))?;
            if !seen.insert(pool.tag.as_str()) {
                return Err(format!("pool `{}` defined twice", pool.tag));
            }
        }
        Ok(())
    }

    /// Look up a pool by tag.
    #[must_use]
    pub fn pool(&self, tag: &str) -> Option<&PoolConfig> {
        self.pools.iter().find(|p| p.tag == tag)
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a JSON file, apply `.env` and process environment overrides, validate.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        // A missing .env file is normal outside development.
        let _ = dotenvy::dotenv();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading pool config {}", path.display()))?;
        let mut cfg: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing pool config {}", path.display()))?;
        cfg.apply_overrides(|key| std::env::var(key).ok())
            .map_err(anyhow::Error::msg)?;
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), String> {
        if let Some(identity) = lookup(ENV_IDENTITY) {
            self.identity = identity;
        }
        let setup = parse_override::<usize>(&lookup, ENV_SETUP_CONCURRENCY)?;
        let attempts = parse_override::<u32>(&lookup, ENV_RETRY_MAX_ATTEMPTS)?;
        let backoff = parse_override::<u64>(&lookup, ENV_RETRY_BACKOFF_MS)?;
        for pool in &mut self.pools {
            if let Some(setup) = setup {
                pool.setup_concurrency = setup;
            }
            if let Some(attempts) = attempts {
                pool.retry.max_attempts = attempts;
            }
            if let Some(backoff) = backoff {
                pool.retry.backoff_ms = backoff;
            }
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, String> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| format!("{key} has invalid value `{raw}`"))
        })
        .transpose()
}
