//! Builders to construct pool engines from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{PoolConfig, PoolsConfig};
use crate::core::{
    AllocationRecordStore, NoopSetup, PoolBackends, PoolEngine, PoolError, ProvisioningClient,
    SessionExchanger, SetupJob, SharedReporter, TracingRunReporter,
};

/// Assembles a single [`PoolEngine`] from its configuration and collaborators.
///
/// The provisioning client, record store, and session exchanger are required.
/// The setup job defaults to [`NoopSetup`] and the reporter to
/// [`TracingRunReporter`].
pub struct PoolEngineBuilder {
    config: PoolConfig,
    identity: String,
    client: Option<Arc<dyn ProvisioningClient>>,
    store: Option<Arc<dyn AllocationRecordStore>>,
    sessions: Option<Arc<dyn SessionExchanger>>,
    setup: Arc<dyn SetupJob>,
    reporter: SharedReporter,
}

impl PoolEngineBuilder {
    /// Start a builder for `config`, owned by `identity`.
    pub fn new(config: PoolConfig, identity: impl Into<String>) -> Self {
        Self {
            config,
            identity: identity.into(),
            client: None,
            store: None,
            sessions: None,
            setup: Arc::new(NoopSetup),
            reporter: Arc::new(TracingRunReporter),
        }
    }

    /// Pool tag being built.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.config.tag
    }

    /// Pool configuration being built.
    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Use every collaborator from `backends`.
    #[must_use]
    pub fn with_backends(mut self, backends: &PoolBackends) -> Self {
        self.client = Some(Arc::clone(&backends.client));
        self.store = Some(Arc::clone(&backends.store));
        self.sessions = Some(Arc::clone(&backends.sessions));
        self.setup = Arc::clone(&backends.setup);
        self.reporter = Arc::clone(&backends.reporter);
        self
    }

    /// Provisioning platform client.
    #[must_use]
    pub fn with_client(mut self, client: Arc<dyn ProvisioningClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Allocation record store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn AllocationRecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Session exchanger used on lease.
    #[must_use]
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionExchanger>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Post-provisioning setup job.
    #[must_use]
    pub fn with_setup(mut self, setup: Arc<dyn SetupJob>) -> Self {
        self.setup = setup;
        self
    }

    /// Run reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: SharedReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Validate the configuration and wire the engine.
    pub fn build(self) -> Result<PoolEngine, PoolError> {
        self.config
            .validate()
            .map_err(|e| PoolError::Config(format!("pool `{}`: {e}", self.config.tag)))?;
        if self.identity.trim().is_empty() {
            return Err(PoolError::Config("identity must not be empty".into()));
        }
        let tag = &self.config.tag;
        let missing = |what: &str| PoolError::Config(format!("pool `{tag}`: no {what} configured"));
        let backends = PoolBackends {
            client: self.client.clone().ok_or_else(|| missing("provisioning client"))?,
            store: self.store.clone().ok_or_else(|| missing("record store"))?,
            sessions: self.sessions.clone().ok_or_else(|| missing("session exchanger"))?,
            setup: Arc::clone(&self.setup),
            reporter: Arc::clone(&self.reporter),
        };
        Ok(PoolEngine::new(self.config, &self.identity, &backends))
    }
}

/// Build one engine per configured pool, keyed by tag, sharing `backends`.
pub fn build_engines(
    cfg: &PoolsConfig,
    backends: &PoolBackends,
) -> Result<HashMap<String, PoolEngine>, PoolError> {
    cfg.validate().map_err(PoolError::Config)?;

    let mut engines = HashMap::with_capacity(cfg.pools.len());
    for pool in &cfg.pools {
        let engine = PoolEngineBuilder::new(pool.clone(), cfg.identity.clone())
            .with_backends(backends)
            .build()?;
        tracing::debug!(tag = %pool.tag, max_allocation = pool.max_allocation, "pool engine built");
        engines.insert(pool.tag.clone(), engine);
    }
    Ok(engines)
}
