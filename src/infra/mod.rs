//! In-memory backends for the provisioning platform, record store, and sessions.

pub mod provisioning;
pub mod store;

pub use provisioning::{InMemoryProvisioningClient, InMemorySessionExchanger};
pub use store::InMemoryRecordStore;
