//! Provisioning platform and session backends.

pub mod memory;
pub mod session;

pub use memory::InMemoryProvisioningClient;
pub use session::InMemorySessionExchanger;
