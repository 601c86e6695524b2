//! Service discovery subsystem.
//!
//! # Data Flow
//! ```text
//! App started
//!     → AppRegistrar builds ServiceInstance (once)
//!     → Registrar::register (etcd.rs: lease + put + keep-alive task)
//!
//! App stopping
//!     → AppRegistrar reuses the same ServiceInstance
//!     → Registrar::deregister (stop keep-alive, delete key, revoke lease)
//! ```
//!
//! # Design Decisions
//! - Backends sit behind the [`Registrar`] trait; etcd is the production one
//! - Without a configured backend registration is a silent no-op
//! - Keep-alive failures re-register with jittered exponential backoff

pub mod backoff;
pub mod etcd;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use etcd::{connect, list_instances, EtcdRegistrar, DEFAULT_NAMESPACE};
pub use memory::{MemoryRegistrar, RegistryEvent};

/// Discovery record for one running process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub endpoints: Vec<String>,
}

/// Error type for discovery operations.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("failed to connect to etcd: {0}")]
    Connect(#[source] etcd_client::Error),
    #[error("etcd request failed: {0}")]
    Etcd(#[from] etcd_client::Error),
    #[error("failed to encode service instance: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A discovery backend instances advertise themselves to.
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Advertise the instance.
    async fn register(&self, instance: &ServiceInstance) -> Result<(), DiscoveryError>;

    /// Withdraw the instance.
    async fn deregister(&self, instance: &ServiceInstance) -> Result<(), DiscoveryError>;
}
