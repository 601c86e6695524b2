//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML config
//! file. Every field has a default so a minimal `[server]` table loads.

use serde::{Deserialize, Serialize};

/// Root of the config file.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// The `[server]` table.
    pub server: ServerConfig,
}

/// Server settings shared by every service built on this scaffold.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Project name, used for logs and metrics. Required at boot.
    pub project_name: String,

    /// Service name advertised to discovery.
    pub name: String,

    /// Host the transports bind to.
    pub host: String,

    /// HTTP port (0 picks an ephemeral port).
    pub http_port: u16,

    /// gRPC port (0 picks an ephemeral port).
    pub grpc_port: u16,

    /// Profiling port (0 disables profiling).
    pub pprof_port: u16,

    /// Prometheus exporter port.
    pub prome_port: u16,

    /// Verbose logging.
    pub debug: bool,

    /// etcd endpoints. Empty disables discovery.
    pub endpoints: Vec<String>,

    /// Lease TTL for the discovery registration, in seconds.
    pub registry_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            project_name: String::new(),
            name: String::new(),
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            grpc_port: 9090,
            pprof_port: 0,
            prome_port: 9100,
            debug: false,
            endpoints: Vec::new(),
            registry_ttl_secs: 15,
        }
    }
}

impl ServerConfig {
    /// True when an etcd backend is configured.
    pub fn discovery_enabled(&self) -> bool {
        !self.endpoints.is_empty()
    }
}
