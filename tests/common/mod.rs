//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use axum::{routing::get, Router};
use tokio::net::TcpStream;
use tonic::service::RoutesBuilder;

use example_service::app::AppRegistrar;
use example_service::config::ServerConfig;
use example_service::discovery::{DiscoveryError, Registrar, ServiceInstance};
use example_service::observability::Stat;
use example_service::Service;

/// Loopback config on ephemeral ports with discovery and profiling off.
pub fn test_config(name: &str) -> ServerConfig {
    ServerConfig {
        project_name: "itest".to_string(),
        name: name.to_string(),
        host: "127.0.0.1".to_string(),
        http_port: 0,
        grpc_port: 0,
        pprof_port: 0,
        prome_port: 0,
        debug: true,
        endpoints: Vec::new(),
        registry_ttl_secs: 15,
    }
}

/// HTTP client that never reuses connections, so graceful shutdown does not
/// wait on idle keep-alives.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub async fn is_listening(addr: SocketAddr) -> bool {
    TcpStream::connect(addr).await.is_ok()
}

pub fn log_dir(dir: &tempfile::TempDir) -> &Path {
    dir.path()
}

/// What `init` was called with.
#[derive(Debug, Clone)]
pub struct InitCall {
    pub name: String,
    pub has_discovery: bool,
    pub registered_before_init: bool,
}

/// What `close` observed about the other components.
#[derive(Debug, Clone, Copy)]
pub struct CloseProbe {
    pub http_listening: bool,
    pub metrics_listening: bool,
}

/// Service that records every call made by the orchestrator.
#[derive(Default)]
pub struct RecordingService {
    pub calls: Mutex<Vec<&'static str>>,
    pub init: Mutex<Option<InitCall>>,
    pub close: Mutex<Option<CloseProbe>>,
    watch: OnceLock<(SocketAddr, SocketAddr)>,
}

impl RecordingService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Addresses `close` should probe: (http, metrics).
    pub fn watch(&self, http: SocketAddr, metrics: SocketAddr) {
        let _ = self.watch.set((http, metrics));
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Service for RecordingService {
    fn register_rpc(&self, _routes: &mut RoutesBuilder) {
        self.record("register_rpc");
    }

    fn register_http_routes(self: Arc<Self>, router: Router) -> Router {
        self.record("register_http_routes");
        router.route("/recording", get(|| async { "recorded" }))
    }

    async fn init(
        &self,
        name: &str,
        discovery: Option<etcd_client::Client>,
        registrar: Arc<AppRegistrar>,
    ) -> anyhow::Result<()> {
        let _stat = Stat::new("RecordingService.init");
        self.record("init");
        *self.init.lock().unwrap() = Some(InitCall {
            name: name.to_string(),
            has_discovery: discovery.is_some(),
            registered_before_init: registrar.is_registered(),
        });
        Ok(())
    }

    async fn close(&self) {
        self.record("close");
        if let Some((http, metrics)) = self.watch.get().copied() {
            let probe = CloseProbe {
                http_listening: is_listening(http).await,
                metrics_listening: is_listening(metrics).await,
            };
            *self.close.lock().unwrap() = Some(probe);
        }
    }
}

/// Registrar whose `register` always fails.
pub struct RejectingRegistrar;

#[async_trait]
impl Registrar for RejectingRegistrar {
    async fn register(&self, _instance: &ServiceInstance) -> Result<(), DiscoveryError> {
        let malformed = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        Err(malformed.into())
    }

    async fn deregister(&self, _instance: &ServiceInstance) -> Result<(), DiscoveryError> {
        Ok(())
    }
}
