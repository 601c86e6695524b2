//! Metrics collection and exposition.
//!
//! # Metrics
//! - `handler_calls_total` (counter): calls per handler
//! - `handler_errors_total` (counter): failed calls per handler
//! - `handler_duration_seconds` (summary): latency per handler
//! - `rpc_panics_total` (counter): recovered panics per gRPC method
//!
//! One Prometheus recorder is installed per process and rendered at
//! `GET /metrics` by the [`Exporter`].

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use axum::{extract::State, routing::get, Router};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;
use crate::net::{self, ListenerError};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Handle to the process-wide recorder, installing it on first use.
pub fn prometheus_handle() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                tracing::warn!("A global metrics recorder was already installed");
            }
            handle
        })
        .clone()
}

/// Per-call timer. Records the call and its duration when dropped.
pub struct Stat {
    name: &'static str,
    start: Instant,
    failed: bool,
}

impl Stat {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
            failed: false,
        }
    }

    /// Count this call as an error.
    pub fn mark_error(&mut self) {
        self.failed = true;
    }
}

impl Drop for Stat {
    fn drop(&mut self) {
        counter!("handler_calls_total", "handler" => self.name).increment(1);
        histogram!("handler_duration_seconds", "handler" => self.name)
            .record(self.start.elapsed().as_secs_f64());
        if self.failed {
            counter!("handler_errors_total", "handler" => self.name).increment(1);
        }
    }
}

/// Record a panic recovered from a gRPC call.
pub fn record_rpc_panic(method: &str) {
    counter!("rpc_panics_total", "method" => method.to_string()).increment(1);
}

/// Prometheus scrape endpoint.
pub struct Exporter {
    addr: SocketAddr,
    shutdown: Shutdown,
    server: JoinHandle<std::io::Result<()>>,
    upkeep: JoinHandle<()>,
}

impl Exporter {
    /// Bind `host:port` and start serving `/metrics`.
    ///
    /// The bind happens before this returns, so a taken port is reported
    /// to the caller.
    pub async fn start(project: &str, host: &str, port: u16) -> Result<Self, ListenerError> {
        let handle = prometheus_handle();
        let listener = net::bind(host, port).await?;
        let addr = listener.local_addr().map_err(|source| ListenerError::Bind {
            addr: format!("{}:{}", host, port),
            source,
        })?;

        let shutdown = Shutdown::new();

        let router = Router::new()
            .route("/metrics", get(render))
            .with_state(handle.clone());
        let signal = shutdown.subscribe();
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(signal.recv())
                .await
        });

        let signal = shutdown.subscribe();
        let upkeep = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(5));
            loop {
                tokio::select! {
                    _ = signal.clone().recv() => return,
                    _ = ticker.tick() => handle.run_upkeep(),
                }
            }
        });

        tracing::info!(project = %project, address = %addr, "Metrics exporter started");
        Ok(Self {
            addr,
            shutdown,
            server,
            upkeep,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop serving and wait for the listener to close.
    pub async fn close(self) {
        self.shutdown.trigger();
        let _ = self.upkeep.await;
        match self.server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Metrics exporter exited with error"),
            Err(e) => tracing::warn!(error = %e, "Metrics exporter task failed"),
        }
        tracing::info!(address = %self.addr, "Metrics exporter stopped");
    }
}

async fn render(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stat_is_rendered() {
        let handle = prometheus_handle();
        {
            let mut stat = Stat::new("unit_test_handler");
            stat.mark_error();
        }

        let text = handle.render();
        assert!(text.contains("handler_calls_total"));
        assert!(text.contains("unit_test_handler"));
        assert!(text.contains("handler_errors_total"));
    }

    #[tokio::test]
    async fn test_exporter_start_and_close() {
        let exporter = Exporter::start("unit", "127.0.0.1", 0).await.unwrap();
        let addr = exporter.local_addr();
        assert_ne!(addr.port(), 0);

        exporter.close().await;
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_exporter_bind_conflict() {
        let exporter = Exporter::start("unit", "127.0.0.1", 0).await.unwrap();
        let port = exporter.local_addr().port();

        assert!(Exporter::start("unit", "127.0.0.1", port).await.is_err());
        exporter.close().await;
    }
}
