//! Startup orchestration.
//!
//! # Order
//! 1. Logging
//! 2. Config checks (project name)
//! 3. etcd client, when endpoints are configured
//! 4. HTTP transport: diagnostic routes, then the service's routes
//! 5. gRPC transport: recovery layer, then the service's services
//! 6. App with a before-start hook calling `Service::init`
//! 7. App start: bind, init, serve, register
//! 8. Profiling endpoint (best effort)
//! 9. Metrics exporter
//!
//! Shutdown runs in reverse: app (deregister + transports), service close,
//! metrics last so scrapes keep working while everything else winds down.
//!
//! Any startup error is fatal and returned; nothing is retried.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::signals::{wait_for_termination, Termination};
use crate::app::{App, AppInfo, AppRegistrar};
use crate::build_info::BuildInfo;
use crate::config::{validate_server, ServerConfig};
use crate::discovery::{self, EtcdRegistrar, Registrar};
use crate::error::BootError;
use crate::http::HttpServer;
use crate::observability::{init_logging, metrics, profiling, Exporter};
use crate::rpc::GrpcServer;
use crate::service::Service;

/// Discovery prefix handed to `Service::init`.
pub fn discovery_name(service_name: &str) -> String {
    format!("microservices/{}", service_name)
}

/// Whether `App::start` got past the before-start hooks before failing.
fn init_ran(error: &BootError) -> bool {
    !matches!(
        error,
        BootError::Hook(_) | BootError::Listener(_) | BootError::InvalidState(_)
    )
}

/// Builds and starts everything around one hosted service.
pub struct Bootstrap<S> {
    config: ServerConfig,
    log_dir: PathBuf,
    service: Arc<S>,
    build: BuildInfo,
    api_doc: Option<utoipa::openapi::OpenApi>,
    registrar: Option<Arc<dyn Registrar>>,
}

impl<S: Service> Bootstrap<S> {
    pub fn new(config: ServerConfig, log_dir: impl Into<PathBuf>, service: Arc<S>) -> Self {
        Self {
            config,
            log_dir: log_dir.into(),
            service,
            build: BuildInfo::from_build_env(),
            api_doc: None,
            registrar: None,
        }
    }

    /// Override the build identity reported by `/git_hash` and discovery.
    pub fn with_build_info(mut self, build: BuildInfo) -> Self {
        self.build = build;
        self
    }

    /// Merge the service's OpenAPI document into `/swagger`.
    pub fn with_api_doc(mut self, doc: utoipa::openapi::OpenApi) -> Self {
        self.api_doc = Some(doc);
        self
    }

    /// Register with `registrar` instead of the etcd registrar.
    pub fn with_registrar(mut self, registrar: Arc<dyn Registrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// Start, block until SIGINT/SIGTERM, then shut down.
    ///
    /// Handlers are installed before startup, so a signal that arrives while
    /// starting still shuts down gracefully.
    pub async fn run(self) -> Result<(), BootError> {
        let mut termination = Termination::install().map_err(BootError::Signal)?;
        let running = self.start().await?;
        termination.recv().await;
        running.shutdown().await;
        Ok(())
    }

    /// Bring every component up, in order.
    pub async fn start(self) -> Result<Running<S>, BootError> {
        let config = self.config;

        init_logging(&config.project_name, config.debug, &self.log_dir).map_err(BootError::Logging)?;
        validate_server(&config)?;
        // Handlers record from their first request, before the exporter binds.
        metrics::prometheus_handle();

        let etcd = if config.discovery_enabled() {
            Some(discovery::connect(&config.endpoints).await?)
        } else {
            None
        };

        let backend: Option<Arc<dyn Registrar>> = match (self.registrar, &etcd) {
            (Some(registrar), _) => Some(registrar),
            (None, Some(client)) => Some(Arc::new(EtcdRegistrar::new(
                client.clone(),
                Duration::from_secs(config.registry_ttl_secs),
            ))),
            (None, None) => None,
        };
        let registrar = Arc::new(AppRegistrar::new(backend));

        let routes_owner = self.service.clone();
        let http = HttpServer::new(
            config.host.clone(),
            config.http_port,
            self.build.clone(),
            self.api_doc,
        )
        .register(move |router| routes_owner.register_http_routes(router));

        let grpc = GrpcServer::new(config.host.clone(), config.grpc_port)
            .register(|routes| self.service.register_rpc(routes));

        let init_name = discovery_name(&config.name);
        let init_service = self.service.clone();
        let init_registrar = registrar.clone();
        let init_client = etcd.clone();

        let mut app = App::builder()
            .name(config.name.clone())
            .version(self.build.git_commit.clone())
            .metadata("project", config.project_name.clone())
            .http(http)
            .grpc(grpc)
            .registrar(registrar.clone())
            .before_start(move || async move {
                init_service
                    .init(&init_name, init_client, init_registrar)
                    .await
            })
            .build();

        if let Err(e) = app.start().await {
            if let Err(stop_err) = app.stop().await {
                tracing::warn!(error = %stop_err, "Application stopped with error");
            }
            if init_ran(&e) {
                self.service.close().await;
            }
            return Err(e);
        }
        let addrs = app.addrs().ok_or(BootError::InvalidState("stopped"))?;

        let profiler = (config.pprof_port > 0)
            .then(|| profiling::spawn(config.host.clone(), config.pprof_port));

        let exporter = match Exporter::start(&config.project_name, &config.host, config.prome_port).await {
            Ok(exporter) => exporter,
            Err(e) => {
                if let Err(stop_err) = app.stop().await {
                    tracing::warn!(error = %stop_err, "Application stopped with error");
                }
                self.service.close().await;
                if let Some(profiler) = profiler {
                    profiler.abort();
                }
                return Err(e.into());
            }
        };

        tracing::info!(
            project = %config.project_name,
            http = %addrs.http,
            grpc = %addrs.grpc,
            metrics = %exporter.local_addr(),
            "app running"
        );

        Ok(Running {
            app,
            service: self.service,
            exporter,
            profiler,
            http_addr: addrs.http,
            grpc_addr: addrs.grpc,
        })
    }
}

/// A started service, waiting to be shut down.
pub struct Running<S> {
    app: App,
    service: Arc<S>,
    exporter: Exporter,
    profiler: Option<JoinHandle<()>>,
    http_addr: SocketAddr,
    grpc_addr: SocketAddr,
}

impl<S: Service> Running<S> {
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn grpc_addr(&self) -> SocketAddr {
        self.grpc_addr
    }

    pub fn metrics_addr(&self) -> SocketAddr {
        self.exporter.local_addr()
    }

    pub fn info(&self) -> &AppInfo {
        self.app.info()
    }

    pub fn registrar(&self) -> Arc<AppRegistrar> {
        self.app.registrar()
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Block until SIGINT or SIGTERM.
    pub async fn wait_for_signal(&self) -> Result<&'static str, BootError> {
        wait_for_termination().await.map_err(BootError::Signal)
    }

    /// Stop the app, close the service, then stop metrics.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.app.stop().await {
            tracing::warn!(error = %e, "Application stopped with error");
        }

        self.service.close().await;

        if let Some(profiler) = self.profiler.take() {
            profiler.abort();
        }

        self.exporter.close().await;
        tracing::info!("app exit");
    }
}

/// Entry point used by `main`: host `service` with `config` until a
/// termination signal arrives.
pub async fn load<S: Service>(
    config: ServerConfig,
    log_dir: impl Into<PathBuf>,
    service: Arc<S>,
) -> Result<(), BootError> {
    Bootstrap::new(config, log_dir, service).run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_ran_only_after_hooks() {
        let hook = BootError::Hook(anyhow::anyhow!("init failed"));
        assert!(!init_ran(&hook));
        assert!(!init_ran(&BootError::InvalidState("started")));

        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let registration = BootError::Discovery(json.into());
        assert!(init_ran(&registration));
    }

    #[test]
    fn test_discovery_name() {
        assert_eq!(discovery_name("example-service"), "microservices/example-service");
    }
}
