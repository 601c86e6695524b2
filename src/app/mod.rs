//! The managed application.
//!
//! # Lifecycle
//! ```text
//! start():
//!     bind HTTP + gRPC listeners
//!     → attach ServiceInstance to the registrar
//!     → before-start hooks (service init)
//!     → spawn accept loops
//!     → register with discovery
//!
//! stop():
//!     deregister
//!     → trigger shutdown, join accept loops
//! ```
//!
//! Registration happens only once both listeners are serving, so discovery
//! never advertises an instance that cannot take traffic.

pub mod registrar;

use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use axum::Router;
use tokio::task::JoinHandle;
use tonic::service::Routes;

pub use registrar::AppRegistrar;

use crate::discovery::ServiceInstance;
use crate::error::BootError;
use crate::http::{self, HttpServer};
use crate::lifecycle::Shutdown;
use crate::net;
use crate::rpc::{self, GrpcServer};

/// Hook run before the application starts serving.
pub type Hook = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

/// Identity of the running application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub metadata: BTreeMap<String, String>,
}

/// Addresses the transports are listening on.
#[derive(Debug, Clone, Copy)]
pub struct BoundAddrs {
    pub http: SocketAddr,
    pub grpc: SocketAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Running,
    Stopped,
}

/// Owns both transports and the registrar.
pub struct App {
    info: AppInfo,
    http: Option<(String, u16, Router)>,
    grpc: Option<(String, u16, Routes)>,
    registrar: Arc<AppRegistrar>,
    before_start: Vec<Hook>,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
    addrs: Option<BoundAddrs>,
    state: State,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::default()
    }

    pub fn info(&self) -> &AppInfo {
        &self.info
    }

    pub fn registrar(&self) -> Arc<AppRegistrar> {
        self.registrar.clone()
    }

    /// Bound addresses, available once started.
    pub fn addrs(&self) -> Option<BoundAddrs> {
        self.addrs
    }

    /// Start both transports and register with discovery.
    pub async fn start(&mut self) -> Result<BoundAddrs, BootError> {
        if self.state != State::Created {
            return Err(BootError::InvalidState("started"));
        }
        let (Some((http_host, http_port, router)), Some((grpc_host, grpc_port, routes))) =
            (self.http.take(), self.grpc.take())
        else {
            return Err(BootError::InvalidState("started"));
        };

        let http_listener = net::bind(&http_host, http_port).await?;
        let grpc_listener = net::bind(&grpc_host, grpc_port).await?;
        let addrs = BoundAddrs {
            http: local_addr(&http_listener, &http_host, http_port)?,
            grpc: local_addr(&grpc_listener, &grpc_host, grpc_port)?,
        };

        self.registrar.attach(self.instance(addrs));

        for hook in self.before_start.drain(..) {
            hook().await.map_err(BootError::Hook)?;
        }

        let signal = self.shutdown.subscribe();
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = http::server::serve(router, http_listener, signal).await {
                tracing::error!(error = %e, "HTTP server failed");
            }
        }));

        let signal = self.shutdown.subscribe();
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = rpc::server::serve(routes, grpc_listener, signal).await {
                tracing::error!(error = %e, "gRPC server failed");
            }
        }));

        self.state = State::Running;
        self.addrs = Some(addrs);

        self.registrar.register().await?;

        tracing::info!(
            id = %self.info.id,
            name = %self.info.name,
            version = %self.info.version,
            http = %addrs.http,
            grpc = %addrs.grpc,
            "Application started"
        );
        Ok(addrs)
    }

    /// Deregister, then stop both transports and wait for them.
    ///
    /// Only the first call does anything.
    pub async fn stop(&mut self) -> Result<(), BootError> {
        if self.state != State::Running {
            return Ok(());
        }
        self.state = State::Stopped;

        let deregistered = self.registrar.deregister().await;
        if let Err(e) = &deregistered {
            tracing::warn!(error = %e, "Deregistration failed");
        }

        self.shutdown.trigger();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Transport task failed");
            }
        }

        tracing::info!(id = %self.info.id, "Application stopped");
        deregistered.map_err(BootError::from)
    }

    fn instance(&self, addrs: BoundAddrs) -> ServiceInstance {
        ServiceInstance {
            id: self.info.id.clone(),
            name: self.info.name.clone(),
            version: self.info.version.clone(),
            metadata: self.info.metadata.clone(),
            endpoints: vec![
                net::endpoint("http", net::advertise_addr(addrs.http)),
                net::endpoint("grpc", net::advertise_addr(addrs.grpc)),
            ],
        }
    }
}

fn local_addr(
    listener: &tokio::net::TcpListener,
    host: &str,
    port: u16,
) -> Result<SocketAddr, BootError> {
    listener.local_addr().map_err(|source| {
        BootError::from(net::ListenerError::Bind {
            addr: format!("{}:{}", host, port),
            source,
        })
    })
}

/// Builder for [`App`].
#[derive(Default)]
pub struct AppBuilder {
    id: Option<String>,
    name: String,
    version: String,
    metadata: BTreeMap<String, String>,
    http: Option<HttpServer>,
    grpc: Option<GrpcServer>,
    registrar: Option<Arc<AppRegistrar>>,
    before_start: Vec<Hook>,
}

impl AppBuilder {
    /// Instance id. Defaults to a random UUID.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn http(mut self, server: HttpServer) -> Self {
        self.http = Some(server);
        self
    }

    pub fn grpc(mut self, server: GrpcServer) -> Self {
        self.grpc = Some(server);
        self
    }

    pub fn registrar(mut self, registrar: Arc<AppRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// Run `hook` after the listeners are bound and before they serve.
    pub fn before_start<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.before_start.push(Box::new(move || Box::pin(hook())));
        self
    }

    pub fn build(self) -> App {
        let http = self.http.unwrap_or_else(|| {
            HttpServer::new("0.0.0.0", 0, crate::build_info::BuildInfo::default(), None)
        });
        let grpc = self.grpc.unwrap_or_else(|| GrpcServer::new("0.0.0.0", 0));

        App {
            info: AppInfo {
                id: self.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                name: self.name,
                version: self.version,
                metadata: self.metadata,
            },
            http: Some((http.host().to_string(), http.port(), http.into_router())),
            grpc: Some((grpc.host().to_string(), grpc.port(), grpc.into_routes())),
            registrar: self
                .registrar
                .unwrap_or_else(|| Arc::new(AppRegistrar::disabled())),
            before_start: self.before_start,
            shutdown: Shutdown::new(),
            tasks: Vec::new(),
            addrs: None,
            state: State::Created,
        }
    }
}
