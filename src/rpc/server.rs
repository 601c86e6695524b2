//! gRPC server setup.

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::service::{Routes, RoutesBuilder};
use tonic::transport::Server;

use super::recovery::RecoveryLayer;
use crate::lifecycle::ShutdownSignal;

/// gRPC transport: registered services plus the address to bind.
pub struct GrpcServer {
    host: String,
    port: u16,
    routes: RoutesBuilder,
}

impl GrpcServer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            routes: RoutesBuilder::default(),
        }
    }

    /// Attach services. Must happen before the server starts.
    pub fn register<F>(mut self, register: F) -> Self
    where
        F: FnOnce(&mut RoutesBuilder),
    {
        register(&mut self.routes);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn into_routes(self) -> Routes {
        self.routes.routes()
    }
}

/// Serve `routes` on `listener` until `signal` fires. Every call runs
/// behind [`RecoveryLayer`].
pub async fn serve(
    routes: Routes,
    listener: TcpListener,
    signal: ShutdownSignal,
) -> Result<(), tonic::transport::Error> {
    let addr = listener.local_addr().ok();
    tracing::info!(address = ?addr, "gRPC server starting");

    Server::builder()
        .layer(RecoveryLayer::new())
        .add_routes(routes)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), signal.recv())
        .await?;

    tracing::info!(address = ?addr, "gRPC server stopped");
    Ok(())
}
