//! The contract a hosted business service implements.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use tonic::service::RoutesBuilder;

use crate::app::AppRegistrar;

/// A business service hosted by the orchestrator.
///
/// The orchestrator calls the methods in this order, each exactly once:
/// `register_http_routes`, `register_rpc`, `init`, then `close` at shutdown.
/// `close` is only called after `init`.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Attach tonic services to the gRPC server.
    fn register_rpc(&self, routes: &mut RoutesBuilder);

    /// Attach routes to the HTTP router.
    fn register_http_routes(self: Arc<Self>, router: Router) -> Router;

    /// Setup that needs discovery, run before any traffic is accepted.
    ///
    /// `name` is the discovery key prefix for this service
    /// (`microservices/<name>`). `discovery` is `None` when no etcd endpoints
    /// are configured.
    async fn init(
        &self,
        name: &str,
        discovery: Option<etcd_client::Client>,
        registrar: Arc<AppRegistrar>,
    ) -> anyhow::Result<()>;

    /// Release resources. The application has already stopped serving and
    /// deregistered.
    async fn close(&self);
}
