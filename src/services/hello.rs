//! Placeholder business service.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::{routing::post, Router};
use tonic::service::RoutesBuilder;
use utoipa::OpenApi;

use crate::app::AppRegistrar;
use crate::jobs::MutexJobUtil;
use crate::observability::Stat;
use crate::service::Service;

const JOB_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

#[derive(OpenApi)]
#[openapi(paths(hello), tags((name = "hello", description = "Example endpoints")))]
struct HelloApiDoc;

/// Serves `POST /api/v1/hello`.
#[derive(Default)]
pub struct HelloService {
    etcd: OnceLock<Option<etcd_client::Client>>,
    jobs: OnceLock<MutexJobUtil>,
}

impl HelloService {
    pub fn new() -> Self {
        Self::default()
    }

    /// OpenAPI document for this service's routes.
    pub fn api_doc() -> utoipa::openapi::OpenApi {
        HelloApiDoc::openapi()
    }

    pub fn jobs(&self) -> Option<&MutexJobUtil> {
        self.jobs.get()
    }

    pub fn has_discovery(&self) -> bool {
        matches!(self.etcd.get(), Some(Some(_)))
    }
}

/// Say hello.
#[utoipa::path(
    post,
    path = "/api/v1/hello",
    responses((status = 200, description = "Greeting", body = String))
)]
async fn hello() -> &'static str {
    let _stat = Stat::new("App.HelloHandler");

    "hello world"
}

#[async_trait]
impl Service for HelloService {
    fn register_rpc(&self, _routes: &mut RoutesBuilder) {}

    fn register_http_routes(self: Arc<Self>, router: Router) -> Router {
        router.nest("/api/v1", Router::new().route("/hello", post(hello)))
    }

    async fn init(
        &self,
        name: &str,
        discovery: Option<etcd_client::Client>,
        registrar: Arc<AppRegistrar>,
    ) -> anyhow::Result<()> {
        if self.jobs.get().is_some() {
            anyhow::bail!("HelloService initialised twice");
        }

        let jobs = MutexJobUtil::start(
            name,
            registrar,
            discovery.clone(),
            JOB_REFRESH_INTERVAL,
            1,
        );
        let _ = self.etcd.set(discovery);
        let _ = self.jobs.set(jobs);
        Ok(())
    }

    async fn close(&self) {
        if let Some(jobs) = self.jobs.get() {
            jobs.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_hello_route() {
        let service = Arc::new(HelloService::new());
        let router = service.register_http_routes(Router::new());

        let response = router
            .oneshot(Request::post("/api/v1/hello").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello world");
    }

    #[tokio::test]
    async fn test_hello_rejects_get() {
        let router = Arc::new(HelloService::new()).register_http_routes(Router::new());
        let response = router
            .oneshot(Request::get("/api/v1/hello").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_init_without_discovery_then_close() {
        let service = HelloService::new();
        service
            .init("microservices/hello", None, Arc::new(AppRegistrar::disabled()))
            .await
            .unwrap();

        assert!(!service.has_discovery());
        let jobs = service.jobs().expect("job util started");
        assert!(jobs.is_holder());

        service.close().await;
        assert!(!jobs.is_holder());
    }

    #[test]
    fn test_api_doc_lists_hello() {
        let doc = HelloService::api_doc();
        assert!(doc.paths.paths.contains_key("/api/v1/hello"));
    }
}
