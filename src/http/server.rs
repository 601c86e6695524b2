//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with the diagnostic routes and swagger UI
//! - Let the hosted service attach its own routes
//! - Wire up middleware (tracing, panic catching)
//! - Serve on a pre-bound listener until shutdown

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{git_hash, ping};
use super::openapi::{self, OPENAPI_JSON_PATH, SWAGGER_PATH};
use crate::build_info::BuildInfo;
use crate::lifecycle::ShutdownSignal;

/// HTTP transport: a router plus the address it will be bound to.
pub struct HttpServer {
    host: String,
    port: u16,
    router: Router,
}

impl HttpServer {
    /// Create a server preloaded with `/ping`, `/git_hash` and `/swagger`.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        build: BuildInfo,
        api_doc: Option<utoipa::openapi::OpenApi>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            router: base_router(build, api_doc),
        }
    }

    /// Attach routes. Must happen before the server starts.
    pub fn register<F>(mut self, register: F) -> Self
    where
        F: FnOnce(Router) -> Router,
    {
        self.router = register(self.router);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The final router with middleware applied.
    pub fn into_router(self) -> Router {
        self.router
            .layer(CatchPanicLayer::new())
            .layer(TraceLayer::new_for_http())
    }
}

/// Diagnostic routes shared by every service.
pub fn base_router(build: BuildInfo, api_doc: Option<utoipa::openapi::OpenApi>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/git_hash", get(git_hash))
        .with_state(build)
        .merge(SwaggerUi::new(SWAGGER_PATH).url(OPENAPI_JSON_PATH, openapi::document(api_doc)))
}

/// Serve `router` on `listener` until `signal` fires.
pub async fn serve(
    router: Router,
    listener: TcpListener,
    signal: ShutdownSignal,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "HTTP server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(signal.recv())
        .await?;

    tracing::info!(address = %addr, "HTTP server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn server() -> HttpServer {
        HttpServer::new("127.0.0.1", 0, BuildInfo::new("abc123"), None)
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_ping() {
        let (status, body) = get_body(server().into_router(), "/ping").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"code":0,"msg":"PONG"}"#);
    }

    #[tokio::test]
    async fn test_git_hash() {
        let (status, body) = get_body(server().into_router(), "/git_hash").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "git_info:abc123");

        let empty = HttpServer::new("127.0.0.1", 0, BuildInfo::default(), None);
        let (_, body) = get_body(empty.into_router(), "/git_hash").await;
        assert_eq!(body, "git_info:");
    }

    #[tokio::test]
    async fn test_openapi_document_served() {
        let (status, body) = get_body(server().into_router(), OPENAPI_JSON_PATH).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("/ping"));
        assert!(body.contains("/git_hash"));
    }

    async fn boom() -> &'static str {
        panic!("handler blew up")
    }

    #[tokio::test]
    async fn test_registered_routes_and_panic_catching() {
        let router = server()
            .register(|router| {
                router
                    .route("/api/v1/echo", get(|| async { "echo" }))
                    .route("/api/v1/boom", get(boom))
            })
            .into_router();

        let (status, body) = get_body(router.clone(), "/api/v1/echo").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "echo");

        let (status, _) = get_body(router.clone(), "/api/v1/boom").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = get_body(router, "/ping").await;
        assert_eq!(status, StatusCode::OK);
    }
}
