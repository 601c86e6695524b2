//! OpenAPI document for the built-in routes.

use utoipa::OpenApi;

use super::handlers::StatusResponse;

/// Where the swagger UI is mounted.
pub const SWAGGER_PATH: &str = "/swagger";
/// Where the OpenAPI JSON is served.
pub const OPENAPI_JSON_PATH: &str = "/swagger/doc.json";

#[derive(OpenApi)]
#[openapi(
    paths(super::handlers::ping, super::handlers::git_hash),
    components(schemas(StatusResponse)),
    tags((name = "diagnostics", description = "Liveness and build identity"))
)]
pub struct ApiDoc;

/// The built-in document merged with a service's own, if any.
pub fn document(extra: Option<utoipa::openapi::OpenApi>) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    if let Some(extra) = extra {
        doc.merge(extra);
    }
    doc
}
