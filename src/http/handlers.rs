//! Built-in diagnostic handlers.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::build_info::BuildInfo;
use crate::observability::Stat;

/// Generic status body.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub code: i32,
    pub msg: String,
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/ping",
    responses((status = 200, description = "Service is alive", body = StatusResponse))
)]
pub async fn ping() -> Json<StatusResponse> {
    let _stat = Stat::new("PingPongHandler");

    Json(StatusResponse {
        code: 0,
        msg: "PONG".to_string(),
    })
}

/// Build identifier of the running binary.
#[utoipa::path(
    get,
    path = "/git_hash",
    responses((status = 200, description = "git_info:<commit>", body = String))
)]
pub async fn git_hash(State(build): State<BuildInfo>) -> String {
    let _stat = Stat::new("GitHashHandler");

    format!("git_info:{}", build.git_commit)
}
