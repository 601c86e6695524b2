//! On-demand CPU profiling.
//!
//! Serves `GET /debug/pprof/profile?seconds=N`, which samples the whole
//! process for N seconds and answers with a flamegraph SVG. Started only
//! when `pprof_port` is non-zero, and never fatal.

use std::time::Duration;

use axum::{
    extract::Query,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::net;

const DEFAULT_SECONDS: u64 = 30;
const MAX_SECONDS: u64 = 300;
const SAMPLE_FREQUENCY: i32 = 99;

#[derive(Debug, Deserialize)]
pub struct ProfileParams {
    seconds: Option<u64>,
}

/// Router with the profiling routes.
pub fn router() -> Router {
    Router::new()
        .route("/debug/pprof/", get(index))
        .route("/debug/pprof/profile", get(profile))
}

/// Spawn the profiling server in the background.
///
/// Bind errors are logged and the task ends; the caller is never told.
pub fn spawn(host: String, port: u16) -> JoinHandle<()> {
    tokio::spawn(async move {
        let listener = match net::bind(&host, port).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(error = %e, "Profiling endpoint not started");
                return;
            }
        };

        tracing::info!(port = port, "Profiling endpoint started");
        if let Err(e) = axum::serve(listener, router()).await {
            tracing::error!(error = %e, "Profiling endpoint stopped");
        }
    })
}

async fn index() -> &'static str {
    "/debug/pprof/\n\nprofile: CPU flamegraph, ?seconds=N (default 30, max 300)\n"
}

async fn profile(Query(params): Query<ProfileParams>) -> Response {
    let seconds = clamp_seconds(params.seconds);
    tracing::info!(seconds = seconds, "CPU profile requested");

    let result = tokio::task::spawn_blocking(move || capture(Duration::from_secs(seconds))).await;

    match result {
        Ok(Ok(svg)) => ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response(),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "CPU profile failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn clamp_seconds(seconds: Option<u64>) -> u64 {
    seconds.unwrap_or(DEFAULT_SECONDS).clamp(1, MAX_SECONDS)
}

fn capture(duration: Duration) -> Result<Vec<u8>, pprof::Error> {
    let guard = pprof::ProfilerGuardBuilder::default()
        .frequency(SAMPLE_FREQUENCY)
        .blocklist(&["libc", "libgcc", "pthread", "vdso"])
        .build()?;

    std::thread::sleep(duration);

    let report = guard.report().build()?;
    let mut svg = Vec::new();
    report.flamegraph(&mut svg)?;
    Ok(svg)
}
