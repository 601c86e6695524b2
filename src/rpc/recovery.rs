//! Panic recovery for gRPC calls.
//!
//! A panic while building or polling a call's future is caught and turned
//! into an `INTERNAL` status for that call only. The server keeps serving.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::FutureExt;
use http::header::{HeaderValue, CONTENT_TYPE};
use tower::{Layer, Service};

use crate::observability::metrics;

/// Message returned to callers whose request panicked.
pub const RECOVERED_MESSAGE: &str = "unknown request error";

/// Layer installing [`Recovery`] around a service.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryLayer;

impl RecoveryLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RecoveryLayer {
    type Service = Recovery<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Recovery { inner }
    }
}

#[derive(Debug, Clone)]
pub struct Recovery<S> {
    inner: S,
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for Recovery<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: http::Request<ReqBody>) -> Self::Future {
        let method = request.uri().path().to_string();

        match panic::catch_unwind(AssertUnwindSafe(|| self.inner.call(request))) {
            Ok(future) => Box::pin(async move {
                match AssertUnwindSafe(future).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => Ok(recovered_response(&method, payload)),
                }
            }),
            Err(payload) => {
                let response = recovered_response(&method, payload);
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

fn recovered_response<B: Default>(method: &str, payload: Box<dyn Any + Send>) -> http::Response<B> {
    let message = panic_message(payload.as_ref());
    tracing::error!(method = %method, panic = %message, "Recovered panic in gRPC call");
    metrics::record_rpc_panic(method);

    let status = tonic::Status::internal(RECOVERED_MESSAGE);
    let mut response = http::Response::new(B::default());
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/grpc"));
    if let Err(e) = status.add_header(response.headers_mut()) {
        tracing::warn!(error = %e, "Failed to encode gRPC status headers");
    }
    response
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
