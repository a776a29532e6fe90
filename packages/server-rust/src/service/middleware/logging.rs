//! Logging middleware for endpoints.
//!
//! Wraps each call in a `tracing` span and emits one structured record on
//! completion with the method name, duration, and error if any. The call's
//! result is returned untouched.

use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{info_span, Instrument};
use usersvc_core::{Call, Operation};

use crate::service::operation::{BoxedFuture, OperationError};

// ---------------------------------------------------------------------------
// LoggingLayer
// ---------------------------------------------------------------------------

/// Tower layer that logs every endpoint call.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer;

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingService { inner }
    }
}

// ---------------------------------------------------------------------------
// LoggingService
// ---------------------------------------------------------------------------

/// Service wrapper that records call duration and outcome.
#[derive(Debug, Clone)]
pub struct LoggingService<S> {
    inner: S,
}

impl<S, R> Service<Call<R>> for LoggingService<S>
where
    R: Operation,
    S: Service<Call<R>, Response = R::Response, Error = OperationError>,
    S::Future: Send + 'static,
{
    type Response = R::Response;
    type Error = OperationError;
    type Future = BoxedFuture<R::Response>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: Call<R>) -> Self::Future {
        let method = R::METHOD;
        let span = info_span!(
            "endpoint",
            method = method,
            trace_id = %call.ctx.trace_id(),
        );

        let start = Instant::now();
        let fut = self.inner.call(call);

        Box::pin(
            async move {
                let result = fut.await;
                let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                match &result {
                    Ok(_) => tracing::info!(method, duration_ms, "call complete"),
                    Err(error) => tracing::warn!(method, duration_ms, %error, "call failed"),
                }

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
