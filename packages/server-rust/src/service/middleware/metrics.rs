//! Metrics middleware for endpoints.
//!
//! Per call: bumps a request counter labelled by method, and records the
//! call duration into a histogram labelled by method and success. Emitted
//! through the `metrics` facade, so whichever recorder the process installed
//! receives them.

use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use usersvc_core::{Call, Operation};

use crate::service::operation::{BoxedFuture, OperationError};

/// Counter incremented once per endpoint invocation.
pub const REQUESTS_TOTAL: &str = "usersvc_endpoint_requests_total";
/// Histogram of endpoint call durations in seconds.
pub const DURATION_SECONDS: &str = "usersvc_endpoint_duration_seconds";

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that counts and times endpoint calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records call counts and durations.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S, R> Service<Call<R>> for MetricsService<S>
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
        metrics::counter!(REQUESTS_TOTAL, "method" => R::METHOD).increment(1);

        let start = Instant::now();
        let fut = self.inner.call(call);
        Box::pin(async move {
            let result = fut.await;
            let success = if result.is_ok() { "true" } else { "false" };
            metrics::histogram!(DURATION_SECONDS, "method" => R::METHOD, "success" => success)
                .record(start.elapsed().as_secs_f64());
            result
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
