//! Deadline and cancellation middleware.
//!
//! Reads the deadline and cancellation token from each call's context and
//! races the wrapped endpoint against both. Calls whose context is already
//! done are rejected without invoking the endpoint.

use std::task::{Context, Poll};
use std::time::Duration;

use tower::{Layer, Service};
use usersvc_core::{Call, Operation};

use crate::service::operation::{BoxedFuture, OperationError};

// ---------------------------------------------------------------------------
// DeadlineLayer
// ---------------------------------------------------------------------------

/// Tower layer enforcing the per-call deadline and cancellation signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadlineLayer {
    fallback: Option<Duration>,
}

impl DeadlineLayer {
    /// Enforces only deadlines the caller already set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gives calls that arrive without a deadline one `timeout` from now.
    #[must_use]
    pub fn with_fallback(timeout: Duration) -> Self {
        Self {
            fallback: Some(timeout),
        }
    }
}

impl<S> Layer<S> for DeadlineLayer {
    type Service = DeadlineService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DeadlineService {
            inner,
            fallback: self.fallback,
        }
    }
}

// ---------------------------------------------------------------------------
// DeadlineService
// ---------------------------------------------------------------------------

/// Service wrapper that aborts calls on deadline expiry or cancellation.
#[derive(Debug, Clone)]
pub struct DeadlineService<S> {
    inner: S,
    fallback: Option<Duration>,
}

impl<S, R> Service<Call<R>> for DeadlineService<S>
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

    fn call(&mut self, mut call: Call<R>) -> Self::Future {
        if let (None, Some(timeout)) = (call.ctx.deadline(), self.fallback) {
            call = call.map_ctx(|ctx| ctx.with_timeout(timeout));
        }
        if call.ctx.is_cancelled() {
            return Box::pin(async { Err(OperationError::Cancelled) });
        }
        if call.ctx.is_expired() {
            return Box::pin(async { Err(OperationError::DeadlineExceeded) });
        }

        let deadline = call.ctx.deadline();
        let token = call.ctx.cancellation().clone();
        let fut = self.inner.call(call);

        Box::pin(async move {
            let expiry = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                () = token.cancelled() => Err(OperationError::Cancelled),
                () = expiry => Err(OperationError::DeadlineExceeded),
                result = fut => result,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;
    use usersvc_core::{CallContext, GetUserRequest, GetUserResponse};

    use super::*;

    /// Service that takes a configurable delay before responding.
    #[derive(Clone)]
    struct SlowService {
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl SlowService {
        fn new(delay_ms: u64) -> Self {
            Self {
                delay: Duration::from_millis(delay_ms),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Service<Call<GetUserRequest>> for SlowService {
        type Response = GetUserResponse;
        type Error = OperationError;
        type Future = BoxedFuture<GetUserResponse>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, call: Call<GetUserRequest>) -> Self::Future {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(GetUserResponse::not_found(call.request.id))
            })
        }
    }

    fn make_call(ctx: CallContext) -> Call<GetUserRequest> {
        Call::new(ctx, GetUserRequest::new("1"))
    }

    #[tokio::test(start_paused = true)]
    async fn completes_within_deadline() {
        let svc = DeadlineLayer::new().layer(SlowService::new(10));
        let ctx = CallContext::background().with_timeout(Duration::from_millis(1000));
        assert!(svc.oneshot(make_call(ctx)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn no_deadline_waits_for_completion() {
        let svc = DeadlineLayer::new().layer(SlowService::new(60_000));
        assert!(svc.oneshot(make_call(CallContext::background())).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_applies_only_without_deadline() {
        let layer = DeadlineLayer::with_fallback(Duration::from_millis(50));

        let svc = layer.layer(SlowService::new(200));
        let err = svc.oneshot(make_call(CallContext::background())).await.unwrap_err();
        assert_eq!(err, OperationError::DeadlineExceeded);

        let svc = layer.layer(SlowService::new(200));
        let ctx = CallContext::background().with_timeout(Duration::from_millis(1000));
        assert!(svc.oneshot(make_call(ctx)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn exceeding_deadline_returns_error() {
        let svc = DeadlineLayer::new().layer(SlowService::new(200));
        let ctx = CallContext::background().with_timeout(Duration::from_millis(50));
        let err = svc.oneshot(make_call(ctx)).await.unwrap_err();
        assert_eq!(err, OperationError::DeadlineExceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_in_flight_call() {
        let token = CancellationToken::new();
        let svc = DeadlineLayer::new().layer(SlowService::new(10_000));
        let ctx = CallContext::background().with_cancellation(token.clone());

        let in_flight = tokio::spawn(svc.oneshot(make_call(ctx)));
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        let err = in_flight.await.unwrap().unwrap_err();
        assert_eq!(err, OperationError::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn done_context_never_reaches_inner() {
        let slow = SlowService::new(1);
        let svc = DeadlineLayer::new().layer(slow.clone());

        let cancelled = CallContext::background();
        cancelled.cancellation().cancel();
        let err = svc.clone().oneshot(make_call(cancelled)).await.unwrap_err();
        assert_eq!(err, OperationError::Cancelled);

        let expired = CallContext::background().with_timeout(Duration::ZERO);
        let err = svc.oneshot(make_call(expired)).await.unwrap_err();
        assert_eq!(err, OperationError::DeadlineExceeded);

        assert_eq!(slow.calls.load(Ordering::SeqCst), 0);
    }
}
