//! Token-bucket rate limiting middleware.
//!
//! Takes one token per call. When the bucket is empty the call fails
//! immediately with `OperationError::RateLimited`; nothing waits or queues.
//!
//! The bucket is kept here instead of using `governor`. It has to accept a
//! refill rate of zero, expose the whole tokens left, and wrap `Call<R>`
//! services rather than HTTP requests.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tower::{Layer, Service};
use usersvc_core::{Call, Operation};

use crate::service::config::RateLimitConfig;
use crate::service::operation::{BoxedFuture, OperationError};

/// Tokens are tracked in thousandths so slow refill rates still accrue.
const MILLI: u64 = 1000;

// ---------------------------------------------------------------------------
// TokenBucket
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct TokenBucket {
    capacity_milli: u64,
    refill_per_sec: u64,
    available_milli: u64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(config: RateLimitConfig, now: Instant) -> Self {
        let capacity_milli = config.capacity.saturating_mul(MILLI);
        Self {
            capacity_milli,
            refill_per_sec: config.refill_per_sec,
            available_milli: capacity_milli,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        if now <= self.last_refill {
            return;
        }
        let elapsed_ms =
            u64::try_from(now.duration_since(self.last_refill).as_millis()).unwrap_or(u64::MAX);
        if elapsed_ms == 0 {
            return;
        }
        // rate tokens/s over elapsed_ms is exactly rate * elapsed_ms milli-tokens.
        let added = self.refill_per_sec.saturating_mul(elapsed_ms);
        self.available_milli = self
            .available_milli
            .saturating_add(added)
            .min(self.capacity_milli);
        self.last_refill += Duration::from_millis(elapsed_ms);
    }

    fn try_take(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.available_milli >= MILLI {
            self.available_milli -= MILLI;
            true
        } else {
            false
        }
    }

    fn available_tokens(&mut self, now: Instant) -> u64 {
        self.refill(now);
        self.available_milli / MILLI
    }
}

// ---------------------------------------------------------------------------
// RateLimitLayer
// ---------------------------------------------------------------------------

/// Tower layer that guards an endpoint with a token bucket.
///
/// Every service produced by one layer (and every clone of it) draws from the
/// same bucket, so applying one layer to several endpoints limits their
/// combined rate.
#[derive(Debug, Clone)]
pub struct RateLimitLayer {
    bucket: Arc<Mutex<TokenBucket>>,
}

impl RateLimitLayer {
    /// Creates a layer with a full bucket.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            bucket: Arc::new(Mutex::new(TokenBucket::new(config, Instant::now()))),
        }
    }

    /// Whole tokens currently available.
    #[must_use]
    pub fn available(&self) -> u64 {
        self.bucket.lock().available_tokens(Instant::now())
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            bucket: Arc::clone(&self.bucket),
        }
    }
}

// ---------------------------------------------------------------------------
// RateLimitService
// ---------------------------------------------------------------------------

/// Service wrapper that rejects calls once the shared bucket is empty.
#[derive(Debug, Clone)]
pub struct RateLimitService<S> {
    inner: S,
    bucket: Arc<Mutex<TokenBucket>>,
}

impl<S, R> Service<Call<R>> for RateLimitService<S>
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
        if !self.bucket.lock().try_take(Instant::now()) {
            return Box::pin(async { Err(OperationError::RateLimited) });
        }
        Box::pin(self.inner.call(call))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tower::ServiceExt;
    use usersvc_core::{CallContext, GetUserRequest, GetUserResponse, User};

    use super::*;

    /// Counts invocations and always answers with a found user.
    #[derive(Clone)]
    struct CountingService {
        calls: Arc<AtomicUsize>,
    }

    impl Service<Call<GetUserRequest>> for CountingService {
        type Response = GetUserResponse;
        type Error = OperationError;
        type Future = BoxedFuture<GetUserResponse>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, call: Call<GetUserRequest>) -> Self::Future {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let id = call.request.id;
            Box::pin(async move { Ok(GetUserResponse::from(Ok(User::new(id, "", "", "", "")))) })
        }
    }

    fn make_call() -> Call<GetUserRequest> {
        Call::new(CallContext::background(), GetUserRequest::new("1"))
    }

    #[tokio::test(start_paused = true)]
    async fn nth_plus_one_call_is_rejected_without_refill() {
        let calls = Arc::new(AtomicUsize::new(0));
        let layer = RateLimitLayer::new(RateLimitConfig {
            capacity: 3,
            refill_per_sec: 0,
        });
        let svc = layer.layer(CountingService {
            calls: Arc::clone(&calls),
        });

        for _ in 0..3 {
            svc.clone().oneshot(make_call()).await.unwrap();
        }
        let err = svc.clone().oneshot(make_call()).await.unwrap_err();
        assert_eq!(err, OperationError::RateLimited);
        assert_eq!(calls.load(Ordering::SeqCst), 3, "rejected call must not reach inner");
    }

    #[tokio::test(start_paused = true)]
    async fn bucket_refills_over_time() {
        let layer = RateLimitLayer::new(RateLimitConfig {
            capacity: 1,
            refill_per_sec: 1,
        });
        let svc = layer.layer(CountingService {
            calls: Arc::new(AtomicUsize::new(0)),
        });

        svc.clone().oneshot(make_call()).await.unwrap();
        assert!(svc.clone().oneshot(make_call()).await.is_err());

        tokio::time::advance(Duration::from_millis(1000)).await;
        svc.clone().oneshot(make_call()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn refill_never_exceeds_capacity() {
        let layer = RateLimitLayer::new(RateLimitConfig {
            capacity: 2,
            refill_per_sec: 100,
        });
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(layer.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_one_bucket() {
        let layer = RateLimitLayer::new(RateLimitConfig {
            capacity: 1,
            refill_per_sec: 0,
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let a = layer.layer(CountingService {
            calls: Arc::clone(&calls),
        });
        let b = layer.layer(CountingService {
            calls: Arc::clone(&calls),
        });

        a.oneshot(make_call()).await.unwrap();
        assert_eq!(b.oneshot(make_call()).await.unwrap_err(), OperationError::RateLimited);
    }
}
