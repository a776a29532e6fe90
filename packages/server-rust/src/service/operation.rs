//! Endpoint shape and call-level error taxonomy.

use std::future::Future;
use std::pin::Pin;

use tower::util::BoxCloneSyncService;
use usersvc_core::{Call, Operation};

/// Boxed future returned by every middleware service in the pipeline.
pub type BoxedFuture<T> = Pin<Box<dyn Future<Output = Result<T, OperationError>> + Send>>;

/// A type-erased, cloneable endpoint for operation `R`:
/// `(CallContext, R) -> Result<R::Response, OperationError>`.
///
/// Cloning is cheap; clones share the state of any stateful middleware
/// (token buckets, breakers) they were built with. The `Sync` bound lets
/// endpoints sit in shared transport state.
pub type Endpoint<R> = BoxCloneSyncService<Call<R>, <R as Operation>::Response, OperationError>;

/// Errors that stop a call before (or instead of) a domain result.
///
/// Domain failures such as a lookup miss are not listed here; they travel
/// inside the response envelope as `usersvc_core::DomainError`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    #[error("malformed request: {0}")]
    Decode(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("circuit breaker {name} is open")]
    CircuitOpen { name: String },
    #[error("call cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl OperationError {
    /// Whether a circuit breaker should count this error against the
    /// downstream. Cancellation and rate limiting are ignored.
    #[must_use]
    pub fn counts_as_failure(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::RateLimited)
    }
}
