//! Operation envelopes: the per-operation request/response values that flow
//! through endpoints, middleware, and both transport codecs.
//!
//! Every request type implements [`Operation`], which ties it to its response
//! type at compile time. Middleware and transports are generic over
//! `R: Operation`, so a create request can never be handed to the lookup
//! endpoint and no runtime downcast is needed anywhere in the pipeline.

pub mod user;

pub use user::{CreateUserRequest, CreateUserResponse, GetUserRequest, GetUserResponse};

use crate::context::CallContext;

/// A request envelope bound to its response envelope.
pub trait Operation: Send + Sync + 'static {
    /// Response envelope produced by the endpoint for this request.
    type Response: Send + 'static;

    /// Method name used in logs, metric labels, and breaker names.
    const METHOD: &'static str;
}

/// The single argument of an endpoint: a context plus one request envelope.
#[derive(Debug, Clone)]
pub struct Call<R> {
    pub ctx: CallContext,
    pub request: R,
}

impl<R> Call<R> {
    #[must_use]
    pub fn new(ctx: CallContext, request: R) -> Self {
        Self { ctx, request }
    }

    /// Replaces the context with one derived from it, keeping the request.
    #[must_use]
    pub fn map_ctx(self, f: impl FnOnce(CallContext) -> CallContext) -> Self {
        Self {
            ctx: f(self.ctx),
            request: self.request,
        }
    }
}
