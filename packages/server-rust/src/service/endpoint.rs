//! Endpoint factories: adapt one [`UserService`] method to the uniform
//! `Service<Call<R>>` shape that middleware and transports operate on.
//!
//! Domain failures are packed into the response envelope; these services
//! only fail if the call itself is broken, which for an in-process service
//! never happens.

use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use usersvc_core::{
    Call, CreateUserRequest, CreateUserResponse, GetUserRequest, GetUserResponse, UserService,
};

use super::operation::{BoxedFuture, Endpoint, OperationError};

// ---------------------------------------------------------------------------
// CreateUserEndpoint
// ---------------------------------------------------------------------------

/// Endpoint for `CreateUser` over a shared domain service.
#[derive(Clone)]
pub struct CreateUserEndpoint {
    service: Arc<dyn UserService>,
}

impl CreateUserEndpoint {
    #[must_use]
    pub fn new(service: Arc<dyn UserService>) -> Self {
        Self { service }
    }
}

impl Service<Call<CreateUserRequest>> for CreateUserEndpoint {
    type Response = CreateUserResponse;
    type Error = OperationError;
    type Future = BoxedFuture<CreateUserResponse>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: Call<CreateUserRequest>) -> Self::Future {
        let service = Arc::clone(&self.service);
        Box::pin(async move {
            let result = service.create_user(&call.ctx, call.request.user).await;
            Ok(CreateUserResponse::from(result))
        })
    }
}

// ---------------------------------------------------------------------------
// GetUserEndpoint
// ---------------------------------------------------------------------------

/// Endpoint for `GetUser` over a shared domain service.
#[derive(Clone)]
pub struct GetUserEndpoint {
    service: Arc<dyn UserService>,
}

impl GetUserEndpoint {
    #[must_use]
    pub fn new(service: Arc<dyn UserService>) -> Self {
        Self { service }
    }
}

impl Service<Call<GetUserRequest>> for GetUserEndpoint {
    type Response = GetUserResponse;
    type Error = OperationError;
    type Future = BoxedFuture<GetUserResponse>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: Call<GetUserRequest>) -> Self::Future {
        let service = Arc::clone(&self.service);
        Box::pin(async move {
            let result = service.get_user(&call.ctx, &call.request.id).await;
            Ok(GetUserResponse::from(result))
        })
    }
}

// ---------------------------------------------------------------------------
// ServerEndpoints
// ---------------------------------------------------------------------------

/// The full set of server endpoints, each already wrapped in its middleware
/// pipeline. Both transports are bound to the same instances, so limiter
/// state is shared across HTTP and RPC traffic.
#[derive(Clone)]
pub struct ServerEndpoints {
    pub create_user: Endpoint<CreateUserRequest>,
    pub get_user: Endpoint<GetUserRequest>,
}

/// Picks the endpoint for operation `R` out of a [`ServerEndpoints`] set.
///
/// Lets transport handlers be written once, generically over `R`.
pub trait Routed: usersvc_core::Operation + Sized {
    fn endpoint(endpoints: &ServerEndpoints) -> &Endpoint<Self>;
}

impl Routed for CreateUserRequest {
    fn endpoint(endpoints: &ServerEndpoints) -> &Endpoint<Self> {
        &endpoints.create_user
    }
}

impl Routed for GetUserRequest {
    fn endpoint(endpoints: &ServerEndpoints) -> &Endpoint<Self> {
        &endpoints.get_user
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
