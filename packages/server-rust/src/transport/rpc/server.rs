//! tonic service binding `pb.UserService` to the endpoints.

use std::sync::Arc;
use std::time::Duration;

use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};
use tower::ServiceExt;
use usersvc_core::{Call, CallContext, CreateUserRequest, GetUserRequest};

use super::pb;
use crate::codec::error::to_status;
use crate::codec::RpcCodec;
use crate::network::middleware::REQUEST_ID_HEADER;
use crate::network::ShutdownController;
use crate::service::{Routed, ServerEndpoints};
use crate::transport::bearer_token;

/// Implements the generated service trait over the shared endpoints.
pub struct RpcHandler {
    endpoints: ServerEndpoints,
    shutdown: Arc<ShutdownController>,
    request_timeout: Duration,
}

impl RpcHandler {
    #[must_use]
    pub fn new(
        endpoints: ServerEndpoints,
        shutdown: Arc<ShutdownController>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            endpoints,
            shutdown,
            request_timeout,
        }
    }

    /// Wraps the handler in the generated tonic server.
    #[must_use]
    pub fn into_server(self) -> pb::UserServiceServer<Self> {
        pb::UserServiceServer::new(self)
    }

    async fn handle<R>(
        &self,
        request: Request<R::WireRequest>,
    ) -> Result<Response<pb::UserResponse>, Status>
    where
        R: RpcCodec + Routed,
    {
        let _guard = self.shutdown.in_flight_guard();

        let ctx = call_context(request.metadata(), self.request_timeout);
        let request = R::decode_request(request.into_inner()).map_err(|e| to_status(&e))?;

        let endpoint = R::endpoint(&self.endpoints).clone();
        let response = endpoint
            .oneshot(Call::new(ctx, request))
            .await
            .map_err(|e| to_status(&e))?;
        R::encode_response(response).map(Response::new)
    }
}

#[tonic::async_trait]
impl pb::UserService for RpcHandler {
    async fn create_user(
        &self,
        request: Request<pb::CreateRequest>,
    ) -> Result<Response<pb::UserResponse>, Status> {
        self.handle::<CreateUserRequest>(request).await
    }

    async fn get_user(
        &self,
        request: Request<pb::GetRequest>,
    ) -> Result<Response<pb::UserResponse>, Status> {
        self.handle::<GetUserRequest>(request).await
    }
}

fn call_context(metadata: &MetadataMap, timeout: Duration) -> CallContext {
    let mut ctx = CallContext::background().with_timeout(timeout);
    if let Some(id) = metadata.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()) {
        ctx = ctx.with_trace_id(id);
    }
    if let Some(token) = metadata
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
    {
        ctx = ctx.with_bearer_token(token);
    }
    ctx
}
