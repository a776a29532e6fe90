//! tonic-backed client transport.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tonic::metadata::MetadataValue;
use tonic::transport::Channel;
use tonic::{Request, Response, Status};
use tower::Service;
use usersvc_core::{Call, CreateUserRequest, GetUserRequest};

use super::pb::{self, UserServiceClient};
use crate::codec::RpcCodec;
use crate::network::middleware::REQUEST_ID_HEADER;
use crate::service::operation::{BoxedFuture, OperationError};

type RpcFuture = Pin<Box<dyn Future<Output = Result<Response<pb::UserResponse>, Status>> + Send>>;

/// Picks the generated client method for an operation.
pub trait RpcMethod: RpcCodec {
    fn invoke(
        client: UserServiceClient<Channel>,
        request: Request<Self::WireRequest>,
    ) -> RpcFuture;
}

impl RpcMethod for CreateUserRequest {
    fn invoke(
        mut client: UserServiceClient<Channel>,
        request: Request<pb::CreateRequest>,
    ) -> RpcFuture {
        Box::pin(async move { client.create_user(request).await })
    }
}

impl RpcMethod for GetUserRequest {
    fn invoke(
        mut client: UserServiceClient<Channel>,
        request: Request<pb::GetRequest>,
    ) -> RpcFuture {
        Box::pin(async move { client.get_user(request).await })
    }
}

/// Sends calls to a remote RPC listener over one shared HTTP/2 channel.
#[derive(Debug, Clone)]
pub struct RpcTransport {
    client: UserServiceClient<Channel>,
}

impl RpcTransport {
    #[must_use]
    pub fn new(channel: Channel) -> Self {
        Self {
            client: UserServiceClient::new(channel),
        }
    }

    /// Connects to `addr`; a bare `host:port` gets `http://` prepended.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::Transport` if the address is invalid or the
    /// connection fails.
    pub async fn connect(addr: &str) -> Result<Self, OperationError> {
        let uri = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("http://{addr}")
        };
        let channel = Channel::from_shared(uri)
            .map_err(|e| OperationError::Transport(format!("invalid address {addr}: {e}")))?
            .connect()
            .await
            .map_err(|e| OperationError::Transport(format!("cannot connect to {addr}: {e}")))?;
        Ok(Self::new(channel))
    }
}

impl<R: RpcMethod> Service<Call<R>> for RpcTransport {
    type Response = R::Response;
    type Error = OperationError;
    type Future = BoxedFuture<R::Response>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: Call<R>) -> Self::Future {
        let mut request = Request::new(call.request.encode_request());
        if let Some(remaining) = call.ctx.remaining() {
            request.set_timeout(remaining);
        }
        if let Ok(id) = MetadataValue::try_from(call.ctx.trace_id()) {
            request.metadata_mut().insert(REQUEST_ID_HEADER, id);
        }
        if let Some(token) = call.ctx.bearer_token() {
            match MetadataValue::try_from(format!("Bearer {token}")) {
                Ok(value) => {
                    request.metadata_mut().insert("authorization", value);
                }
                Err(e) => {
                    let err = OperationError::Internal(format!("unencodable bearer token: {e}"));
                    return Box::pin(async move { Err(err) });
                }
            }
        }

        let rpc = R::invoke(self.client.clone(), request);
        Box::pin(async move {
            match rpc.await {
                Ok(response) => R::decode_response(response.into_inner()),
                Err(status) => call.request.decode_status(&status),
            }
        })
    }
}
