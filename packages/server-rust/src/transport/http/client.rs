//! reqwest-backed client transport.

use std::task::{Context, Poll};

use tower::Service;
use usersvc_core::Call;

use crate::codec::error::from_http_status;
use crate::codec::{ErrorBody, HttpCodec};
use crate::network::middleware::REQUEST_ID_HEADER;
use crate::service::operation::{BoxedFuture, OperationError};

/// Sends calls to a remote HTTP listener.
///
/// The call context supplies the bearer token, the request id, and the
/// per-request timeout (whatever is left of the deadline).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// `base_url` may be a bare `host:port`; `http://` is assumed then.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        let base_url = if base_url.contains("://") {
            base_url.to_string()
        } else {
            format!("http://{base_url}")
        };
        Self { client, base_url }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl<R: HttpCodec> Service<Call<R>> for HttpTransport {
    type Response = R::Response;
    type Error = OperationError;
    type Future = BoxedFuture<R::Response>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: Call<R>) -> Self::Future {
        let mut builder = self
            .client
            .post(format!("{}{}", self.base_url, R::PATH))
            .header(REQUEST_ID_HEADER, call.ctx.trace_id())
            .json(&call.request.encode_request());
        if let Some(token) = call.ctx.bearer_token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(remaining) = call.ctx.remaining() {
            builder = builder.timeout(remaining);
        }

        Box::pin(async move {
            let response = builder.send().await.map_err(map_reqwest_error)?;
            let status = response.status();
            let body = response.bytes().await.map_err(map_reqwest_error)?;

            if status != reqwest::StatusCode::OK {
                let message = serde_json::from_slice::<ErrorBody>(&body).map_or_else(
                    |_| String::from_utf8_lossy(&body).into_owned(),
                    |b| b.error,
                );
                return Err(from_http_status(status, message));
            }
            R::response_from_json(&body)
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> OperationError {
    if err.is_timeout() {
        OperationError::DeadlineExceeded
    } else {
        OperationError::Transport(err.to_string())
    }
}
