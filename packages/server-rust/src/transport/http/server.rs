//! axum handlers binding `POST /create` and `POST /get` to the endpoints.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tower::ServiceExt;
use usersvc_core::{Call, CallContext, CreateUserRequest, GetUserRequest};

use crate::codec::error::to_http_status;
use crate::codec::{ErrorBody, HttpCodec};
use crate::network::middleware::REQUEST_ID_HEADER;
use crate::network::AppState;
use crate::service::{OperationError, Routed};
use crate::transport::bearer_token;

/// Operation routes, one per [`HttpCodec::PATH`].
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(CreateUserRequest::PATH, post(handle::<CreateUserRequest>))
        .route(GetUserRequest::PATH, post(handle::<GetUserRequest>))
}

/// Decodes the body, runs the endpoint, and encodes the outcome.
///
/// A response envelope is always a 200, even when it embeds a domain error.
/// Call errors are answered with their mapped status and an `{"error"}` body.
async fn handle<R>(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response
where
    R: HttpCodec + Routed,
{
    let _guard = state.shutdown.in_flight_guard();

    let body = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(&rejection),
    };
    let request = match R::request_from_json(&body) {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    let ctx = call_context(&headers, state.config.request_timeout);
    let endpoint = R::endpoint(&state.endpoints).clone();
    match endpoint.oneshot(Call::new(ctx, request)).await {
        Ok(response) => (StatusCode::OK, Json(R::encode_response(&response))).into_response(),
        Err(e) => error_response(&e),
    }
}

fn call_context(headers: &HeaderMap, timeout: Duration) -> CallContext {
    let mut ctx = CallContext::background().with_timeout(timeout);
    if let Some(id) = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        ctx = ctx.with_trace_id(id);
    }
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
    {
        ctx = ctx.with_bearer_token(token);
    }
    ctx
}

fn error_response(err: &OperationError) -> Response {
    (to_http_status(err), Json(ErrorBody::from(err))).into_response()
}

/// A body that could not be read (too large, broken stream) keeps the
/// extractor's status and gets the usual `{"error"}` body.
fn rejection_response(rejection: &BytesRejection) -> Response {
    let body = ErrorBody {
        error: rejection.body_text(),
    };
    (rejection.status(), Json(body)).into_response()
}
