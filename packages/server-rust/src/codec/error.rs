//! Mapping between [`OperationError`] and transport-level failures.
//!
//! | error              | HTTP | RPC code            |
//! |--------------------|------|---------------------|
//! | `Decode`           | 400  | `InvalidArgument`   |
//! | `Unauthorized`     | 401  | `Unauthenticated`   |
//! | `RateLimited`      | 429  | `ResourceExhausted` |
//! | `CircuitOpen`      | 503  | `Unavailable`       |
//! | `Cancelled`        | 408  | `Cancelled`         |
//! | `DeadlineExceeded` | 504  | `DeadlineExceeded`  |
//! | `Transport`        | 502  | `Unavailable`       |
//! | `Internal`         | 500  | `Internal`          |
//!
//! Decoding runs the table backwards, except that `503` and `Unavailable`
//! come back as `Transport`.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use tonic::{Code, Status};

use crate::service::operation::OperationError;

/// JSON body of every non-200 HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl From<&OperationError> for ErrorBody {
    fn from(err: &OperationError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

#[must_use]
pub fn to_http_status(err: &OperationError) -> StatusCode {
    match err {
        OperationError::Decode(_) => StatusCode::BAD_REQUEST,
        OperationError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        OperationError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        OperationError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
        OperationError::Cancelled => StatusCode::REQUEST_TIMEOUT,
        OperationError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        OperationError::Transport(_) => StatusCode::BAD_GATEWAY,
        OperationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Rebuilds a call error from a non-200 status and its `{error}` message.
#[must_use]
pub fn from_http_status(status: StatusCode, message: String) -> OperationError {
    match status {
        StatusCode::BAD_REQUEST => OperationError::Decode(message),
        StatusCode::UNAUTHORIZED => OperationError::Unauthorized(message),
        StatusCode::TOO_MANY_REQUESTS => OperationError::RateLimited,
        StatusCode::REQUEST_TIMEOUT => OperationError::Cancelled,
        StatusCode::GATEWAY_TIMEOUT => OperationError::DeadlineExceeded,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => {
            OperationError::Transport(message)
        }
        StatusCode::INTERNAL_SERVER_ERROR => OperationError::Internal(message),
        other => OperationError::Transport(format!("unexpected status {other}: {message}")),
    }
}

#[must_use]
pub fn to_status(err: &OperationError) -> Status {
    let message = err.to_string();
    match err {
        OperationError::Decode(_) => Status::invalid_argument(message),
        OperationError::Unauthorized(_) => Status::unauthenticated(message),
        OperationError::RateLimited => Status::resource_exhausted(message),
        OperationError::CircuitOpen { .. } | OperationError::Transport(_) => {
            Status::unavailable(message)
        }
        OperationError::Cancelled => Status::cancelled(message),
        OperationError::DeadlineExceeded => Status::deadline_exceeded(message),
        OperationError::Internal(_) => Status::internal(message),
    }
}

/// Rebuilds a call error from an RPC status.
///
/// `NotFound` is not handled here; it carries a domain result and is
/// decoded per operation by [`crate::codec::RpcCodec::decode_status`].
#[must_use]
pub fn from_status(status: &Status) -> OperationError {
    let message = status.message().to_string();
    match status.code() {
        Code::InvalidArgument => OperationError::Decode(message),
        Code::Unauthenticated => OperationError::Unauthorized(message),
        Code::ResourceExhausted => OperationError::RateLimited,
        Code::Cancelled => OperationError::Cancelled,
        Code::DeadlineExceeded => OperationError::DeadlineExceeded,
        Code::Unavailable => OperationError::Transport(message),
        Code::Internal => OperationError::Internal(message),
        other => OperationError::Transport(format!("{other:?}: {message}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_errors() -> Vec<OperationError> {
        vec![
            OperationError::Decode("bad json".to_string()),
            OperationError::Unauthorized("missing bearer token".to_string()),
            OperationError::RateLimited,
            OperationError::CircuitOpen {
                name: "get_user".to_string(),
            },
            OperationError::Cancelled,
            OperationError::DeadlineExceeded,
            OperationError::Transport("connection reset".to_string()),
            OperationError::Internal("boom".to_string()),
        ]
    }

    #[test]
    fn http_statuses_follow_table() {
        let statuses: Vec<u16> = all_errors()
            .iter()
            .map(|e| to_http_status(e).as_u16())
            .collect();
        assert_eq!(statuses, [400, 401, 429, 503, 408, 504, 502, 500]);
    }

    #[test]
    fn rpc_codes_follow_table() {
        let codes: Vec<Code> = all_errors().iter().map(|e| to_status(e).code()).collect();
        assert_eq!(
            codes,
            [
                Code::InvalidArgument,
                Code::Unauthenticated,
                Code::ResourceExhausted,
                Code::Unavailable,
                Code::Cancelled,
                Code::DeadlineExceeded,
                Code::Unavailable,
                Code::Internal,
            ]
        );
    }

    #[test]
    fn policy_errors_survive_http_round_trip() {
        for err in [
            OperationError::RateLimited,
            OperationError::Cancelled,
            OperationError::DeadlineExceeded,
        ] {
            let body = ErrorBody::from(&err);
            assert_eq!(from_http_status(to_http_status(&err), body.error), err);
        }
        assert!(matches!(
            from_http_status(StatusCode::UNAUTHORIZED, "nope".to_string()),
            OperationError::Unauthorized(m) if m == "nope"
        ));
    }

    #[test]
    fn policy_errors_survive_rpc_round_trip() {
        for err in [
            OperationError::RateLimited,
            OperationError::Cancelled,
            OperationError::DeadlineExceeded,
        ] {
            assert_eq!(from_status(&to_status(&err)), err);
        }
    }

    #[test]
    fn remote_open_circuit_is_a_transport_failure() {
        let err = OperationError::CircuitOpen {
            name: "create_user".to_string(),
        };
        assert!(matches!(
            from_http_status(to_http_status(&err), err.to_string()),
            OperationError::Transport(_)
        ));
        assert!(matches!(
            from_status(&to_status(&err)),
            OperationError::Transport(_)
        ));
    }

    #[test]
    fn unknown_http_status_is_transport() {
        let err = from_http_status(StatusCode::NOT_FOUND, "no route".to_string());
        assert!(matches!(err, OperationError::Transport(m) if m.contains("404")));
    }

    #[test]
    fn error_body_uses_lowercase_key() {
        let json = serde_json::to_string(&ErrorBody::from(&OperationError::RateLimited)).unwrap();
        assert_eq!(json, r#"{"error":"rate limit exceeded"}"#);
    }
}
