//! JSON wire format for the HTTP transport.
//!
//! Field names are PascalCase. Responses always carry both `User` and `Err`;
//! exactly one is non-null. A domain failure is encoded as
//! `"Err": {"Code": "NotFound", "Id": "<id>"}` inside a 200 response.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use usersvc_core::{
    CreateUserRequest, CreateUserResponse, DomainError, GetUserRequest, GetUserResponse,
    Operation, User,
};

use crate::service::operation::OperationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireUser {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
}

impl From<User> for WireUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            username: user.username,
        }
    }
}

impl From<WireUser> for User {
    fn from(wire: WireUser) -> Self {
        Self {
            id: wire.id,
            first_name: wire.first_name,
            last_name: wire.last_name,
            email: wire.email,
            username: wire.username,
        }
    }
}

/// Embedded domain error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireError {
    pub code: String,
    pub id: String,
}

impl From<&DomainError> for WireError {
    fn from(err: &DomainError) -> Self {
        match err {
            DomainError::NotFound { id } => Self {
                code: err.code().to_string(),
                id: id.clone(),
            },
        }
    }
}

impl TryFrom<WireError> for DomainError {
    type Error = OperationError;

    fn try_from(wire: WireError) -> Result<Self, Self::Error> {
        match wire.code.as_str() {
            "NotFound" => Ok(Self::NotFound { id: wire.id }),
            other => Err(OperationError::Decode(format!(
                "unknown domain error code {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireCreateRequest {
    pub user: WireUser,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireGetRequest {
    pub id: String,
}

/// Response body shared by both operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireUserResponse {
    pub user: Option<WireUser>,
    pub err: Option<WireError>,
}

impl WireUserResponse {
    fn encode(result: &Result<User, DomainError>) -> Self {
        match result {
            Ok(user) => Self {
                user: Some(WireUser::from(user.clone())),
                err: None,
            },
            Err(e) => Self {
                user: None,
                err: Some(WireError::from(e)),
            },
        }
    }

    fn decode(self) -> Result<Result<User, DomainError>, OperationError> {
        match (self.user, self.err) {
            (_, Some(err)) => Ok(Err(DomainError::try_from(err)?)),
            (Some(user), None) => Ok(Ok(User::from(user))),
            (None, None) => Err(OperationError::Decode(
                "response carries neither a user nor an error".to_string(),
            )),
        }
    }
}

/// Per-operation JSON binding.
pub trait HttpCodec: Operation + Sized {
    /// Route the operation is served on.
    const PATH: &'static str;

    type WireRequest: Serialize + DeserializeOwned + Send + 'static;

    fn encode_request(&self) -> Self::WireRequest;
    fn decode_request(wire: Self::WireRequest) -> Self;
    fn encode_response(response: &Self::Response) -> WireUserResponse;
    fn decode_response(wire: WireUserResponse) -> Result<Self::Response, OperationError>;

    /// Parses a request body.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::Decode` if the body is not a well-formed
    /// request for this operation.
    fn request_from_json(body: &[u8]) -> Result<Self, OperationError> {
        from_json::<Self::WireRequest>(body).map(Self::decode_request)
    }

    /// Parses a 200 response body.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::Decode` if the body is not a well-formed
    /// response.
    fn response_from_json(body: &[u8]) -> Result<Self::Response, OperationError> {
        from_json::<WireUserResponse>(body).and_then(Self::decode_response)
    }
}

fn from_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, OperationError> {
    serde_json::from_slice(body).map_err(|e| OperationError::Decode(e.to_string()))
}

impl HttpCodec for CreateUserRequest {
    const PATH: &'static str = "/create";

    type WireRequest = WireCreateRequest;

    fn encode_request(&self) -> WireCreateRequest {
        WireCreateRequest {
            user: WireUser::from(self.user.clone()),
        }
    }

    fn decode_request(wire: WireCreateRequest) -> Self {
        Self::new(User::from(wire.user))
    }

    fn encode_response(response: &CreateUserResponse) -> WireUserResponse {
        WireUserResponse::encode(&response.result)
    }

    fn decode_response(wire: WireUserResponse) -> Result<CreateUserResponse, OperationError> {
        wire.decode().map(CreateUserResponse::from)
    }
}

impl HttpCodec for GetUserRequest {
    const PATH: &'static str = "/get";

    type WireRequest = WireGetRequest;

    fn encode_request(&self) -> WireGetRequest {
        WireGetRequest {
            id: self.id.clone(),
        }
    }

    fn decode_request(wire: WireGetRequest) -> Self {
        Self::new(wire.id)
    }

    fn encode_response(response: &GetUserResponse) -> WireUserResponse {
        WireUserResponse::encode(&response.result)
    }

    fn decode_response(wire: WireUserResponse) -> Result<GetUserResponse, OperationError> {
        wire.decode().map(GetUserResponse::from)
    }
}
