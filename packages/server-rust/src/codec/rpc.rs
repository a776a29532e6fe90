//! Protobuf binding for the RPC transport.
//!
//! `UserResponse` has no error field. A domain `NotFound` is sent as a
//! `NOT_FOUND` status instead, and the client turns that status back into
//! the envelope's embedded error.

use tonic::{Code, Status};
use usersvc_core::{
    CreateUserRequest, CreateUserResponse, DomainError, GetUserRequest, GetUserResponse,
    Operation, User,
};

use super::error::from_status;
use crate::service::operation::OperationError;
use crate::transport::rpc::pb;

impl From<User> for pb::User {
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

impl From<pb::User> for User {
    fn from(wire: pb::User) -> Self {
        Self {
            id: wire.id,
            first_name: wire.first_name,
            last_name: wire.last_name,
            email: wire.email,
            username: wire.username,
        }
    }
}

/// Per-operation protobuf binding.
pub trait RpcCodec: Operation + Sized {
    type WireRequest: prost::Message + Default + Send + 'static;

    fn encode_request(&self) -> Self::WireRequest;

    /// # Errors
    ///
    /// Returns `OperationError::Decode` if a required message field is absent.
    fn decode_request(wire: Self::WireRequest) -> Result<Self, OperationError>;

    /// Encodes an endpoint response. Domain failures become a status.
    ///
    /// # Errors
    ///
    /// Returns the status carrying the embedded domain error.
    fn encode_response(response: Self::Response) -> Result<pb::UserResponse, Status>;

    /// # Errors
    ///
    /// Returns `OperationError::Decode` if the response carries no user.
    fn decode_response(wire: pb::UserResponse) -> Result<Self::Response, OperationError>;

    /// Turns a failed RPC back into a result for this request.
    ///
    /// # Errors
    ///
    /// Returns the call error the status maps to.
    fn decode_status(&self, status: &Status) -> Result<Self::Response, OperationError> {
        Err(from_status(status))
    }
}

fn encode_result(result: Result<User, DomainError>) -> Result<pb::UserResponse, Status> {
    match result {
        Ok(user) => Ok(pb::UserResponse {
            user: Some(pb::User::from(user)),
        }),
        Err(e @ DomainError::NotFound { .. }) => Err(Status::not_found(e.to_string())),
    }
}

fn decode_user(wire: pb::UserResponse) -> Result<User, OperationError> {
    wire.user
        .map(User::from)
        .ok_or_else(|| OperationError::Decode("response carries no user".to_string()))
}

impl RpcCodec for CreateUserRequest {
    type WireRequest = pb::CreateRequest;

    fn encode_request(&self) -> pb::CreateRequest {
        pb::CreateRequest {
            user: Some(pb::User::from(self.user.clone())),
        }
    }

    fn decode_request(wire: pb::CreateRequest) -> Result<Self, OperationError> {
        wire.user
            .map(|user| Self::new(User::from(user)))
            .ok_or_else(|| OperationError::Decode("create request carries no user".to_string()))
    }

    fn encode_response(response: CreateUserResponse) -> Result<pb::UserResponse, Status> {
        encode_result(response.result)
    }

    fn decode_response(wire: pb::UserResponse) -> Result<CreateUserResponse, OperationError> {
        decode_user(wire).map(|user| CreateUserResponse::from(Ok(user)))
    }
}

impl RpcCodec for GetUserRequest {
    type WireRequest = pb::GetRequest;

    fn encode_request(&self) -> pb::GetRequest {
        pb::GetRequest {
            id: self.id.clone(),
        }
    }

    fn decode_request(wire: pb::GetRequest) -> Result<Self, OperationError> {
        Ok(Self::new(wire.id))
    }

    fn encode_response(response: GetUserResponse) -> Result<pb::UserResponse, Status> {
        encode_result(response.result)
    }

    fn decode_response(wire: pb::UserResponse) -> Result<GetUserResponse, OperationError> {
        decode_user(wire).map(|user| GetUserResponse::from(Ok(user)))
    }

    fn decode_status(&self, status: &Status) -> Result<GetUserResponse, OperationError> {
        if status.code() == Code::NotFound {
            return Ok(GetUserResponse::not_found(self.id.clone()));
        }
        Err(from_status(status))
    }
}
