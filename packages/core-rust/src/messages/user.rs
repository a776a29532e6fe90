use crate::error::DomainError;
use crate::types::User;

use super::Operation;

/// Request envelope for storing a user.
#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub user: User,
}

/// Response envelope for [`CreateUserRequest`].
///
/// The domain outcome rides inside the envelope, so `Ok(response)` from an
/// endpoint only says the call mechanism worked.
#[derive(Debug, Clone)]
pub struct CreateUserResponse {
    pub result: Result<User, DomainError>,
}

/// Request envelope for looking a user up by id.
#[derive(Debug, Clone)]
pub struct GetUserRequest {
    pub id: String,
}

/// Response envelope for [`GetUserRequest`].
#[derive(Debug, Clone)]
pub struct GetUserResponse {
    pub result: Result<User, DomainError>,
}

impl Operation for CreateUserRequest {
    type Response = CreateUserResponse;
    const METHOD: &'static str = "CreateUser";
}

impl Operation for GetUserRequest {
    type Response = GetUserResponse;
    const METHOD: &'static str = "GetUser";
}

impl CreateUserRequest {
    #[must_use]
    pub fn new(user: User) -> Self {
        Self { user }
    }
}

impl GetUserRequest {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl CreateUserResponse {
    /// The stored user, if the domain call succeeded.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.result.as_ref().ok()
    }

    /// The embedded domain error, if the domain call failed.
    #[must_use]
    pub fn err(&self) -> Option<&DomainError> {
        self.result.as_ref().err()
    }
}

impl GetUserResponse {
    /// Envelope for a lookup miss on `id`.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self {
            result: Err(DomainError::NotFound { id: id.into() }),
        }
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.result.as_ref().ok()
    }

    #[must_use]
    pub fn err(&self) -> Option<&DomainError> {
        self.result.as_ref().err()
    }
}

impl From<Result<User, DomainError>> for CreateUserResponse {
    fn from(result: Result<User, DomainError>) -> Self {
        Self { result }
    }
}

impl From<Result<User, DomainError>> for GetUserResponse {
    fn from(result: Result<User, DomainError>) -> Self {
        Self { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names() {
        assert_eq!(CreateUserRequest::METHOD, "CreateUser");
        assert_eq!(GetUserRequest::METHOD, "GetUser");
    }

    #[test]
    fn response_exposes_exactly_one_side() {
        let ok = GetUserResponse::from(Ok(User::new("1", "Ada", "Lovelace", "a@x.io", "ada")));
        assert!(ok.user().is_some());
        assert!(ok.err().is_none());

        let miss = GetUserResponse::not_found("7");
        assert!(miss.user().is_none());
        assert_eq!(miss.err(), Some(&DomainError::NotFound { id: "7".to_string() }));
    }
}
