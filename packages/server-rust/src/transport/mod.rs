//! Transport bindings.
//!
//! Each binding has a server half, which decodes wire requests and drives
//! the shared [`ServerEndpoints`](crate::service::ServerEndpoints), and a
//! client half, which is itself a `Service<Call<R>>` that client-side
//! middleware wraps.

pub mod http;
pub mod rpc;

/// Extracts the token from an `Authorization: Bearer <token>` value.
///
/// The scheme is matched case-insensitively. Anything else yields `None`,
/// which the verifier then reports as a missing token.
#[must_use]
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
