//! `usersvc` core: user model, operation envelopes, call context, and the
//! service/store contracts shared by every transport.

pub mod context;
pub mod error;
pub mod messages;
pub mod traits;
pub mod types;

pub use context::{CallContext, Claims};
pub use error::DomainError;
pub use messages::{
    Call, CreateUserRequest, CreateUserResponse, GetUserRequest, GetUserResponse, Operation,
};
pub use traits::{KeyedStore, UserService};
pub use types::User;

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
