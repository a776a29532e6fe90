use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::DomainError;
use crate::types::User;

/// The two business operations exposed over every transport.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Stores `user` under its id, replacing any existing entry, and returns
    /// the stored value unchanged.
    async fn create_user(&self, ctx: &CallContext, user: User) -> Result<User, DomainError>;

    /// Returns the user stored under `id`, or `DomainError::NotFound`.
    async fn get_user(&self, ctx: &CallContext, id: &str) -> Result<User, DomainError>;
}

/// Concurrency-safe keyed store. Implementations serialize access internally
/// so callers may share one instance across tasks.
pub trait KeyedStore<V>: Send + Sync {
    /// Inserts `value` under `id`, returning the previous value if any.
    fn put(&self, id: String, value: V) -> Option<V>;

    /// Returns a copy of the value under `id`.
    fn get(&self, id: &str) -> Option<V>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
