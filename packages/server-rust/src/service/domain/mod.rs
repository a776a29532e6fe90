//! Domain service: the two business operations over a keyed store.

pub mod instrumented;

pub use instrumented::InstrumentedUserService;

use async_trait::async_trait;
use usersvc_core::{CallContext, DomainError, KeyedStore, User, UserService};

/// Plain [`UserService`] over any [`KeyedStore<User>`].
pub struct BasicUserService<S> {
    store: S,
}

impl<S> BasicUserService<S>
where
    S: KeyedStore<User>,
{
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The backing store, for inspection.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S> UserService for BasicUserService<S>
where
    S: KeyedStore<User>,
{
    async fn create_user(&self, _ctx: &CallContext, user: User) -> Result<User, DomainError> {
        self.store.put(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, _ctx: &CallContext, id: &str) -> Result<User, DomainError> {
        self.store
            .get(id)
            .ok_or_else(|| DomainError::NotFound { id: id.to_string() })
    }
}
