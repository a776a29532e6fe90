//! Logging and business-metrics decorator for a [`UserService`].

use std::time::Instant;

use async_trait::async_trait;
use usersvc_core::{CallContext, DomainError, User, UserService};

/// Counter bumped once per `create_user` call.
pub const USERS_CREATED_TOTAL: &str = "usersvc_users_created_total";
/// Counter bumped once per `get_user` call.
pub const USER_LOOKUPS_TOTAL: &str = "usersvc_user_lookups_total";

/// Wraps a [`UserService`], logging each domain call and counting it.
///
/// Results pass through untouched.
pub struct InstrumentedUserService<S> {
    inner: S,
}

impl<S> InstrumentedUserService<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S> UserService for InstrumentedUserService<S>
where
    S: UserService,
{
    async fn create_user(&self, ctx: &CallContext, user: User) -> Result<User, DomainError> {
        let start = Instant::now();
        let id = user.id.clone();
        let result = self.inner.create_user(ctx, user).await;
        metrics::counter!(USERS_CREATED_TOTAL).increment(1);

        match &result {
            Ok(_) => tracing::info!(
                method = "CreateUser",
                trace_id = ctx.trace_id(),
                user_id = %id,
                took_us = elapsed_us(start),
                "user stored"
            ),
            Err(e) => tracing::info!(
                method = "CreateUser",
                trace_id = ctx.trace_id(),
                user_id = %id,
                error = %e,
                took_us = elapsed_us(start),
                "create failed"
            ),
        }
        result
    }

    async fn get_user(&self, ctx: &CallContext, id: &str) -> Result<User, DomainError> {
        let start = Instant::now();
        let result = self.inner.get_user(ctx, id).await;
        metrics::counter!(USER_LOOKUPS_TOTAL).increment(1);

        match &result {
            Ok(_) => tracing::info!(
                method = "GetUser",
                trace_id = ctx.trace_id(),
                user_id = id,
                took_us = elapsed_us(start),
                "user found"
            ),
            Err(e) => tracing::info!(
                method = "GetUser",
                trace_id = ctx.trace_id(),
                user_id = id,
                error = %e,
                took_us = elapsed_us(start),
                "lookup failed"
            ),
        }
        result
    }
}

fn elapsed_us(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX)
}
