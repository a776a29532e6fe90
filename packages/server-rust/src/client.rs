//! Client-side bindings: the same envelopes and middleware, wrapped around
//! a remote transport instead of a local service.
//!
//! Pipelines (outermost first):
//! - `CreateUser`: auth-sign, circuit breaker, rate limit, deadline, transport
//! - `GetUser`: circuit breaker, rate limit, deadline, transport
//!
//! Both pipelines draw from one token bucket, so `rate_limit` caps the
//! client's combined outbound rate. Each has its own breaker.

use std::time::Duration;

use tower::{Service, ServiceExt};
use usersvc_core::{
    Call, CallContext, CreateUserRequest, CreateUserResponse, DomainError, GetUserRequest,
    GetUserResponse, User,
};

use crate::service::config::{AuthConfig, CircuitBreakerConfig, RateLimitConfig};
use crate::service::middleware::{
    AuthSignerLayer, CircuitBreakerLayer, CircuitState, DeadlineLayer, Pipeline, PipelineBuilder,
    RateLimitLayer,
};
use crate::service::operation::OperationError;
use crate::transport::http::HttpTransport;
use crate::transport::rpc::RpcTransport;

/// Client-side policy.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bucket shared by both operations.
    pub rate_limit: RateLimitConfig,
    /// Settings for each per-operation breaker.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Signs `CreateUser` calls when set.
    pub auth: Option<AuthConfig>,
    /// Deadline given to calls that do not bring their own.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::OUTBOUND,
            circuit_breaker: CircuitBreakerConfig::default(),
            auth: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Either half of a failed client call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The call itself failed (policy, transport, remote rejection).
    #[error(transparent)]
    Call(#[from] OperationError),
    /// The call went through and the domain operation failed.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Typed client over either transport.
pub struct UserClient {
    create: Pipeline<CreateUserRequest>,
    get: Pipeline<GetUserRequest>,
    limiter: RateLimitLayer,
    create_breaker: CircuitBreakerLayer,
    get_breaker: CircuitBreakerLayer,
    request_timeout: Duration,
}

impl UserClient {
    /// Client speaking JSON to `base_url` (`host:port` or a full URL).
    #[must_use]
    pub fn http(base_url: &str, config: &ClientConfig) -> Self {
        Self::with_transport(HttpTransport::new(reqwest::Client::new(), base_url), config)
    }

    /// Client speaking protobuf to `addr`.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::Transport` if the connection cannot be made.
    pub async fn rpc(addr: &str, config: &ClientConfig) -> Result<Self, OperationError> {
        Ok(Self::with_transport(RpcTransport::connect(addr).await?, config))
    }

    /// Builds both pipelines around one transport.
    pub fn with_transport<T>(transport: T, config: &ClientConfig) -> Self
    where
        T: Service<Call<CreateUserRequest>, Response = CreateUserResponse, Error = OperationError>
            + Service<Call<GetUserRequest>, Response = GetUserResponse, Error = OperationError>
            + Clone
            + Send
            + Sync
            + 'static,
        <T as Service<Call<CreateUserRequest>>>::Future: Send + 'static,
        <T as Service<Call<GetUserRequest>>>::Future: Send + 'static,
    {
        let limiter = RateLimitLayer::new(config.rate_limit);
        let create_breaker = CircuitBreakerLayer::new("create_user", config.circuit_breaker);
        let get_breaker = CircuitBreakerLayer::new("get_user", config.circuit_breaker);

        let mut create = PipelineBuilder::<CreateUserRequest>::new();
        if let Some(auth) = &config.auth {
            create = create.layer("auth", AuthSignerLayer::new(auth));
        }
        let create = create
            .layer("circuit_breaker", create_breaker.clone())
            .layer("rate_limit", limiter.clone())
            .layer("deadline", DeadlineLayer::new())
            .service(transport.clone());

        let get = PipelineBuilder::<GetUserRequest>::new()
            .layer("circuit_breaker", get_breaker.clone())
            .layer("rate_limit", limiter.clone())
            .layer("deadline", DeadlineLayer::new())
            .service(transport);

        Self {
            create,
            get,
            limiter,
            create_breaker,
            get_breaker,
            request_timeout: config.request_timeout,
        }
    }

    /// Runs `CreateUser` and returns the envelope.
    ///
    /// # Errors
    ///
    /// Returns the call error if the call did not produce an envelope.
    pub async fn call_create(
        &self,
        ctx: CallContext,
        user: User,
    ) -> Result<CreateUserResponse, OperationError> {
        let ctx = ctx.with_timeout(self.request_timeout);
        self.create
            .endpoint()
            .oneshot(Call::new(ctx, CreateUserRequest::new(user)))
            .await
    }

    /// Runs `GetUser` and returns the envelope.
    ///
    /// # Errors
    ///
    /// Returns the call error if the call did not produce an envelope.
    pub async fn call_get(
        &self,
        ctx: CallContext,
        id: &str,
    ) -> Result<GetUserResponse, OperationError> {
        let ctx = ctx.with_timeout(self.request_timeout);
        self.get
            .endpoint()
            .oneshot(Call::new(ctx, GetUserRequest::new(id)))
            .await
    }

    /// Stores `user` and returns what the server stored.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Call` for call failures and
    /// `ClientError::Domain` for domain failures.
    pub async fn create_user(&self, user: User) -> Result<User, ClientError> {
        Ok(self.call_create(CallContext::background(), user).await?.result?)
    }

    /// Looks up a user by id.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Domain(NotFound)` for unknown ids and
    /// `ClientError::Call` for call failures.
    pub async fn get_user(&self, id: &str) -> Result<User, ClientError> {
        Ok(self.call_get(CallContext::background(), id).await?.result?)
    }

    /// Layer names of the `CreateUser` pipeline, outermost first.
    #[must_use]
    pub fn create_layers(&self) -> &[&'static str] {
        self.create.layers()
    }

    /// Layer names of the `GetUser` pipeline, outermost first.
    #[must_use]
    pub fn get_layers(&self) -> &[&'static str] {
        self.get.layers()
    }

    /// Whole tokens left in the shared outbound bucket.
    #[must_use]
    pub fn available_tokens(&self) -> u64 {
        self.limiter.available()
    }

    #[must_use]
    pub fn create_breaker_state(&self) -> CircuitState {
        self.create_breaker.state()
    }

    #[must_use]
    pub fn get_breaker_state(&self) -> CircuitState {
        self.get_breaker.state()
    }
}
