//! Bearer-token middleware.
//!
//! [`AuthSignerLayer`] runs on the client side: it mints an HS256 JWT for
//! every call and places it in the call context. [`JwtVerifyLayer`] runs on
//! the server side: it rejects calls whose context carries no token, or a
//! token that does not verify against the shared secret, before the wrapped
//! endpoint sees them.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tower::{Layer, Service};
use usersvc_core::{Call, Claims, Operation};

use crate::service::config::AuthConfig;
use crate::service::operation::{BoxedFuture, OperationError};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

// ---------------------------------------------------------------------------
// Authenticator
// ---------------------------------------------------------------------------

/// HS256 keys derived once from the shared secret.
struct Authenticator {
    subject: String,
    token_ttl_secs: u64,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Authenticator {
    fn new(config: &AuthConfig) -> Self {
        let secret = config.secret.as_bytes();
        Self {
            subject: config.subject.clone(),
            token_ttl_secs: config.token_ttl.as_secs(),
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    fn sign(&self) -> Result<String, OperationError> {
        let iat = unix_now();
        let claims = Claims {
            sub: self.subject.clone(),
            iat,
            exp: iat.saturating_add(self.token_ttl_secs),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| OperationError::Internal(format!("failed to sign token: {e}")))
    }

    fn verify(&self, token: &str) -> Result<Claims, OperationError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| OperationError::Unauthorized(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// JwtVerifyLayer
// ---------------------------------------------------------------------------

/// Server-side layer that requires a valid bearer token on every call.
#[derive(Clone)]
pub struct JwtVerifyLayer {
    auth: Arc<Authenticator>,
}

impl JwtVerifyLayer {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            auth: Arc::new(Authenticator::new(config)),
        }
    }
}

impl<S> Layer<S> for JwtVerifyLayer {
    type Service = JwtVerifyService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        JwtVerifyService {
            inner,
            auth: Arc::clone(&self.auth),
        }
    }
}

/// Service wrapper that verifies the context's bearer token.
///
/// On success the verified claims are attached to the context passed on.
#[derive(Clone)]
pub struct JwtVerifyService<S> {
    inner: S,
    auth: Arc<Authenticator>,
}

impl<S, R> Service<Call<R>> for JwtVerifyService<S>
where
    R: Operation,
    S: Service<Call<R>, Response = R::Response, Error = OperationError>,
    S::Future: Send + 'static,
{
    type Response = R::Response;
    type Error = OperationError;
    type Future = BoxedFuture<R::Response>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: Call<R>) -> Self::Future {
        let verified = match call.ctx.bearer_token() {
            Some(token) => self.auth.verify(token),
            None => Err(OperationError::Unauthorized(
                "missing bearer token".to_string(),
            )),
        };

        match verified {
            Ok(claims) => {
                let fut = self.inner.call(call.map_ctx(|ctx| ctx.with_claims(claims)));
                Box::pin(fut)
            }
            Err(e) => {
                tracing::debug!(method = R::METHOD, error = %e, "rejected unauthenticated call");
                Box::pin(async move { Err(e) })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// AuthSignerLayer
// ---------------------------------------------------------------------------

/// Client-side layer that attaches a freshly signed bearer token to each call.
#[derive(Clone)]
pub struct AuthSignerLayer {
    auth: Arc<Authenticator>,
}

impl AuthSignerLayer {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            auth: Arc::new(Authenticator::new(config)),
        }
    }
}

impl<S> Layer<S> for AuthSignerLayer {
    type Service = AuthSignerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthSignerService {
            inner,
            auth: Arc::clone(&self.auth),
        }
    }
}

/// Service wrapper that signs a token and forwards the call with it.
#[derive(Clone)]
pub struct AuthSignerService<S> {
    inner: S,
    auth: Arc<Authenticator>,
}

impl<S, R> Service<Call<R>> for AuthSignerService<S>
where
    R: Operation,
    S: Service<Call<R>, Response = R::Response, Error = OperationError>,
    S::Future: Send + 'static,
{
    type Response = R::Response;
    type Error = OperationError;
    type Future = BoxedFuture<R::Response>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: Call<R>) -> Self::Future {
        match self.auth.sign() {
            Ok(token) => Box::pin(
                self.inner
                    .call(call.map_ctx(|ctx| ctx.with_bearer_token(token))),
            ),
            Err(e) => Box::pin(async move { Err(e) }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
