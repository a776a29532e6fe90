use std::time::Duration;

/// Token-bucket settings for a rate-limiting layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum tokens the bucket holds; also the initial fill.
    pub capacity: u64,
    /// Tokens added per second. Zero means the bucket never refills.
    pub refill_per_sec: u64,
}

impl RateLimitConfig {
    /// Reference policy for outbound client traffic.
    pub const OUTBOUND: Self = Self {
        capacity: 100,
        refill_per_sec: 100,
    };

    /// Reference policy for a single inbound endpoint.
    pub const INBOUND: Self = Self {
        capacity: 1,
        refill_per_sec: 1,
    };
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker from CLOSED to OPEN.
    pub failure_threshold: u32,
    /// Time spent OPEN before a probe call is let through.
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
        }
    }
}

/// HS256 bearer-token settings shared by the signer and the verifier.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Shared HMAC secret.
    pub secret: String,
    /// `sub` claim placed in signed tokens.
    pub subject: String,
    /// Lifetime of signed tokens.
    pub token_ttl: Duration,
}

impl AuthConfig {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            subject: "usersvc-client".to_string(),
            token_ttl: Duration::from_secs(300),
        }
    }
}

/// Server-level configuration for the endpoint pipelines.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Secret used to verify bearer tokens on protected operations.
    pub auth_secret: String,
    /// Per-endpoint inbound token bucket.
    pub inbound_rate_limit: RateLimitConfig,
    /// Deadline applied to calls that arrive without one.
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            auth_secret: String::new(),
            inbound_rate_limit: RateLimitConfig::INBOUND,
            request_timeout: Duration::from_secs(30),
        }
    }
}
