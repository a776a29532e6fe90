//! Tower middleware layers for endpoint pipelines.
//!
//! Every layer wraps a `Service<Call<R>>` for any operation `R`:
//!
//! - [`auth`]: Bearer-token signing (client) and verification (server)
//! - [`circuit_breaker`]: Consecutive-failure circuit breaking
//! - [`deadline`]: Deadline and cancellation enforcement
//! - [`logging`]: One tracing record per call
//! - [`metrics`]: Call counting and timing via the `metrics` facade
//! - [`rate_limit`]: Token-bucket admission
//! - [`pipeline`]: Ordered composition and the server endpoint stacks

pub mod auth;
pub mod circuit_breaker;
pub mod deadline;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod rate_limit;

pub use auth::{AuthSignerLayer, JwtVerifyLayer};
pub use circuit_breaker::{CircuitBreakerLayer, CircuitState};
pub use deadline::DeadlineLayer;
pub use logging::LoggingLayer;
pub use metrics::MetricsLayer;
pub use pipeline::{build_server_endpoints, Pipeline, PipelineBuilder};
pub use rate_limit::RateLimitLayer;
