//! Operation pipeline: domain services, the endpoints that adapt them to
//! `Service<Call<R>>`, and the middleware stacked around those endpoints.

pub mod config;
pub mod domain;
pub mod endpoint;
pub mod middleware;
pub mod operation;

pub use config::{AuthConfig, CircuitBreakerConfig, RateLimitConfig, ServerConfig};
pub use domain::{BasicUserService, InstrumentedUserService};
pub use endpoint::{Routed, ServerEndpoints};
pub use middleware::build_server_endpoints;
pub use operation::{Endpoint, OperationError};
