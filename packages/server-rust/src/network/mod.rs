//! Listener lifecycle: configuration, HTTP middleware, health handlers, and
//! graceful shutdown for the HTTP and RPC servers.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use config::NetworkConfig;
pub use handlers::AppState;
pub use module::{BoundPorts, NetworkModule};
pub use shutdown::{HealthState, InFlightGuard, ShutdownController};
