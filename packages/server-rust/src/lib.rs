//! usersvc server: a user create/lookup service reachable over JSON/HTTP and
//! protobuf RPC, with auth, rate limiting, circuit breaking, logging, and
//! metrics applied as composable endpoint middleware.
//!
//! - [`service`]: domain service, endpoints, middleware, pipelines
//! - [`codec`]: envelope <-> wire mappings for both transports
//! - [`transport`]: server handlers and client transports
//! - [`network`]: listener lifecycle and graceful shutdown
//! - [`client`]: typed client over either transport
//! - [`storage`]: in-memory keyed store

pub mod client;
pub mod codec;
pub mod network;
pub mod service;
pub mod storage;
pub mod transport;

pub use client::{ClientConfig, ClientError, UserClient};
pub use network::{NetworkConfig, NetworkModule};
pub use service::{BasicUserService, InstrumentedUserService, ServerConfig, ServerEndpoints};
pub use storage::HashMapStore;

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
