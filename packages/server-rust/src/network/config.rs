//! Network configuration for the HTTP and RPC listeners.

use std::time::Duration;

/// Top-level network configuration for the server.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address shared by both listeners.
    pub host: String,
    /// HTTP listener port. 0 means OS-assigned.
    pub http_port: u16,
    /// RPC listener port. 0 means OS-assigned.
    pub rpc_port: u16,
    /// Maximum time a transport waits for a request to complete.
    pub request_timeout: Duration,
    /// Largest accepted HTTP request body, in bytes.
    pub max_body_bytes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 0,
            rpc_port: 0,
            request_timeout: Duration::from_secs(30),
            max_body_bytes: 64 * 1024,
        }
    }
}
