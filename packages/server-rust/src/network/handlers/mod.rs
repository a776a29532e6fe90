//! Shared axum state and the operational (non-operation) HTTP handlers.

pub mod health;

pub use health::{health_handler, liveness_handler, readiness_handler};

use std::sync::Arc;
use std::time::Instant;

use super::{NetworkConfig, ShutdownController};
use crate::service::ServerEndpoints;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references and cheap endpoint clones so cloning per request
/// is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Fully wrapped endpoints; the RPC listener holds clones of the same.
    pub endpoints: ServerEndpoints,
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Server start time, used for uptime calculation.
    pub start_time: Instant,
}
