//! Network module with deferred startup lifecycle.
//!
//! `new()` creates shared state, `start()` binds both TCP listeners, and
//! `serve()` accepts connections until shutdown. Binding before serving
//! lets callers learn OS-assigned ports (port 0) before traffic flows.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{health_handler, liveness_handler, readiness_handler, AppState};
use super::middleware::{build_http_layers, json_error_body};
use super::shutdown::ShutdownController;
use crate::service::ServerEndpoints;
use crate::transport::http::routes;
use crate::transport::rpc::RpcHandler;

/// How long `serve()` waits for in-flight calls after both listeners stop.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Ports actually bound by [`NetworkModule::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundPorts {
    pub http: u16,
    pub rpc: u16,
}

/// Owns both listeners and serves the same endpoints over HTTP and RPC.
///
/// 1. `new()` -- allocates the shutdown controller
/// 2. `start()` -- binds the HTTP and RPC listeners
/// 3. `serve()` -- accepts connections until the shutdown future resolves
pub struct NetworkModule {
    config: NetworkConfig,
    endpoints: ServerEndpoints,
    http_listener: Option<TcpListener>,
    rpc_listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, endpoints: ServerEndpoints) -> Self {
        Self {
            config,
            endpoints,
            http_listener: None,
            rpc_listener: None,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    /// Shared shutdown controller, for health checks or triggering shutdown.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `POST /create`, `POST /get` -- operations
    /// - `GET /health` -- detailed health JSON
    /// - `GET /health/live` -- liveness probe
    /// - `GET /health/ready` -- readiness probe
    pub fn build_router(&self) -> Router {
        build_router(
            &self.config,
            self.endpoints.clone(),
            Arc::clone(&self.shutdown),
        )
    }

    /// Binds both listeners to the configured host and ports.
    ///
    /// # Errors
    ///
    /// Returns an error if either address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<BoundPorts> {
        let http = TcpListener::bind((self.config.host.as_str(), self.config.http_port)).await?;
        let rpc = TcpListener::bind((self.config.host.as_str(), self.config.rpc_port)).await?;
        let ports = BoundPorts {
            http: http.local_addr()?.port(),
            rpc: rpc.local_addr()?.port(),
        };

        info!(
            host = %self.config.host,
            http_port = ports.http,
            rpc_port = ports.rpc,
            "listeners bound"
        );

        self.http_listener = Some(http);
        self.rpc_listener = Some(rpc);
        Ok(ports)
    }

    /// Serves both transports until `shutdown` resolves or either listener
    /// fails, then waits for in-flight calls to drain.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first, or if either
    /// server hits a fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let (Some(http_listener), Some(rpc_listener)) = (self.http_listener, self.rpc_listener)
        else {
            anyhow::bail!("start() must be called before serve()");
        };
        let ctrl = self.shutdown;
        let config = self.config;

        let router = build_router(&config, self.endpoints.clone(), Arc::clone(&ctrl));
        let rpc_service =
            RpcHandler::new(self.endpoints, Arc::clone(&ctrl), config.request_timeout)
                .into_server();

        {
            let ctrl = Arc::clone(&ctrl);
            tokio::spawn(async move {
                shutdown.await;
                ctrl.trigger_shutdown();
            });
        }

        ctrl.set_ready();

        let http = async {
            let result = axum::serve(http_listener, router)
                .with_graceful_shutdown(ctrl.signalled())
                .await;
            ctrl.trigger_shutdown();
            result
        };
        let rpc = async {
            let result = tonic::transport::Server::builder()
                .timeout(config.request_timeout)
                .add_service(rpc_service)
                .serve_with_incoming_shutdown(
                    TcpListenerStream::new(rpc_listener),
                    ctrl.signalled(),
                )
                .await;
            ctrl.trigger_shutdown();
            result
        };

        let (http_result, rpc_result) = tokio::join!(http, rpc);

        if ctrl.wait_for_drain(DRAIN_TIMEOUT).await {
            info!("all in-flight calls drained");
        } else {
            warn!(
                in_flight = ctrl.in_flight_count(),
                "drain timeout expired with calls still in flight"
            );
        }

        http_result?;
        rpc_result?;
        Ok(())
    }
}

fn build_router(
    config: &NetworkConfig,
    endpoints: ServerEndpoints,
    shutdown: Arc<ShutdownController>,
) -> Router {
    let state = AppState {
        endpoints,
        shutdown,
        config: Arc::new(config.clone()),
        start_time: Instant::now(),
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .merge(routes())
        .layer(build_http_layers(config))
        .layer(axum::middleware::map_response(json_error_body))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::network::HealthState;
    use crate::service::{build_server_endpoints, BasicUserService, ServerConfig};
    use crate::storage::HashMapStore;

    fn module() -> NetworkModule {
        module_with(NetworkConfig {
            host: "127.0.0.1".to_string(),
            ..NetworkConfig::default()
        })
    }

    fn module_with(config: NetworkConfig) -> NetworkModule {
        let service = Arc::new(BasicUserService::new(HashMapStore::new()));
        NetworkModule::new(
            config,
            build_server_endpoints(service, &ServerConfig::default()),
        )
    }

    async fn post(router: Router, path: &str, body: impl Into<Body>) -> (StatusCode, String) {
        let response = router
            .oneshot(
                Request::post(path)
                    .header("content-type", "application/json")
                    .body(Into::<Body>::into(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn new_creates_module_without_binding() {
        let module = module();
        assert!(module.http_listener.is_none());
        assert!(module.rpc_listener.is_none());
    }

    #[test]
    fn shutdown_controller_returns_shared_arc() {
        let module = module();
        assert!(Arc::ptr_eq(
            &module.shutdown_controller(),
            &module.shutdown_controller()
        ));
    }

    #[tokio::test]
    async fn start_binds_two_os_assigned_ports() {
        let mut module = module();
        let ports = module.start().await.unwrap();
        assert!(ports.http > 0);
        assert!(ports.rpc > 0);
        assert_ne!(ports.http, ports.rpc);
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let err = module().serve(std::future::pending::<()>()).await.unwrap_err();
        assert!(err.to_string().contains("start()"));
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() {
        let mut module = module();
        module.start().await.unwrap();
        let ctrl = module.shutdown_controller();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(module.serve(async {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert_eq!(ctrl.health_state(), HealthState::Stopped);
    }

    #[tokio::test]
    async fn router_embeds_not_found_in_200() {
        let (status, body) = post(module().build_router(), "/get", r#"{"Id":"404"}"#).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["User"], serde_json::Value::Null);
        assert_eq!(json["Err"]["Code"], "NotFound");
        assert_eq!(json["Err"]["Id"], "404");
    }

    #[tokio::test]
    async fn router_rejects_malformed_body_with_400() {
        let (status, body) = post(module().build_router(), "/get", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn router_rejects_create_without_token_with_401() {
        let (status, body) = post(
            module().build_router(),
            "/create",
            r#"{"User":{"Id":"1","FirstName":"Ada","LastName":"Lovelace","Email":"ada@x.io","Username":"ada"}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("error"));
    }

    #[tokio::test]
    async fn router_answers_oversized_body_with_json_413() {
        let router = module_with(NetworkConfig {
            host: "127.0.0.1".to_string(),
            max_body_bytes: 64,
            ..NetworkConfig::default()
        })
        .build_router();
        let body = format!(r#"{{"Id":"{}"}}"#, "x".repeat(256));

        let (status, body) = post(router, "/get", body).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(json["error"].is_string(), "{body}");
    }

    #[tokio::test]
    async fn router_answers_wrong_method_with_json_405() {
        let response = module()
            .build_router()
            .oneshot(Request::get("/create").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "Method Not Allowed");
    }

    #[tokio::test]
    async fn router_serves_liveness() {
        let response = module()
            .build_router()
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
