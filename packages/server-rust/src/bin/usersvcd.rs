//! Server daemon: serves the user service over HTTP and RPC until Ctrl-C or
//! SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use usersvc_server::service::{build_server_endpoints, RateLimitConfig};
use usersvc_server::{
    BasicUserService, HashMapStore, InstrumentedUserService, NetworkConfig, NetworkModule,
    ServerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "usersvcd", version, about = "User service daemon")]
struct Args {
    /// Bind address for both listeners.
    #[arg(long, env = "USERSVC_HOST", default_value = "0.0.0.0")]
    host: String,
    #[arg(long, env = "USERSVC_HTTP_PORT", default_value_t = 8080)]
    http_port: u16,
    #[arg(long, env = "USERSVC_RPC_PORT", default_value_t = 8081)]
    rpc_port: u16,
    /// Prometheus scrape address; metrics are not exported when unset.
    #[arg(long, env = "USERSVC_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,
    /// HS256 secret that `CreateUser` bearer tokens must verify against.
    #[arg(long, env = "USERSVC_AUTH_SECRET", hide_env_values = true)]
    auth_secret: String,
    /// Inbound token bucket capacity, per operation.
    #[arg(long, env = "USERSVC_RATE_CAPACITY", default_value_t = RateLimitConfig::INBOUND.capacity)]
    rate_capacity: u64,
    /// Inbound tokens added per second, per operation.
    #[arg(long, env = "USERSVC_RATE_REFILL", default_value_t = RateLimitConfig::INBOUND.refill_per_sec)]
    rate_refill: u64,
    #[arg(long, env = "USERSVC_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,
    #[arg(long, env = "USERSVC_MAX_BODY_BYTES", default_value_t = 64 * 1024)]
    max_body_bytes: usize,
    /// Emit logs as JSON lines.
    #[arg(long, env = "USERSVC_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    if let Some(addr) = args.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(%addr, "metrics exporter listening");
    }

    let request_timeout = Duration::from_secs(args.request_timeout_secs);
    let server_config = ServerConfig {
        auth_secret: args.auth_secret,
        inbound_rate_limit: RateLimitConfig {
            capacity: args.rate_capacity,
            refill_per_sec: args.rate_refill,
        },
        request_timeout,
    };
    let network_config = NetworkConfig {
        host: args.host,
        http_port: args.http_port,
        rpc_port: args.rpc_port,
        request_timeout,
        max_body_bytes: args.max_body_bytes,
    };

    let service = Arc::new(InstrumentedUserService::new(BasicUserService::new(
        HashMapStore::new(),
    )));
    let endpoints = build_server_endpoints(service, &server_config);

    let mut module = NetworkModule::new(network_config, endpoints);
    let ports = module.start().await?;
    info!(http = ports.http, rpc = ports.rpc, "usersvcd started");

    let stop = CancellationToken::new();
    tokio::spawn(wait_for_signal(stop.clone()));
    module.serve(stop.cancelled_owned()).await?;

    info!("usersvcd stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let result = if json {
        fmt().with_env_filter(filter).json().try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing init failed: {e}");
    }
}

async fn wait_for_signal(stop: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Ctrl-C received, shutting down"),
        () = terminate => info!("SIGTERM received, shutting down"),
    }
    stop.cancel();
}
