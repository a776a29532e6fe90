//! End-to-end tests: real HTTP and RPC listeners on OS-assigned ports,
//! driven through the typed client over both transports.

use std::sync::Arc;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use usersvc_core::{DomainError, User};
use usersvc_server::network::BoundPorts;
use usersvc_server::service::{build_server_endpoints, AuthConfig, OperationError, RateLimitConfig};
use usersvc_server::{
    BasicUserService, ClientConfig, ClientError, HashMapStore, NetworkConfig, NetworkModule,
    ServerConfig, UserClient,
};

const SECRET: &str = "integration-secret";

struct TestServer {
    ports: BoundPorts,
    stop: CancellationToken,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn start(inbound_rate_limit: RateLimitConfig) -> Self {
        let service = Arc::new(BasicUserService::new(HashMapStore::new()));
        let endpoints = build_server_endpoints(
            service,
            &ServerConfig {
                auth_secret: SECRET.to_string(),
                inbound_rate_limit,
                ..ServerConfig::default()
            },
        );
        let mut module = NetworkModule::new(
            NetworkConfig {
                host: "127.0.0.1".to_string(),
                ..NetworkConfig::default()
            },
            endpoints,
        );
        let ports = module.start().await.unwrap();

        let stop = CancellationToken::new();
        let handle = tokio::spawn(module.serve(stop.clone().cancelled_owned()));
        Self {
            ports,
            stop,
            handle,
        }
    }

    async fn unthrottled() -> Self {
        Self::start(RateLimitConfig {
            capacity: 10_000,
            refill_per_sec: 10_000,
        })
        .await
    }

    fn http_addr(&self) -> String {
        format!("127.0.0.1:{}", self.ports.http)
    }

    fn http_client(&self, auth: Option<&str>) -> UserClient {
        UserClient::http(&self.http_addr(), &client_config(auth))
    }

    async fn rpc_client(&self, auth: Option<&str>) -> UserClient {
        UserClient::rpc(&format!("127.0.0.1:{}", self.ports.rpc), &client_config(auth))
            .await
            .unwrap()
    }

    async fn shutdown(self) {
        self.stop.cancel();
        self.handle.await.unwrap().unwrap();
    }
}

fn client_config(auth: Option<&str>) -> ClientConfig {
    ClientConfig {
        auth: auth.map(AuthConfig::new),
        ..ClientConfig::default()
    }
}

fn ada() -> User {
    User::new("1", "Ada", "Lovelace", "ada@x.io", "ada")
}

#[tokio::test]
async fn create_over_http_then_get_over_rpc() {
    let server = TestServer::unthrottled().await;
    let http = server.http_client(Some(SECRET));
    let rpc = server.rpc_client(None).await;

    let created = http.create_user(ada()).await.unwrap();
    assert!(created.same_fields(&ada()));

    let fetched = rpc.get_user("1").await.unwrap();
    assert!(fetched.same_fields(&ada()));

    server.shutdown().await;
}

#[tokio::test]
async fn create_over_rpc_then_get_over_http() {
    let server = TestServer::unthrottled().await;
    let rpc = server.rpc_client(Some(SECRET)).await;
    let http = server.http_client(None);

    let grace = User::new("2", "Grace", "Hopper", "grace@x.io", "grace");
    rpc.create_user(grace.clone()).await.unwrap();

    let fetched = http.get_user("2").await.unwrap();
    assert!(fetched.same_fields(&grace));

    server.shutdown().await;
}

#[tokio::test]
async fn unauthenticated_create_leaves_store_untouched() {
    let server = TestServer::unthrottled().await;
    let clients = [
        server.http_client(None),
        server.http_client(Some("wrong-secret")),
        server.rpc_client(None).await,
        server.rpc_client(Some("wrong-secret")).await,
    ];

    for client in &clients {
        let err = client.create_user(ada()).await.unwrap_err();
        assert!(
            matches!(err, ClientError::Call(OperationError::Unauthorized(_))),
            "{err:?}"
        );
    }

    let err = clients[0].get_user("1").await.unwrap_err();
    assert!(matches!(err, ClientError::Domain(DomainError::NotFound { .. })));

    server.shutdown().await;
}

#[tokio::test]
async fn not_found_is_a_domain_error_on_both_transports() {
    let server = TestServer::unthrottled().await;
    let expected = ClientError::Domain(DomainError::NotFound {
        id: "missing".to_string(),
    });

    let http = server.http_client(None);
    assert_eq!(http.get_user("missing").await.unwrap_err(), expected);

    let rpc = server.rpc_client(None).await;
    assert_eq!(rpc.get_user("missing").await.unwrap_err(), expected);

    // The embedded error leaves the outer call successful.
    let envelope = rpc
        .call_get(usersvc_core::CallContext::background(), "missing")
        .await
        .unwrap();
    assert!(envelope.user().is_none());

    server.shutdown().await;
}

#[tokio::test]
async fn malformed_http_body_is_rejected_with_400() {
    let server = TestServer::unthrottled().await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/create", server.http_addr()))
        .header("content-type", "application/json")
        .body(r#"{"User": "not an object"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().is_some_and(|m| !m.is_empty()));

    server.shutdown().await;
}

#[tokio::test]
async fn http_response_uses_pascal_case_envelope() {
    let server = TestServer::unthrottled().await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/get", server.http_addr()))
        .json(&serde_json::json!({ "Id": "nobody" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "User": null, "Err": { "Code": "NotFound", "Id": "nobody" } })
    );

    server.shutdown().await;
}

#[tokio::test]
async fn inbound_bucket_is_shared_across_transports() {
    let server = TestServer::start(RateLimitConfig {
        capacity: 1,
        refill_per_sec: 0,
    })
    .await;
    let http = server.http_client(None);
    let rpc = server.rpc_client(None).await;

    let err = http.get_user("1").await.unwrap_err();
    assert!(matches!(err, ClientError::Domain(_)));

    let err = rpc.get_user("1").await.unwrap_err();
    assert_eq!(err, ClientError::Call(OperationError::RateLimited));
    let err = http.get_user("1").await.unwrap_err();
    assert_eq!(err, ClientError::Call(OperationError::RateLimited));

    server.shutdown().await;
}

#[tokio::test]
async fn health_routes_report_ready() {
    let server = TestServer::unthrottled().await;
    let client = reqwest::Client::new();

    let ready = client
        .get(format!("http://{}/health/ready", server.http_addr()))
        .send()
        .await
        .unwrap();
    assert_eq!(ready.status(), reqwest::StatusCode::OK);

    let health: serde_json::Value = client
        .get(format!("http://{}/health", server.http_addr()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["state"], "ready");

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_over_both_transports() {
    let server = TestServer::unthrottled().await;
    let writer = Arc::new(server.rpc_client(Some(SECRET)).await);
    let reader = Arc::new(server.http_client(None));

    let mut tasks = JoinSet::new();
    for i in 0..32 {
        let writer = Arc::clone(&writer);
        tasks.spawn(async move {
            let user = User::new(
                i.to_string(),
                format!("first{i}"),
                format!("last{i}"),
                format!("u{i}@x.io"),
                format!("user{i}"),
            );
            writer.create_user(user).await
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    let mut tasks = JoinSet::new();
    for i in 0..32 {
        let reader = Arc::clone(&reader);
        tasks.spawn(async move { (i, reader.get_user(&i.to_string()).await) });
    }
    while let Some(result) = tasks.join_next().await {
        let (i, user) = result.unwrap();
        assert_eq!(user.unwrap().username, format!("user{i}"));
    }

    server.shutdown().await;
}
