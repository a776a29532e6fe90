//! Pipeline composition: stacks middleware layers around an endpoint in a
//! recorded, inspectable order.

use std::sync::Arc;

use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};
use usersvc_core::{Call, CreateUserRequest, GetUserRequest, Operation, UserService};

use super::auth::JwtVerifyLayer;
use super::deadline::DeadlineLayer;
use super::logging::LoggingLayer;
use super::metrics::MetricsLayer;
use super::rate_limit::RateLimitLayer;
use crate::service::config::{AuthConfig, ServerConfig};
use crate::service::endpoint::{CreateUserEndpoint, GetUserEndpoint, ServerEndpoints};
use crate::service::operation::{Endpoint, OperationError};

type Stage<R> = Box<dyn FnOnce(Endpoint<R>) -> Endpoint<R> + Send>;

/// Collects named layers for operation `R`, outermost first.
pub struct PipelineBuilder<R: Operation> {
    stages: Vec<(&'static str, Stage<R>)>,
}

impl<R: Operation> Default for PipelineBuilder<R> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<R: Operation> PipelineBuilder<R> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `layer` inside every layer added before it.
    #[must_use]
    pub fn layer<L>(mut self, name: &'static str, layer: L) -> Self
    where
        L: Layer<Endpoint<R>> + Send + 'static,
        L::Service: Service<Call<R>, Response = R::Response, Error = OperationError>
            + Clone
            + Send
            + Sync
            + 'static,
        <L::Service as Service<Call<R>>>::Future: Send + 'static,
    {
        self.stages.push((
            name,
            Box::new(move |inner| BoxCloneSyncService::new(layer.layer(inner))),
        ));
        self
    }

    /// Wraps `inner` in the recorded layers.
    pub fn service<S>(self, inner: S) -> Pipeline<R>
    where
        S: Service<Call<R>, Response = R::Response, Error = OperationError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let layers = self.stages.iter().map(|(name, _)| *name).collect();
        let mut endpoint = BoxCloneSyncService::new(inner);
        for (_, stage) in self.stages.into_iter().rev() {
            endpoint = stage(endpoint);
        }
        Pipeline { endpoint, layers }
    }
}

/// A built endpoint together with the names of its layers.
pub struct Pipeline<R: Operation> {
    endpoint: Endpoint<R>,
    layers: Vec<&'static str>,
}

impl<R: Operation> Pipeline<R> {
    /// Layer names, outermost first.
    #[must_use]
    pub fn layers(&self) -> &[&'static str] {
        &self.layers
    }

    #[must_use]
    pub fn endpoint(&self) -> Endpoint<R> {
        self.endpoint.clone()
    }

    #[must_use]
    pub fn into_endpoint(self) -> Endpoint<R> {
        self.endpoint
    }
}

/// Server pipeline for `CreateUser`.
///
/// Order (outermost to innermost):
/// 1. `logging` -- one record per call, rejected calls included
/// 2. `metrics` -- request count and latency, rejected calls included
/// 3. `deadline` -- server-side request timeout and cancellation
/// 4. `auth` -- bearer token must verify
/// 5. `rate_limit` -- inbound token bucket, only spent by authenticated calls
#[must_use]
pub fn server_create_pipeline(
    service: Arc<dyn UserService>,
    config: &ServerConfig,
) -> Pipeline<CreateUserRequest> {
    PipelineBuilder::<CreateUserRequest>::new()
        .layer("logging", LoggingLayer)
        .layer("metrics", MetricsLayer)
        .layer("deadline", DeadlineLayer::with_fallback(config.request_timeout))
        .layer(
            "auth",
            JwtVerifyLayer::new(&AuthConfig::new(config.auth_secret.clone())),
        )
        .layer("rate_limit", RateLimitLayer::new(config.inbound_rate_limit))
        .service(CreateUserEndpoint::new(service))
}

/// Server pipeline for `GetUser`. Same as create, without auth.
#[must_use]
pub fn server_get_pipeline(
    service: Arc<dyn UserService>,
    config: &ServerConfig,
) -> Pipeline<GetUserRequest> {
    PipelineBuilder::<GetUserRequest>::new()
        .layer("logging", LoggingLayer)
        .layer("metrics", MetricsLayer)
        .layer("deadline", DeadlineLayer::with_fallback(config.request_timeout))
        .layer("rate_limit", RateLimitLayer::new(config.inbound_rate_limit))
        .service(GetUserEndpoint::new(service))
}

/// Builds both server endpoints over one domain service.
#[must_use]
pub fn build_server_endpoints(
    service: Arc<dyn UserService>,
    config: &ServerConfig,
) -> ServerEndpoints {
    ServerEndpoints {
        create_user: server_create_pipeline(Arc::clone(&service), config).into_endpoint(),
        get_user: server_get_pipeline(service, config).into_endpoint(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use jsonwebtoken::{EncodingKey, Header};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;
    use usersvc_core::{CallContext, Claims, User};

    use super::*;
    use crate::service::config::RateLimitConfig;
    use crate::service::domain::BasicUserService;
    use crate::storage::HashMapStore;

    const SECRET: &str = "pipeline-secret";

    fn config() -> ServerConfig {
        ServerConfig {
            auth_secret: SECRET.to_string(),
            ..ServerConfig::default()
        }
    }

    fn service() -> Arc<dyn UserService> {
        Arc::new(BasicUserService::new(HashMapStore::new()))
    }

    fn token(secret: &str) -> String {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let claims = Claims {
            sub: "test".to_string(),
            iat,
            exp: iat + 60,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn create(ctx: CallContext, id: &str) -> Call<CreateUserRequest> {
        Call::new(
            ctx,
            CreateUserRequest::new(User::new(id, "Ada", "Lovelace", "ada@x.io", "ada")),
        )
    }

    #[test]
    fn records_layers_outermost_first() {
        let create = server_create_pipeline(service(), &config());
        assert_eq!(
            create.layers(),
            ["logging", "metrics", "deadline", "auth", "rate_limit"]
        );

        let get = server_get_pipeline(service(), &config());
        assert_eq!(get.layers(), ["logging", "metrics", "deadline", "rate_limit"]);
    }

    #[tokio::test(start_paused = true)]
    async fn create_requires_token_and_get_does_not() {
        let endpoints = build_server_endpoints(service(), &config());

        let err = endpoints
            .create_user
            .clone()
            .oneshot(create(CallContext::background(), "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Unauthorized(_)));

        let resp = endpoints
            .get_user
            .clone()
            .oneshot(Call::new(CallContext::background(), GetUserRequest::new("1")))
            .await
            .unwrap();
        assert!(resp.err().is_some(), "rejected create must not reach the store");
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_auth_does_not_spend_tokens() {
        let endpoints = build_server_endpoints(service(), &config());

        for _ in 0..3 {
            let ctx = CallContext::background().with_bearer_token(token("wrong"));
            let err = endpoints
                .create_user
                .clone()
                .oneshot(create(ctx, "1"))
                .await
                .unwrap_err();
            assert!(matches!(err, OperationError::Unauthorized(_)));
        }

        let ctx = CallContext::background().with_bearer_token(token(SECRET));
        let resp = endpoints
            .create_user
            .clone()
            .oneshot(create(ctx, "1"))
            .await
            .unwrap();
        assert_eq!(resp.user().map(|u| u.id.as_str()), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn endpoints_have_independent_inbound_buckets() {
        let endpoints = build_server_endpoints(service(), &config());
        let get = || Call::new(CallContext::background(), GetUserRequest::new("1"));

        assert!(endpoints.get_user.clone().oneshot(get()).await.is_ok());
        let err = endpoints.get_user.clone().oneshot(get()).await.unwrap_err();
        assert_eq!(err, OperationError::RateLimited);

        let ctx = CallContext::background().with_bearer_token(token(SECRET));
        assert!(endpoints.create_user.clone().oneshot(create(ctx, "1")).await.is_ok());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(endpoints.get_user.clone().oneshot(get()).await.is_ok());
    }

    #[test]
    fn rate_limited_calls_are_still_metered() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        metrics::with_local_recorder(&recorder, || {
            rt.block_on(async {
                let config = ServerConfig {
                    inbound_rate_limit: RateLimitConfig {
                        capacity: 1,
                        refill_per_sec: 0,
                    },
                    ..config()
                };
                let get = server_get_pipeline(service(), &config).into_endpoint();
                for _ in 0..3 {
                    let _ = get
                        .clone()
                        .oneshot(Call::new(CallContext::background(), GetUserRequest::new("x")))
                        .await;
                }
            });
        });

        let rendered = handle.render();
        assert!(rendered.contains(r#"usersvc_endpoint_requests_total{method="GetUser"} 3"#));
        assert!(rendered.contains(r#"success="false""#));
    }
}
