pub mod audio;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod validation;

use std::sync::Arc;

use audio_core::AssetStore;
use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{HeaderName, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use llm_core::{GenerativeBackend, IngestionGate, Relay};
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::metrics::AppMetrics;

#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
    pub gate: IngestionGate,
    pub audio: AssetStore,
    pub config: Arc<ServerConfig>,
    pub metrics: AppMetrics,
}

impl AppState {
    pub fn new(config: ServerConfig, backend: Arc<dyn GenerativeBackend>) -> Self {
        Self {
            relay: Relay::new(backend.clone(), config.relay.clone()),
            gate: IngestionGate::new(backend, config.ingestion),
            audio: AssetStore::with_capacity(config.audio_cache_size),
            config: Arc::new(config),
            metrics: AppMetrics::new(),
        }
    }
}

// Request ID middleware for tracing
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let header = HeaderName::from_static("x-request-id");
    let request_id = request
        .headers()
        .get(&header)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // a client-supplied id that is not a valid header value is replaced
    let value = HeaderValue::from_str(&request_id)
        .unwrap_or_else(|_| HeaderValue::from_static("invalid-request-id"));
    request.headers_mut().insert(header.clone(), value.clone());
    let mut response = next.run(request).await;
    response.headers_mut().insert(header, value);
    response
}

/// Every route, mounted at the root and again under `/api`, without the
/// outer rate limiting, CORS and tracing layers.
pub fn routes(state: AppState) -> Router {
    let config = state.config.clone();

    // SSE replies outlive any sensible request timeout, so the chat route
    // only gets the body limit.
    let chat_api = Router::new()
        .route(
            "/chat",
            post(handlers::chat_endpoint).put(handlers::upload_endpoint),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes));

    let public_api = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/healthz", get(handlers::health_check))
        .route("/voices", get(handlers::list_voices))
        .route("/audio", post(audio::store_audio))
        .route(
            "/audio/{id}",
            get(audio::fetch_audio).delete(audio::release_audio),
        )
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TimeoutLayer::new(config.request_timeout()));

    // Metrics endpoint - consider adding authentication in production
    let metrics_api = Router::new().route("/metrics", get(handlers::metrics_endpoint));

    let api = Router::new()
        .merge(chat_api)
        .merge(public_api)
        .merge(metrics_api);

    Router::new()
        .merge(api.clone()) // root paths
        .nest("/api", api) // /api prefix
        .layer(axum::middleware::from_fn(add_request_id))
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS];
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .flatten()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_methods(methods)
        .allow_headers(Any)
        .allow_credentials(false);
    if origins.is_empty() {
        if config.cors_allowed_origins.is_some() {
            warn!("CORS_ALLOWED_ORIGINS is empty, falling back to permissive CORS");
        } else {
            warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
        }
        cors.allow_origin(Any)
    } else {
        info!("CORS configured for {} origin(s)", origins.len());
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

/// The full application: routes plus tracing, rate limiting and CORS.
pub fn app(state: AppState) -> anyhow::Result<Router> {
    let config = state.config.clone();

    // Global key: all clients share one budget, which also works behind proxies.
    let per_minute = config.rate_limit_per_minute.max(1);
    let replenish_ms = u64::from((60_000 / per_minute).max(1));
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(replenish_ms)
            .burst_size(per_minute)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?,
    );
    info!("Rate limiting: {} requests per minute", per_minute);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(cors_layer(&config))
        .into_inner();

    Ok(routes(state).layer(middleware_stack))
}
