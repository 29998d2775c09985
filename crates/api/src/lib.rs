mod rate_limit;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{ConnectInfo, Json, Path as AxumPath, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Router};
use bestroute_completion::CompletionBackend;
use bestroute_core::{route_cards, RoutingFailure, TripRequest};
use bestroute_observability::AppMetrics;
use bestroute_planner::{
    RoutePlanner, SearchRejected, SessionRegistry, SessionView, SlotState, SubmitMode,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use crate::rate_limit::SearchRateLimiter;

const MAX_BODY_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub api_key: String,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    pub session_ttl: Duration,
    pub allowed_origins: Vec<String>,
    /// Take the client address from `x-forwarded-for`. Only safe behind a proxy that sets it.
    pub trust_forwarded_for: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_key: "dev-bestroute-key".to_string(),
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max: 30,
            session_ttl: Duration::from_secs(60 * 60),
            allowed_origins: vec!["http://localhost:5173".to_string()],
            trust_forwarded_for: false,
        }
    }
}

impl ApiSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            api_key: env::var("BESTROUTE_API_KEY").unwrap_or(defaults.api_key),
            rate_limit_window: env::var("BESTROUTE_RATE_LIMIT_WINDOW_SECONDS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            rate_limit_max: env::var("BESTROUTE_RATE_LIMIT_MAX")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(defaults.rate_limit_max),
            session_ttl: env::var("BESTROUTE_SESSION_TTL_SECONDS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_ttl),
            allowed_origins: env::var("BESTROUTE_ALLOWED_ORIGINS")
                .ok()
                .map(|value| {
                    value
                        .split(',')
                        .map(|origin| origin.trim().trim_end_matches('/').to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect::<Vec<_>>()
                })
                .unwrap_or(defaults.allowed_origins),
            trust_forwarded_for: env::var("BESTROUTE_TRUST_FORWARDED_FOR")
                .ok()
                .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
                .unwrap_or(defaults.trust_forwarded_for),
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub planner: Arc<RoutePlanner<CompletionBackend>>,
    pub sessions: SessionRegistry,
    pub metrics: Arc<AppMetrics>,
    pub api_key: String,
    pub limiter: SearchRateLimiter,
    pub allowed_origins: Arc<Vec<String>>,
    pub trust_forwarded_for: bool,
}

impl ApiState {
    pub fn new(settings: ApiSettings, backend: CompletionBackend) -> Result<Self> {
        let metrics = AppMetrics::shared();
        let planner = Arc::new(RoutePlanner::new(Arc::new(backend), metrics.clone()));
        let session_ttl = chrono::Duration::from_std(settings.session_ttl)
            .context("session TTL out of range")?;

        Ok(Self {
            planner,
            sessions: SessionRegistry::new(session_ttl),
            metrics,
            api_key: settings.api_key,
            limiter: SearchRateLimiter::new(settings.rate_limit_window, settings.rate_limit_max),
            allowed_origins: Arc::new(settings.allowed_origins),
            trust_forwarded_for: settings.trust_forwarded_for,
        })
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    backend: &'static str,
    active_sessions: usize,
    metrics: bestroute_observability::MetricsSnapshot,
}

#[derive(Debug, Deserialize)]
struct SessionSearchRequest {
    #[serde(flatten)]
    trip: TripRequest,
    #[serde(default)]
    supersede: bool,
}

pub fn build_app(settings: ApiSettings, backend: CompletionBackend) -> Result<Router> {
    let state = ApiState::new(settings, backend)?;
    Ok(build_router(state))
}

pub fn build_app_from_env() -> Result<(Router, ApiState)> {
    let backend = CompletionBackend::from_env().context("failed to configure completion backend")?;
    let state = ApiState::new(ApiSettings::from_env(), backend)?;
    Ok((build_router(state.clone()), state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/routes", post(find_routes))
        .route("/v1/sessions", post(session_create))
        .route("/v1/sessions/{session_id}", get(session_get))
        .route("/v1/sessions/{session_id}/search", post(session_search))
        .route("/v1/sessions/{session_id}/reset", post(session_reset))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        backend: state.planner.backend_name(),
        active_sessions: state.sessions.len(),
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

async fn find_routes(
    State(state): State<ApiState>,
    Json(trip): Json<TripRequest>,
) -> Response {
    match state.planner.find_best_routes_for(&trip).await {
        Ok(response) => {
            let cards = route_cards(&response);
            (
                StatusCode::OK,
                Json(json!({
                    "bestRoute": &response.best_route,
                    "alternatives": &response.alternatives,
                    "cards": cards,
                })),
            )
                .into_response()
        }
        Err(failure) => routing_failure_response(&failure),
    }
}

async fn session_create(State(state): State<ApiState>) -> Response {
    state.sessions.purge_expired(chrono::Utc::now());
    let session = state.sessions.create();
    (StatusCode::CREATED, Json(session_payload(&session.view()))).into_response()
}

async fn session_get(
    State(state): State<ApiState>,
    AxumPath(session_id): AxumPath<String>,
) -> Response {
    match state.sessions.get(&session_id) {
        Some(session) => (StatusCode::OK, Json(session_payload(&session.view()))).into_response(),
        None => session_not_found(),
    }
}

async fn session_search(
    State(state): State<ApiState>,
    AxumPath(session_id): AxumPath<String>,
    Json(input): Json<SessionSearchRequest>,
) -> Response {
    let Some(session) = state.sessions.get(&session_id) else {
        return session_not_found();
    };
    let mode = if input.supersede {
        SubmitMode::Supersede
    } else {
        SubmitMode::Guarded
    };

    match state.planner.search(&session, input.trip, mode).await {
        Ok(view) => {
            let status = match &view.state {
                SlotState::Failed { .. } => StatusCode::BAD_GATEWAY,
                _ => StatusCode::OK,
            };
            (status, Json(session_payload(&view))).into_response()
        }
        Err(SearchRejected::InvalidInput(invalid)) => {
            routing_failure_response(&RoutingFailure::InvalidInput(invalid))
        }
        Err(SearchRejected::InProgress) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "search_in_progress",
                "message": SearchRejected::InProgress.to_string(),
            })),
        )
            .into_response(),
    }
}

async fn session_reset(
    State(state): State<ApiState>,
    AxumPath(session_id): AxumPath<String>,
) -> Response {
    match state.sessions.get(&session_id) {
        Some(session) => {
            session.reset();
            (StatusCode::OK, Json(session_payload(&session.view()))).into_response()
        }
        None => session_not_found(),
    }
}

fn session_payload(view: &SessionView) -> serde_json::Value {
    let cards = match &view.state {
        SlotState::Ready { response } => route_cards(response),
        _ => Vec::new(),
    };
    json!({
        "session": view,
        "cards": cards,
    })
}

fn routing_failure_response(failure: &RoutingFailure) -> Response {
    let (status, error) = match failure {
        RoutingFailure::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
        RoutingFailure::ServiceFailure | RoutingFailure::MalformedResponse => {
            (StatusCode::BAD_GATEWAY, "routing_failed")
        }
    };
    (
        status,
        Json(json!({
            "error": error,
            "message": failure.user_message(),
        })),
    )
        .into_response()
}

fn session_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "session_not_found",
            "message": "unknown or expired session",
        })),
    )
        .into_response()
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    let origins = if origins.is_empty() {
        vec![HeaderValue::from_static("http://localhost:5173")]
    } else {
        origins
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ])
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if request.method() == Method::OPTIONS || is_public_endpoint(path.as_str()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if header_key != state.api_key {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "unauthorized",
                "message": "missing or invalid x-api-key"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::POST || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = request_ip(&request, state.trust_forwarded_for);
    if let Err(wait) = state.limiter.check(&ip) {
        warn!(ip = %ip, retry_after_secs = wait.as_secs(), "rate limit exceeded");
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "rate_limited",
                "message": "rate limit exceeded for this IP"
            })),
        )
            .into_response();
        if let Ok(value) = HeaderValue::from_str(&wait.as_secs().max(1).to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    next.run(request).await
}

async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;

    response.headers_mut().insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );
    response.headers_mut().insert(
        header::HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );

    response
}

fn is_public_endpoint(path: &str) -> bool {
    matches!(path, "/health")
}

fn request_ip(request: &Request<Body>, trust_forwarded_for: bool) -> String {
    let forwarded = trust_forwarded_for
        .then(|| {
            request
                .headers()
                .get("x-forwarded-for")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next())
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
        .flatten();

    forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(peer)| peer.ip().to_string())
        })
        .unwrap_or_else(|| "local".to_string())
}
