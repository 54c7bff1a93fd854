mod cache;
mod ebay;
mod estimator;
mod http;
mod insights;
mod metrics;
mod models;
mod pipeline;
mod query;
mod scrape;
mod security;
mod signal;
mod speed;

use axum::{
    Json, Router,
    extract::{Extension, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use models::{ApiError, SignalRequest, SignalResponse, SpeedEstimate, SpeedRequest};
use pipeline::{Pipeline, PipelineError, PipelineErrorKind};
use security::{AuthContext, AuthState, require_api_auth};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

/// Queries shorter than this cannot produce a meaningful market signal.
const MIN_QUERY_LEN: usize = 3;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "scout.api", "server crashed: {err}");
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let auth_state = AuthState::from_env();
    let pipeline = Pipeline::from_env();
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("prom recorder");
    let state = AppState {
        pipeline,
        prometheus_handle,
    };

    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let protected = Router::new()
        .route("/signals", post(research_signal))
        .route("/signals/speed", post(estimate_speed))
        .route_layer(middleware::from_fn_with_state(auth_state, require_api_auth));

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit_from_env()));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "scout.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    pipeline: Pipeline,
    prometheus_handle: PrometheusHandle,
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
/// - Auth: none
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "scout-api-rs",
    }))
}

async fn metrics_endpoint(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> axum::http::Response<String> {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return axum::http::Response::builder()
                .status(axum::http::StatusCode::UNAUTHORIZED)
                .body("unauthorized".into())
                .unwrap_or_default();
        }
    }
    let body = state.prometheus_handle.render();
    axum::http::Response::builder()
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .unwrap_or_default()
}

/// Run the market-signal pipeline for a product query.
///
/// - Method: `POST`
/// - Path: `/signals`
/// - Auth: `Authorization: Bearer <key>` or `X-Scout-Key: <key>`
/// - Body: `SignalRequest`
/// - Response: `SignalResponse` (the fused signal, plus insights and a
///   days-to-sell estimate when requested)
async fn research_signal(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<SignalRequest>,
) -> Result<Json<SignalResponse>, AppError> {
    crate::metrics::inc_requests("/signals");
    info!(
        target = "scout.api",
        org_id = %context.org_id,
        api_key = %context.api_key_id,
        "signal pipeline invoked",
    );

    if payload.query.trim().len() < MIN_QUERY_LEN {
        return Err(AppError::Pipeline(PipelineError::invalid_input(
            "query",
            "query_too_short",
        )));
    }

    let signal = state
        .pipeline
        .research(&payload.query, payload.condition, payload.max_samples)
        .await?;

    let insights = payload
        .include_insights
        .then(|| insights::generate(&signal));
    let speed = payload.target_price.filter(|p| *p > 0.0).map(|price| {
        SpeedEstimate {
            list_price: price,
            estimated_days_to_sell: speed::estimate_days_to_sell(
                price,
                signal.median_price,
                signal.sell_through_rate,
            ),
        }
    });

    Ok(Json(SignalResponse {
        signal,
        insights,
        speed,
    }))
}

/// Days-to-sell estimate for a candidate price against a known market.
///
/// - Method: `POST`
/// - Path: `/signals/speed`
/// - Body: `SpeedRequest` (list price + the signal's median and rate)
async fn estimate_speed(
    Extension(_context): Extension<AuthContext>,
    Json(payload): Json<SpeedRequest>,
) -> Result<Json<SpeedEstimate>, AppError> {
    crate::metrics::inc_requests("/signals/speed");
    if payload.list_price <= 0.0 {
        return Err(AppError::Pipeline(PipelineError::invalid_input(
            "speed",
            "list_price_must_be_positive",
        )));
    }
    Ok(Json(SpeedEstimate {
        list_price: payload.list_price,
        estimated_days_to_sell: speed::estimate_days_to_sell(
            payload.list_price,
            payload.median_price,
            payload.sell_through_rate.clamp(0.0, 100.0),
        ),
    }))
}

#[derive(Debug)]
enum AppError {
    Pipeline(PipelineError),
}

impl From<PipelineError> for AppError {
    fn from(value: PipelineError) -> Self {
        Self::Pipeline(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Pipeline(err) => {
                let status = match err.kind() {
                    PipelineErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                    PipelineErrorKind::SourceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                    PipelineErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let payload = ApiError {
                    error: err.stage().to_string(),
                    detail: Some(err.detail().to_string()),
                };
                (status, Json(payload)).into_response()
            }
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(256 * 1024)
}
