use std::time::Duration;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, OriginalUri},
    http::{header, HeaderValue, Method, Request, Response},
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{classify::ServerErrorsFailureClass, cors::CorsLayer, trace::TraceLayer};
use tracing::{field, Span};

use crate::{
    cars,
    config::AppConfig,
    error::{normalize_errors, AppError},
    state::AppState,
    users,
};

const BODY_LIMIT: usize = 10 * 1024;

async fn health() -> Json<Value> {
    Json(json!({ "status": "success" }))
}

async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::route_not_found(uri.path())
}

fn cors(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

fn request_span(req: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        status = field::Empty,
        latency_ms = field::Empty,
    )
}

fn record_response(res: &Response<Body>, latency: Duration, span: &Span) {
    let status = res.status();
    span.record("status", status.as_u16());
    span.record("latency_ms", latency.as_millis() as u64);
    if status.is_client_error() {
        tracing::debug!(%status, "request rejected");
    } else {
        tracing::info!(%status, "request finished");
    }
}

fn record_failure(failure: ServerErrorsFailureClass, latency: Duration, _span: &Span) {
    tracing::error!(%failure, latency_ms = latency.as_millis() as u64, "request failed");
}

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .nest("/users", users::router(state.clone()))
        .nest("/cars", cars::router(state.clone()))
        .route("/health", get(health));

    Router::new()
        .nest("/api/v1", api)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            normalize_errors,
        ))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors(&state.config))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(record_response)
                .on_failure(record_failure),
        )
        .with_state(state)
}

/// Binds `host:port` from the configuration and serves until the process ends.
pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
