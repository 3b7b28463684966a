//! HTTP endpoint server using Axum

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};

use crate::core::engine::SeriesEngine;
use crate::core::runtime::RefreshCoordinator;
use crate::core::scheduler::{ChangeNotifier, DataChanged};
use crate::error::{EngineError, ParseError};
use crate::metrics::Metrics;
use crate::models::record::{Category, EntityId};
use crate::models::request::{DateRange, Dataset, Period, SeriesRequest};

#[derive(Clone)]
pub struct AppState {
    pub health: Arc<RwLock<HealthStatus>>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub engine: Arc<SeriesEngine>,
    pub coordinator: Arc<RefreshCoordinator>,
    pub notifier: ChangeNotifier,
}

#[derive(Clone, Debug)]
pub struct HealthStatus {
    pub status: String,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

impl From<ParseError> for ApiError {
    fn from(err: ParseError) -> Self {
        api_error(StatusCode::BAD_REQUEST, err.to_string())
    }
}

pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let health = state.health.read().await;
    let uptime_seconds = state.start_time.elapsed().as_secs();
    Ok(Json(json!({
        "status": health.status,
        "uptime_seconds": uptime_seconds,
        "service": "cropledger-series-engine"
    })))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

/// Query string of `GET /api/series`. Entities are comma separated.
#[derive(Debug, Default, Deserialize)]
pub struct SeriesQuery {
    dataset: Option<String>,
    entities: Option<String>,
    period: Option<String>,
    from: Option<String>,
    to: Option<String>,
    category: Option<String>,
}

impl SeriesQuery {
    pub fn into_request(self) -> Result<SeriesRequest, ParseError> {
        let dataset = match self.dataset.as_deref() {
            Some(raw) => raw.parse()?,
            None => Dataset::default(),
        };
        let period = match self.period.as_deref() {
            Some(raw) => raw.parse()?,
            None => Period::default(),
        };
        let entities = self
            .entities
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| {
                id.parse::<EntityId>()
                    .map_err(|_| ParseError::new("entities", id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let date_range = DateRange::new(
            parse_date("from", self.from.as_deref())?,
            parse_date("to", self.to.as_deref())?,
        );

        let mut request = SeriesRequest::new(dataset, entities, period).with_range(date_range);
        if let Some(raw) = self.category.as_deref().filter(|c| !c.is_empty()) {
            request = request.with_category(raw.parse::<Category>()?);
        }
        Ok(request)
    }
}

fn parse_date(field: &'static str, raw: Option<&str>) -> Result<Option<NaiveDate>, ParseError> {
    raw.filter(|s| !s.is_empty())
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| ParseError::new(field, s)))
        .transpose()
}

fn engine_error(err: EngineError) -> ApiError {
    match err {
        EngineError::InvalidRequest(message) => api_error(StatusCode::BAD_REQUEST, message),
        EngineError::NoEntitiesResolved { ref failed } => {
            warn!(failed = ?failed, "No entity resolved for series request");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": err.to_string(), "failed": failed })),
            )
        }
        EngineError::Cancelled => api_error(StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
    }
}

/// Compute a series once, outside the refresh cycle.
async fn get_series(
    State(state): State<AppState>,
    Query(query): Query<SeriesQuery>,
) -> Result<Json<Value>, ApiError> {
    let request = query.into_request()?;
    let response = state
        .engine
        .get_series(&request, &CancellationToken::new())
        .await
        .map_err(engine_error)?;
    Ok(Json(json!(response)))
}

/// Replace the coordinator's selection; the cycle runs in the background.
async fn put_selection(
    State(state): State<AppState>,
    Json(request): Json<SeriesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !request.date_range.is_valid() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "date range starts after it ends",
        ));
    }
    let cycle = state.coordinator.select(request).await;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "generation": cycle.generation })),
    ))
}

/// Latest published snapshot, 204 until the first cycle completes.
async fn get_latest(State(state): State<AppState>) -> Response {
    let Some(snapshot) = state.coordinator.latest().await else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let (series, error) = match &snapshot.outcome {
        Ok(response) => (json!(response), Value::Null),
        Err(message) => (Value::Null, json!(message)),
    };
    Json(json!({
        "generation": snapshot.generation,
        "completed_at": snapshot.completed_at,
        "request": snapshot.request,
        "series": series,
        "error": error,
    }))
    .into_response()
}

/// Change signal. The body is optional; a bare POST means "something changed".
async fn post_data_changed(
    State(state): State<AppState>,
    body: Option<Json<DataChanged>>,
) -> impl IntoResponse {
    let event = body.map(|Json(event)| event).unwrap_or_default();
    let listeners = state.notifier.notify(event);
    (StatusCode::ACCEPTED, Json(json!({ "listeners": listeners })))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/series", get(get_series))
        .route("/api/series/latest", get(get_latest))
        .route("/api/selection", put(put_selection))
        .route("/api/data-changed", post(post_data_changed))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn start_server(port: u16, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    info!(
        "Metrics endpoint available at http://0.0.0.0:{}/metrics",
        port
    );
    axum::serve(listener, app).await?;

    Ok(())
}
