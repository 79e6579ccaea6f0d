use crate::models::*;
use crate::services::serving::ServeError;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    n: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = match self {
            ServeError::InvalidCount { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let body = ApiError {
            error: "invalid_parameter".to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Product Audience Recommendation API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /recommend/{product_id}?n=": "Ranked users for a product",
            "GET /products/sample?n=": "Random product ids with a cached ranking",
            "GET /health": "Health check",
            "GET /metrics": "Model provenance and serving counters"
        }
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.serving.health())
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(state.serving.metrics())
}

async fn recommend(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Query(params): Query<CountQuery>,
) -> Result<Json<RecommendationResponse>, ServeError> {
    let n = params.n.unwrap_or(state.serving.config().default_n as i64);
    state.serving.recommend(product_id, n).map(Json)
}

async fn sample_products(
    State(state): State<AppState>,
    Query(params): Query<CountQuery>,
) -> Result<Json<SampleProductsResponse>, ServeError> {
    let n = params.n.unwrap_or(state.serving.config().default_n as i64);
    state.serving.sample_products(n).map(Json)
}

pub fn create_router(state: AppState) -> Router {
    let timeout = Duration::from_millis(state.config.server.request_timeout_ms);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/recommend/:product_id", get(recommend))
        .route("/products/sample", get(sample_products))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(timeout))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
