use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::engine::PredictEngine;
use crate::error::AppError;
use crate::features::{AttributeMap, AttributeValue};
use crate::types::{MetricsResponse, PredictResponse, QUERY_ATTRIBUTES};

pub type AppState = Arc<PredictEngine>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/predict/:id", get(predict_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Builds the attribute map from raw query parameters. Absent or unparsable
/// values become `Missing`; the encoder's policy decides what they score as.
fn attribute_map_from_query(params: &HashMap<String, String>) -> AttributeMap {
    QUERY_ATTRIBUTES
        .iter()
        .map(|(wire, canonical)| {
            let value = params
                .get(*wire)
                .and_then(|raw| raw.parse::<f64>().ok())
                .map_or(AttributeValue::Missing, AttributeValue::Present);
            (canonical.to_string(), value)
        })
        .collect()
}

async fn predict_handler(
    State(engine): State<AppState>,
    Path(driver_id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<PredictResponse>, AppError> {
    let start = Instant::now();
    metrics::counter!("predict_requests_total").increment(1);

    let decision_id = Uuid::new_v4();
    let attributes = attribute_map_from_query(&params);
    let predict = engine.predict(driver_id, attributes).await?;

    info!(%decision_id, driver_id, predict, "prediction request served");
    metrics::histogram!("predict_duration_ms").record(start.elapsed().as_secs_f64() * 1000.0);

    Ok(Json(PredictResponse { predict }))
}

async fn metrics_handler(State(engine): State<AppState>) -> Json<MetricsResponse> {
    Json(engine.metrics_snapshot())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
