use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

use dispatch_engine::config::{Config, TrainingConfig};
use dispatch_engine::engine::PredictEngine;
use dispatch_engine::routes;

const HEADER: &str = "order_id,created_at,status_id,driver_id,hour,day_of_week,\
distance_from_order_on_creation,driver_location_key,driver_latitude,driver_longitude,\
completed_at,offer_seen_at,cancelled_at,origin_location_key,origin_latitude,origin_longitude";

fn write_two_record_dataset(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("orders.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    // Record A: explicit accepted status, no completion evidence -> label 1.
    writeln!(
        file,
        "1,2016-07-16,4,716,10,5,800.0,17,55.75,37.61,,,,21,55.70,37.50"
    )
    .unwrap();
    // Record B: excluded status with completion evidence -> label 0.
    writeln!(
        file,
        "2,2016-07-16,3,716,22,6,4300.0,18,55.60,37.40,x,,,22,55.80,37.65"
    )
    .unwrap();
    path
}

fn test_config(dataset_path: &Path, model_path: &Path) -> Config {
    Config {
        port: 0,
        dataset_path: dataset_path.to_string_lossy().into_owned(),
        model_path: model_path.to_string_lossy().into_owned(),
        classifier: "forest".to_string(),
        training: TrainingConfig {
            steps: 30,
            max_depth: 7,
            min_leaf_size: 10,
            tree_count: 10,
            learning_rate: 0.0001,
            learning_rate_discount: 1.0,
            regularization: 0.0001,
            gini: 1.0,
            feature_count: 9,
            dt_sample_ratio: 1.0,
            eval_threshold: 0.7,
        },
    }
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_two_record_dataset_trains_and_serves_a_score() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_two_record_dataset(dir.path());
    let model = dir.path().join("models").join("acceptance.json");

    let engine = PredictEngine::new(test_config(&dataset, &model));
    let app = routes::router(Arc::new(engine));

    let (status, body) = get(
        app.clone(),
        "/api/predict/716?hour=10&dayOfWeek=5&distance_from_order_on_creation=800",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let predict = body["predict"].as_f64().expect("predict is a float");
    assert!(predict.is_finite());
    assert!((0.0..=1.0).contains(&predict));

    // The training pass persisted the entity-independent model artifact.
    assert!(model.exists());
}

#[tokio::test]
async fn test_second_request_reuses_the_cached_model() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_two_record_dataset(dir.path());
    let model = dir.path().join("acceptance.json");

    let engine = PredictEngine::new(test_config(&dataset, &model));
    let app = routes::router(Arc::new(engine));

    let (first_status, _) = get(app.clone(), "/api/predict/716?hour=10").await;
    let (second_status, _) = get(app.clone(), "/api/predict/716?hour=11").await;
    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);

    let (_, metrics) = get(app.clone(), "/metrics").await;
    assert_eq!(metrics["total_requests"].as_u64(), Some(2));
    assert_eq!(metrics["cache_misses"].as_u64(), Some(1));
    assert_eq!(metrics["cache_hits"].as_u64(), Some(1));
    assert_eq!(metrics["trained_models"].as_u64(), Some(1));
}

#[tokio::test]
async fn test_missing_attributes_still_score() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_two_record_dataset(dir.path());
    let model = dir.path().join("acceptance.json");

    let engine = PredictEngine::new(test_config(&dataset, &model));
    let app = routes::router(Arc::new(engine));

    // No query parameters at all: every attribute is imputed to 0.0.
    let (status, body) = get(app, "/api/predict/716").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["predict"].as_f64().unwrap().is_finite());
}

#[tokio::test]
async fn test_unavailable_dataset_is_a_5xx_not_a_score() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nonexistent.csv");
    let model = dir.path().join("acceptance.json");

    let engine = PredictEngine::new(test_config(&missing, &model));
    let app = routes::router(Arc::new(engine));

    let (status, body) = get(app, "/api/predict/716?hour=10").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["predict"].is_null());
}

#[tokio::test]
async fn test_health_endpoint_reports_healthy() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_two_record_dataset(dir.path());
    let model = dir.path().join("acceptance.json");

    let engine = PredictEngine::new(test_config(&dataset, &model));
    let app = routes::router(Arc::new(engine));

    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"].as_str(), Some("healthy"));
}
