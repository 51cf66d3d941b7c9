use serde::{Deserialize, Serialize};

/// Wire name -> canonical attribute name for prediction query parameters.
/// The HTTP surface keeps the legacy camelCase `dayOfWeek`; encoding uses the
/// canonical training-time name so the hashed feature id is identical on both
/// sides.
pub const QUERY_ATTRIBUTES: [(&str, &str); 9] = [
    ("hour", "hour"),
    ("dayOfWeek", "day_of_week"),
    (
        "distance_from_order_on_creation",
        "distance_from_order_on_creation",
    ),
    ("driver_location_key", "driver_location_key"),
    ("driver_latitude", "driver_latitude"),
    ("driver_longitude", "driver_longitude"),
    ("origin_location_key", "origin_location_key"),
    ("origin_latitude", "origin_latitude"),
    ("origin_longitude", "origin_longitude"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predict: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub model_variant: String,
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub trained_models: u64,
    pub avg_latency_ms: f64,
    pub uptime_seconds: u64,
}
