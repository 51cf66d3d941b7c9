use crate::cache::{DriverId, ModelBuilder, ModelCache, TrainingPipeline};
use crate::config::Config;
use crate::error::AppError;
use crate::features::{AttributeMap, FeatureEncoder, Sample};
use crate::types::MetricsResponse;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Request-facing orchestrator: encoder + per-driver model cache.
pub struct PredictEngine {
    config: Config,
    encoder: FeatureEncoder,
    cache: ModelCache,
    metrics: Mutex<EngineMetrics>,
    start_time: Instant,
}

#[derive(Debug, Default)]
struct EngineMetrics {
    total_requests: u64,
    cache_hits: u64,
    cache_misses: u64,
    total_latency_ms: f64,
}

impl PredictEngine {
    pub fn new(config: Config) -> Self {
        info!(
            classifier = %config.classifier,
            dataset = %config.dataset_path,
            "initializing prediction engine"
        );
        let pipeline = Arc::new(TrainingPipeline::new(&config));
        Self::with_builder(config, pipeline)
    }

    /// Injection point for tests that substitute the training pipeline.
    pub fn with_builder(config: Config, builder: Arc<dyn ModelBuilder>) -> Self {
        Self {
            config,
            encoder: FeatureEncoder::default(),
            cache: ModelCache::new(builder),
            metrics: Mutex::new(EngineMetrics::default()),
            start_time: Instant::now(),
        }
    }

    /// Scores one request. The first call per driver pays for a full dataset
    /// load and training pass; later calls reuse the cached classifier.
    pub async fn predict(&self, driver_id: DriverId, attributes: AttributeMap) -> Result<f64, AppError> {
        let start = Instant::now();

        let resolution = self.cache.resolve(driver_id).await?;
        let sample = Sample::unlabeled(self.encoder.encode(&attributes));
        let score = resolution.classifier.predict(&sample);

        debug!(
            driver_id,
            score,
            cache_hit = resolution.cache_hit,
            "prediction served"
        );
        self.update_metrics(start.elapsed().as_secs_f64() * 1000.0, resolution.cache_hit);

        Ok(score)
    }

    pub fn metrics_snapshot(&self) -> MetricsResponse {
        let metrics = self.metrics.lock();
        let avg_latency_ms = if metrics.total_requests > 0 {
            metrics.total_latency_ms / metrics.total_requests as f64
        } else {
            0.0
        };

        MetricsResponse {
            model_variant: self.config.classifier.clone(),
            total_requests: metrics.total_requests,
            cache_hits: metrics.cache_hits,
            cache_misses: metrics.cache_misses,
            trained_models: self.cache.ready_models() as u64,
            avg_latency_ms,
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    fn update_metrics(&self, latency_ms: f64, cache_hit: bool) {
        let mut metrics = self.metrics.lock();
        metrics.total_requests += 1;
        metrics.total_latency_ms += latency_ms;
        if cache_hit {
            metrics.cache_hits += 1;
        } else {
            metrics.cache_misses += 1;
        }
    }
}
