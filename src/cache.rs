use crate::classifier::{create_classifier, ClassifierParams, SharedClassifier};
use crate::config::Config;
use crate::dataset::DatasetLoader;
use crate::error::AppError;
use crate::evaluation;
use crate::features::FeatureEncoder;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{info, warn};

pub type DriverId = i64;

/// Seam between the cache and the training pipeline. Production uses
/// [`TrainingPipeline`]; tests substitute counting or failing builders.
/// `build` may block for the full dataset-load-plus-train pass.
pub trait ModelBuilder: Send + Sync + 'static {
    fn build(&self, driver_id: DriverId) -> Result<SharedClassifier, AppError>;
}

#[derive(Debug)]
pub struct Resolution {
    pub classifier: SharedClassifier,
    pub cache_hit: bool,
}

/// Per-driver classifier cache. Entries go `Absent -> Training -> Ready`;
/// a failed training pass leaves the slot empty so a later request retries.
/// There is no eviction; the cache only grows for the process lifetime.
pub struct ModelCache {
    entries: DashMap<DriverId, Arc<OnceCell<SharedClassifier>>>,
    builder: Arc<dyn ModelBuilder>,
}

impl ModelCache {
    pub fn new(builder: Arc<dyn ModelBuilder>) -> Self {
        Self {
            entries: DashMap::new(),
            builder,
        }
    }

    /// Returns the driver's classifier, training it first on a miss.
    ///
    /// Concurrent misses for the same driver coalesce onto one training pass
    /// through the per-entry `OnceCell`; resolvers for different drivers never
    /// block each other. Training runs on the blocking pool so the request
    /// path only awaits it.
    pub async fn resolve(&self, driver_id: DriverId) -> Result<Resolution, AppError> {
        let cell = Arc::clone(&*self.entries.entry(driver_id).or_default());
        let cache_hit = cell.initialized();

        let classifier = cell
            .get_or_try_init(|| {
                let builder = self.builder.clone();
                async move {
                    info!(driver_id, "model cache miss, training classifier");
                    tokio::task::spawn_blocking(move || builder.build(driver_id))
                        .await
                        .map_err(|e| {
                            AppError::Internal(format!("training task failed: {}", e))
                        })?
                }
            })
            .await?
            .clone();

        Ok(Resolution {
            classifier,
            cache_hit,
        })
    }

    /// Number of drivers with a trained model installed.
    pub fn ready_models(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }
}

/// Production miss path: construct the configured variant, init it with the
/// fixed parameter bag, load the global dataset, train, persist the artifact.
pub struct TrainingPipeline {
    classifier_name: String,
    params: ClassifierParams,
    loader: DatasetLoader,
    model_path: PathBuf,
    eval_threshold: f64,
}

impl TrainingPipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            classifier_name: config.classifier.clone(),
            params: config.training.to_classifier_params(),
            loader: DatasetLoader::new(&config.dataset_path, FeatureEncoder::default()),
            model_path: PathBuf::from(&config.model_path),
            eval_threshold: config.training.eval_threshold,
        }
    }
}

impl ModelBuilder for TrainingPipeline {
    fn build(&self, driver_id: DriverId) -> Result<SharedClassifier, AppError> {
        let mut classifier = create_classifier(&self.classifier_name)?;
        // Invalid configuration must fail before any training is attempted.
        classifier.init(&self.params)?;

        let loaded = self.loader.load()?;

        let started = Instant::now();
        classifier.train(&loaded.dataset)?;
        info!(
            driver_id,
            samples = loaded.dataset.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "classifier trained"
        );
        metrics::counter!("models_trained_total").increment(1);

        let report = evaluation::evaluate(
            classifier.as_ref(),
            &loaded.dataset,
            &loaded.statuses,
            self.eval_threshold,
        );
        info!(
            driver_id,
            mean_accepted = report.mean_accepted_score,
            mean_rejected = report.mean_rejected_score,
            accepted_above = report.accepted_above_threshold,
            rejected_above = report.rejected_above_threshold,
            "in-sample evaluation"
        );

        // The artifact is a side effect; a trained model stays usable even if
        // the write fails.
        if let Err(e) = classifier.save_model(&self.model_path) {
            warn!(driver_id, error = %e, "failed to persist model artifact");
        }

        Ok(Arc::from(classifier))
    }
}
