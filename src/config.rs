use crate::classifier::ClassifierParams;
use crate::error::AppError;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// The one global historical dataset every driver model trains from.
    pub dataset_path: String,
    /// Entity-independent model artifact path written after each training pass.
    pub model_path: String,
    /// Classifier variant resolved through the registry.
    pub classifier: String,
    pub training: TrainingConfig,
}

/// Fixed training configuration applied on every cache miss. There is no
/// per-driver tuning; variants read the keys they understand and ignore the
/// rest (shared parameter bag).
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    pub steps: u32,
    pub max_depth: u32,
    pub min_leaf_size: u32,
    pub tree_count: u32,
    pub learning_rate: f64,
    pub learning_rate_discount: f64,
    pub regularization: f64,
    pub gini: f64,
    pub feature_count: u32,
    pub dt_sample_ratio: f64,
    /// Score cut used only in the post-training evaluation report.
    pub eval_threshold: f64,
}

impl TrainingConfig {
    /// Renders the bag in the string-map shape `Classifier::init` consumes.
    pub fn to_classifier_params(&self) -> ClassifierParams {
        let mut params = ClassifierParams::new();
        params.set("steps", self.steps.to_string());
        params.set("max-depth", self.max_depth.to_string());
        params.set("min-leaf-size", self.min_leaf_size.to_string());
        params.set("tree-count", self.tree_count.to_string());
        params.set("learning-rate", self.learning_rate.to_string());
        params.set(
            "learning-rate-discount",
            self.learning_rate_discount.to_string(),
        );
        params.set("regularization", self.regularization.to_string());
        params.set("gini", self.gini.to_string());
        params.set("feature-count", self.feature_count.to_string());
        params.set("dt-sample-ratio", self.dt_sample_ratio.to_string());
        params
    }
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        let settings = config::Config::builder()
            .set_default("port", 8080_i64)?
            .set_default("dataset_path", "data/orders.csv")?
            .set_default("model_path", "models/acceptance.json")?
            .set_default("classifier", "forest")?
            .set_default("training.steps", 30_i64)?
            .set_default("training.max_depth", 7_i64)?
            .set_default("training.min_leaf_size", 10_i64)?
            .set_default("training.tree_count", 10_i64)?
            .set_default("training.learning_rate", 0.0001_f64)?
            .set_default("training.learning_rate_discount", 1.0_f64)?
            .set_default("training.regularization", 0.0001_f64)?
            .set_default("training.gini", 1.0_f64)?
            .set_default("training.feature_count", 9_i64)?
            .set_default("training.dt_sample_ratio", 1.0_f64)?
            .set_default("training.eval_threshold", 0.7_f64)?
            .add_source(config::File::with_name("dispatch-engine").required(false))
            .add_source(config::Environment::with_prefix("DISPATCH").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
