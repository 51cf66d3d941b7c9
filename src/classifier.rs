use crate::error::AppError;
use crate::features::{DataSet, Sample};
use crate::forest::RandomForest;
use crate::logistic::LogisticRegression;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// A trained classifier shared read-only across concurrent requests.
pub type SharedClassifier = Arc<dyn Classifier>;

/// Contract the model cache depends on. `init` must reject missing or
/// unparsable required keys before any training happens; `predict` takes
/// `&self` and is safe to call concurrently once `train` has returned.
/// Calling `predict` before `train` yields the variant's untrained default,
/// not an error.
pub trait Classifier: Send + Sync + std::fmt::Debug {
    fn init(&mut self, params: &ClassifierParams) -> Result<(), AppError>;
    fn train(&mut self, dataset: &DataSet) -> Result<(), AppError>;
    fn predict(&self, sample: &Sample) -> f64;
    fn save_model(&self, path: &Path) -> Result<(), AppError>;
    fn load_model(&mut self, path: &Path) -> Result<(), AppError>;
}

/// String-keyed hyperparameter bag. Variants pull out the keys they
/// understand with the typed accessors and ignore everything else.
#[derive(Debug, Clone, Default)]
pub struct ClassifierParams {
    values: HashMap<String, String>,
}

impl ClassifierParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get_usize(&self, key: &str) -> Result<usize, AppError> {
        self.raw(key)?
            .parse()
            .map_err(|_| Self::unparsable(key, self.values.get(key)))
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, AppError> {
        self.raw(key)?
            .parse()
            .map_err(|_| Self::unparsable(key, self.values.get(key)))
    }

    fn raw(&self, key: &str) -> Result<&str, AppError> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| AppError::ClassifierConfig(format!("missing required key '{}'", key)))
    }

    fn unparsable(key: &str, value: Option<&String>) -> AppError {
        AppError::ClassifierConfig(format!(
            "unparsable value '{}' for key '{}'",
            value.map(String::as_str).unwrap_or(""),
            key
        ))
    }
}

/// Closed registry of classifier variants. Adding an algorithm means adding
/// an arm here; the cache never needs to change.
pub fn create_classifier(name: &str) -> Result<Box<dyn Classifier>, AppError> {
    match name {
        "forest" => Ok(Box::new(RandomForest::default())),
        "logistic" => Ok(Box::new(LogisticRegression::default())),
        other => Err(AppError::UnknownClassifier(other.to_string())),
    }
}
