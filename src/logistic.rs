use crate::classifier::{Classifier, ClassifierParams};
use crate::error::AppError;
use crate::features::{DataSet, Sample};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Sparse logistic regression trained with plain SGD. Weights are keyed by
/// hashed feature id, so the model never needs a dense feature dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogisticRegression {
    steps: usize,
    learning_rate: f64,
    learning_rate_discount: f64,
    regularization: f64,
    weights: HashMap<u64, f64>,
    bias: f64,
    trained_samples: u64,
}

impl LogisticRegression {
    fn raw_score(&self, sample: &Sample) -> f64 {
        let mut z = self.bias;
        for feature in &sample.features {
            z += self.weights.get(&feature.id).copied().unwrap_or(0.0) * feature.value;
        }
        z
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Classifier for LogisticRegression {
    fn init(&mut self, params: &ClassifierParams) -> Result<(), AppError> {
        self.steps = params.get_usize("steps")?;
        self.learning_rate = params.get_f64("learning-rate")?;
        self.learning_rate_discount = params.get_f64("learning-rate-discount")?;
        self.regularization = params.get_f64("regularization")?;
        Ok(())
    }

    fn train(&mut self, dataset: &DataSet) -> Result<(), AppError> {
        if dataset.is_empty() {
            return Err(AppError::Training(
                "refusing to train on an empty dataset".to_string(),
            ));
        }

        let mut learning_rate = self.learning_rate;
        for _ in 0..self.steps {
            for sample in dataset.samples() {
                let error = sample.label as f64 - sigmoid(self.raw_score(sample));
                self.bias += learning_rate * error;
                for feature in &sample.features {
                    let weight = self.weights.entry(feature.id).or_insert(0.0);
                    *weight +=
                        learning_rate * (error * feature.value - self.regularization * *weight);
                }
            }
            learning_rate *= self.learning_rate_discount;
        }

        self.trained_samples = dataset.len() as u64;
        debug!(
            samples = dataset.len(),
            weights = self.weights.len(),
            "logistic regression trained"
        );
        Ok(())
    }

    // Untrained model scores every sample at 0.5.
    fn predict(&self, sample: &Sample) -> f64 {
        sigmoid(self.raw_score(sample))
    }

    fn save_model(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::ModelPersistence(format!("create {:?}: {}", parent, e)))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|e| AppError::ModelPersistence(format!("write {:?}: {}", path, e)))
    }

    fn load_model(&mut self, path: &Path) -> Result<(), AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::ModelPersistence(format!("read {:?}: {}", path, e)))?;
        *self = serde_json::from_str(&content)?;
        Ok(())
    }
}
