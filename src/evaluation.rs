use crate::classifier::Classifier;
use crate::features::DataSet;
use serde::Serialize;

/// Status token that marks an explicit acceptance in the raw export.
const ACCEPTED_TOKEN: &str = "4";

/// In-sample scoring summary, grouped by the raw status token sequence the
/// loader returns alongside the dataset. Diagnostic only; nothing on the
/// request path reads it.
#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub threshold: f64,
    pub accepted_count: usize,
    pub rejected_count: usize,
    pub mean_accepted_score: f64,
    pub mean_rejected_score: f64,
    pub accepted_above_threshold: usize,
    pub rejected_above_threshold: usize,
}

pub fn evaluate(
    classifier: &dyn Classifier,
    dataset: &DataSet,
    statuses: &[String],
    threshold: f64,
) -> EvalReport {
    let mut accepted_count = 0;
    let mut rejected_count = 0;
    let mut accepted_total = 0.0;
    let mut rejected_total = 0.0;
    let mut accepted_above = 0;
    let mut rejected_above = 0;

    for (sample, status) in dataset.samples().iter().zip(statuses) {
        let score = classifier.predict(sample);
        if status == ACCEPTED_TOKEN {
            accepted_count += 1;
            accepted_total += score;
            accepted_above += usize::from(score > threshold);
        } else {
            rejected_count += 1;
            rejected_total += score;
            rejected_above += usize::from(score > threshold);
        }
    }

    let mean = |total: f64, count: usize| if count > 0 { total / count as f64 } else { 0.0 };

    EvalReport {
        threshold,
        accepted_count,
        rejected_count,
        mean_accepted_score: mean(accepted_total, accepted_count),
        mean_rejected_score: mean(rejected_total, rejected_count),
        accepted_above_threshold: accepted_above,
        rejected_above_threshold: rejected_above,
    }
}
