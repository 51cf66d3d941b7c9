use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// One named attribute after hashing: a stable numeric id and its value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: u64,
    pub value: f64,
}

/// Raw attribute value before encoding. `Missing` covers both an absent
/// parameter and an unparsable numeric field, so 0.0 stays distinguishable
/// from "not supplied" until the encoder applies its policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeValue {
    Present(f64),
    Missing,
}

pub type AttributeMap = HashMap<String, AttributeValue>;

/// What the encoder does with a `Missing` attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MissingPolicy {
    Impute(f64),
    Drop,
}

/// Labeled feature vector, the unit consumed by training and prediction.
/// Label is 0 or 1; inference-time samples carry label 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub label: u8,
    pub features: Vec<Feature>,
}

impl Sample {
    pub fn new(label: u8, features: Vec<Feature>) -> Self {
        Self { label, features }
    }

    pub fn unlabeled(features: Vec<Feature>) -> Self {
        Self { label: 0, features }
    }
}

/// Ordered, immutable set of samples built once per training pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSet {
    samples: Vec<Sample>,
}

impl DataSet {
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Round-robin holdout split: every `part`-th of `total` samples goes to
    /// the second set, the rest to the first.
    pub fn split(&self, total: usize, part: usize) -> (DataSet, DataSet) {
        let mut train = Vec::new();
        let mut test = Vec::new();
        for (i, sample) in self.samples.iter().enumerate() {
            if total > 0 && i % total == part {
                test.push(sample.clone());
            } else {
                train.push(sample.clone());
            }
        }
        (DataSet::from_samples(train), DataSet::from_samples(test))
    }
}

/// Deterministic attribute-name hash: first 8 bytes of SHA-256, big-endian.
/// The same name must map to the same id at training and inference time;
/// distinct names may collide with negligible probability (hashing trick).
pub fn feature_id(name: &str) -> u64 {
    let digest = Sha256::digest(name.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Maps named numeric attributes into a sparse feature vector.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    missing: MissingPolicy,
}

impl FeatureEncoder {
    pub fn new(missing: MissingPolicy) -> Self {
        Self { missing }
    }

    /// Emits one `Feature` per attribute, sorted by id. No normalization,
    /// no scaling; any name is hashable.
    pub fn encode(&self, attributes: &AttributeMap) -> Vec<Feature> {
        let mut features = Vec::with_capacity(attributes.len());
        for (name, value) in attributes {
            let value = match (*value, self.missing) {
                (AttributeValue::Present(v), _) => v,
                (AttributeValue::Missing, MissingPolicy::Impute(default)) => default,
                (AttributeValue::Missing, MissingPolicy::Drop) => continue,
            };
            features.push(Feature {
                id: feature_id(name),
                value,
            });
        }
        features.sort_by_key(|f| f.id);
        features
    }
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        // Absent attributes score as 0.0, the documented request contract.
        Self::new(MissingPolicy::Impute(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, AttributeValue)]) -> AttributeMap {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }

    #[test]
    fn test_feature_id_is_deterministic() {
        assert_eq!(feature_id("hour"), feature_id("hour"));
        assert_eq!(
            feature_id("distance_from_order_on_creation"),
            feature_id("distance_from_order_on_creation")
        );
        assert_ne!(feature_id("hour"), feature_id("day_of_week"));
    }

    #[test]
    fn test_encode_round_trip_identity() {
        let encoder = FeatureEncoder::default();
        let map = attrs(&[
            ("hour", AttributeValue::Present(13.0)),
            ("day_of_week", AttributeValue::Present(5.0)),
            ("driver_latitude", AttributeValue::Present(55.75)),
        ]);
        assert_eq!(encoder.encode(&map), encoder.encode(&map));
    }

    #[test]
    fn test_encode_is_sorted_by_id() {
        let encoder = FeatureEncoder::default();
        let map = attrs(&[
            ("origin_longitude", AttributeValue::Present(37.6)),
            ("hour", AttributeValue::Present(1.0)),
            ("driver_location_key", AttributeValue::Present(42.0)),
        ]);
        let features = encoder.encode(&map);
        assert!(features.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_missing_attribute_imputes_zero() {
        let encoder = FeatureEncoder::default();
        let map = attrs(&[
            ("hour", AttributeValue::Present(9.0)),
            ("driver_latitude", AttributeValue::Missing),
        ]);
        let features = encoder.encode(&map);
        let lat = features
            .iter()
            .find(|f| f.id == feature_id("driver_latitude"))
            .expect("missing attribute still produces a feature");
        assert_eq!(lat.value, 0.0);
    }

    #[test]
    fn test_missing_attribute_dropped_under_drop_policy() {
        let encoder = FeatureEncoder::new(MissingPolicy::Drop);
        let map = attrs(&[
            ("hour", AttributeValue::Present(9.0)),
            ("driver_latitude", AttributeValue::Missing),
        ]);
        let features = encoder.encode(&map);
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id, feature_id("hour"));
    }

    #[test]
    fn test_dataset_split_round_robin() {
        let samples: Vec<Sample> = (0..10)
            .map(|i| Sample::new((i % 2) as u8, vec![]))
            .collect();
        let dataset = DataSet::from_samples(samples);
        let (train, test) = dataset.split(2, 0);
        assert_eq!(train.len(), 5);
        assert_eq!(test.len(), 5);
    }
}
