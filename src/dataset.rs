use crate::error::AppError;
use crate::features::{AttributeMap, AttributeValue, DataSet, FeatureEncoder, Sample};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::info;

/// Dataset schema v1: comma-delimited, one header row, columns resolved by
/// header name. The legacy export laid these out positionally (status at 2,
/// completion evidence at 10, features at 4-9 and 13-15); resolving by name
/// keeps column order drift from silently corrupting features.
pub const STATUS_COLUMN: &str = "status_id";
pub const COMPLETION_COLUMN: &str = "completed_at";
pub const FEATURE_COLUMNS: [&str; 9] = [
    "hour",
    "day_of_week",
    "distance_from_order_on_creation",
    "driver_location_key",
    "driver_latitude",
    "driver_longitude",
    "origin_location_key",
    "origin_latitude",
    "origin_longitude",
];

/// Status codes that count as accepted outright.
const ACCEPTED_STATUS_CODES: [&str; 2] = ["4", "2"];
/// Status code excluded from completion-based promotion.
const EXCLUDED_STATUS_CODE: &str = "3";

/// Two-rule label policy, order fixed: an explicit accepted status wins;
/// otherwise completion evidence promotes unless the status is the excluded
/// code. A positive label is never demoted.
pub fn derive_label(status: &str, completion: &str) -> u8 {
    if ACCEPTED_STATUS_CODES.contains(&status) {
        return 1;
    }
    if !completion.is_empty() && status != EXCLUDED_STATUS_CODE {
        return 1;
    }
    0
}

#[derive(Debug)]
struct Schema {
    status: usize,
    completion: usize,
    features: Vec<(String, usize)>,
}

fn column_position(columns: &[&str], name: &str) -> Result<usize, AppError> {
    columns
        .iter()
        .position(|column| *column == name)
        .ok_or_else(|| AppError::Dataset(format!("schema drift: missing column '{}'", name)))
}

impl Schema {
    fn resolve(header: &str) -> Result<Self, AppError> {
        let columns: Vec<&str> = header.split(',').map(str::trim).collect();
        let status = column_position(&columns, STATUS_COLUMN)?;
        let completion = column_position(&columns, COMPLETION_COLUMN)?;
        let features = FEATURE_COLUMNS
            .iter()
            .map(|name| Ok((name.to_string(), column_position(&columns, name)?)))
            .collect::<Result<Vec<_>, AppError>>()?;
        Ok(Self {
            status,
            completion,
            features,
        })
    }
}

/// A labeled sample set plus the parallel raw status token per record.
/// The tokens are diagnostic only; inference never sees them.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: DataSet,
    pub statuses: Vec<String>,
}

/// Reads the historical order export and produces labeled training samples.
pub struct DatasetLoader {
    path: PathBuf,
    encoder: FeatureEncoder,
}

impl DatasetLoader {
    pub fn new(path: impl Into<PathBuf>, encoder: FeatureEncoder) -> Self {
        Self {
            path: path.into(),
            encoder,
        }
    }

    pub fn load(&self) -> Result<LoadedDataset, AppError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            AppError::Dataset(format!("dataset {:?} unavailable: {}", self.path, e))
        })?;
        let digest = hex::encode(Sha256::digest(raw.as_bytes()));

        let mut lines = raw.lines();
        let header = lines
            .next()
            .ok_or_else(|| AppError::Dataset(format!("dataset {:?} is empty", self.path)))?;
        let schema = Schema::resolve(header)?;

        let mut samples = Vec::new();
        let mut statuses = Vec::new();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let status = fields.get(schema.status).copied().unwrap_or("");
            let completion = fields.get(schema.completion).copied().unwrap_or("");
            let label = derive_label(status, completion);

            let mut attributes = AttributeMap::with_capacity(schema.features.len());
            for (name, position) in &schema.features {
                let value = fields
                    .get(*position)
                    .and_then(|raw| raw.parse::<f64>().ok())
                    .map_or(AttributeValue::Missing, AttributeValue::Present);
                attributes.insert(name.clone(), value);
            }

            samples.push(Sample::new(label, self.encoder.encode(&attributes)));
            statuses.push(status.to_string());
        }

        info!(
            path = ?self.path,
            records = samples.len(),
            digest = %digest,
            "historical dataset loaded"
        );

        Ok(LoadedDataset {
            dataset: DataSet::from_samples(samples),
            statuses,
        })
    }
}
