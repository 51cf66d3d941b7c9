use crate::classifier::{Classifier, ClassifierParams};
use crate::error::AppError;
use crate::features::{DataSet, Sample};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

const BOOTSTRAP_SEED: u64 = 0x64726976;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        probability: f64,
    },
    Split {
        column: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// Bagged random forest over densified hashed features. Sparse samples are
/// mapped onto the column layout observed at training time; ids unseen during
/// training are ignored at prediction time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RandomForest {
    tree_count: usize,
    max_depth: usize,
    min_leaf_size: usize,
    sample_ratio: f64,
    feature_count: usize,
    feature_index: HashMap<u64, usize>,
    trees: Vec<TreeNode>,
}

struct GrowContext<'a> {
    rows: &'a [Vec<f64>],
    labels: &'a [u8],
    max_depth: usize,
    min_leaf_size: usize,
    feature_count: usize,
    columns: usize,
}

impl RandomForest {
    fn densify(&self, sample: &Sample) -> Vec<f64> {
        let mut row = vec![0.0; self.feature_index.len()];
        for feature in &sample.features {
            if let Some(&column) = self.feature_index.get(&feature.id) {
                row[column] = feature.value;
            }
        }
        row
    }
}

fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}

fn grow_tree(ctx: &GrowContext, indices: &[usize], depth: usize, rng: &mut StdRng) -> TreeNode {
    let positives = indices.iter().filter(|&&i| ctx.labels[i] == 1).count();
    let probability = positives as f64 / indices.len() as f64;

    if ctx.columns == 0
        || depth >= ctx.max_depth
        || indices.len() < ctx.min_leaf_size
        || positives == 0
        || positives == indices.len()
    {
        return TreeNode::Leaf { probability };
    }

    let parent_gini = gini(positives, indices.len());
    let candidate_count = ctx.feature_count.min(ctx.columns).max(1);
    let candidates = rand::seq::index::sample(rng, ctx.columns, candidate_count);

    let mut best: Option<(usize, f64, f64)> = None;
    for column in candidates {
        let mut values: Vec<f64> = indices.iter().map(|&i| ctx.rows[i][column]).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        values.dedup();

        for pair in values.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;
            let mut left_total = 0;
            let mut left_positives = 0;
            for &i in indices {
                if ctx.rows[i][column] <= threshold {
                    left_total += 1;
                    left_positives += usize::from(ctx.labels[i] == 1);
                }
            }
            let right_total = indices.len() - left_total;
            let right_positives = positives - left_positives;
            let weighted = (left_total as f64 * gini(left_positives, left_total)
                + right_total as f64 * gini(right_positives, right_total))
                / indices.len() as f64;

            if best.map_or(weighted < parent_gini, |(_, _, g)| weighted < g) {
                best = Some((column, threshold, weighted));
            }
        }
    }

    let Some((column, threshold, _)) = best else {
        return TreeNode::Leaf { probability };
    };

    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| ctx.rows[i][column] <= threshold);

    TreeNode::Split {
        column,
        threshold,
        left: Box::new(grow_tree(ctx, &left_indices, depth + 1, rng)),
        right: Box::new(grow_tree(ctx, &right_indices, depth + 1, rng)),
    }
}

fn walk(node: &TreeNode, row: &[f64]) -> f64 {
    match node {
        TreeNode::Leaf { probability } => *probability,
        TreeNode::Split {
            column,
            threshold,
            left,
            right,
        } => {
            if row.get(*column).copied().unwrap_or(0.0) <= *threshold {
                walk(left, row)
            } else {
                walk(right, row)
            }
        }
    }
}

impl Classifier for RandomForest {
    fn init(&mut self, params: &ClassifierParams) -> Result<(), AppError> {
        self.tree_count = params.get_usize("tree-count")?;
        self.max_depth = params.get_usize("max-depth")?;
        self.min_leaf_size = params.get_usize("min-leaf-size")?;
        self.sample_ratio = params.get_f64("dt-sample-ratio")?;
        self.feature_count = params.get_usize("feature-count")?;

        if self.tree_count == 0 {
            return Err(AppError::ClassifierConfig(
                "tree-count must be at least 1".to_string(),
            ));
        }
        if self.sample_ratio <= 0.0 {
            return Err(AppError::ClassifierConfig(
                "dt-sample-ratio must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn train(&mut self, dataset: &DataSet) -> Result<(), AppError> {
        if dataset.is_empty() {
            return Err(AppError::Training(
                "refusing to train on an empty dataset".to_string(),
            ));
        }

        let mut ids: Vec<u64> = dataset
            .samples()
            .iter()
            .flat_map(|s| s.features.iter().map(|f| f.id))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        self.feature_index = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let rows: Vec<Vec<f64>> = dataset.samples().iter().map(|s| self.densify(s)).collect();
        let labels: Vec<u8> = dataset.samples().iter().map(|s| s.label).collect();

        let ctx = GrowContext {
            rows: &rows,
            labels: &labels,
            max_depth: self.max_depth,
            min_leaf_size: self.min_leaf_size,
            feature_count: self.feature_count,
            columns: ids.len(),
        };

        let bag_size = ((rows.len() as f64 * self.sample_ratio).round() as usize).max(1);
        let mut rng = StdRng::seed_from_u64(BOOTSTRAP_SEED);
        self.trees = (0..self.tree_count)
            .map(|_| {
                let bag: Vec<usize> = (0..bag_size).map(|_| rng.gen_range(0..rows.len())).collect();
                grow_tree(&ctx, &bag, 0, &mut rng)
            })
            .collect();

        debug!(
            trees = self.trees.len(),
            columns = ids.len(),
            samples = rows.len(),
            "random forest trained"
        );
        Ok(())
    }

    // Untrained forest scores every sample at 0.5.
    fn predict(&self, sample: &Sample) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let row = self.densify(sample);
        let total: f64 = self.trees.iter().map(|tree| walk(tree, &row)).sum();
        total / self.trees.len() as f64
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
