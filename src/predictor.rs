//! The predictor capability shared by the four ensemble variants: train on
//! (feature, career) pairs, rank candidate careers, persist as an opaque
//! blob. Untrained predictors degrade to a deterministic rule instead of
//! failing.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PredictorError;
use crate::features::{FeatureVector, FEATURE_LEN};
use crate::models::CareerProfile;
use crate::store::ModelStore;

/// Fixed shuffle seed so training is reproducible run to run.
pub const SPLIT_SEED: u64 = 42;

pub trait Predictor {
    fn name(&self) -> &'static str;

    fn is_trained(&self) -> bool;

    /// Fit on an 80% split of `(x, y)` and return held-out accuracy on the
    /// remaining 20%. `prior` is the historical (features, assigned career)
    /// table; only the KNN variant consumes it.
    fn train(
        &mut self,
        x: &[FeatureVector],
        y: &[u32],
        prior: &[(FeatureVector, u32)],
    ) -> Result<f64, PredictorError>;

    /// Compatibility of one student with every candidate career, sorted
    /// descending, stable on ties. Never fails: untrained variants fall back
    /// to [`rule_compatibility`].
    fn predict_compatibility(
        &self,
        features: &FeatureVector,
        careers: &[CareerProfile],
    ) -> Vec<(u32, f64)>;

    fn save(&self, store: &ModelStore) -> anyhow::Result<()>;

    /// Restore fitted state. A missing or corrupt blob leaves the predictor
    /// untrained; it must not fail the caller.
    fn load(&mut self, store: &ModelStore);
}

pub struct HoldoutSplit {
    pub train_x: Vec<FeatureVector>,
    pub train_y: Vec<u32>,
    pub test_x: Vec<FeatureVector>,
    pub test_y: Vec<u32>,
}

/// Seeded 80/20 shuffle split. At least one sample always lands in the test
/// partition.
pub fn holdout_split(x: &[FeatureVector], y: &[u32]) -> Result<HoldoutSplit, PredictorError> {
    if x.len() < 2 {
        return Err(PredictorError::NotEnoughSamples(x.len()));
    }
    if distinct_labels(y).len() < 2 {
        return Err(PredictorError::NotEnoughClasses);
    }

    let mut indices: Vec<usize> = (0..x.len()).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(SPLIT_SEED));

    let test_len = (x.len() / 5).max(1);
    let (test_idx, train_idx) = indices.split_at(test_len);

    Ok(HoldoutSplit {
        train_x: train_idx.iter().map(|i| x[*i]).collect(),
        train_y: train_idx.iter().map(|i| y[*i]).collect(),
        test_x: test_idx.iter().map(|i| x[*i]).collect(),
        test_y: test_idx.iter().map(|i| y[*i]).collect(),
    })
}

/// Sorted unique career labels.
pub fn distinct_labels(y: &[u32]) -> Vec<u32> {
    let mut labels = y.to_vec();
    labels.sort_unstable();
    labels.dedup();
    labels
}

pub fn accuracy(predicted: &[u32], truth: &[u32]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = predicted
        .iter()
        .zip(truth)
        .filter(|(p, t)| p == t)
        .count();
    hits as f64 / truth.len() as f64
}

/// Per-feature standardization fitted on the training split and persisted
/// inside each blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl Scaler {
    pub fn fit(rows: &[FeatureVector]) -> Self {
        let width = rows.first().map(|r| r.as_slice().len()).unwrap_or(0);
        let mut mean = vec![0.0; width];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row.as_slice()) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= rows.len().max(1) as f64;
        }

        let mut std = vec![0.0; width];
        for row in rows {
            for ((s, v), m) in std.iter_mut().zip(row.as_slice()).zip(&mean) {
                let d = v - m;
                *s += d * d;
            }
        }
        for s in &mut std {
            *s = (*s / rows.len().max(1) as f64).sqrt();
            if *s < 1e-12 {
                *s = 1.0;
            }
        }

        Self { mean, std }
    }

    pub fn transform(&self, features: &FeatureVector) -> Vec<f64> {
        features
            .as_slice()
            .iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn transform_all(&self, rows: &[FeatureVector]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }
}

/// Deterministic fallback shared by every variant: weighted dot-product of
/// the student's top-3 category tallies against the career's weights,
/// normalized by the weights actually used, then scaled to [0, 1].
pub fn rule_compatibility(
    features: &FeatureVector,
    careers: &[CareerProfile],
) -> Vec<(u32, f64)> {
    let top = features.top_categories(3);
    let mut results = Vec::with_capacity(careers.len());

    for career in careers {
        let mut weighted = 0.0;
        let mut weight_sum = 0.0;
        for (category, total) in &top {
            let weight = career.weights.weight(*category);
            if weight > 0.0 {
                weighted += total * weight;
                weight_sum += weight;
            }
        }
        let score = if weight_sum > 0.0 {
            ((weighted / weight_sum) / 14.0).clamp(0.0, 1.0)
        } else {
            0.0
        };
        results.push((career.id, score));
    }

    sort_descending(&mut results);
    results
}

/// Stable descending sort by score; equal scores keep their input order.
pub fn sort_descending(pairs: &mut [(u32, f64)]) {
    pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
}

/// True when a restored blob's scaler still matches the feature contract.
/// A stale blob from an older contract is discarded with a warning so the
/// variant reloads as untrained.
pub fn restored_width_ok(name: &str, scaler: &Scaler) -> bool {
    if scaler.width() == FEATURE_LEN {
        return true;
    }
    let err = PredictorError::FeatureMismatch {
        got: scaler.width(),
        expected: FEATURE_LEN,
    };
    warn!(model = name, error = %err, "discarding stale model blob");
    false
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::features::{build_from_parts, FeatureVector};
    use crate::models::{CareerProfile, CategoryWeights};

    pub fn career(id: u32, name: &str, weights: CategoryWeights) -> CareerProfile {
        CareerProfile {
            id,
            name: name.to_string(),
            faculty: "Engineering".to_string(),
            weights,
        }
    }

    pub fn engineering_weights() -> CategoryWeights {
        CategoryWeights {
            i: 0.9,
            e: 0.7,
            c: 0.4,
            ..Default::default()
        }
    }

    pub fn health_weights() -> CategoryWeights {
        CategoryWeights {
            s: 0.9,
            e: 0.6,
            h: 0.4,
            ..Default::default()
        }
    }

    /// Student leaning hard into engineering/exact sciences.
    pub fn technical_student() -> FeatureVector {
        build_from_parts(
            [Some(85.0), Some(75.0), Some(60.0), Some(60.0), Some(55.0), Some(60.0)],
            [6, 2, 1, 4, 12, 2, 10],
        )
    }

    /// Student leaning into health/humanities.
    pub fn caring_student() -> FeatureVector {
        build_from_parts(
            [Some(65.0), Some(80.0), Some(75.0), Some(70.0), Some(60.0), Some(65.0)],
            [4, 9, 3, 12, 2, 3, 6],
        )
    }

    /// Small linearly separable training set over two careers.
    pub fn two_class_training_set() -> (Vec<FeatureVector>, Vec<u32>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..10u32 {
            let bump = i % 3;
            x.push(build_from_parts(
                [Some(80.0 + bump as f64), Some(70.0), Some(60.0), Some(60.0), Some(55.0), Some(60.0)],
                [5, 2, 1, 3, 11 + (bump.min(3)), 2, 9],
            ));
            y.push(1);
            x.push(build_from_parts(
                [Some(60.0), Some(80.0), Some(75.0 + bump as f64), Some(70.0), Some(60.0), Some(65.0)],
                [3, 9, 2, 12 - bump.min(2), 2, 3, 5],
            ));
            y.push(2);
        }
        (x, y)
    }
}
