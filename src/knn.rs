//! Nearest-neighbour variant: keeps a standardized table of historical
//! (features, assigned career) rows and scores a student by the
//! distance-weighted vote of the 5 closest rows.

use serde::{Deserialize, Serialize};

use crate::error::PredictorError;
use crate::features::FeatureVector;
use crate::models::CareerProfile;
use crate::predictor::{
    accuracy, holdout_split, restored_width_ok, rule_compatibility, sort_descending, Predictor,
    Scaler,
};
use crate::store::ModelStore;

const BLOB_NAME: &str = "knn";
const K: usize = 5;
/// Below this many stored rows the vote is too noisy to trust.
const MIN_NEIGHBORS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedKnn {
    scaler: Scaler,
    rows: Vec<Vec<f64>>,
    labels: Vec<u32>,
}

impl FittedKnn {
    /// Distance-weighted vote share per label among the k nearest rows.
    fn vote(&self, scaled: &[f64]) -> Vec<(u32, f64)> {
        let mut distances: Vec<(usize, f64)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| (i, euclidean(row, scaled)))
            .collect();
        distances.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        distances.truncate(K);

        let mut votes: Vec<(u32, f64)> = Vec::new();
        let mut total = 0.0;
        for (i, distance) in &distances {
            let weight = 1.0 / (distance + 1e-6);
            total += weight;
            let label = self.labels[*i];
            match votes.iter_mut().find(|(l, _)| *l == label) {
                Some((_, w)) => *w += weight,
                None => votes.push((label, weight)),
            }
        }
        for (_, w) in &mut votes {
            *w /= total;
        }
        votes
    }

    fn predict_label(&self, scaled: &[f64]) -> u32 {
        let votes = self.vote(scaled);
        votes
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(label, _)| *label)
            .unwrap_or(0)
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[derive(Debug, Default)]
pub struct KnnModel {
    fitted: Option<FittedKnn>,
}

impl KnnModel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Predictor for KnnModel {
    fn name(&self) -> &'static str {
        BLOB_NAME
    }

    fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    fn train(
        &mut self,
        x: &[FeatureVector],
        y: &[u32],
        prior: &[(FeatureVector, u32)],
    ) -> Result<f64, PredictorError> {
        let split = holdout_split(x, y)?;

        // Prefer the historical assignment table; fall back to the training
        // split itself when no history exists yet.
        let (table_x, table_y): (Vec<FeatureVector>, Vec<u32>) = if prior.len() >= MIN_NEIGHBORS {
            prior.iter().cloned().unzip()
        } else {
            (split.train_x.clone(), split.train_y.clone())
        };
        if table_x.len() < MIN_NEIGHBORS {
            return Err(PredictorError::NotEnoughSamples(table_x.len()));
        }

        let scaler = Scaler::fit(&table_x);
        let rows = scaler.transform_all(&table_x);
        let fitted = FittedKnn {
            scaler,
            rows,
            labels: table_y,
        };

        let predicted: Vec<u32> = split
            .test_x
            .iter()
            .map(|row| fitted.predict_label(&fitted.scaler.transform(row)))
            .collect();
        let score = accuracy(&predicted, &split.test_y);

        self.fitted = Some(fitted);
        Ok(score)
    }

    fn predict_compatibility(
        &self,
        features: &FeatureVector,
        careers: &[CareerProfile],
    ) -> Vec<(u32, f64)> {
        let Some(fitted) = &self.fitted else {
            return rule_compatibility(features, careers);
        };
        let votes = fitted.vote(&fitted.scaler.transform(features));
        let mut results: Vec<(u32, f64)> = careers
            .iter()
            .map(|career| {
                let score = votes
                    .iter()
                    .find(|(label, _)| *label == career.id)
                    .map(|(_, share)| *share)
                    .unwrap_or(0.0);
                (career.id, score)
            })
            .collect();
        sort_descending(&mut results);
        results
    }

    fn save(&self, store: &ModelStore) -> anyhow::Result<()> {
        if let Some(fitted) = &self.fitted {
            store.save_blob(BLOB_NAME, fitted)?;
        }
        Ok(())
    }

    fn load(&mut self, store: &ModelStore) {
        self.fitted = store
            .load_blob::<FittedKnn>(BLOB_NAME)
            .filter(|f| restored_width_ok(BLOB_NAME, &f.scaler));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::test_support::*;

    #[test]
    fn euclidean_distance_basics() {
        assert_eq!(euclidean(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(euclidean(&[1.0], &[1.0]), 0.0);
    }

    #[test]
    fn trains_and_separates_two_classes() {
        let (x, y) = two_class_training_set();
        let mut model = KnnModel::new();
        let acc = model.train(&x, &y, &[]).unwrap();
        assert!(model.is_trained());
        assert!((0.0..=1.0).contains(&acc));

        let careers = vec![
            career(1, "Ingenieria de Sistemas", engineering_weights()),
            career(2, "Medicina", health_weights()),
        ];
        let ranked = model.predict_compatibility(&technical_student(), &careers);
        assert_eq!(ranked[0].0, 1);
        let ranked = model.predict_compatibility(&caring_student(), &careers);
        assert_eq!(ranked[0].0, 2);
    }

    #[test]
    fn prefers_prior_table_when_large_enough() {
        let (x, y) = two_class_training_set();
        // History that disagrees with the training labels: every stored row
        // was assigned career 7.
        let prior: Vec<(FeatureVector, u32)> = x.iter().map(|f| (*f, 7)).collect();
        let mut model = KnnModel::new();
        model.train(&x, &y, &prior).unwrap();

        let careers = vec![
            career(1, "Ingenieria de Sistemas", engineering_weights()),
            career(7, "Historia", Default::default()),
        ];
        let ranked = model.predict_compatibility(&technical_student(), &careers);
        assert_eq!(ranked[0], (7, 1.0));
    }

    #[test]
    fn untrained_uses_rule_fallback() {
        let model = KnnModel::new();
        let careers = vec![career(1, "Ingenieria de Sistemas", engineering_weights())];
        assert_eq!(
            model.predict_compatibility(&technical_student(), &careers),
            rule_compatibility(&technical_student(), &careers)
        );
    }

    #[test]
    fn vote_shares_sum_to_one() {
        let (x, y) = two_class_training_set();
        let mut model = KnnModel::new();
        model.train(&x, &y, &[]).unwrap();
        let fitted = model.fitted.as_ref().unwrap();
        let votes = fitted.vote(&fitted.scaler.transform(&technical_student()));
        let sum: f64 = votes.iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn save_load_round_trip_preserves_predictions() {
        let tmp = tempfile::tempdir().unwrap();
        let store = crate::store::ModelStore::new(tmp.path());
        let (x, y) = two_class_training_set();
        let mut model = KnnModel::new();
        model.train(&x, &y, &[]).unwrap();
        model.save(&store).unwrap();

        let careers = vec![
            career(1, "Ingenieria de Sistemas", engineering_weights()),
            career(2, "Medicina", health_weights()),
        ];
        let before = model.predict_compatibility(&technical_student(), &careers);

        let mut restored = KnnModel::new();
        restored.load(&store);
        let after = restored.predict_compatibility(&technical_student(), &careers);
        assert_eq!(before, after);
    }
}
