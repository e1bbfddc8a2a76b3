//! Multinomial logistic regression variant: standardized features, softmax
//! over the career labels seen in training, full-batch gradient descent.

use serde::{Deserialize, Serialize};

use crate::error::PredictorError;
use crate::features::FeatureVector;
use crate::models::CareerProfile;
use crate::predictor::{
    accuracy, distinct_labels, holdout_split, restored_width_ok, rule_compatibility,
    sort_descending, Predictor, Scaler,
};
use crate::store::ModelStore;

const BLOB_NAME: &str = "logistic";
const EPOCHS: usize = 400;
const LEARNING_RATE: f64 = 0.1;
const L2: f64 = 1e-4;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedLogistic {
    scaler: Scaler,
    classes: Vec<u32>,
    /// weights[class][feature]
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

impl FittedLogistic {
    fn probabilities(&self, scaled: &[f64]) -> Vec<f64> {
        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(scaled).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect();
        softmax(&logits)
    }

    fn predict_label(&self, scaled: &[f64]) -> u32 {
        let probs = self.probabilities(scaled);
        let mut best = 0;
        for (i, p) in probs.iter().enumerate() {
            if *p > probs[best] {
                best = i;
            }
        }
        self.classes[best]
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

#[derive(Debug, Default)]
pub struct LogisticModel {
    fitted: Option<FittedLogistic>,
}

impl LogisticModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn fit(scaler: Scaler, scaled: &[Vec<f64>], y: &[u32], classes: &[u32]) -> FittedLogistic {
        let width = scaled.first().map(Vec::len).unwrap_or(0);
        let class_count = classes.len();
        let mut weights = vec![vec![0.0; width]; class_count];
        let mut bias = vec![0.0; class_count];
        let class_index: Vec<usize> = y
            .iter()
            .map(|label| classes.iter().position(|c| c == label).unwrap_or(0))
            .collect();
        let n = scaled.len() as f64;

        for _ in 0..EPOCHS {
            let mut grad_w = vec![vec![0.0; width]; class_count];
            let mut grad_b = vec![0.0; class_count];

            for (row, target) in scaled.iter().zip(&class_index) {
                let logits: Vec<f64> = weights
                    .iter()
                    .zip(&bias)
                    .map(|(w, b)| w.iter().zip(row).map(|(wi, xi)| wi * xi).sum::<f64>() + b)
                    .collect();
                let probs = softmax(&logits);
                for c in 0..class_count {
                    let error = probs[c] - if c == *target { 1.0 } else { 0.0 };
                    for (g, x) in grad_w[c].iter_mut().zip(row) {
                        *g += error * x;
                    }
                    grad_b[c] += error;
                }
            }

            for c in 0..class_count {
                for (w, g) in weights[c].iter_mut().zip(&grad_w[c]) {
                    *w -= LEARNING_RATE * (g / n + L2 * *w);
                }
                bias[c] -= LEARNING_RATE * grad_b[c] / n;
            }
        }

        FittedLogistic {
            scaler,
            classes: classes.to_vec(),
            weights,
            bias,
        }
    }
}

impl Predictor for LogisticModel {
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
        _prior: &[(FeatureVector, u32)],
    ) -> Result<f64, PredictorError> {
        let split = holdout_split(x, y)?;
        let scaler = Scaler::fit(&split.train_x);
        let scaled = scaler.transform_all(&split.train_x);
        let classes = distinct_labels(y);

        let fitted = Self::fit(scaler, &scaled, &split.train_y, &classes);

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
        let probs = fitted.probabilities(&fitted.scaler.transform(features));
        let mut results: Vec<(u32, f64)> = careers
            .iter()
            .map(|career| {
                let score = fitted
                    .classes
                    .iter()
                    .position(|c| *c == career.id)
                    .map(|i| probs[i])
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
            .load_blob::<FittedLogistic>(BLOB_NAME)
            .filter(|f| restored_width_ok(BLOB_NAME, &f.scaler));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::test_support::*;

    #[test]
    fn trains_and_separates_two_classes() {
        let (x, y) = two_class_training_set();
        let mut model = LogisticModel::new();
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
    fn untrained_uses_rule_fallback() {
        let model = LogisticModel::new();
        let careers = vec![
            career(1, "Ingenieria de Sistemas", engineering_weights()),
            career(2, "Medicina", health_weights()),
        ];
        let ranked = model.predict_compatibility(&technical_student(), &careers);
        assert_eq!(ranked, rule_compatibility(&technical_student(), &careers));
    }

    #[test]
    fn unseen_career_scores_zero() {
        let (x, y) = two_class_training_set();
        let mut model = LogisticModel::new();
        model.train(&x, &y, &[]).unwrap();
        let careers = vec![career(99, "Arquitectura", Default::default())];
        let ranked = model.predict_compatibility(&technical_student(), &careers);
        assert_eq!(ranked, vec![(99, 0.0)]);
    }

    #[test]
    fn save_load_round_trip_preserves_predictions() {
        let tmp = tempfile::tempdir().unwrap();
        let store = crate::store::ModelStore::new(tmp.path());
        let (x, y) = two_class_training_set();
        let mut model = LogisticModel::new();
        model.train(&x, &y, &[]).unwrap();
        model.save(&store).unwrap();

        let careers = vec![
            career(1, "Ingenieria de Sistemas", engineering_weights()),
            career(2, "Medicina", health_weights()),
        ];
        let before = model.predict_compatibility(&technical_student(), &careers);

        let mut restored = LogisticModel::new();
        restored.load(&store);
        assert!(restored.is_trained());
        let after = restored.predict_compatibility(&technical_student(), &careers);
        assert_eq!(before, after);
    }
}
