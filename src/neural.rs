//! Single-hidden-layer network variant: 16 inputs, 32 ReLU units, softmax
//! output over the career labels seen in training. Weight init is seeded so
//! retraining on the same data reproduces the same network.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::PredictorError;
use crate::features::FeatureVector;
use crate::models::CareerProfile;
use crate::predictor::{
    accuracy, distinct_labels, holdout_split, restored_width_ok, rule_compatibility,
    sort_descending, Predictor, Scaler,
};
use crate::store::ModelStore;

const BLOB_NAME: &str = "neural";
const HIDDEN: usize = 32;
const EPOCHS: usize = 300;
const LEARNING_RATE: f64 = 0.05;
const INIT_SEED: u64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedNetwork {
    scaler: Scaler,
    classes: Vec<u32>,
    /// w1[hidden][input], w2[class][hidden]
    w1: Vec<Vec<f64>>,
    b1: Vec<f64>,
    w2: Vec<Vec<f64>>,
    b2: Vec<f64>,
}

impl FittedNetwork {
    fn hidden_activations(&self, row: &[f64]) -> Vec<f64> {
        self.w1
            .iter()
            .zip(&self.b1)
            .map(|(w, b)| {
                let z = w.iter().zip(row).map(|(wi, xi)| wi * xi).sum::<f64>() + b;
                z.max(0.0)
            })
            .collect()
    }

    fn probabilities(&self, row: &[f64]) -> Vec<f64> {
        let hidden = self.hidden_activations(row);
        let logits: Vec<f64> = self
            .w2
            .iter()
            .zip(&self.b2)
            .map(|(w, b)| w.iter().zip(&hidden).map(|(wi, hi)| wi * hi).sum::<f64>() + b)
            .collect();
        softmax(&logits)
    }

    fn predict_label(&self, row: &[f64]) -> u32 {
        let probs = self.probabilities(row);
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
pub struct NeuralModel {
    fitted: Option<FittedNetwork>,
}

impl NeuralModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn fit(scaler: Scaler, scaled: &[Vec<f64>], y: &[u32], classes: &[u32]) -> FittedNetwork {
        let width = scaled.first().map(Vec::len).unwrap_or(0);
        let class_count = classes.len();
        let mut rng = StdRng::seed_from_u64(INIT_SEED);
        let spread = (1.0 / width.max(1) as f64).sqrt();

        let mut net = FittedNetwork {
            scaler,
            classes: classes.to_vec(),
            w1: (0..HIDDEN)
                .map(|_| (0..width).map(|_| rng.gen_range(-spread..spread)).collect())
                .collect(),
            b1: vec![0.0; HIDDEN],
            w2: (0..class_count)
                .map(|_| {
                    (0..HIDDEN)
                        .map(|_| rng.gen_range(-spread..spread))
                        .collect()
                })
                .collect(),
            b2: vec![0.0; class_count],
        };

        let class_index: Vec<usize> = y
            .iter()
            .map(|label| classes.iter().position(|c| c == label).unwrap_or(0))
            .collect();
        let n = scaled.len() as f64;

        for _ in 0..EPOCHS {
            let mut grad_w1 = vec![vec![0.0; width]; HIDDEN];
            let mut grad_b1 = vec![0.0; HIDDEN];
            let mut grad_w2 = vec![vec![0.0; HIDDEN]; class_count];
            let mut grad_b2 = vec![0.0; class_count];

            for (row, target) in scaled.iter().zip(&class_index) {
                let hidden = net.hidden_activations(row);
                let logits: Vec<f64> = net
                    .w2
                    .iter()
                    .zip(&net.b2)
                    .map(|(w, b)| {
                        w.iter().zip(&hidden).map(|(wi, hi)| wi * hi).sum::<f64>() + b
                    })
                    .collect();
                let probs = softmax(&logits);

                let delta_out: Vec<f64> = probs
                    .iter()
                    .enumerate()
                    .map(|(c, p)| p - if c == *target { 1.0 } else { 0.0 })
                    .collect();

                for c in 0..class_count {
                    for (g, h) in grad_w2[c].iter_mut().zip(&hidden) {
                        *g += delta_out[c] * h;
                    }
                    grad_b2[c] += delta_out[c];
                }

                for h in 0..HIDDEN {
                    if hidden[h] <= 0.0 {
                        continue;
                    }
                    let delta_hidden: f64 =
                        (0..class_count).map(|c| delta_out[c] * net.w2[c][h]).sum();
                    for (g, x) in grad_w1[h].iter_mut().zip(row) {
                        *g += delta_hidden * x;
                    }
                    grad_b1[h] += delta_hidden;
                }
            }

            for h in 0..HIDDEN {
                for (w, g) in net.w1[h].iter_mut().zip(&grad_w1[h]) {
                    *w -= LEARNING_RATE * g / n;
                }
                net.b1[h] -= LEARNING_RATE * grad_b1[h] / n;
            }
            for c in 0..class_count {
                for (w, g) in net.w2[c].iter_mut().zip(&grad_w2[c]) {
                    *w -= LEARNING_RATE * g / n;
                }
                net.b2[c] -= LEARNING_RATE * grad_b2[c] / n;
            }
        }

        net
    }
}

impl Predictor for NeuralModel {
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
            .load_blob::<FittedNetwork>(BLOB_NAME)
            .filter(|f| restored_width_ok(BLOB_NAME, &f.scaler));
    }
}
