//! Decision tree variant: gini-impurity CART with the same shallow
//! hyperparameters the original advisor ran (depth 5, split 5, leaf 2).
//! Leaves hold a class-probability distribution rather than a single label
//! so compatibility scores stay graded.

use serde::{Deserialize, Serialize};

use crate::error::PredictorError;
use crate::features::FeatureVector;
use crate::models::CareerProfile;
use crate::predictor::{
    accuracy, distinct_labels, holdout_split, restored_width_ok, rule_compatibility,
    sort_descending, Predictor, Scaler,
};
use crate::store::ModelStore;

const BLOB_NAME: &str = "tree";
const MAX_DEPTH: usize = 5;
const MIN_SAMPLES_SPLIT: usize = 5;
const MIN_SAMPLES_LEAF: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        /// Probability per class, aligned with `FittedTree::classes`.
        probs: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn probabilities<'a>(&'a self, row: &[f64]) -> &'a [f64] {
        match self {
            Node::Leaf { probs } => probs,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.probabilities(row)
                } else {
                    right.probabilities(row)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedTree {
    scaler: Scaler,
    classes: Vec<u32>,
    root: Node,
}

impl FittedTree {
    fn predict_label(&self, row: &[f64]) -> u32 {
        let probs = self.root.probabilities(row);
        let mut best = 0;
        for (i, p) in probs.iter().enumerate() {
            if *p > probs[best] {
                best = i;
            }
        }
        self.classes[best]
    }
}

fn gini(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let mut impurity = 1.0;
    for count in counts {
        let p = *count as f64 / total as f64;
        impurity -= p * p;
    }
    impurity
}

fn class_counts(targets: &[usize], class_count: usize) -> Vec<usize> {
    let mut counts = vec![0usize; class_count];
    for t in targets {
        counts[*t] += 1;
    }
    counts
}

fn leaf(targets: &[usize], class_count: usize) -> Node {
    let counts = class_counts(targets, class_count);
    let total = targets.len().max(1) as f64;
    Node::Leaf {
        probs: counts.iter().map(|c| *c as f64 / total).collect(),
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

fn find_best_split(rows: &[&[f64]], targets: &[usize], class_count: usize) -> Option<BestSplit> {
    let width = rows.first()?.len();
    let parent = gini(&class_counts(targets, class_count));
    let mut best: Option<BestSplit> = None;

    for feature in 0..width {
        let mut values: Vec<f64> = rows.iter().map(|r| r[feature]).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values.dedup();

        for pair in values.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;
            let mut left = Vec::new();
            let mut right = Vec::new();
            for (row, target) in rows.iter().zip(targets) {
                if row[feature] <= threshold {
                    left.push(*target);
                } else {
                    right.push(*target);
                }
            }
            if left.len() < MIN_SAMPLES_LEAF || right.len() < MIN_SAMPLES_LEAF {
                continue;
            }
            let n = targets.len() as f64;
            let weighted = gini(&class_counts(&left, class_count)) * left.len() as f64 / n
                + gini(&class_counts(&right, class_count)) * right.len() as f64 / n;
            if weighted + 1e-12 >= parent {
                continue;
            }
            if best.as_ref().map(|b| weighted < b.impurity).unwrap_or(true) {
                best = Some(BestSplit {
                    feature,
                    threshold,
                    impurity: weighted,
                });
            }
        }
    }

    best
}

fn grow(rows: &[&[f64]], targets: &[usize], class_count: usize, depth: usize) -> Node {
    let pure = targets.windows(2).all(|w| w[0] == w[1]);
    if depth >= MAX_DEPTH || targets.len() < MIN_SAMPLES_SPLIT || pure {
        return leaf(targets, class_count);
    }
    let Some(split) = find_best_split(rows, targets, class_count) else {
        return leaf(targets, class_count);
    };

    let mut left_rows = Vec::new();
    let mut left_targets = Vec::new();
    let mut right_rows = Vec::new();
    let mut right_targets = Vec::new();
    for (row, target) in rows.iter().zip(targets) {
        if row[split.feature] <= split.threshold {
            left_rows.push(*row);
            left_targets.push(*target);
        } else {
            right_rows.push(*row);
            right_targets.push(*target);
        }
    }

    Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(grow(&left_rows, &left_targets, class_count, depth + 1)),
        right: Box::new(grow(&right_rows, &right_targets, class_count, depth + 1)),
    }
}

#[derive(Debug, Default)]
pub struct TreeModel {
    fitted: Option<FittedTree>,
}

impl TreeModel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Predictor for TreeModel {
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
        let targets: Vec<usize> = split
            .train_y
            .iter()
            .map(|label| classes.iter().position(|c| c == label).unwrap_or(0))
            .collect();

        let rows: Vec<&[f64]> = scaled.iter().map(Vec::as_slice).collect();
        let root = grow(&rows, &targets, classes.len(), 0);
        let fitted = FittedTree {
            scaler,
            classes,
            root,
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
        let scaled = fitted.scaler.transform(features);
        let probs = fitted.root.probabilities(&scaled);
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
            .load_blob::<FittedTree>(BLOB_NAME)
            .filter(|f| restored_width_ok(BLOB_NAME, &f.scaler));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::test_support::*;

    #[test]
    fn gini_of_pure_and_even_sets() {
        assert_eq!(gini(&[4, 0]), 0.0);
        assert!((gini(&[2, 2]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn trains_and_separates_two_classes() {
        let (x, y) = two_class_training_set();
        let mut model = TreeModel::new();
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
        let model = TreeModel::new();
        let careers = vec![career(1, "Ingenieria de Sistemas", engineering_weights())];
        assert_eq!(
            model.predict_compatibility(&technical_student(), &careers),
            rule_compatibility(&technical_student(), &careers)
        );
    }

    #[test]
    fn training_errors_on_degenerate_input() {
        let (x, _) = two_class_training_set();
        let mut model = TreeModel::new();
        assert!(model.train(&x, &vec![3; x.len()], &[]).is_err());
        assert!(!model.is_trained());
    }

    #[test]
    fn save_load_round_trip_preserves_predictions() {
        let tmp = tempfile::tempdir().unwrap();
        let store = crate::store::ModelStore::new(tmp.path());
        let (x, y) = two_class_training_set();
        let mut model = TreeModel::new();
        model.train(&x, &y, &[]).unwrap();
        model.save(&store).unwrap();

        let careers = vec![
            career(1, "Ingenieria de Sistemas", engineering_weights()),
            career(2, "Medicina", health_weights()),
        ];
        let before = model.predict_compatibility(&caring_student(), &careers);

        let mut restored = TreeModel::new();
        restored.load(&store);
        let after = restored.predict_compatibility(&caring_student(), &careers);
        assert_eq!(before, after);
    }
}
