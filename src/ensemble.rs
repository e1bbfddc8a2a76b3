//! Ensemble coordination: four predictor variants voting with
//! accuracy-proportional weights. Variants that fail to train are dropped
//! from the vote instead of failing the whole run.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::features::FeatureVector;
use crate::knn::KnnModel;
use crate::logistic::LogisticModel;
use crate::models::CareerProfile;
use crate::neural::NeuralModel;
use crate::predictor::Predictor;
use crate::store::ModelStore;
use crate::tree::TreeModel;

const STATE_BLOB: &str = "ensemble";

/// One career's aggregated position in the ensemble vote.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCareer {
    pub career_id: u32,
    pub score: f64,
    /// The variant whose raw score for this career was largest.
    pub contributing_model: String,
}

struct Member {
    predictor: Box<dyn Predictor>,
    weight: f64,
    accuracy: f64,
    active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct EnsembleState {
    weights: Vec<(String, f64)>,
    accuracies: Vec<(String, f64)>,
}

pub struct EnsembleRegistry {
    members: Vec<Member>,
}

impl Default for EnsembleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EnsembleRegistry {
    pub fn new() -> Self {
        let predictors: Vec<Box<dyn Predictor>> = vec![
            Box::new(LogisticModel::new()),
            Box::new(TreeModel::new()),
            Box::new(KnnModel::new()),
            Box::new(NeuralModel::new()),
        ];
        let uniform = 1.0 / predictors.len() as f64;
        Self {
            members: predictors
                .into_iter()
                .map(|predictor| Member {
                    predictor,
                    weight: uniform,
                    accuracy: 0.0,
                    active: false,
                })
                .collect(),
        }
    }

    /// Train every variant on the same data and rebalance the vote. Returns
    /// how many variants survived training.
    pub fn train_all(
        &mut self,
        x: &[FeatureVector],
        y: &[u32],
        prior: &[(FeatureVector, u32)],
    ) -> usize {
        for member in &mut self.members {
            match member.predictor.train(x, y, prior) {
                Ok(accuracy) => {
                    info!(
                        model = member.predictor.name(),
                        accuracy, "variant trained"
                    );
                    member.accuracy = accuracy;
                    member.active = true;
                }
                Err(err) => {
                    warn!(
                        model = member.predictor.name(),
                        error = %err,
                        "variant dropped from ensemble"
                    );
                    member.accuracy = 0.0;
                    member.active = false;
                }
            }
        }
        self.rebalance();
        self.active_count()
    }

    /// Accuracy-proportional weights over active variants. When every active
    /// variant scored zero the vote is uniform over them; inactive variants
    /// always weigh zero.
    fn rebalance(&mut self) {
        let active: Vec<f64> = self
            .members
            .iter()
            .filter(|m| m.active)
            .map(|m| m.accuracy)
            .collect();
        let balanced = balanced_weights(&active);

        let mut next = balanced.into_iter();
        for member in &mut self.members {
            member.weight = if member.active {
                next.next().unwrap_or(0.0)
            } else {
                0.0
            };
        }
    }

    pub fn active_count(&self) -> usize {
        self.members.iter().filter(|m| m.active).count()
    }

    pub fn weights(&self) -> Vec<(&'static str, f64)> {
        self.members
            .iter()
            .map(|m| (m.predictor.name(), m.weight))
            .collect()
    }

    pub fn accuracies(&self) -> Vec<(&'static str, f64)> {
        self.members
            .iter()
            .map(|m| (m.predictor.name(), m.accuracy))
            .collect()
    }

    /// Weighted vote over the active variants. Each variant contributes its
    /// strongest `2 * top_n` candidates; per-career weighted scores are
    /// summed. Empty when no variant is active.
    pub fn recommend(
        &self,
        features: &FeatureVector,
        careers: &[CareerProfile],
        top_n: usize,
    ) -> Vec<RankedCareer> {
        let fetch = top_n * 2;
        let mut pool: Vec<(u32, f64, &'static str, f64)> = Vec::new();

        for member in self.members.iter().filter(|m| m.active && m.weight > 0.0) {
            let mut ranked = member.predictor.predict_compatibility(features, careers);
            ranked.truncate(fetch);
            for (career_id, raw) in ranked {
                let weighted = raw * member.weight;
                match pool.iter_mut().find(|entry| entry.0 == career_id) {
                    Some(entry) => {
                        entry.1 += weighted;
                        if raw > entry.3 {
                            entry.2 = member.predictor.name();
                            entry.3 = raw;
                        }
                    }
                    None => pool.push((career_id, weighted, member.predictor.name(), raw)),
                }
            }
        }

        pool.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        pool.truncate(top_n);
        pool.into_iter()
            .map(|(career_id, score, model, _)| RankedCareer {
                career_id,
                score,
                contributing_model: model.to_string(),
            })
            .collect()
    }

    pub fn save_all(&self, store: &ModelStore) -> anyhow::Result<()> {
        for member in &self.members {
            member.predictor.save(store)?;
        }
        let state = EnsembleState {
            weights: self
                .members
                .iter()
                .map(|m| (m.predictor.name().to_string(), m.weight))
                .collect(),
            accuracies: self
                .members
                .iter()
                .map(|m| (m.predictor.name().to_string(), m.accuracy))
                .collect(),
        };
        store.save_blob(STATE_BLOB, &state)
    }

    /// Restore fitted variants and the persisted vote. Variants whose blob is
    /// missing or unreadable stay inactive.
    pub fn load_all(&mut self, store: &ModelStore) {
        let state: Option<EnsembleState> = store.load_blob(STATE_BLOB);
        for member in &mut self.members {
            member.predictor.load(store);
            member.active = member.predictor.is_trained();
            let name = member.predictor.name();
            if let Some(state) = &state {
                if let Some((_, w)) = state.weights.iter().find(|(n, _)| n == name) {
                    member.weight = *w;
                }
                if let Some((_, a)) = state.accuracies.iter().find(|(n, _)| n == name) {
                    member.accuracy = *a;
                }
            }
        }
        // The stored vote may reference variants that failed to load.
        self.rebalance();
    }
}

/// Weights proportional to accuracy, uniform when every accuracy is zero.
fn balanced_weights(accuracies: &[f64]) -> Vec<f64> {
    if accuracies.is_empty() {
        return Vec::new();
    }
    let total: f64 = accuracies.iter().filter(|a| **a > 0.0).sum();
    if total > 0.0 {
        accuracies
            .iter()
            .map(|a| if *a > 0.0 { a / total } else { 0.0 })
            .collect()
    } else {
        vec![1.0 / accuracies.len() as f64; accuracies.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::test_support::*;

    fn catalog() -> Vec<CareerProfile> {
        vec![
            career(1, "Ingenieria de Sistemas", engineering_weights()),
            career(2, "Medicina", health_weights()),
        ]
    }

    #[test]
    fn balanced_weights_are_proportional() {
        let weights = balanced_weights(&[0.8, 0.2, 0.0]);
        assert!((weights[0] - 0.8).abs() < 1e-12);
        assert!((weights[1] - 0.2).abs() < 1e-12);
        assert_eq!(weights[2], 0.0);
    }

    #[test]
    fn balanced_weights_uniform_when_all_zero() {
        let weights = balanced_weights(&[0.0, 0.0]);
        assert_eq!(weights, vec![0.5, 0.5]);
    }

    #[test]
    fn fresh_registry_votes_empty() {
        let registry = EnsembleRegistry::new();
        assert_eq!(registry.active_count(), 0);
        assert!(registry
            .recommend(&technical_student(), &catalog(), 3)
            .is_empty());
    }

    #[test]
    fn training_activates_variants_and_normalizes_weights() {
        let (x, y) = two_class_training_set();
        let mut registry = EnsembleRegistry::new();
        let active = registry.train_all(&x, &y, &[]);
        assert_eq!(active, 4);

        let sum: f64 = registry.weights().iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(registry.weights().iter().all(|(_, w)| *w >= 0.0));
    }

    #[test]
    fn recommend_ranks_matching_career_first() {
        let (x, y) = two_class_training_set();
        let mut registry = EnsembleRegistry::new();
        registry.train_all(&x, &y, &[]);

        let ranked = registry.recommend(&technical_student(), &catalog(), 2);
        assert!(!ranked.is_empty());
        assert_eq!(ranked[0].career_id, 1);
        assert!(!ranked[0].contributing_model.is_empty());

        let ranked = registry.recommend(&caring_student(), &catalog(), 2);
        assert_eq!(ranked[0].career_id, 2);
    }

    #[test]
    fn recommend_truncates_to_requested_count() {
        let (x, y) = two_class_training_set();
        let mut registry = EnsembleRegistry::new();
        registry.train_all(&x, &y, &[]);
        let ranked = registry.recommend(&technical_student(), &catalog(), 1);
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn recommend_is_deterministic() {
        let (x, y) = two_class_training_set();
        let mut registry = EnsembleRegistry::new();
        registry.train_all(&x, &y, &[]);
        let first = registry.recommend(&technical_student(), &catalog(), 2);
        let second = registry.recommend(&technical_student(), &catalog(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn save_load_restores_vote_and_predictions() {
        let tmp = tempfile::tempdir().unwrap();
        let store = crate::store::ModelStore::new(tmp.path());

        let (x, y) = two_class_training_set();
        let mut registry = EnsembleRegistry::new();
        registry.train_all(&x, &y, &[]);
        registry.save_all(&store).unwrap();
        let before = registry.recommend(&technical_student(), &catalog(), 2);

        let mut restored = EnsembleRegistry::new();
        restored.load_all(&store);
        assert_eq!(restored.active_count(), 4);
        let after = restored.recommend(&technical_student(), &catalog(), 2);
        assert_eq!(before, after);
    }

    #[test]
    fn load_from_empty_store_stays_inactive() {
        let tmp = tempfile::tempdir().unwrap();
        let store = crate::store::ModelStore::new(tmp.path());
        let mut registry = EnsembleRegistry::new();
        registry.load_all(&store);
        assert_eq!(registry.active_count(), 0);
        assert!(registry
            .recommend(&technical_student(), &catalog(), 3)
            .is_empty());
    }
}
