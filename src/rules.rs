//! Deterministic rule path used whenever no trained ensemble is available:
//! the shared top-3 dot-product base plus small academic, affinity, and
//! consistency bonuses.

use crate::ensemble::RankedCareer;
use crate::features::{FeatureVector, MAX_TOTAL_VARIANCE};
use crate::models::{CareerProfile, Category};
use crate::predictor::rule_compatibility;

pub const RULES_MODEL_NAME: &str = "rules";

/// Career-name keywords that pair with a dominant category.
const AFFINITY_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::I, &["ingenieria", "sistemas", "industrial"]),
    (Category::S, &["medicina", "enfermeria", "salud"]),
    (Category::C, &["administracion", "contabilidad", "economia"]),
    (Category::H, &["psicologia", "derecho", "comunicacion"]),
];

#[derive(Debug, Default)]
pub struct RuleFallbackEngine;

impl RuleFallbackEngine {
    pub fn new() -> Self {
        Self
    }

    /// Rank `careers` for one student. Same shape as the ensemble vote so the
    /// orchestrator treats both paths identically.
    pub fn recommend(
        &self,
        features: &FeatureVector,
        careers: &[CareerProfile],
        top_n: usize,
    ) -> Vec<RankedCareer> {
        let base = rule_compatibility(features, careers);
        let average = overall_average(features);
        let tier_bonus = academic_bonus(average);
        let spread_bonus = consistency_bonus(features);
        let dominant = features.dominant();

        let mut ranked: Vec<RankedCareer> = base
            .into_iter()
            .map(|(career_id, score)| {
                let affinity = careers
                    .iter()
                    .find(|c| c.id == career_id)
                    .map(|c| affinity_bonus(dominant, &c.name))
                    .unwrap_or(0.0);
                let total = (score + tier_bonus + affinity + spread_bonus).min(1.0);
                debug_assert!((0.0..=1.0).contains(&total));
                RankedCareer {
                    career_id,
                    score: total,
                    contributing_model: RULES_MODEL_NAME.to_string(),
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(top_n);
        ranked
    }
}

/// Mean of the six academic slots, back on the 0-100 scale.
fn overall_average(features: &FeatureVector) -> f64 {
    (0..6).map(|i| features.academic(i)).sum::<f64>() / 6.0 * 100.0
}

fn academic_bonus(average: f64) -> f64 {
    if average >= 85.0 {
        0.15
    } else if average >= 75.0 {
        0.10
    } else if average >= 65.0 {
        0.05
    } else {
        0.0
    }
}

fn affinity_bonus(dominant: Category, career_name: &str) -> f64 {
    let normalized = normalize(career_name);
    let matched = AFFINITY_KEYWORDS
        .iter()
        .find(|(cat, _)| *cat == dominant)
        .map(|(_, keywords)| keywords.iter().any(|k| normalized.contains(k)))
        .unwrap_or(false);
    if matched {
        0.05
    } else {
        0.0
    }
}

fn consistency_bonus(features: &FeatureVector) -> f64 {
    let variance = (1.0 - features.consistency()) * MAX_TOTAL_VARIANCE;
    if variance <= 2.0 {
        0.05
    } else if variance <= 4.0 {
        0.03
    } else {
        0.0
    }
}

/// Lowercase with Spanish accents folded so keyword matching sees
/// "Ingeniería" and "ingenieria" as the same word.
fn normalize(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}
