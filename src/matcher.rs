//! End-to-end matching pipeline: validate the questionnaire, score it,
//! rank careers through the ensemble (or the rule engine when no ensemble
//! is available), then attach a human-readable explanation to each pick.

use tracing::debug;
use uuid::Uuid;

use crate::chaside;
use crate::ensemble::{EnsembleRegistry, RankedCareer};
use crate::error::RecommendError;
use crate::features::{self, MISSING_AREA_DEFAULT};
use crate::models::{
    AcademicProfile, AcademicTier, CareerProfile, Category, CategoryScores, Explanation,
    QuestionnaireResponse, Recommendation,
};
use crate::rules::RuleFallbackEngine;

/// Tally at or above which a category counts as a strength (of 14).
const STRONG_TALLY: u32 = 8;

pub const DEFAULT_TOP_N: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    New,
    Scored,
    Matched,
    Explained,
    Failed,
}

pub struct CareerMatcher<'a> {
    ensemble: &'a EnsembleRegistry,
    rules: RuleFallbackEngine,
}

impl<'a> CareerMatcher<'a> {
    pub fn new(ensemble: &'a EnsembleRegistry) -> Self {
        Self {
            ensemble,
            rules: RuleFallbackEngine::new(),
        }
    }

    /// Produce the ranked, explained recommendations for one student.
    ///
    /// The same inputs always produce the same output; there is no clock or
    /// unseeded randomness anywhere downstream.
    pub fn recommend(
        &self,
        student_id: Uuid,
        response: &QuestionnaireResponse,
        academic: &AcademicProfile,
        careers: &[CareerProfile],
        top_n: usize,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        let mut phase = Phase::New;
        debug!(%student_id, ?phase, "matching started");

        if !response.is_complete() {
            phase = Phase::Failed;
            debug!(%student_id, ?phase, answered = response.answered(), "incomplete questionnaire");
            return Err(RecommendError::IncompleteQuestionnaire {
                answered: response.answered(),
                required: QuestionnaireResponse::MIN_ANSWERED,
            });
        }
        if careers.is_empty() {
            phase = Phase::Failed;
            debug!(%student_id, ?phase, "no careers to match against");
            return Err(RecommendError::NoCareers);
        }

        let scores = chaside::score(response);
        let features = features::build(academic, &scores);
        phase = Phase::Scored;
        debug!(
            %student_id,
            ?phase,
            dominant = %features.dominant().code(),
            academic_level = features.academic_level(),
            "questionnaire scored"
        );

        let ranked = self.rank(&features, careers, top_n);
        if ranked.is_empty() {
            phase = Phase::Failed;
            debug!(%student_id, ?phase, "no ranking produced");
            return Err(RecommendError::MatchingFailed);
        }
        phase = Phase::Matched;
        debug!(%student_id, ?phase, candidates = ranked.len(), "careers ranked");

        let recommendations: Vec<Recommendation> = ranked
            .into_iter()
            .enumerate()
            .map(|(i, pick)| {
                let explanation = explain(&pick, careers, academic, &scores);
                Recommendation {
                    student_id,
                    career_id: pick.career_id,
                    score: pick.score,
                    rank: (i + 1) as u32,
                    contributing_model: pick.contributing_model,
                    explanation,
                }
            })
            .collect();
        phase = Phase::Explained;
        debug!(%student_id, ?phase, count = recommendations.len(), "explanations attached");

        Ok(recommendations)
    }

    /// Ensemble when any variant is active, rules otherwise. An ensemble that
    /// votes nobody also falls through to the rules.
    fn rank(
        &self,
        features: &crate::features::FeatureVector,
        careers: &[CareerProfile],
        top_n: usize,
    ) -> Vec<RankedCareer> {
        if self.ensemble.active_count() > 0 {
            let ranked = self.ensemble.recommend(features, careers, top_n);
            if !ranked.is_empty() {
                return ranked;
            }
        }
        self.rules.recommend(features, careers, top_n)
    }
}

fn explain(
    pick: &RankedCareer,
    careers: &[CareerProfile],
    academic: &AcademicProfile,
    scores: &CategoryScores,
) -> Explanation {
    let (career_name, faculty_name) = careers
        .iter()
        .find(|c| c.id == pick.career_id)
        .map(|c| (c.name.clone(), c.faculty.clone()))
        .unwrap_or_default();

    let mut totals = [0u32; 7];
    for cat in Category::ALL {
        totals[cat.index()] = scores.get(&cat).map(|s| s.total()).unwrap_or(0);
    }
    let dominant = features::dominant_category(&totals);
    let dominant_score = totals[dominant.index()];

    let strong_categories: Vec<Category> = Category::ALL
        .into_iter()
        .filter(|cat| totals[cat.index()] >= STRONG_TALLY)
        .collect();

    let academic_average = academic.overall_average().unwrap_or(MISSING_AREA_DEFAULT);
    let tier = AcademicTier::from_average(academic_average);
    let compatibility_pct = (pick.score * 1000.0).round() / 10.0;

    let summary = format!(
        "{} fits your dominant {} profile ({}/14). Academic record is {} ({:.1}/100). Estimated compatibility {:.1}%.",
        career_name,
        dominant.display_name(),
        dominant_score,
        tier.label(),
        academic_average,
        compatibility_pct,
    );

    Explanation {
        career_name,
        faculty_name,
        compatibility_pct,
        dominant_category: dominant,
        dominant_category_name: dominant.display_name().to_string(),
        dominant_score,
        academic_average,
        academic_tier: tier.label().to_string(),
        strong_categories,
        contributing_model: pick.contributing_model.clone(),
        summary,
    }
}
