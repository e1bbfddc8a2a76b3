//! Feature assembly: one fixed-order numeric vector per student, shared by
//! every predictor. The slot order is a frozen contract; changing it
//! invalidates every persisted model blob.

use serde::{Deserialize, Serialize};

use crate::models::{AcademicProfile, Category, CategoryScores};

/// Grade substituted for a knowledge area with no recorded subjects: the
/// Bolivian minimum passing grade, so "no data" does not read as failing.
pub const MISSING_AREA_DEFAULT: f64 = 51.0;

/// Slots: 6 academic area averages (/100), 7 category totals (/14),
/// dominant-category ordinal, academic level (0/1/2), consistency.
pub const FEATURE_LEN: usize = 16;

const ACADEMIC_OFFSET: usize = 0;
const CATEGORY_OFFSET: usize = 6;
const DOMINANT_SLOT: usize = 13;
const LEVEL_SLOT: usize = 14;
const CONSISTENCY_SLOT: usize = 15;

/// Maximum population variance of seven 0-14 totals: var([14,0,0,0,0,0,0]).
pub const MAX_TOTAL_VARIANCE: f64 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: [f64; FEATURE_LEN],
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn academic(&self, area_index: usize) -> f64 {
        self.values[ACADEMIC_OFFSET + area_index]
    }

    /// Normalized (0-1) tally for one category.
    pub fn category(&self, category: Category) -> f64 {
        self.values[CATEGORY_OFFSET + category.index()]
    }

    /// Raw 0-14 tally reconstructed from the normalized slot.
    pub fn category_total(&self, category: Category) -> f64 {
        self.category(category) * 14.0
    }

    pub fn dominant(&self) -> Category {
        let index = self.values[DOMINANT_SLOT].round() as usize;
        Category::ALL[index.min(6)]
    }

    pub fn academic_level(&self) -> u8 {
        self.values[LEVEL_SLOT].round() as u8
    }

    pub fn consistency(&self) -> f64 {
        self.values[CONSISTENCY_SLOT]
    }

    /// The student's strongest `n` categories by tally, descending, ties in
    /// category order.
    pub fn top_categories(&self, n: usize) -> Vec<(Category, f64)> {
        let mut ranked: Vec<(Category, f64)> = Category::ALL
            .iter()
            .map(|cat| (*cat, self.category_total(*cat)))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(n);
        ranked
    }
}

/// Build the feature vector for one student from profile plus tallies.
pub fn build(academic: &AcademicProfile, scores: &CategoryScores) -> FeatureVector {
    let mut totals = [0u32; 7];
    for cat in Category::ALL {
        totals[cat.index()] = scores.get(&cat).map(|s| s.total()).unwrap_or(0);
    }
    build_from_parts(academic.area_averages(), totals)
}

/// Shared builder for the serving path and the training-data loaders, so the
/// feature contract has exactly one implementation.
pub fn build_from_parts(area_averages: [Option<f64>; 6], totals: [u32; 7]) -> FeatureVector {
    let mut values = [0.0; FEATURE_LEN];

    let defaulted: Vec<f64> = area_averages
        .iter()
        .map(|avg| avg.unwrap_or(MISSING_AREA_DEFAULT))
        .collect();
    for (i, avg) in defaulted.iter().enumerate() {
        values[ACADEMIC_OFFSET + i] = avg / 100.0;
    }

    for (i, total) in totals.iter().enumerate() {
        values[CATEGORY_OFFSET + i] = f64::from(*total) / 14.0;
    }

    values[DOMINANT_SLOT] = dominant_category(&totals).index() as f64;
    values[LEVEL_SLOT] = f64::from(academic_level(&defaulted));
    values[CONSISTENCY_SLOT] = consistency(&totals);

    FeatureVector { values }
}

/// Highest tally wins; ties resolve to the earliest category in CHASIDE
/// order.
pub fn dominant_category(totals: &[u32; 7]) -> Category {
    let mut best = Category::C;
    let mut best_total = totals[0];
    for cat in Category::ALL {
        if totals[cat.index()] > best_total {
            best = cat;
            best_total = totals[cat.index()];
        }
    }
    best
}

fn academic_level(area_averages: &[f64]) -> u8 {
    let mean = area_averages.iter().sum::<f64>() / area_averages.len() as f64;
    if mean >= 80.0 {
        2
    } else if mean >= 65.0 {
        1
    } else {
        0
    }
}

/// Population variance of the seven tallies.
pub fn total_variance(totals: &[u32; 7]) -> f64 {
    let mean = totals.iter().map(|t| f64::from(*t)).sum::<f64>() / 7.0;
    totals
        .iter()
        .map(|t| {
            let d = f64::from(*t) - mean;
            d * d
        })
        .sum::<f64>()
        / 7.0
}

/// 1 means evenly spread interests, 0 means everything concentrated in one
/// category.
fn consistency(totals: &[u32; 7]) -> f64 {
    if MAX_TOTAL_VARIANCE <= 0.0 {
        return 1.0;
    }
    1.0 - total_variance(totals) / MAX_TOTAL_VARIANCE
}
