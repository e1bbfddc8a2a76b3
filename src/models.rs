use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::RecommendError;

/// The seven CHASIDE vocational categories. Declaration order is the fixed
/// tie-break priority used everywhere (dominant category, ranking ties).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Category {
    C,
    H,
    A,
    S,
    I,
    D,
    E,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::C,
        Category::H,
        Category::A,
        Category::S,
        Category::I,
        Category::D,
        Category::E,
    ];

    pub fn code(self) -> char {
        match self {
            Category::C => 'C',
            Category::H => 'H',
            Category::A => 'A',
            Category::S => 'S',
            Category::I => 'I',
            Category::D => 'D',
            Category::E => 'E',
        }
    }

    pub fn index(self) -> usize {
        Category::ALL.iter().position(|c| *c == self).unwrap_or(0)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Category::C => "Administrative & Accounting",
            Category::H => "Humanities & Social Sciences",
            Category::A => "Artistic",
            Category::S => "Health Sciences",
            Category::I => "Engineering & Technology",
            Category::D => "Defense & Security",
            Category::E => "Exact & Experimental Sciences",
        }
    }

    /// Descriptive interest tags for the category, shown in reports.
    pub fn interest_tags(self) -> &'static [&'static str] {
        match self {
            Category::C => &["organization", "supervision", "order", "analysis", "calculation"],
            Category::H => &["verbal precision", "linguistics", "justice", "relating facts"],
            Category::A => &["aesthetics", "harmony", "manual work", "visual", "auditory"],
            Category::S => &["assisting", "investigating", "precision", "helping others"],
            Category::I => &["calculation", "scientific method", "exactness", "planning"],
            Category::D => &["justice", "equity", "teamwork", "leadership"],
            Category::E => &["research", "organization", "numeric calculation", "classifying"],
        }
    }

    /// Descriptive aptitude tags for the category, shown in reports.
    pub fn aptitude_tags(self) -> &'static [&'static str] {
        match self {
            Category::C => &["persuasive", "objective", "practical", "responsible"],
            Category::H => &["responsible", "fair", "conciliatory", "imaginative"],
            Category::A => &["imaginative", "creative", "detail-oriented", "intuitive"],
            Category::S => &["altruistic", "patient", "understanding", "respectful"],
            Category::I => &["practical", "critical", "analytical"],
            Category::D => &["daring", "courageous", "supportive"],
            Category::E => &["methodical", "analytical", "observant", "patient"],
        }
    }
}

/// Per-category questionnaire tally. A category covers 10 interest and
/// 4 aptitude questions, so `total() <= 14`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub interests: u32,
    pub aptitudes: u32,
}

impl CategoryScore {
    pub fn total(&self) -> u32 {
        self.interests + self.aptitudes
    }
}

/// All seven tallies, keyed in category order.
pub type CategoryScores = BTreeMap<Category, CategoryScore>;

/// A student's yes/no answers keyed by question number (1..=98).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionnaireResponse {
    answers: BTreeMap<u16, bool>,
}

impl QuestionnaireResponse {
    pub const QUESTION_COUNT: u16 = 98;
    /// Minimum answered questions for the form to be scoreable.
    pub const MIN_ANSWERED: usize = 50;

    pub fn new(answers: BTreeMap<u16, bool>) -> Result<Self, RecommendError> {
        if let Some(bad) = answers
            .keys()
            .find(|q| **q < 1 || **q > Self::QUESTION_COUNT)
        {
            return Err(RecommendError::InvalidQuestion(*bad));
        }
        Ok(Self { answers })
    }

    pub fn answered(&self) -> usize {
        self.answers.len()
    }

    pub fn is_complete(&self) -> bool {
        self.answered() >= Self::MIN_ANSWERED
    }

    /// Question numbers answered "yes", in ascending order.
    pub fn yes_questions(&self) -> impl Iterator<Item = u16> + '_ {
        self.answers
            .iter()
            .filter(|(_, yes)| **yes)
            .map(|(q, _)| *q)
    }
}

/// The six fixed knowledge areas of the Bolivian secondary curriculum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KnowledgeArea {
    ExactSciences,
    NaturalSciences,
    LanguageCommunication,
    SocialSciences,
    Arts,
    PhysicalEducation,
}

impl KnowledgeArea {
    pub const ALL: [KnowledgeArea; 6] = [
        KnowledgeArea::ExactSciences,
        KnowledgeArea::NaturalSciences,
        KnowledgeArea::LanguageCommunication,
        KnowledgeArea::SocialSciences,
        KnowledgeArea::Arts,
        KnowledgeArea::PhysicalEducation,
    ];

    pub fn label(self) -> &'static str {
        match self {
            KnowledgeArea::ExactSciences => "exact sciences",
            KnowledgeArea::NaturalSciences => "natural sciences",
            KnowledgeArea::LanguageCommunication => "language & communication",
            KnowledgeArea::SocialSciences => "social sciences",
            KnowledgeArea::Arts => "arts",
            KnowledgeArea::PhysicalEducation => "physical education",
        }
    }
}

/// Subject grades on the 0-100 Bolivian scale. `None` means the grade was
/// never recorded, which is distinct from scoring zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcademicProfile {
    #[serde(default)]
    pub math: Option<f64>,
    #[serde(default)]
    pub physics: Option<f64>,
    #[serde(default)]
    pub chemistry: Option<f64>,
    #[serde(default)]
    pub biology: Option<f64>,
    #[serde(default)]
    pub language: Option<f64>,
    #[serde(default)]
    pub foreign_language: Option<f64>,
    #[serde(default)]
    pub social_studies: Option<f64>,
    #[serde(default)]
    pub philosophy: Option<f64>,
    #[serde(default)]
    pub ethics: Option<f64>,
    #[serde(default)]
    pub visual_arts: Option<f64>,
    #[serde(default)]
    pub music: Option<f64>,
    #[serde(default)]
    pub physical_education: Option<f64>,
}

impl AcademicProfile {
    fn area_subjects(&self, area: KnowledgeArea) -> Vec<Option<f64>> {
        match area {
            KnowledgeArea::ExactSciences => vec![self.math, self.physics, self.chemistry],
            KnowledgeArea::NaturalSciences => vec![self.biology],
            KnowledgeArea::LanguageCommunication => vec![self.language, self.foreign_language],
            KnowledgeArea::SocialSciences => {
                vec![self.social_studies, self.philosophy, self.ethics]
            }
            KnowledgeArea::Arts => vec![self.visual_arts, self.music],
            KnowledgeArea::PhysicalEducation => vec![self.physical_education],
        }
    }

    /// Mean of the recorded subject grades in the area, or `None` when every
    /// underlying grade is missing.
    pub fn area_average(&self, area: KnowledgeArea) -> Option<f64> {
        let present: Vec<f64> = self.area_subjects(area).into_iter().flatten().collect();
        if present.is_empty() {
            None
        } else {
            Some(present.iter().sum::<f64>() / present.len() as f64)
        }
    }

    pub fn area_averages(&self) -> [Option<f64>; 6] {
        let mut out = [None; 6];
        for (slot, area) in out.iter_mut().zip(KnowledgeArea::ALL) {
            *slot = self.area_average(area);
        }
        out
    }

    /// Mean over the areas that have any data at all.
    pub fn overall_average(&self) -> Option<f64> {
        let present: Vec<f64> = self.area_averages().into_iter().flatten().collect();
        if present.is_empty() {
            None
        } else {
            Some(present.iter().sum::<f64>() / present.len() as f64)
        }
    }
}

/// Affinity of one career with each CHASIDE category, each weight in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    #[serde(default)]
    pub c: f64,
    #[serde(default)]
    pub h: f64,
    #[serde(default)]
    pub a: f64,
    #[serde(default)]
    pub s: f64,
    #[serde(default)]
    pub i: f64,
    #[serde(default)]
    pub d: f64,
    #[serde(default)]
    pub e: f64,
}

impl CategoryWeights {
    pub fn weight(&self, category: Category) -> f64 {
        match category {
            Category::C => self.c,
            Category::H => self.h,
            Category::A => self.a,
            Category::S => self.s,
            Category::I => self.i,
            Category::D => self.d,
            Category::E => self.e,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareerProfile {
    pub id: u32,
    pub name: String,
    pub faculty: String,
    pub weights: CategoryWeights,
}

/// Overall academic performance bands on the Bolivian grading scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcademicTier {
    Excellent,
    VeryGood,
    Good,
    Developing,
}

impl AcademicTier {
    pub fn from_average(average: f64) -> Self {
        if average >= 85.0 {
            AcademicTier::Excellent
        } else if average >= 75.0 {
            AcademicTier::VeryGood
        } else if average >= 65.0 {
            AcademicTier::Good
        } else {
            AcademicTier::Developing
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AcademicTier::Excellent => "excellent",
            AcademicTier::VeryGood => "very good",
            AcademicTier::Good => "good",
            AcademicTier::Developing => "developing",
        }
    }
}

/// Structured justification attached to every recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub career_name: String,
    pub faculty_name: String,
    pub compatibility_pct: f64,
    pub dominant_category: Category,
    pub dominant_category_name: String,
    pub dominant_score: u32,
    pub academic_average: f64,
    pub academic_tier: String,
    /// Categories where the student tallied 8 or more of 14.
    pub strong_categories: Vec<Category>,
    pub contributing_model: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub student_id: Uuid,
    pub career_id: u32,
    pub score: f64,
    /// 1-based position in the ranked list, contiguous, 1 = best.
    pub rank: u32,
    pub explanation: Explanation,
    pub contributing_model: String,
}

/// Companion record stored next to the model blobs so the serving path can
/// decide ensemble-vs-rules without attempting a load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingStatus {
    pub trained: bool,
    pub trained_at: DateTime<Utc>,
    pub sample_count: usize,
    pub feature_count: usize,
}
