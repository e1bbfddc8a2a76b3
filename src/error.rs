use thiserror::Error;

/// User-visible failures of the recommendation pipeline.
///
/// Predictor-level failures never surface here; they shrink the active
/// ensemble and the rule engine picks up the slack.
#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("questionnaire incomplete: {answered} of 98 questions answered, at least {required} required")]
    IncompleteQuestionnaire { answered: usize, required: usize },

    #[error("question number {0} is outside the 1..=98 form")]
    InvalidQuestion(u16),

    #[error("no careers available to match against")]
    NoCareers,

    #[error("recommendation failed, please retake the questionnaire")]
    MatchingFailed,
}

/// Failures local to a single predictor. Recovered by the ensemble registry,
/// never propagated to end users.
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("not enough training samples ({0}, need at least 2 to split)")]
    NotEnoughSamples(usize),

    #[error("fewer than 2 distinct career labels in training data")]
    NotEnoughClasses,

    #[error("feature vector length {got} does not match trained length {expected}")]
    FeatureMismatch { got: usize, expected: usize },
}
