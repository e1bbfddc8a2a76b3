//! CHASIDE questionnaire scorer: fixed 98-question form, 70 interest and
//! 28 aptitude questions partitioned across the seven categories (10 + 4
//! per category).

use crate::models::{Category, CategoryScore, CategoryScores, QuestionnaireResponse};

use Category::{A, C, D, E, H, I, S};

/// Interest question number -> category (70 entries, one row per form block).
pub(crate) const INTEREST_QUESTIONS: [(u16, Category); 70] = [
    (1, C), (9, H), (3, A), (8, S), (6, I), (5, D), (17, E),
    (12, C), (25, H), (11, A), (16, S), (19, I), (14, D), (32, E),
    (20, C), (34, H), (21, A), (23, S), (27, I), (24, D), (35, E),
    (53, C), (41, H), (28, A), (33, S), (38, I), (31, D), (42, E),
    (64, C), (56, H), (36, A), (44, S), (47, I), (37, D), (49, E),
    (71, C), (67, H), (45, A), (52, S), (54, I), (48, D), (61, E),
    (78, C), (74, H), (50, A), (62, S), (60, I), (58, D), (68, E),
    (85, C), (80, H), (57, A), (70, S), (75, I), (65, D), (77, E),
    (91, C), (89, H), (81, A), (87, S), (83, I), (73, D), (88, E),
    (98, C), (95, H), (96, A), (92, S), (97, I), (84, D), (93, E),
];

/// Aptitude question number -> category (28 entries).
pub(crate) const APTITUDE_QUESTIONS: [(u16, Category); 28] = [
    (2, C), (30, H), (22, A), (4, S), (10, I), (13, D), (7, E),
    (15, C), (63, H), (39, A), (29, S), (26, I), (18, D), (55, E),
    (46, C), (72, H), (76, A), (40, S), (59, I), (43, D), (79, E),
    (51, C), (86, H), (82, A), (69, S), (90, I), (66, D), (94, E),
];

fn interest_category(question: u16) -> Option<Category> {
    INTEREST_QUESTIONS
        .iter()
        .find(|(q, _)| *q == question)
        .map(|(_, cat)| *cat)
}

fn aptitude_category(question: u16) -> Option<Category> {
    APTITUDE_QUESTIONS
        .iter()
        .find(|(q, _)| *q == question)
        .map(|(_, cat)| *cat)
}

/// Tally affirmative answers into per-category interest/aptitude counts.
///
/// Pure and total: unanswered or "no" questions contribute nothing, and an
/// empty response yields all-zero tallies. The interest table is checked
/// first; a question never appears in both tables.
pub fn score(responses: &QuestionnaireResponse) -> CategoryScores {
    let mut scores: CategoryScores = Category::ALL
        .iter()
        .map(|cat| (*cat, CategoryScore::default()))
        .collect();

    for question in responses.yes_questions() {
        if let Some(category) = interest_category(question) {
            if let Some(entry) = scores.get_mut(&category) {
                entry.interests += 1;
            }
        } else if let Some(category) = aptitude_category(question) {
            if let Some(entry) = scores.get_mut(&category) {
                entry.aptitudes += 1;
            }
        }
    }

    scores
}

/// Top `top_n` categories by total tally, ties broken by ascending category
/// code so the result is deterministic.
pub fn recommended_categories(scores: &CategoryScores, top_n: usize) -> Vec<(Category, u32)> {
    let mut ranked: Vec<(Category, u32)> = scores
        .iter()
        .map(|(cat, score)| (*cat, score.total()))
        .collect();
    ranked.sort_by_key(|(cat, total)| (std::cmp::Reverse(*total), *cat));
    ranked.truncate(top_n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn all_yes() -> QuestionnaireResponse {
        let answers: BTreeMap<u16, bool> = (1..=98).map(|q| (q, true)).collect();
        QuestionnaireResponse::new(answers).unwrap()
    }

    #[test]
    fn tables_partition_all_98_questions() {
        let mut seen = [false; 99];
        for (q, _) in INTEREST_QUESTIONS.iter().chain(APTITUDE_QUESTIONS.iter()) {
            assert!(!seen[*q as usize], "question {q} mapped twice");
            seen[*q as usize] = true;
        }
        assert!((1..=98).all(|q| seen[q]));
    }

    #[test]
    fn each_category_has_ten_interest_and_four_aptitude_questions() {
        for cat in Category::ALL {
            let interests = INTEREST_QUESTIONS.iter().filter(|(_, c)| *c == cat).count();
            let aptitudes = APTITUDE_QUESTIONS.iter().filter(|(_, c)| *c == cat).count();
            assert_eq!(interests, 10, "{cat:?}");
            assert_eq!(aptitudes, 4, "{cat:?}");
        }
    }

    #[test]
    fn all_yes_scores_fourteen_everywhere() {
        let scores = score(&all_yes());
        for cat in Category::ALL {
            let entry = &scores[&cat];
            assert_eq!(entry.interests, 10);
            assert_eq!(entry.aptitudes, 4);
            assert_eq!(entry.total(), 14);
        }
    }

    #[test]
    fn empty_response_scores_zero_everywhere() {
        let scores = score(&QuestionnaireResponse::default());
        assert!(scores.values().all(|s| s.total() == 0));
    }

    #[test]
    fn no_answers_do_not_count() {
        let answers: BTreeMap<u16, bool> = (1..=98).map(|q| (q, false)).collect();
        let scores = score(&QuestionnaireResponse::new(answers).unwrap());
        assert!(scores.values().all(|s| s.total() == 0));
    }

    #[test]
    fn totals_conserve_yes_count() {
        // Every "yes" lands in exactly one category tally.
        let answers: BTreeMap<u16, bool> = (1..=98).map(|q| (q, q % 3 == 0)).collect();
        let response = QuestionnaireResponse::new(answers).unwrap();
        let yes_count = response.yes_questions().count() as u32;
        let scores = score(&response);
        let total: u32 = scores.values().map(|s| s.total()).sum();
        assert_eq!(total, yes_count);
    }

    #[test]
    fn ties_rank_by_category_order() {
        let scores = score(&all_yes());
        let ranked = recommended_categories(&scores, 3);
        assert_eq!(
            ranked,
            vec![(Category::C, 14), (Category::H, 14), (Category::A, 14)]
        );
    }

    #[test]
    fn ranking_prefers_higher_totals() {
        let mut answers = BTreeMap::new();
        // Three "yes" interest answers for I, one for C.
        answers.insert(6u16, true);
        answers.insert(19u16, true);
        answers.insert(27u16, true);
        answers.insert(1u16, true);
        let scores = score(&QuestionnaireResponse::new(answers).unwrap());
        let ranked = recommended_categories(&scores, 2);
        assert_eq!(ranked[0], (Category::I, 3));
        assert_eq!(ranked[1], (Category::C, 1));
    }
}
