use std::fmt::Write;

use crate::models::{AcademicProfile, Category, CategoryScores, KnowledgeArea, Recommendation};

/// Markdown profile report for one student: questionnaire tallies, academic
/// record, the top category traits, and the ranked recommendations with
/// their explanations.
pub fn build_report(
    student_label: &str,
    scores: &CategoryScores,
    academic: &AcademicProfile,
    recommendations: &[Recommendation],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Vocational Orientation Report");
    let _ = writeln!(output, "Prepared for {}", student_label);
    let _ = writeln!(output);
    let _ = writeln!(output, "## CHASIDE Profile");

    for cat in Category::ALL {
        let score = scores.get(&cat).copied().unwrap_or_default();
        let _ = writeln!(
            output,
            "- {} ({}): {} of 14 ({} interests, {} aptitudes)",
            cat.display_name(),
            cat.code(),
            score.total(),
            score.interests,
            score.aptitudes
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Academic Record");

    if let Some(average) = academic.overall_average() {
        for area in KnowledgeArea::ALL {
            match academic.area_average(area) {
                Some(avg) => {
                    let _ = writeln!(output, "- {}: {:.1}/100", area.label(), avg);
                }
                None => {
                    let _ = writeln!(output, "- {}: no grades recorded", area.label());
                }
            }
        }
        let _ = writeln!(output, "- overall: {:.1}/100", average);
    } else {
        let _ = writeln!(output, "No grades recorded.");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Strongest Traits");

    let ranked = crate::chaside::recommended_categories(scores, 3);
    if ranked.iter().all(|(_, total)| *total == 0) {
        let _ = writeln!(output, "No affirmative answers recorded.");
    } else {
        for (cat, total) in ranked.iter().filter(|(_, total)| *total > 0) {
            let _ = writeln!(
                output,
                "- {} ({}/14): interests in {}; aptitudes: {}",
                cat.display_name(),
                total,
                cat.interest_tags().join(", "),
                cat.aptitude_tags().join(", ")
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommended Careers");

    if recommendations.is_empty() {
        let _ = writeln!(output, "No recommendations could be produced.");
    } else {
        for rec in recommendations {
            let e = &rec.explanation;
            let _ = writeln!(
                output,
                "{}. {} ({}) at {:.1}% compatibility [{}]",
                rec.rank, e.career_name, e.faculty_name, e.compatibility_pct, rec.contributing_model
            );
            let _ = writeln!(output, "   {}", e.summary);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chaside;
    use crate::models::{Explanation, QuestionnaireResponse};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn sample_profile() -> AcademicProfile {
        AcademicProfile {
            math: Some(82.0),
            physics: Some(74.0),
            language: Some(68.0),
            ..Default::default()
        }
    }

    fn sample_recommendation(rank: u32, career: &str, pct: f64) -> Recommendation {
        Recommendation {
            student_id: Uuid::nil(),
            career_id: rank,
            score: pct / 100.0,
            rank,
            contributing_model: "rules".to_string(),
            explanation: Explanation {
                career_name: career.to_string(),
                faculty_name: "Facultad de Ingeniería".to_string(),
                compatibility_pct: pct,
                dominant_category: Category::I,
                dominant_category_name: Category::I.display_name().to_string(),
                dominant_score: 12,
                academic_average: 78.0,
                academic_tier: "very good".to_string(),
                strong_categories: vec![Category::I, Category::E],
                contributing_model: "rules".to_string(),
                summary: format!("{career} fits your profile."),
            },
        }
    }

    #[test]
    fn report_lists_all_seven_categories() {
        let answers: BTreeMap<u16, bool> = (1..=98).map(|q| (q, q % 2 == 0)).collect();
        let scores = chaside::score(&QuestionnaireResponse::new(answers).unwrap());
        let report = build_report("Student 7", &scores, &sample_profile(), &[]);
        for cat in Category::ALL {
            assert!(report.contains(cat.display_name()), "{cat:?}");
        }
        assert!(report.contains("No recommendations could be produced."));
    }

    #[test]
    fn academic_section_distinguishes_missing_areas() {
        let scores = chaside::score(&QuestionnaireResponse::default());
        let report = build_report("Student 7", &scores, &sample_profile(), &[]);
        assert!(report.contains("exact sciences: 78.0/100"));
        assert!(report.contains("arts: no grades recorded"));

        let empty = build_report("Student 7", &scores, &AcademicProfile::default(), &[]);
        assert!(empty.contains("No grades recorded."));
    }

    #[test]
    fn report_orders_recommendations_by_rank() {
        let scores = chaside::score(&QuestionnaireResponse::default());
        let recs = vec![
            sample_recommendation(1, "Ingeniería de Sistemas", 87.5),
            sample_recommendation(2, "Ingeniería Civil", 71.2),
        ];
        let report = build_report("Student 7", &scores, &sample_profile(), &recs);
        let first = report.find("1. Ingeniería de Sistemas").unwrap();
        let second = report.find("2. Ingeniería Civil").unwrap();
        assert!(first < second);
        assert!(report.contains("87.5%"));
    }

    #[test]
    fn empty_profile_notes_no_answers() {
        let scores = chaside::score(&QuestionnaireResponse::default());
        let report = build_report("Student 7", &scores, &sample_profile(), &[]);
        assert!(report.contains("No affirmative answers recorded."));
    }
}
