use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod chaside;
mod data;
mod ensemble;
mod error;
mod features;
mod knn;
mod logistic;
mod matcher;
mod models;
mod neural;
mod predictor;
mod report;
mod rules;
mod store;
mod tree;

use ensemble::EnsembleRegistry;
use matcher::CareerMatcher;
use models::{AcademicProfile, QuestionnaireResponse, TrainingStatus};
use store::ModelStore;

#[derive(Parser)]
#[command(name = "career-recommender")]
#[command(about = "CHASIDE vocational test scorer and career recommender", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the built-in career catalog to a JSON file
    SeedCareers {
        #[arg(long, default_value = "careers.json")]
        out: PathBuf,
    },
    /// Score a questionnaire and print the CHASIDE profile
    Score {
        /// JSON map of question number (1-98) to yes/no
        #[arg(long)]
        answers: PathBuf,
    },
    /// Train the ensemble from history, or from a synthetic cohort
    Train {
        #[arg(long, default_value = "careers.json")]
        careers: PathBuf,
        /// CSV of historical rows; omitted means train synthetically
        #[arg(long)]
        history: Option<PathBuf>,
        #[arg(long, default_value_t = 100)]
        samples: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,
    },
    /// Recommend careers for one student
    Recommend {
        #[arg(long)]
        answers: PathBuf,
        /// JSON subject grades; omitted means no academic record
        #[arg(long)]
        grades: Option<PathBuf>,
        #[arg(long, default_value = "careers.json")]
        careers: PathBuf,
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,
        #[arg(long, default_value_t = 3)]
        top: usize,
        #[arg(long)]
        student_id: Option<Uuid>,
        /// Also write the recommendations as JSON
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a markdown orientation report
    Report {
        #[arg(long)]
        answers: PathBuf,
        #[arg(long)]
        grades: Option<PathBuf>,
        #[arg(long, default_value = "careers.json")]
        careers: PathBuf,
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[arg(long)]
        student_id: Option<Uuid>,
    },
}

fn load_answers(path: &Path) -> anyhow::Result<QuestionnaireResponse> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading answers file {}", path.display()))?;
    let answers: BTreeMap<u16, bool> = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing answers file {}", path.display()))?;
    QuestionnaireResponse::new(answers)
        .with_context(|| format!("validating answers file {}", path.display()))
}

fn load_grades(path: Option<&PathBuf>) -> anyhow::Result<AcademicProfile> {
    let Some(path) = path else {
        return Ok(AcademicProfile::default());
    };
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading grades file {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing grades file {}", path.display()))
}

/// Restore the trained ensemble if the status record says one exists.
fn load_ensemble(store: &ModelStore) -> EnsembleRegistry {
    let mut ensemble = EnsembleRegistry::new();
    if store.load_status().map(|s| s.trained).unwrap_or(false) {
        ensemble.load_all(store);
    }
    ensemble
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::SeedCareers { out } => {
            let catalog = data::builtin_catalog();
            data::save_catalog(&out, &catalog)?;
            println!("Wrote {} careers to {}.", catalog.len(), out.display());
        }
        Commands::Score { answers } => {
            let response = load_answers(&answers)?;
            let scores = chaside::score(&response);

            println!(
                "Answered {} of {} questions.",
                response.answered(),
                QuestionnaireResponse::QUESTION_COUNT
            );
            for (cat, score) in &scores {
                println!(
                    "- {} ({}): {}/14 ({} interests, {} aptitudes)",
                    cat.display_name(),
                    cat.code(),
                    score.total(),
                    score.interests,
                    score.aptitudes
                );
            }
            println!("Top categories:");
            for (cat, total) in chaside::recommended_categories(&scores, 3) {
                println!("- {} with {}", cat.display_name(), total);
            }
        }
        Commands::Train {
            careers,
            history,
            samples,
            seed,
            models_dir,
        } => {
            let catalog = data::load_catalog(&careers)?;
            let set = match history {
                Some(path) => {
                    let set = data::load_history(&path)?;
                    if set.len() >= 5 {
                        set
                    } else {
                        warn!(
                            rows = set.len(),
                            "too little history, training on a synthetic cohort instead"
                        );
                        data::synthetic_training_set(&catalog, samples, seed)
                    }
                }
                None => data::synthetic_training_set(&catalog, samples, seed),
            };
            if set.is_empty() {
                anyhow::bail!("no training rows available");
            }

            let mut ensemble = EnsembleRegistry::new();
            let active = ensemble.train_all(&set.x, &set.y, &set.prior);

            let store = ModelStore::new(&models_dir);
            ensemble.save_all(&store)?;
            store.save_status(&TrainingStatus {
                trained: active > 0,
                trained_at: Utc::now(),
                sample_count: set.len(),
                feature_count: features::FEATURE_LEN,
            })?;

            println!(
                "Trained {active} of 4 variants on {} samples. Models in {}.",
                set.len(),
                store.dir().display()
            );
            for ((name, accuracy), (_, weight)) in
                ensemble.accuracies().iter().zip(ensemble.weights())
            {
                println!("- {name}: accuracy {accuracy:.2}, vote weight {weight:.2}");
            }
        }
        Commands::Recommend {
            answers,
            grades,
            careers,
            models_dir,
            top,
            student_id,
            out,
        } => {
            let response = load_answers(&answers)?;
            let academic = load_grades(grades.as_ref())?;
            let catalog = data::load_catalog(&careers)?;
            let ensemble = load_ensemble(&ModelStore::new(&models_dir));

            let student = student_id.unwrap_or_else(Uuid::new_v4);
            let matcher = CareerMatcher::new(&ensemble);
            let recommendations =
                matcher.recommend(student, &response, &academic, &catalog, top)?;

            println!("Recommendations for student {student}:");
            for rec in &recommendations {
                println!(
                    "{}. {} ({:.1}%) via {}",
                    rec.rank,
                    rec.explanation.career_name,
                    rec.explanation.compatibility_pct,
                    rec.contributing_model
                );
                println!("   {}", rec.explanation.summary);
            }

            if let Some(out) = out {
                let json = serde_json::to_vec_pretty(&recommendations)?;
                std::fs::write(&out, json)
                    .with_context(|| format!("writing recommendations {}", out.display()))?;
                println!("Recommendations written to {}.", out.display());
            }
        }
        Commands::Report {
            answers,
            grades,
            careers,
            models_dir,
            out,
            student_id,
        } => {
            let response = load_answers(&answers)?;
            let academic = load_grades(grades.as_ref())?;
            let catalog = data::load_catalog(&careers)?;
            let ensemble = load_ensemble(&ModelStore::new(&models_dir));

            let student = student_id.unwrap_or_else(Uuid::new_v4);
            let matcher = CareerMatcher::new(&ensemble);
            let recommendations =
                matcher.recommend(student, &response, &academic, &catalog, matcher::DEFAULT_TOP_N)?;

            let scores = chaside::score(&response);
            let report = report::build_report(
                &format!("student {student}"),
                &scores,
                &academic,
                &recommendations,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
