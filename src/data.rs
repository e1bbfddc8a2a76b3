//! Training and catalog data: the built-in Bolivian career catalog, a CSV
//! loader for historical recommendation rows, and a seeded synthetic
//! generator used to bootstrap the ensemble before real history exists.

use std::fs;
use std::path::Path;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::info;

use crate::features::{build_from_parts, FeatureVector};
use crate::models::{CareerProfile, CategoryWeights};

/// Feature rows plus labels for the ensemble. `prior` mirrors the historical
/// assignment table the nearest-neighbour variant keys on.
#[derive(Debug, Default)]
pub struct TrainingSet {
    pub x: Vec<FeatureVector>,
    pub y: Vec<u32>,
    pub prior: Vec<(FeatureVector, u32)>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

fn career(id: u32, name: &str, faculty: &str, weights: CategoryWeights) -> CareerProfile {
    CareerProfile {
        id,
        name: name.to_string(),
        faculty: faculty.to_string(),
        weights,
    }
}

/// The stock catalog of the Bolivian university system, used by `seed-careers`.
pub fn builtin_catalog() -> Vec<CareerProfile> {
    let engineering = "Facultad de Ingeniería";
    let medicine = "Facultad de Medicina";
    let economics = "Facultad de Ciencias Económicas y Financieras";
    let humanities = "Facultad de Humanidades y Ciencias de la Educación";
    let law = "Facultad de Derecho y Ciencias Políticas";
    let sciences = "Facultad de Ciencias Puras y Naturales";
    let arts = "Facultad de Arquitectura y Artes";
    let agronomy = "Facultad de Agronomía";

    let w = |c, h, a, s, i, d, e| CategoryWeights { c, h, a, s, i, d, e };

    vec![
        career(1, "Ingeniería de Sistemas", engineering, w(0.4, 0.0, 0.0, 0.0, 0.9, 0.0, 0.7)),
        career(2, "Ingeniería Civil", engineering, w(0.0, 0.0, 0.0, 0.0, 0.8, 0.3, 0.6)),
        career(3, "Ingeniería Industrial", engineering, w(0.6, 0.0, 0.0, 0.0, 0.7, 0.0, 0.5)),
        career(4, "Medicina", medicine, w(0.0, 0.4, 0.0, 0.9, 0.0, 0.0, 0.6)),
        career(5, "Enfermería", medicine, w(0.3, 0.5, 0.0, 0.8, 0.0, 0.0, 0.0)),
        career(6, "Administración de Empresas", economics, w(0.9, 0.4, 0.0, 0.0, 0.3, 0.0, 0.0)),
        career(7, "Contaduría Pública", economics, w(0.8, 0.3, 0.0, 0.0, 0.0, 0.0, 0.4)),
        career(8, "Psicología", humanities, w(0.0, 0.8, 0.3, 0.6, 0.0, 0.0, 0.0)),
        career(9, "Comunicación Social", humanities, w(0.4, 0.7, 0.6, 0.0, 0.0, 0.0, 0.0)),
        career(10, "Derecho", law, w(0.4, 0.8, 0.0, 0.0, 0.0, 0.5, 0.0)),
        career(11, "Biología", sciences, w(0.0, 0.3, 0.0, 0.5, 0.0, 0.0, 0.9)),
        career(12, "Química", sciences, w(0.0, 0.0, 0.0, 0.3, 0.4, 0.0, 0.8)),
        career(13, "Arquitectura", arts, w(0.0, 0.3, 0.8, 0.0, 0.6, 0.0, 0.0)),
        career(14, "Diseño Gráfico", arts, w(0.3, 0.0, 0.9, 0.0, 0.4, 0.0, 0.0)),
        career(15, "Ingeniería Agronómica", agronomy, w(0.4, 0.0, 0.0, 0.0, 0.5, 0.0, 0.7)),
    ]
}

pub fn load_catalog(path: &Path) -> anyhow::Result<Vec<CareerProfile>> {
    let bytes = fs::read(path)
        .with_context(|| format!("reading career catalog {}", path.display()))?;
    let careers: Vec<CareerProfile> = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing career catalog {}", path.display()))?;
    Ok(careers)
}

pub fn save_catalog(path: &Path, careers: &[CareerProfile]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_vec_pretty(careers)?;
    fs::write(path, json)
        .with_context(|| format!("writing career catalog {}", path.display()))?;
    Ok(())
}

/// One historical row: six area averages (blank = never recorded), the seven
/// questionnaire tallies, and the career the student was matched to.
#[derive(Debug, Deserialize)]
pub struct HistoryRow {
    pub exact_sciences: Option<f64>,
    pub natural_sciences: Option<f64>,
    pub language: Option<f64>,
    pub social_sciences: Option<f64>,
    pub arts: Option<f64>,
    pub physical_education: Option<f64>,
    pub c: u32,
    pub h: u32,
    pub a: u32,
    pub s: u32,
    pub i: u32,
    pub d: u32,
    pub e: u32,
    pub career_id: u32,
}

impl HistoryRow {
    fn features(&self) -> FeatureVector {
        build_from_parts(
            [
                self.exact_sciences,
                self.natural_sciences,
                self.language,
                self.social_sciences,
                self.arts,
                self.physical_education,
            ],
            [self.c, self.h, self.a, self.s, self.i, self.d, self.e],
        )
    }
}

pub fn load_history(path: &Path) -> anyhow::Result<TrainingSet> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening history file {}", path.display()))?;
    let mut set = TrainingSet::default();
    for (line, record) in reader.deserialize::<HistoryRow>().enumerate() {
        let row = record.with_context(|| format!("history row {}", line + 1))?;
        let features = row.features();
        set.x.push(features);
        set.y.push(row.career_id);
        set.prior.push((features, row.career_id));
    }
    info!(rows = set.len(), path = %path.display(), "history loaded");
    Ok(set)
}

/// Archetypes the synthetic generator draws from, each with its own grade
/// bands and tally ranges.
#[derive(Debug, Clone, Copy)]
enum Archetype {
    Mathematical,
    Humanistic,
    Artistic,
    Scientific,
    Balanced,
}

const ARCHETYPES: [Archetype; 5] = [
    Archetype::Mathematical,
    Archetype::Humanistic,
    Archetype::Artistic,
    Archetype::Scientific,
    Archetype::Balanced,
];

/// Generate a labelled synthetic cohort. Labels come from the same weighted
/// dot-product the rule engine uses, with a high-achiever bonus, so the
/// ensemble learns a function consistent with the rules it replaces.
pub fn synthetic_training_set(
    careers: &[CareerProfile],
    samples: usize,
    seed: u64,
) -> TrainingSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut set = TrainingSet::default();

    for n in 0..samples {
        let archetype = ARCHETYPES[n % ARCHETYPES.len()];
        let (grades, totals) = sample_profile(archetype, &mut rng);
        let Some(career_id) = best_career_for(&totals, &grades, careers) else {
            continue;
        };
        let features = build_from_parts(grades.map(Some), totals);
        set.x.push(features);
        set.y.push(career_id);
        set.prior.push((features, career_id));
    }

    info!(samples = set.len(), seed, "synthetic cohort generated");
    set
}

fn sample_profile(archetype: Archetype, rng: &mut StdRng) -> ([f64; 6], [u32; 7]) {
    // Grade slots follow the area order; tallies follow CHASIDE order.
    match archetype {
        Archetype::Mathematical => (
            [
                rng.gen_range(80.0..95.0),
                rng.gen_range(70.0..90.0),
                rng.gen_range(55.0..75.0),
                rng.gen_range(60.0..80.0),
                rng.gen_range(50.0..70.0),
                rng.gen_range(55.0..75.0),
            ],
            [
                rng.gen_range(5..9),
                rng.gen_range(2..5),
                rng.gen_range(1..4),
                rng.gen_range(4..7),
                rng.gen_range(9..14),
                rng.gen_range(2..5),
                rng.gen_range(8..12),
            ],
        ),
        Archetype::Humanistic => (
            [
                rng.gen_range(55.0..75.0),
                rng.gen_range(55.0..75.0),
                rng.gen_range(80.0..95.0),
                rng.gen_range(85.0..95.0),
                rng.gen_range(65.0..85.0),
                rng.gen_range(55.0..75.0),
            ],
            [
                rng.gen_range(6..10),
                rng.gen_range(10..14),
                rng.gen_range(5..9),
                rng.gen_range(3..6),
                rng.gen_range(1..4),
                rng.gen_range(4..7),
                rng.gen_range(2..5),
            ],
        ),
        Archetype::Artistic => (
            [
                rng.gen_range(50.0..70.0),
                rng.gen_range(55.0..75.0),
                rng.gen_range(70.0..90.0),
                rng.gen_range(65.0..80.0),
                rng.gen_range(85.0..95.0),
                rng.gen_range(60.0..80.0),
            ],
            [
                rng.gen_range(3..6),
                rng.gen_range(6..10),
                rng.gen_range(10..14),
                rng.gen_range(2..5),
                rng.gen_range(3..7),
                rng.gen_range(1..4),
                rng.gen_range(2..5),
            ],
        ),
        Archetype::Scientific => (
            [
                rng.gen_range(75.0..90.0),
                rng.gen_range(85.0..95.0),
                rng.gen_range(60.0..80.0),
                rng.gen_range(55.0..75.0),
                rng.gen_range(50.0..70.0),
                rng.gen_range(55.0..75.0),
            ],
            [
                rng.gen_range(4..7),
                rng.gen_range(3..6),
                rng.gen_range(1..4),
                rng.gen_range(7..11),
                rng.gen_range(6..9),
                rng.gen_range(2..5),
                rng.gen_range(10..14),
            ],
        ),
        Archetype::Balanced => {
            let base: f64 = rng.gen_range(65.0..80.0);
            let mut grades = [0.0; 6];
            for g in &mut grades {
                *g = (base + rng.gen_range(-10.0..10.0)).clamp(51.0, 100.0);
            }
            let mut totals = [0u32; 7];
            for t in &mut totals {
                *t = rng.gen_range(5..9);
            }
            (grades, totals)
        }
    }
}

/// Highest weighted dot-product wins; students averaging 80+ (or 70+) get a
/// 20% (10%) bonus on every career so stronger records weigh in.
fn best_career_for(totals: &[u32; 7], grades: &[f64; 6], careers: &[CareerProfile]) -> Option<u32> {
    let average = grades.iter().sum::<f64>() / 6.0;
    let multiplier = if average >= 80.0 {
        1.2
    } else if average >= 70.0 {
        1.1
    } else {
        1.0
    };

    let mut best: Option<(u32, f64)> = None;
    for career in careers {
        let dot: f64 = crate::models::Category::ALL
            .iter()
            .map(|cat| f64::from(totals[cat.index()]) * career.weights.weight(*cat))
            .sum();
        let score = dot * multiplier;
        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((career.id, score));
        }
    }
    best.map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_catalog_has_unique_ids_and_weights_in_range() {
        let catalog = builtin_catalog();
        assert_eq!(catalog.len(), 15);
        let mut ids: Vec<u32> = catalog.iter().map(|c| c.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), catalog.len());
        for career in &catalog {
            for cat in crate::models::Category::ALL {
                let w = career.weights.weight(cat);
                assert!((0.0..=1.0).contains(&w), "{} {:?}", career.name, cat);
            }
        }
    }

    #[test]
    fn catalog_round_trips_through_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("careers.json");
        let catalog = builtin_catalog();
        save_catalog(&path, &catalog).unwrap();
        let loaded = load_catalog(&path).unwrap();
        assert_eq!(loaded.len(), catalog.len());
        assert_eq!(loaded[0].name, "Ingeniería de Sistemas");
    }

    #[test]
    fn history_csv_parses_blank_grades_as_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("history.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "exact_sciences,natural_sciences,language,social_sciences,arts,physical_education,c,h,a,s,i,d,e,career_id"
        )
        .unwrap();
        writeln!(file, "85.0,,70.0,65.0,60.0,70.0,5,2,1,4,12,2,10,1").unwrap();
        writeln!(file, "60.0,80.0,75.0,70.0,60.0,65.0,3,9,2,12,2,3,5,4").unwrap();
        drop(file);

        let set = load_history(&path).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.y, vec![1, 4]);
        assert_eq!(set.prior.len(), 2);
        // Blank natural_sciences reads as the passing-grade default.
        assert!((set.x[0].academic(1) - 0.51).abs() < 1e-12);
    }

    #[test]
    fn synthetic_cohort_is_seed_deterministic() {
        let catalog = builtin_catalog();
        let first = synthetic_training_set(&catalog, 40, 42);
        let second = synthetic_training_set(&catalog, 40, 42);
        assert_eq!(first.y, second.y);
        assert_eq!(first.x, second.x);
        assert!(first.len() >= 20);
    }

    #[test]
    fn synthetic_labels_cover_multiple_careers() {
        let catalog = builtin_catalog();
        let set = synthetic_training_set(&catalog, 60, 7);
        let mut labels = set.y.clone();
        labels.sort_unstable();
        labels.dedup();
        assert!(labels.len() >= 2);
        assert!(set.y.iter().all(|id| catalog.iter().any(|c| c.id == *id)));
    }

    #[test]
    fn best_career_prefers_aligned_weights() {
        let catalog = builtin_catalog();
        // Heavy I/E tallies should land in an engineering career.
        let id = best_career_for(
            &[5, 2, 1, 4, 13, 2, 10],
            &[85.0, 75.0, 60.0, 60.0, 55.0, 60.0],
            &catalog,
        )
        .unwrap();
        let name = &catalog.iter().find(|c| c.id == id).unwrap().name;
        assert!(name.contains("Ingeniería"), "{name}");
    }
}
