// ABOUTME: Deterministic routine recommendation engine producing a 4-day training plan
// ABOUTME: Pool sampling with anti-repetition, rep/set schemes, weight suggestions, catalog gaps
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Recommendation Engine
//!
//! Synthesizes a structured multi-day training plan from the user's recent
//! history and a static exercise pool. This is an explainable heuristic
//! generator, not a statistical model: identical historical input and catalog
//! must produce a byte-identical draft. No clocks, no randomness; every
//! collection it iterates is ordered.
//!
//! Pipeline:
//! 1. classify category shares over the last 4 weeks (over-/under-trained)
//! 2. union under-trained categories with the caller's focus targets
//! 3. fill a fixed Upper/Lower/Pull/Push split, focus categories first
//! 4. sample exercises per category, preferring names unused so far
//! 5. assign rep/set schemes and suggest weights from historical top sets
//! 6. cross-reference the catalog for missing exercise types
//! 7. emit a ready-to-persist routine draft plus a call-to-action line

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::aggregation::{recent_stats, window_start};
use crate::models::{ExerciseTypeEntry, RoutineDraft, RoutineExercise, RoutineSet, TrainingRecord};

/// Weeks of history the share classification looks at
const LOOKBACK_WEEKS: u32 = 4;

/// Category share at or above which a category counts as over-trained
const OVER_TRAINED_SHARE: f64 = 0.35;

/// Category share at or below which a category counts as under-trained
const UNDER_TRAINED_SHARE: f64 = 0.10;

/// Days of history scanned for weight suggestions
const WEIGHT_SCAN_DAYS: u32 = 180;

/// Most-recent sessions scanned per exercise before giving up
const WEIGHT_SCAN_SESSION_CAP: usize = 60;

/// Weight rounding step for suggestions
const WEIGHT_STEP: f64 = 2.5;

/// Fraction of the historical top weight suggested for low-rep schemes (≤8)
const LOW_REP_FACTOR: f64 = 0.9;

/// Fraction of the historical top weight suggested for higher-rep schemes
const HIGH_REP_FACTOR: f64 = 0.85;

/// Compound lifts that get the heavy 8×3 scheme
const BIG_COMPOUNDS: &[&str] = &[
    "squat",
    "deadlift",
    "bench press",
    "overhead press",
    "barbell row",
];

/// Static exercise pool per category, in preference order
const EXERCISE_POOLS: &[(&str, &[&str])] = &[
    (
        "chest",
        &[
            "Bench Press",
            "Incline Dumbbell Press",
            "Chest Press Machine",
            "Cable Crossover",
            "Dips",
        ],
    ),
    (
        "back",
        &[
            "Deadlift",
            "Lat Pulldown",
            "Barbell Row",
            "Seated Cable Row",
            "Pull Up",
        ],
    ),
    (
        "shoulder",
        &[
            "Overhead Press",
            "Dumbbell Shoulder Press",
            "Lateral Raise",
            "Face Pull",
            "Rear Delt Fly",
        ],
    ),
    (
        "legs",
        &[
            "Squat",
            "Leg Press",
            "Romanian Deadlift",
            "Leg Extension",
            "Leg Curl",
            "Walking Lunge",
        ],
    ),
    (
        "arms",
        &[
            "Barbell Curl",
            "Triceps Pushdown",
            "Hammer Curl",
            "Skull Crusher",
            "Dumbbell Curl",
        ],
    ),
    (
        "abdomen",
        &[
            "Plank",
            "Crunch",
            "Hanging Leg Raise",
            "Cable Crunch",
            "Russian Twist",
        ],
    ),
];

/// Fixed 4-day split: day name plus category → exercise-count spec
const SPLIT_TEMPLATE: &[(&str, &[(&str, usize)])] = &[
    ("Upper", &[("chest", 2), ("shoulder", 1), ("arms", 1)]),
    ("Lower", &[("legs", 3), ("abdomen", 1)]),
    ("Pull", &[("back", 3), ("arms", 1)]),
    ("Push", &[("chest", 1), ("shoulder", 2), ("abdomen", 1)]),
];

/// One planned set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetPlan {
    pub set_number: u32,
    pub reps: u32,
    /// 0.0 when no history exists for the exercise
    pub suggested_weight: f64,
}

/// One planned exercise with its generated set scheme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExercisePlan {
    pub name: String,
    pub category: String,
    pub sets: Vec<SetPlan>,
}

/// One day block of the plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub name: String,
    pub exercises: Vec<ExercisePlan>,
}

/// Complete recommendation artifact
///
/// Transient: held in memory for one request and echoed into the stream
/// metadata; it only becomes durable if the user confirms `add_routine`
/// with the embedded draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationPlan {
    pub days: Vec<DayPlan>,
    /// Categories prioritized while filling the split
    pub focus_categories: Vec<String>,
    /// Categories deprioritized for being over-trained
    pub over_trained_categories: Vec<String>,
    /// Chosen exercise names absent from the user's catalog (plan order)
    pub missing_exercise_types: Vec<String>,
    /// Ready-to-persist payload mirroring the routine-creation contract
    pub draft: RoutineDraft,
    /// Call-to-action line; differs when catalog gaps exist
    pub cta: String,
}

/// Generate a 4-day routine recommendation from training history
///
/// Deterministic for identical inputs; see module docs for the pipeline.
#[must_use]
pub fn recommend_routine(
    records: &[TrainingRecord],
    catalog: &[ExerciseTypeEntry],
    today: NaiveDate,
    focus_targets: &[String],
) -> RecommendationPlan {
    let stats = recent_stats(records, today, LOOKBACK_WEEKS);

    let mut focus: Vec<String> = Vec::new();
    let mut over_trained: Vec<String> = Vec::new();
    if stats.total_volume > 0.0 {
        for (category, volume) in &stats.volume_by_category {
            let share = volume / stats.total_volume;
            if share >= OVER_TRAINED_SHARE {
                over_trained.push(category.to_lowercase());
            } else if share <= UNDER_TRAINED_SHARE {
                focus.push(category.to_lowercase());
            }
        }
    }
    for target in focus_targets {
        let normalized = target.to_lowercase();
        if !normalized.is_empty() && !focus.contains(&normalized) {
            focus.push(normalized);
        }
    }

    // Sessions newest first, bounded to the weight-suggestion window
    let scan_from = window_start(today, WEIGHT_SCAN_DAYS);
    let mut history: Vec<&TrainingRecord> = records
        .iter()
        .filter(|r| !r.deleted && r.date >= scan_from && r.date <= today)
        .collect();
    history.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.performed_at.cmp(&a.performed_at))
    });

    let mut used_names: BTreeSet<String> = BTreeSet::new();
    let mut days: Vec<DayPlan> = Vec::with_capacity(SPLIT_TEMPLATE.len());

    for (day_name, spec) in SPLIT_TEMPLATE {
        // Focus categories first; otherwise keep template order
        let is_focus = |cat: &str| focus.iter().any(|f| f == cat);
        let mut ordered: Vec<(&str, usize)> = Vec::with_capacity(spec.len());
        ordered.extend(spec.iter().copied().filter(|&(cat, _)| is_focus(cat)));
        ordered.extend(spec.iter().copied().filter(|&(cat, _)| !is_focus(cat)));

        let mut exercises = Vec::new();
        for (category, count) in ordered {
            for name in pick_n(category, count, &mut used_names) {
                let (reps, set_count) = rep_scheme(category, name);
                let suggested = suggest_weight(&history, name, reps);
                let sets = (1..=set_count)
                    .map(|set_number| SetPlan {
                        set_number,
                        reps,
                        suggested_weight: suggested,
                    })
                    .collect();
                exercises.push(ExercisePlan {
                    name: name.to_owned(),
                    category: category.to_owned(),
                    sets,
                });
            }
        }
        days.push(DayPlan {
            name: (*day_name).to_owned(),
            exercises,
        });
    }

    let missing_exercise_types = missing_from_catalog(&days, catalog);
    let draft = build_draft(&days);
    let cta = build_cta(&missing_exercise_types);

    RecommendationPlan {
        days,
        focus_categories: focus,
        over_trained_categories: over_trained,
        missing_exercise_types,
        draft,
        cta,
    }
}

/// Sample `count` names from a category pool, preferring unused names
///
/// Walks the pool in preference order taking names not chosen anywhere in the
/// plan yet; when the pool is exhausted it wraps around and accepts repeats
/// from other days (never a duplicate within one pick).
fn pick_n(category: &str, count: usize, used: &mut BTreeSet<String>) -> Vec<&'static str> {
    let pool = EXERCISE_POOLS
        .iter()
        .find(|(cat, _)| *cat == category)
        .map(|(_, names)| *names)
        .unwrap_or(&[]);

    let mut chosen: Vec<&'static str> = Vec::with_capacity(count);
    for &name in pool {
        if chosen.len() == count {
            break;
        }
        if used.insert(name.to_lowercase()) {
            chosen.push(name);
        }
    }
    // Pool exhausted: wrap around, allowing cross-day repeats
    for &name in pool {
        if chosen.len() == count {
            break;
        }
        if !chosen.contains(&name) {
            chosen.push(name);
        }
    }
    chosen
}

/// Rep/set scheme for a chosen exercise
const fn rep_scheme_counts(is_abdomen: bool, is_compound: bool) -> (u32, u32) {
    if is_abdomen {
        (15, 3)
    } else if is_compound {
        (8, 3)
    } else {
        (10, 3)
    }
}

fn rep_scheme(category: &str, name: &str) -> (u32, u32) {
    let lower = name.to_lowercase();
    let is_compound = BIG_COMPOUNDS.contains(&lower.as_str());
    rep_scheme_counts(category == "abdomen", is_compound)
}

/// Suggest a working weight from the most recent top set of the exercise
///
/// Scans sessions newest first (capped) and takes the first session holding
/// at least one set of the exercise; the heaviest set of that session is the
/// reference. Unknown exercises suggest 0.
fn suggest_weight(history_desc: &[&TrainingRecord], name: &str, reps: u32) -> f64 {
    let wanted = name.to_lowercase();
    for record in history_desc.iter().take(WEIGHT_SCAN_SESSION_CAP) {
        for exercise in &record.exercises {
            if exercise.name.to_lowercase() != wanted {
                continue;
            }
            if let Some(top) = exercise.top_set() {
                let factor = if reps <= 8 { LOW_REP_FACTOR } else { HIGH_REP_FACTOR };
                return round_to_step(top.weight * factor, WEIGHT_STEP);
            }
        }
    }
    0.0
}

/// Round to the nearest multiple of `step`
fn round_to_step(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}

/// Chosen names absent from the catalog, case-insensitively, in plan order
fn missing_from_catalog(days: &[DayPlan], catalog: &[ExerciseTypeEntry]) -> Vec<String> {
    let known: BTreeSet<String> = catalog.iter().map(|e| e.name.to_lowercase()).collect();

    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut missing = Vec::new();
    for day in days {
        for exercise in &day.exercises {
            let lower = exercise.name.to_lowercase();
            if !known.contains(&lower) && seen.insert(lower) {
                missing.push(exercise.name.clone());
            }
        }
    }
    missing
}

/// Flatten the day blocks into the routine-creation payload
fn build_draft(days: &[DayPlan]) -> RoutineDraft {
    let mut exercises = Vec::new();
    let mut order_index = 0u32;
    for day in days {
        for exercise in &day.exercises {
            exercises.push(RoutineExercise {
                name: exercise.name.clone(),
                category: exercise.category.clone(),
                order_index,
                sets: exercise
                    .sets
                    .iter()
                    .map(|s| RoutineSet {
                        set_number: s.set_number,
                        weight: s.suggested_weight,
                        reps: s.reps,
                    })
                    .collect(),
            });
            order_index += 1;
        }
    }

    RoutineDraft {
        name: "AI Coach 4-Day Split".to_owned(),
        memo: Some("Generated from your last 4 weeks of training".to_owned()),
        exercises,
    }
}

/// Call-to-action line appended to the plan
fn build_cta(missing: &[String]) -> String {
    if missing.is_empty() {
        "Want me to save this routine to your library?".to_owned()
    } else {
        format!(
            "Want me to add {} to your exercise catalog and save this routine?",
            missing.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    use crate::models::{ExerciseEntry, Intensity, SetEntry};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record_with(name: &str, category: &str, weight: f64, reps: u32, d: NaiveDate) -> TrainingRecord {
        let set = SetEntry {
            set_number: 1,
            weight,
            reps,
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        };
        let mut volume_by_category = BTreeMap::new();
        volume_by_category.insert(category.to_owned(), set.volume());
        TrainingRecord {
            id: format!("rec-{name}-{d}"),
            date: d,
            performed_at: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
            memo: None,
            intensity: Intensity::Normal,
            volume_by_category,
            exercises: vec![ExerciseEntry {
                id: format!("ex-{name}"),
                name: name.to_owned(),
                category: category.to_owned(),
                order_index: 0,
                memo: None,
                sets: vec![set],
            }],
            deleted: false,
        }
    }

    #[test]
    fn test_empty_history_yields_full_plan_with_zero_weights() {
        let plan = recommend_routine(&[], &[], date(2025, 6, 15), &[]);
        assert_eq!(plan.days.len(), 4);
        assert!(plan.days.iter().all(|d| !d.exercises.is_empty()));
        for day in &plan.days {
            for exercise in &day.exercises {
                assert!(exercise.sets.iter().all(|s| s.suggested_weight == 0.0));
            }
        }
        assert!(!plan.draft.exercises.is_empty());
    }

    #[test]
    fn test_determinism_byte_identical_draft() {
        let records = vec![
            record_with("Bench Press", "chest", 80.0, 5, date(2025, 6, 10)),
            record_with("Squat", "legs", 120.0, 5, date(2025, 6, 12)),
        ];
        let focus = vec!["back".to_owned()];
        let a = recommend_routine(&records, &[], date(2025, 6, 15), &focus);
        let b = recommend_routine(&records, &[], date(2025, 6, 15), &focus);
        assert_eq!(
            serde_json::to_vec(&a.draft).unwrap(),
            serde_json::to_vec(&b.draft).unwrap()
        );
    }

    #[test]
    fn test_rep_schemes() {
        assert_eq!(rep_scheme("abdomen", "Crunch"), (15, 3));
        assert_eq!(rep_scheme("legs", "Squat"), (8, 3));
        assert_eq!(rep_scheme("shoulder", "Lateral Raise"), (10, 3));
    }

    #[test]
    fn test_weight_suggestion_rounds_to_step() {
        let records = vec![record_with("Squat", "legs", 113.0, 5, date(2025, 6, 10))];
        let history: Vec<&TrainingRecord> = records.iter().collect();
        // 113 * 0.9 = 101.7 → 102.5
        let suggested = suggest_weight(&history, "Squat", 8);
        assert!((suggested - 102.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_most_recent_top_set_wins() {
        let records = vec![
            record_with("Bench Press", "chest", 100.0, 5, date(2025, 6, 1)),
            record_with("Bench Press", "chest", 80.0, 5, date(2025, 6, 12)),
        ];
        let mut history: Vec<&TrainingRecord> = records.iter().collect();
        history.sort_by(|a, b| b.date.cmp(&a.date));
        // The newer 80kg session wins over the older 100kg one
        let suggested = suggest_weight(&history, "Bench Press", 8);
        assert!((suggested - 72.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_exercise_types_exact() {
        let catalog: Vec<ExerciseTypeEntry> = ["bench press", "squat", "deadlift"]
            .iter()
            .enumerate()
            .map(|(i, name)| ExerciseTypeEntry {
                id: format!("t{i}"),
                name: (*name).to_owned(),
                category: "any".to_owned(),
                memo: None,
            })
            .collect();

        let plan = recommend_routine(&[], &catalog, date(2025, 6, 15), &[]);

        let chosen_lower: BTreeSet<String> = plan
            .days
            .iter()
            .flat_map(|d| d.exercises.iter().map(|e| e.name.to_lowercase()))
            .collect();
        let known: BTreeSet<String> = catalog.iter().map(|e| e.name.to_lowercase()).collect();

        let expected: BTreeSet<String> = chosen_lower.difference(&known).cloned().collect();
        let actual: BTreeSet<String> = plan
            .missing_exercise_types
            .iter()
            .map(|n| n.to_lowercase())
            .collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_pick_n_prefers_unused_then_wraps() {
        let mut used = BTreeSet::new();
        let first = pick_n("abdomen", 3, &mut used);
        assert_eq!(first, vec!["Plank", "Crunch", "Hanging Leg Raise"]);
        let second = pick_n("abdomen", 3, &mut used);
        // Two unused remain, then the pool wraps from the start
        assert_eq!(second, vec!["Cable Crunch", "Russian Twist", "Plank"]);
    }

    #[test]
    fn test_cta_mentions_missing_types() {
        let with_gap = build_cta(&["Face Pull".to_owned()]);
        assert!(with_gap.contains("Face Pull"));
        let without = build_cta(&[]);
        assert!(without.contains("save this routine"));
    }
}
