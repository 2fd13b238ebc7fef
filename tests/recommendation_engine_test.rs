// ABOUTME: Property-level tests for the routine recommendation engine
// ABOUTME: Determinism, catalog-gap exactness, empty-history behavior, scheme assignment
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::collections::BTreeSet;

use common::{catalog_entry, date, exercise, record, set};
use milo_coach_server::intelligence::recommend_routine;
use milo_coach_server::models::Intensity;

#[test]
fn test_byte_identical_draft_for_identical_input() {
    let records = vec![
        record(
            "a",
            date(2025, 6, 2),
            Intensity::Normal,
            vec![exercise("Bench Press", "chest", vec![set(1, 80.0, 5)])],
        ),
        record(
            "b",
            date(2025, 6, 9),
            Intensity::High,
            vec![exercise("Squat", "legs", vec![set(1, 130.0, 3)])],
        ),
    ];
    let catalog = vec![catalog_entry("t1", "Bench Press", "chest")];
    let focus = vec!["shoulder".to_owned()];

    let first = recommend_routine(&records, &catalog, date(2025, 6, 15), &focus);
    let second = recommend_routine(&records, &catalog, date(2025, 6, 15), &focus);

    assert_eq!(
        serde_json::to_vec(&first.draft).unwrap(),
        serde_json::to_vec(&second.draft).unwrap()
    );
    assert_eq!(first.missing_exercise_types, second.missing_exercise_types);
    assert_eq!(first.cta, second.cta);
}

#[test]
fn test_missing_types_are_exactly_the_catalog_gaps() {
    let catalog = vec![
        catalog_entry("t1", "BENCH PRESS", "chest"),
        catalog_entry("t2", "squat", "legs"),
        catalog_entry("t3", "Plank", "abdomen"),
    ];
    let plan = recommend_routine(&[], &catalog, date(2025, 6, 15), &[]);

    let chosen: BTreeSet<String> = plan
        .days
        .iter()
        .flat_map(|d| d.exercises.iter().map(|e| e.name.to_lowercase()))
        .collect();
    let known: BTreeSet<String> = catalog.iter().map(|e| e.name.to_lowercase()).collect();
    let expected: BTreeSet<String> = chosen.difference(&known).cloned().collect();

    let reported: BTreeSet<String> = plan
        .missing_exercise_types
        .iter()
        .map(|n| n.to_lowercase())
        .collect();

    // Exactly the gaps: no more, no fewer, case-insensitively
    assert_eq!(reported, expected);
    assert!(!reported.contains("bench press"));
    assert!(!reported.contains("squat"));
    assert!(!reported.contains("plank"));
}

#[test]
fn test_empty_history_full_plan_with_unknown_weights() {
    let plan = recommend_routine(&[], &[], date(2025, 6, 15), &[]);

    assert_eq!(plan.days.len(), 4);
    let names: Vec<&str> = plan.days.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["Upper", "Lower", "Pull", "Push"]);

    for day in &plan.days {
        assert!(!day.exercises.is_empty());
        for exercise_plan in &day.exercises {
            assert!(!exercise_plan.sets.is_empty());
            for set_plan in &exercise_plan.sets {
                assert!((set_plan.suggested_weight).abs() < f64::EPSILON);
            }
        }
    }
}

#[test]
fn test_schemes_by_category_and_compound() {
    let plan = recommend_routine(&[], &[], date(2025, 6, 15), &[]);

    for day in &plan.days {
        for exercise_plan in &day.exercises {
            let reps = exercise_plan.sets[0].reps;
            assert_eq!(exercise_plan.sets.len(), 3);
            if exercise_plan.category == "abdomen" {
                assert_eq!(reps, 15, "{}", exercise_plan.name);
            } else if ["Squat", "Deadlift", "Bench Press", "Overhead Press", "Barbell Row"]
                .contains(&exercise_plan.name.as_str())
            {
                assert_eq!(reps, 8, "{}", exercise_plan.name);
            } else {
                assert_eq!(reps, 10, "{}", exercise_plan.name);
            }
            // Set numbers are contiguous from 1
            for (index, set_plan) in exercise_plan.sets.iter().enumerate() {
                assert_eq!(set_plan.set_number as usize, index + 1);
            }
        }
    }
}

#[test]
fn test_weight_suggestion_from_recent_history() {
    // Bench Press appears in the Upper day; the most recent top set is 100kg,
    // so the 8-rep compound scheme suggests 0.9 × 100 = 90.
    let records = vec![record(
        "a",
        date(2025, 6, 10),
        Intensity::Normal,
        vec![exercise("Bench Press", "chest", vec![set(1, 100.0, 5)])],
    )];
    let plan = recommend_routine(&records, &[], date(2025, 6, 15), &[]);

    let bench = plan
        .days
        .iter()
        .flat_map(|d| &d.exercises)
        .find(|e| e.name == "Bench Press")
        .unwrap();
    assert!((bench.sets[0].suggested_weight - 90.0).abs() < f64::EPSILON);
}

#[test]
fn test_focus_targets_reorder_day_filling() {
    let plan = recommend_routine(&[], &[], date(2025, 6, 15), &["abdomen".to_owned()]);
    assert!(plan.focus_categories.contains(&"abdomen".to_owned()));

    // In the Lower day the abdomen slot is filled before legs
    let lower = plan.days.iter().find(|d| d.name == "Lower").unwrap();
    assert_eq!(lower.exercises[0].category, "abdomen");
}

#[test]
fn test_draft_flattens_plan_in_order() {
    let plan = recommend_routine(&[], &[], date(2025, 6, 15), &[]);

    let plan_names: Vec<String> = plan
        .days
        .iter()
        .flat_map(|d| d.exercises.iter().map(|e| e.name.clone()))
        .collect();
    let draft_names: Vec<String> = plan.draft.exercises.iter().map(|e| e.name.clone()).collect();
    assert_eq!(plan_names, draft_names);

    for (index, exercise_draft) in plan.draft.exercises.iter().enumerate() {
        assert_eq!(exercise_draft.order_index as usize, index);
    }
}

#[test]
fn test_cta_differs_with_catalog_gaps() {
    let with_gaps = recommend_routine(&[], &[], date(2025, 6, 15), &[]);
    assert!(with_gaps.cta.contains("add"));

    // A catalog covering every pool entry leaves no gaps
    let full_catalog: Vec<_> = [
        "Bench Press", "Incline Dumbbell Press", "Chest Press Machine", "Cable Crossover", "Dips",
        "Deadlift", "Lat Pulldown", "Barbell Row", "Seated Cable Row", "Pull Up",
        "Overhead Press", "Dumbbell Shoulder Press", "Lateral Raise", "Face Pull", "Rear Delt Fly",
        "Squat", "Leg Press", "Romanian Deadlift", "Leg Extension", "Leg Curl", "Walking Lunge",
        "Barbell Curl", "Triceps Pushdown", "Hammer Curl", "Skull Crusher", "Dumbbell Curl",
        "Plank", "Crunch", "Hanging Leg Raise", "Cable Crunch", "Russian Twist",
    ]
    .iter()
    .enumerate()
    .map(|(i, name)| catalog_entry(&format!("t{i}"), name, "any"))
    .collect();

    let without_gaps = recommend_routine(&[], &full_catalog, date(2025, 6, 15), &[]);
    assert!(without_gaps.missing_exercise_types.is_empty());
    assert!(without_gaps.cta.contains("save this routine"));
    assert_ne!(with_gaps.cta, without_gaps.cta);
}
