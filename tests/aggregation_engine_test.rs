// ABOUTME: Property-level tests for the aggregation engine over seeded histories
// ABOUTME: Volume conservation, Epley exactness, deleted-record exclusion, week bucketing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{date, exercise, record, set};
use milo_coach_server::intelligence::{
    epley_one_rm, exercise_timeseries, pr_trend, recent_sessions, recent_stats,
};
use milo_coach_server::models::Intensity;

#[test]
fn test_volume_totals_equal_category_sums() {
    let today = date(2025, 6, 15);
    let mut deleted = record(
        "gone",
        date(2025, 6, 10),
        Intensity::High,
        vec![exercise("Deadlift", "back", vec![set(1, 140.0, 3)])],
    );
    deleted.deleted = true;

    let records = vec![
        record(
            "a",
            date(2025, 6, 9),
            Intensity::Normal,
            vec![
                exercise("Bench Press", "chest", vec![set(1, 80.0, 5), set(2, 75.0, 8)]),
                exercise("Squat", "legs", vec![set(1, 100.0, 5)]),
            ],
        ),
        record(
            "b",
            date(2025, 6, 12),
            Intensity::Low,
            vec![exercise("Lat Pulldown", "back", vec![set(1, 55.0, 10)])],
        ),
        deleted,
    ];

    let stats = recent_stats(&records, today, 4);

    let category_sum: f64 = stats.volume_by_category.values().sum();
    assert!((stats.total_volume - category_sum).abs() < f64::EPSILON);

    // The deleted deadlift session contributes nothing anywhere
    assert!(!stats.volume_by_category.contains_key("back") || {
        (stats.volume_by_category["back"] - 550.0).abs() < f64::EPSILON
    });
    assert_eq!(stats.session_count, 2);
}

#[test]
fn test_epley_exact_for_single_set() {
    let today = date(2025, 6, 15);
    for (weight, reps) in [(0.0, 0), (60.0, 1), (100.0, 10), (42.5, 12)] {
        let records = vec![record(
            "r",
            date(2025, 6, 11),
            Intensity::Normal,
            vec![exercise("Overhead Press", "shoulder", vec![set(1, weight, reps)])],
        )];
        let series = exercise_timeseries(&records, "Overhead Press", today, 30);
        assert_eq!(series.len(), 1);
        let expected = weight * (1.0 + f64::from(reps) / 30.0);
        assert!(
            (series[0].estimated_one_rm - expected).abs() < f64::EPSILON,
            "epley mismatch for {weight}x{reps}"
        );
        assert!((epley_one_rm(weight, reps) - expected).abs() < f64::EPSILON);
    }
}

#[test]
fn test_zero_records_zero_stats() {
    let stats = recent_stats(&[], date(2025, 6, 15), 4);
    assert_eq!(stats.session_count, 0);
    assert!((stats.total_volume).abs() < f64::EPSILON);
    assert_eq!(stats.total_sets, 0);
}

#[test]
fn test_sessions_sorted_newest_first_and_capped() {
    let records: Vec<_> = (1..=5)
        .map(|d| {
            record(
                &format!("r{d}"),
                date(2025, 6, d),
                Intensity::Normal,
                vec![exercise("Squat", "legs", vec![set(1, 100.0, 5)])],
            )
        })
        .collect();

    let sessions = recent_sessions(&records, 3);
    assert_eq!(sessions.len(), 3);
    assert_eq!(sessions[0].record_id, "r5");
    assert_eq!(sessions[2].record_id, "r3");
}

#[test]
fn test_pr_trend_weekly_maxima() {
    let today = date(2025, 6, 15);
    let records = vec![
        // Same ISO week: only the stronger estimate survives
        record(
            "a",
            date(2025, 6, 2),
            Intensity::Normal,
            vec![exercise("Squat", "legs", vec![set(1, 100.0, 5)])],
        ),
        record(
            "b",
            date(2025, 6, 4),
            Intensity::Normal,
            vec![exercise("Squat", "legs", vec![set(1, 110.0, 3)])],
        ),
        record(
            "c",
            date(2025, 6, 9),
            Intensity::Normal,
            vec![exercise("Squat", "legs", vec![set(1, 105.0, 8)])],
        ),
    ];

    let trend = pr_trend(&records, "Squat", today, 60);
    assert_eq!(trend.len(), 2);
    assert_eq!(trend[0].week_start, date(2025, 6, 2));
    assert!((trend[0].est_one_rm - epley_one_rm(110.0, 3)).abs() < f64::EPSILON);
    assert!((trend[1].est_one_rm - epley_one_rm(105.0, 8)).abs() < f64::EPSILON);
}
