// ABOUTME: Weekly training-volume aggregation and read-only projections over training history
// ABOUTME: ISO-week bucketing, Epley one-rep-max estimation, category breakdowns, best-set lookups
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Aggregation Engine
//!
//! Pure functions over a time-bounded slice of training records. Windows are
//! computed against the record's user-local calendar date (`TrainingRecord::date`),
//! not the UTC timestamp, to avoid day-boundary skew. Aggregates are produced
//! fresh on every call and never cached.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Intensity, TrainingRecord};

/// Divisor in the Epley estimated one-rep-max formula
const EPLEY_DIVISOR: f64 = 30.0;

/// Estimated one-rep-max via Epley: `weight * (1 + reps / 30)`
#[must_use]
pub fn epley_one_rm(weight: f64, reps: u32) -> f64 {
    weight * (1.0 + f64::from(reps) / EPLEY_DIVISOR)
}

/// Monday of the ISO week containing `date`
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// Non-deleted records whose calendar date falls in `[from, to]`, any order
fn records_in_window<'a>(
    records: &'a [TrainingRecord],
    from: NaiveDate,
    to: NaiveDate,
) -> impl Iterator<Item = &'a TrainingRecord> {
    records
        .iter()
        .filter(move |r| !r.deleted && r.date >= from && r.date <= to)
}

/// First day of a trailing window of `days` days ending at `today` (inclusive)
pub(crate) fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today - Days::new(u64::from(days.saturating_sub(1)))
}

// ============================================================================
// Recent Stats
// ============================================================================

/// Summary of recent training activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentStats {
    pub session_count: usize,
    pub avg_sessions_per_week: f64,
    pub total_sets: usize,
    pub total_reps: u64,
    pub total_volume: f64,
    pub volume_by_category: BTreeMap<String, f64>,
}

/// Aggregate the trailing `weeks` full weeks of history
#[must_use]
pub fn recent_stats(records: &[TrainingRecord], today: NaiveDate, weeks: u32) -> RecentStats {
    let from = window_start(today, weeks * 7);

    let mut session_count = 0usize;
    let mut total_sets = 0usize;
    let mut total_reps = 0u64;
    let mut volume_by_category: BTreeMap<String, f64> = BTreeMap::new();

    for record in records_in_window(records, from, today) {
        session_count += 1;
        for exercise in &record.exercises {
            total_sets += exercise.sets.len();
            total_reps += exercise.sets.iter().map(|s| u64::from(s.reps)).sum::<u64>();
        }
        for (category, volume) in &record.volume_by_category {
            *volume_by_category.entry(category.clone()).or_insert(0.0) += volume;
        }
    }

    let total_volume = volume_by_category.values().sum();
    #[allow(clippy::cast_precision_loss)]
    let avg_sessions_per_week = if weeks == 0 {
        0.0
    } else {
        session_count as f64 / f64::from(weeks)
    };

    RecentStats {
        session_count,
        avg_sessions_per_week,
        total_sets,
        total_reps,
        total_volume,
        volume_by_category,
    }
}

// ============================================================================
// Exercise Timeseries
// ============================================================================

/// Per-ISO-week aggregate for one exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekAggregate {
    /// Monday of the ISO week
    pub week_start: NaiveDate,
    pub total_volume: f64,
    pub total_sets: usize,
    pub total_reps: u64,
    pub top_set_weight: f64,
    /// Epley estimate from the week's top weight and total reps
    pub estimated_one_rm: f64,
}

/// Weekly volume/sets/reps/top-set series for one exercise over `since_days`
///
/// Exercise names compare case-insensitively. Weeks with no matching sets are
/// omitted; the result is ordered oldest week first.
#[must_use]
pub fn exercise_timeseries(
    records: &[TrainingRecord],
    exercise_name: &str,
    today: NaiveDate,
    since_days: u32,
) -> Vec<WeekAggregate> {
    let from = window_start(today, since_days);
    let wanted = exercise_name.to_lowercase();

    struct WeekAccum {
        volume: f64,
        sets: usize,
        reps: u64,
        top_weight: f64,
    }

    let mut weeks: BTreeMap<NaiveDate, WeekAccum> = BTreeMap::new();

    for record in records_in_window(records, from, today) {
        for exercise in &record.exercises {
            if exercise.name.to_lowercase() != wanted {
                continue;
            }
            let bucket = weeks.entry(week_start(record.date)).or_insert(WeekAccum {
                volume: 0.0,
                sets: 0,
                reps: 0,
                top_weight: 0.0,
            });
            for set in &exercise.sets {
                bucket.volume += set.volume();
                bucket.sets += 1;
                bucket.reps += u64::from(set.reps);
                if set.weight > bucket.top_weight {
                    bucket.top_weight = set.weight;
                }
            }
        }
    }

    weeks
        .into_iter()
        .map(|(start, accum)| {
            #[allow(clippy::cast_precision_loss)]
            let estimated_one_rm = accum.top_weight * (1.0 + accum.reps as f64 / EPLEY_DIVISOR);
            WeekAggregate {
                week_start: start,
                total_volume: accum.volume,
                total_sets: accum.sets,
                total_reps: accum.reps,
                top_set_weight: accum.top_weight,
                estimated_one_rm,
            }
        })
        .collect()
}

// ============================================================================
// Category Breakdown
// ============================================================================

/// Volume and share of one training category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: String,
    pub volume: f64,
    /// Fraction of the total volume in the window, 0.0 when nothing was logged
    pub share: f64,
}

/// Per-category volume and share over the trailing `weeks` weeks
///
/// Ordered by descending volume, then category name for a stable output.
#[must_use]
pub fn category_breakdown(
    records: &[TrainingRecord],
    today: NaiveDate,
    weeks: u32,
) -> Vec<CategoryShare> {
    let stats = recent_stats(records, today, weeks);
    let total = stats.total_volume;

    let mut shares: Vec<CategoryShare> = stats
        .volume_by_category
        .into_iter()
        .map(|(category, volume)| CategoryShare {
            category,
            volume,
            share: if total > 0.0 { volume / total } else { 0.0 },
        })
        .collect();

    shares.sort_by(|a, b| {
        b.volume
            .total_cmp(&a.volume)
            .then_with(|| a.category.cmp(&b.category))
    });
    shares
}

// ============================================================================
// Recent Sessions
// ============================================================================

/// One-line projection of a training session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub record_id: String,
    pub date: NaiveDate,
    pub intensity: Intensity,
    pub total_volume: f64,
    pub exercise_count: usize,
    #[serde(default)]
    pub memo: Option<String>,
}

/// Most recent sessions, newest first, capped at `limit`
#[must_use]
pub fn recent_sessions(records: &[TrainingRecord], limit: usize) -> Vec<SessionSummary> {
    let mut live: Vec<&TrainingRecord> = records.iter().filter(|r| !r.deleted).collect();
    live.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.performed_at.cmp(&a.performed_at))
    });

    live.into_iter()
        .take(limit)
        .map(|r| SessionSummary {
            record_id: r.id.clone(),
            date: r.date,
            intensity: r.intensity,
            total_volume: r.total_volume(),
            exercise_count: r.exercises.len(),
            memo: r.memo.clone(),
        })
        .collect()
}

// ============================================================================
// Best Set / PR Trend
// ============================================================================

/// The heaviest logged set of an exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestSet {
    pub weight: f64,
    pub reps: u32,
    pub date: NaiveDate,
    pub estimated_one_rm: f64,
}

/// Heaviest set of `exercise_name` within `since_days`, if one exists
///
/// Scans newest session first; on equal weight the more recent set wins.
#[must_use]
pub fn best_set(
    records: &[TrainingRecord],
    exercise_name: &str,
    today: NaiveDate,
    since_days: u32,
) -> Option<BestSet> {
    let from = window_start(today, since_days);
    let wanted = exercise_name.to_lowercase();

    let mut in_window: Vec<&TrainingRecord> = records_in_window(records, from, today).collect();
    in_window.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.performed_at.cmp(&a.performed_at))
    });

    let mut best: Option<BestSet> = None;
    for record in in_window {
        for exercise in &record.exercises {
            if exercise.name.to_lowercase() != wanted {
                continue;
            }
            for set in &exercise.sets {
                let beats = best.as_ref().is_none_or(|b| set.weight > b.weight);
                if beats {
                    best = Some(BestSet {
                        weight: set.weight,
                        reps: set.reps,
                        date: record.date,
                        estimated_one_rm: epley_one_rm(set.weight, set.reps),
                    });
                }
            }
        }
    }
    best
}

/// One point in a personal-record trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrPoint {
    pub week_start: NaiveDate,
    /// Best per-set Epley estimate logged that week
    pub est_one_rm: f64,
}

/// Weekly best estimated one-rep-max for an exercise, oldest week first
#[must_use]
pub fn pr_trend(
    records: &[TrainingRecord],
    exercise_name: &str,
    today: NaiveDate,
    since_days: u32,
) -> Vec<PrPoint> {
    let from = window_start(today, since_days);
    let wanted = exercise_name.to_lowercase();

    let mut weeks: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in records_in_window(records, from, today) {
        for exercise in &record.exercises {
            if exercise.name.to_lowercase() != wanted {
                continue;
            }
            for set in &exercise.sets {
                let estimate = epley_one_rm(set.weight, set.reps);
                let entry = weeks.entry(week_start(record.date)).or_insert(0.0);
                if estimate > *entry {
                    *entry = estimate;
                }
            }
        }
    }

    weeks
        .into_iter()
        .map(|(start, est)| PrPoint {
            week_start: start,
            est_one_rm: est,
        })
        .collect()
}

// ============================================================================
// Day Record Summary
// ============================================================================

/// Per-exercise line of a single-session summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayExercise {
    pub name: String,
    pub category: String,
    pub set_count: usize,
    pub top_weight: f64,
    pub volume: f64,
}

/// Projection of one training record for tool consumption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub record_id: String,
    pub date: NaiveDate,
    pub intensity: Intensity,
    #[serde(default)]
    pub memo: Option<String>,
    pub total_volume: f64,
    pub exercises: Vec<DayExercise>,
}

/// Summarize a single record (deleted records yield `None`)
#[must_use]
pub fn day_record_summary(record: &TrainingRecord) -> Option<DaySummary> {
    if record.deleted {
        return None;
    }
    let exercises = record
        .exercises
        .iter()
        .map(|e| DayExercise {
            name: e.name.clone(),
            category: e.category.clone(),
            set_count: e.sets.len(),
            top_weight: e.top_set().map_or(0.0, |s| s.weight),
            volume: e.sets.iter().map(crate::models::SetEntry::volume).sum(),
        })
        .collect();

    Some(DaySummary {
        record_id: record.id.clone(),
        date: record.date,
        intensity: record.intensity,
        memo: record.memo.clone(),
        total_volume: record.total_volume(),
        exercises,
    })
}
