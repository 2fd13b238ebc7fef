// ABOUTME: Heuristic training-risk detection over the trailing two weeks of records
// ABOUTME: Flags high-intensity streaks, rest deficits, and sudden per-category volume spikes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Risk Detector
//!
//! Scans the last 14 days of training and emits independent, human-readable
//! risk signals. The checks are not mutually exclusive; all of them may fire
//! on the same history. The output is advisory context for the coach model,
//! never a hard gate on anything.

use chrono::{Days, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::TrainingRecord;

/// Days of history the detector looks at
const SCAN_WINDOW_DAYS: u64 = 14;

/// Consecutive High/VeryHigh sessions that trigger the streak signal
const HIGH_STREAK_THRESHOLD: usize = 3;

/// Active days within the trailing 7-day window that trigger the rest signal
const REST_DEFICIT_THRESHOLD: usize = 6;

/// Trailing-vs-prior weekly volume ratio that counts as a spike
const SPIKE_RATIO: f64 = 1.4;

/// Minimum trailing weekly volume before a spike is worth flagging
///
/// Guards against flagging noise on nearly-zero baselines.
const SPIKE_VOLUME_FLOOR: f64 = 3000.0;

/// Detect heuristic safety signals in the trailing 14 days of history
///
/// Returns a flat list of human-readable risk strings, empty when nothing
/// fires. Soft-deleted records are ignored.
#[must_use]
pub fn detect_risk(records: &[TrainingRecord], today: NaiveDate) -> Vec<String> {
    let from = today - Days::new(SCAN_WINDOW_DAYS - 1);
    let mut window: Vec<&TrainingRecord> = records
        .iter()
        .filter(|r| !r.deleted && r.date >= from && r.date <= today)
        .collect();
    window.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.performed_at.cmp(&a.performed_at))
    });

    let mut signals = Vec::new();

    if let Some(streak) = high_intensity_streak(&window) {
        signals.push(format!(
            "{streak} consecutive high-intensity sessions without an easier session in between"
        ));
    }

    let active = active_days_last_week(&window, today);
    if active >= REST_DEFICIT_THRESHOLD {
        signals.push(format!(
            "{active} active days in the last 7 days; fewer rest days than recommended"
        ));
    }

    for (category, trailing, prior) in category_spikes(&window, today) {
        signals.push(format!(
            "Volume spike in '{category}': {trailing:.0} this week vs {prior:.0} the week before"
        ));
    }

    signals
}

/// Length of the High/VeryHigh streak counted from the most recent session
///
/// The scan walks sessions newest first and stops at the first session logged
/// below High; a streak shorter than the threshold yields `None`.
fn high_intensity_streak(window_desc: &[&TrainingRecord]) -> Option<usize> {
    let mut streak = 0usize;
    for record in window_desc {
        if record.intensity.is_high() {
            streak += 1;
        } else {
            break;
        }
    }
    (streak >= HIGH_STREAK_THRESHOLD).then_some(streak)
}

/// Distinct calendar days with at least one session in the trailing 7 days
fn active_days_last_week(window_desc: &[&TrainingRecord], today: NaiveDate) -> usize {
    let from = today - Days::new(6);
    let days: BTreeSet<NaiveDate> = window_desc
        .iter()
        .filter(|r| r.date >= from)
        .map(|r| r.date)
        .collect();
    days.len()
}

/// Categories whose trailing-7-day volume spiked against the prior 7 days
///
/// A spike requires both the ratio and the absolute floor: trailing volume
/// must exceed `SPIKE_RATIO` × prior volume and `SPIKE_VOLUME_FLOOR` units.
fn category_spikes(
    window_desc: &[&TrainingRecord],
    today: NaiveDate,
) -> Vec<(String, f64, f64)> {
    let trailing_from = today - Days::new(6);

    let mut trailing: BTreeMap<String, f64> = BTreeMap::new();
    let mut prior: BTreeMap<String, f64> = BTreeMap::new();

    for record in window_desc {
        let bucket = if record.date >= trailing_from {
            &mut trailing
        } else {
            &mut prior
        };
        for (category, volume) in &record.volume_by_category {
            *bucket.entry(category.clone()).or_insert(0.0) += volume;
        }
    }

    trailing
        .into_iter()
        .filter_map(|(category, recent)| {
            let before = prior.get(&category).copied().unwrap_or(0.0);
            let spiked = recent > before * SPIKE_RATIO && recent > SPIKE_VOLUME_FLOOR;
            spiked.then_some((category, recent, before))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    use crate::models::Intensity;

    fn record(id: &str, date: NaiveDate, intensity: Intensity, volume: f64) -> TrainingRecord {
        let mut volume_by_category = BTreeMap::new();
        volume_by_category.insert("legs".to_owned(), volume);
        TrainingRecord {
            id: id.to_owned(),
            date,
            performed_at: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
            memo: None,
            intensity,
            volume_by_category,
            exercises: Vec::new(),
            deleted: false,
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[test]
    fn test_streak_requires_three_uninterrupted() {
        let today = date(14);
        // Most recent first once sorted: 14 HIGH, 13 HIGH, 12 LOW, 11 HIGH
        let records = vec![
            record("a", date(11), Intensity::High, 100.0),
            record("b", date(12), Intensity::Low, 100.0),
            record("c", date(13), Intensity::High, 100.0),
            record("d", date(14), Intensity::VeryHigh, 100.0),
        ];
        let signals = detect_risk(&records, today);
        assert!(!signals.iter().any(|s| s.contains("consecutive")));
    }

    #[test]
    fn test_streak_fires_on_three_recent_highs() {
        let today = date(14);
        let records = vec![
            record("a", date(12), Intensity::High, 100.0),
            record("b", date(13), Intensity::VeryHigh, 100.0),
            record("c", date(14), Intensity::High, 100.0),
        ];
        let signals = detect_risk(&records, today);
        assert!(signals.iter().any(|s| s.contains("3 consecutive")));
    }

    #[test]
    fn test_rest_deficit_on_six_active_days() {
        let today = date(14);
        let records: Vec<TrainingRecord> = (9..=14)
            .map(|d| record(&format!("r{d}"), date(d), Intensity::Normal, 100.0))
            .collect();
        let signals = detect_risk(&records, today);
        assert!(signals.iter().any(|s| s.contains("6 active days")));
    }

    #[test]
    fn test_spike_needs_ratio_and_floor() {
        let today = date(14);
        // Prior week 2000, trailing week 3500: ratio 1.75 and above floor
        let records = vec![
            record("old", date(5), Intensity::Normal, 2000.0),
            record("new", date(12), Intensity::Normal, 3500.0),
        ];
        let signals = detect_risk(&records, today);
        assert!(signals.iter().any(|s| s.contains("Volume spike")));

        // Same ratio far below the floor must stay quiet
        let quiet = vec![
            record("old", date(5), Intensity::Normal, 200.0),
            record("new", date(12), Intensity::Normal, 350.0),
        ];
        assert!(detect_risk(&quiet, today).is_empty());
    }
}
