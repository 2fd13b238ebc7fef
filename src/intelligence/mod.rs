// ABOUTME: Training analytics engines: aggregation, risk detection, and routine recommendation
// ABOUTME: Pure, deterministic computations over a user's historical training records
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Intelligence Engines
//!
//! The data the coach is allowed to reason over is computed here:
//!
//! - [`aggregation`]: weekly volume/one-rep-max aggregation and read-only
//!   projections over training history
//! - [`risk`]: heuristic safety signals over the trailing two weeks
//! - [`recommendation`]: the deterministic multi-day routine generator
//!
//! Every function in this module tree is side-effect-free and takes the
//! record slice and the caller-local `today` date explicitly, so identical
//! inputs always produce identical outputs. Soft-deleted records are treated
//! as nonexistent throughout.

pub mod aggregation;
pub mod recommendation;
pub mod risk;

pub use aggregation::{
    best_set, category_breakdown, day_record_summary, epley_one_rm, exercise_timeseries, pr_trend,
    recent_sessions, recent_stats, BestSet, CategoryShare, DaySummary, PrPoint, RecentStats,
    SessionSummary, WeekAggregate,
};
pub use recommendation::{recommend_routine, DayPlan, ExercisePlan, RecommendationPlan, SetPlan};
pub use risk::detect_risk;
