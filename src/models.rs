// ABOUTME: Core domain models for training records, catalogs, routines, and coach replies
// ABOUTME: Shared data structures read by the intelligence engines and the tool dispatcher
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Domain Models
//!
//! Data structures for the coach backend. Training records and the exercise
//! catalog are produced by the mobile app's CRUD layer and are read-only to
//! this crate (except for the soft-delete flag, which excludes a record from
//! every aggregation). Routine drafts flow the other way: the recommendation
//! engine emits them, and the routine-persistence tool submits them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Session intensity label as logged by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intensity {
    Low,
    Normal,
    High,
    VeryHigh,
}

impl Intensity {
    /// Whether this label counts as high intensity for risk detection
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High | Self::VeryHigh)
    }
}

/// One working set inside an exercise entry
///
/// Set numbers are 1-based and contiguous within their exercise; renumbering
/// after deletions is the responsibility of the mutating CRUD layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetEntry {
    pub set_number: u32,
    pub weight: f64,
    pub reps: u32,
    pub created_at: DateTime<Utc>,
}

impl SetEntry {
    /// Volume contributed by this set (weight × reps)
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.weight * f64::from(self.reps)
    }
}

/// One exercise performed within a training record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseEntry {
    /// Stable item id assigned by the CRUD layer
    pub id: String,
    /// Canonical exercise name (e.g. "Bench Press")
    pub name: String,
    /// Training category (e.g. "chest", "legs")
    pub category: String,
    /// Position within the record
    pub order_index: u32,
    #[serde(default)]
    pub memo: Option<String>,
    /// Ordered working sets, set_number 1..=n
    pub sets: Vec<SetEntry>,
}

impl ExerciseEntry {
    /// Number of logged sets
    #[must_use]
    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    /// Heaviest set of this exercise, if any sets were logged
    #[must_use]
    pub fn top_set(&self) -> Option<&SetEntry> {
        self.sets
            .iter()
            .max_by(|a, b| a.weight.total_cmp(&b.weight))
    }
}

/// One logged training session
///
/// `date` is the user-local calendar date the session belongs to; windowing
/// in the engines is computed against this field, not the UTC timestamp, to
/// avoid day-boundary skew.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub id: String,
    pub date: NaiveDate,
    pub performed_at: DateTime<Utc>,
    #[serde(default)]
    pub memo: Option<String>,
    pub intensity: Intensity,
    /// Category name → accumulated weight×reps, maintained by the CRUD layer
    #[serde(default)]
    pub volume_by_category: BTreeMap<String, f64>,
    pub exercises: Vec<ExerciseEntry>,
    /// Soft-delete flag; deleted records are invisible to every engine
    #[serde(default)]
    pub deleted: bool,
}

impl TrainingRecord {
    /// Total volume across all categories
    #[must_use]
    pub fn total_volume(&self) -> f64 {
        self.volume_by_category.values().sum()
    }
}

/// Per-user canonical exercise catalog entry
///
/// The recommendation engine treats the catalog as a membership set keyed by
/// lowercased name when deciding which recommended exercises are "known".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseTypeEntry {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub memo: Option<String>,
}

/// A persisted routine (saved training plan)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub memo: Option<String>,
    pub exercises: Vec<RoutineExercise>,
    pub created_at: DateTime<Utc>,
}

/// One exercise inside a persisted routine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineExercise {
    pub name: String,
    pub category: String,
    pub order_index: u32,
    pub sets: Vec<RoutineSet>,
}

/// One planned set inside a routine exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineSet {
    pub set_number: u32,
    pub weight: f64,
    pub reps: u32,
}

/// Not-yet-persisted routine payload, mirroring the routine-creation contract
///
/// Produced by the recommendation engine and submitted unchanged through the
/// `add_routine` tool once the user confirms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineDraft {
    pub name: String,
    #[serde(default)]
    pub memo: Option<String>,
    pub exercises: Vec<RoutineExercise>,
}

/// Structured final answer from the coach
///
/// The orchestrator asks the model for this JSON shape; when the model
/// replies with plain prose instead, the raw text becomes `reply` and the
/// other fields stay empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachReply {
    pub reply: String,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub actions: Vec<SuggestedAction>,
}

impl CoachReply {
    /// Wrap plain text in a reply with no highlights or actions
    #[must_use]
    pub fn text_only(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            highlights: Vec::new(),
            actions: Vec::new(),
        }
    }
}

/// A follow-up action the client can offer the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedAction {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub args: Value,
}

/// One appended chat-log entry (role + content), persisted per session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLogEntry {
    pub role: String,
    pub content: String,
    pub logged_at: DateTime<Utc>,
}
