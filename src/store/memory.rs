// ABOUTME: In-memory CoachStore and IdentityVerifier backed by DashMap
// ABOUTME: Used by the binary in standalone mode and by the integration tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{CoachStore, IdentityVerifier};
use crate::errors::{AppError, AppResult};
use crate::models::{ChatLogEntry, ExerciseTypeEntry, Routine, RoutineDraft, TrainingRecord};

/// In-memory document store
///
/// Concurrent maps keyed per user; routine ids are generated on insert the
/// way the managed store would assign document ids.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, Vec<TrainingRecord>>,
    exercise_types: DashMap<String, Vec<ExerciseTypeEntry>>,
    routines: DashMap<String, Vec<Routine>>,
    chat_logs: DashMap<(String, String), Vec<ChatLogEntry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed training records for a user (test/standalone setup)
    pub fn put_records(&self, uid: &str, records: Vec<TrainingRecord>) {
        self.records.insert(uid.to_owned(), records);
    }

    /// Seed the exercise-type catalog for a user
    pub fn put_exercise_types(&self, uid: &str, entries: Vec<ExerciseTypeEntry>) {
        self.exercise_types.insert(uid.to_owned(), entries);
    }
}

#[async_trait]
impl CoachStore for MemoryStore {
    async fn list_records(&self, uid: &str) -> AppResult<Vec<TrainingRecord>> {
        Ok(self
            .records
            .get(uid)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    async fn get_record(&self, uid: &str, record_id: &str) -> AppResult<Option<TrainingRecord>> {
        Ok(self
            .records
            .get(uid)
            .and_then(|r| r.value().iter().find(|rec| rec.id == record_id).cloned()))
    }

    async fn list_exercise_types(&self, uid: &str) -> AppResult<Vec<ExerciseTypeEntry>> {
        Ok(self
            .exercise_types
            .get(uid)
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }

    async fn list_routines(&self, uid: &str) -> AppResult<Vec<Routine>> {
        let mut routines = self
            .routines
            .get(uid)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        routines.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(routines)
    }

    async fn get_routine(&self, uid: &str, routine_id: &str) -> AppResult<Option<Routine>> {
        Ok(self
            .routines
            .get(uid)
            .and_then(|r| r.value().iter().find(|rt| rt.id == routine_id).cloned()))
    }

    async fn add_routine(&self, uid: &str, draft: &RoutineDraft) -> AppResult<Routine> {
        let routine = Routine {
            id: Uuid::new_v4().to_string(),
            name: draft.name.clone(),
            memo: draft.memo.clone(),
            exercises: draft.exercises.clone(),
            created_at: Utc::now(),
        };
        self.routines
            .entry(uid.to_owned())
            .or_default()
            .push(routine.clone());
        Ok(routine)
    }

    async fn append_chat(
        &self,
        uid: &str,
        session_id: &str,
        entry: &ChatLogEntry,
    ) -> AppResult<()> {
        self.chat_logs
            .entry((uid.to_owned(), session_id.to_owned()))
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn list_chat(&self, uid: &str, session_id: &str) -> AppResult<Vec<ChatLogEntry>> {
        Ok(self
            .chat_logs
            .get(&(uid.to_owned(), session_id.to_owned()))
            .map(|l| l.value().clone())
            .unwrap_or_default())
    }
}

/// Token → uid lookup table for standalone deployments and tests
#[derive(Default)]
pub struct StaticTokenVerifier {
    tokens: DashMap<String, String>,
}

impl StaticTokenVerifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for a user
    pub fn insert(&self, token: &str, uid: &str) {
        self.tokens.insert(token.to_owned(), uid.to_owned());
    }
}

#[async_trait]
impl IdentityVerifier for StaticTokenVerifier {
    async fn verify(&self, bearer_token: &str) -> AppResult<String> {
        self.tokens
            .get(bearer_token)
            .map(|uid| uid.value().clone())
            .ok_or_else(|| AppError::auth_invalid("Unknown bearer token"))
    }
}
