// ABOUTME: Datastore collaborator trait for training records, catalogs, routines, and chat logs
// ABOUTME: The coach core reads through this seam; CRUD ownership stays with the mobile backend
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Coach Datastore Seam
//!
//! The fitness app persists its entities in a managed document store owned by
//! the CRUD layer. The coach core only needs a narrow, read-mostly slice of
//! it plus two writes (chat-log append and routine creation), captured by the
//! [`CoachStore`] trait. The design mirrors the database-provider trait seam
//! used elsewhere on the platform: components hold `Arc<dyn CoachStore>` and
//! never know which backend is behind it.

mod memory;

pub use memory::{MemoryStore, StaticTokenVerifier};

use async_trait::async_trait;

use crate::errors::AppResult;
use crate::models::{ChatLogEntry, ExerciseTypeEntry, Routine, RoutineDraft, TrainingRecord};

/// Read/write access to the per-user coaching data
///
/// All reads return records including the soft-delete flag; filtering deleted
/// records is the engines' responsibility so the rule lives in exactly one
/// place (`intelligence::aggregation`).
#[async_trait]
pub trait CoachStore: Send + Sync {
    /// All training records for a user, unordered
    async fn list_records(&self, uid: &str) -> AppResult<Vec<TrainingRecord>>;

    /// One training record by id
    async fn get_record(&self, uid: &str, record_id: &str) -> AppResult<Option<TrainingRecord>>;

    /// The user's exercise-type catalog
    async fn list_exercise_types(&self, uid: &str) -> AppResult<Vec<ExerciseTypeEntry>>;

    /// The user's saved routines, newest first
    async fn list_routines(&self, uid: &str) -> AppResult<Vec<Routine>>;

    /// One routine by id
    async fn get_routine(&self, uid: &str, routine_id: &str) -> AppResult<Option<Routine>>;

    /// Persist a routine draft, returning the stored routine
    async fn add_routine(&self, uid: &str, draft: &RoutineDraft) -> AppResult<Routine>;

    /// Append one entry to the session chat log
    async fn append_chat(
        &self,
        uid: &str,
        session_id: &str,
        entry: &ChatLogEntry,
    ) -> AppResult<()>;

    /// Read back a session chat log, oldest first
    async fn list_chat(&self, uid: &str, session_id: &str) -> AppResult<Vec<ChatLogEntry>>;
}

/// Resolves a bearer token to an authenticated user id
///
/// Session management is owned by the platform auth layer; the coach core
/// only needs the uid to compare against the request body.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify a bearer token and return the uid it belongs to
    ///
    /// # Errors
    ///
    /// Returns an auth error for unknown or malformed tokens.
    async fn verify(&self, bearer_token: &str) -> AppResult<String>;
}
