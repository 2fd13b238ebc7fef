// ABOUTME: Streaming session manager with transactional content appends and status transitions
// ABOUTME: Owns the broadcast StreamSession record a client subscribes to for token-by-token output
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Streaming Session Manager
//!
//! One `StreamSession` record exists per `(uid, session_id, stream_id)` tuple
//! and is how a client renders incremental assistant output. Appends use an
//! explicit optimistic-concurrency loop (read version, compute new value,
//! conditional write, retry on conflict) so concurrent appenders never lose
//! data; status moves forward only, and every mutation bumps `updated_at`
//! for staleness detection by subscribers.

mod flusher;
mod memory;

pub use flusher::DebouncedFlusher;
pub use memory::MemoryStreamStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::models::SuggestedAction;

/// Conflict retries before an append gives up
///
/// Within one request only debounced flush callbacks contend, so conflicts
/// resolve in one or two rounds; the bound exists for liveness if the store
/// misbehaves.
const MAX_APPEND_RETRIES: usize = 32;

/// Identifies one stream record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamKey {
    pub uid: String,
    pub session_id: String,
    pub stream_id: String,
}

impl StreamKey {
    #[must_use]
    pub fn new(uid: &str, session_id: &str, stream_id: &str) -> Self {
        Self {
            uid: uid.to_owned(),
            session_id: session_id.to_owned(),
            stream_id: stream_id.to_owned(),
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.uid, self.session_id, self.stream_id)
    }
}

/// Lifecycle of a stream record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Pending,
    Streaming,
    Done,
    Error,
}

impl StreamStatus {
    /// Whether this status ends the stream
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// Reply metadata surfaced alongside the content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMeta {
    pub highlights: Vec<String>,
    pub actions: Vec<SuggestedAction>,
}

/// The externally observable stream record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSession {
    pub status: StreamStatus,
    /// Accumulated assistant output; grows monotonically
    pub content: String,
    pub error: Option<String>,
    pub meta: Option<StreamMeta>,
    pub updated_at: DateTime<Utc>,
}

impl StreamSession {
    /// Fresh record in `Pending` state
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: StreamStatus::Pending,
            content: String::new(),
            error: None,
            meta: None,
            updated_at: Utc::now(),
        }
    }
}

/// A stream record together with its store version
#[derive(Debug, Clone)]
pub struct VersionedSession {
    pub session: StreamSession,
    pub version: u64,
}

/// Versioned storage for stream records
///
/// `write_if` is the single concurrency primitive: it commits only when the
/// caller's version still matches, which the manager turns into a
/// read-modify-write retry loop.
#[async_trait]
pub trait StreamStore: Send + Sync {
    /// Create or replace a record unconditionally (version resets)
    async fn put(&self, key: &StreamKey, session: StreamSession) -> AppResult<()>;

    /// Read the current record and version
    async fn read(&self, key: &StreamKey) -> AppResult<Option<VersionedSession>>;

    /// Conditionally write: commit only if the stored version equals
    /// `expected_version`; returns `false` on conflict or missing record
    async fn write_if(
        &self,
        key: &StreamKey,
        expected_version: u64,
        session: StreamSession,
    ) -> AppResult<bool>;

    /// Remove a record (explicit cleanup by the caller after completion)
    async fn remove(&self, key: &StreamKey) -> AppResult<()>;
}

/// Transactional facade over a [`StreamStore`]
pub struct StreamSessionManager {
    store: Arc<dyn StreamStore>,
}

impl StreamSessionManager {
    #[must_use]
    pub fn new(store: Arc<dyn StreamStore>) -> Self {
        Self { store }
    }

    /// Snapshot the current record for a subscriber
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store is unreachable.
    pub async fn snapshot(&self, key: &StreamKey) -> AppResult<Option<StreamSession>> {
        Ok(self.store.read(key).await?.map(|v| v.session))
    }

    /// Initialize a fresh record: status=pending, content empty, no metadata
    ///
    /// # Errors
    ///
    /// Fails fast when the store is unreachable; the caller aborts the whole
    /// chat request in that case.
    pub async fn initialize(&self, key: &StreamKey) -> AppResult<()> {
        self.store.put(key, StreamSession::pending()).await
    }

    /// Append text to the content field, transactionally
    ///
    /// Read-modify-write on the content alone; retries until it observes a
    /// consistent base value. Appends after a terminal status are ignored
    /// (the stream is over; the persisted transcript is authoritative).
    ///
    /// # Errors
    ///
    /// Returns an error when the record was never initialized, the store is
    /// unreachable, or the retry bound is exhausted.
    pub async fn append_content(&self, key: &StreamKey, text: &str) -> AppResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        for _ in 0..MAX_APPEND_RETRIES {
            let Some(current) = self.store.read(key).await? else {
                return Err(AppError::storage(format!(
                    "Stream {key} was never initialized"
                )));
            };
            if current.session.status.is_terminal() {
                debug!("Ignoring append to terminal stream {key}");
                return Ok(());
            }

            let mut next = current.session;
            next.content.push_str(text);
            next.updated_at = Utc::now();

            if self.store.write_if(key, current.version, next).await? {
                return Ok(());
            }
            debug!("Append conflict on stream {key}, retrying");
        }
        Err(AppError::conflict(format!(
            "Append to stream {key} kept conflicting"
        )))
    }

    /// Replace the metadata wholesale (last-writer-wins)
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::append_content`].
    pub async fn set_metadata(&self, key: &StreamKey, meta: StreamMeta) -> AppResult<()> {
        for _ in 0..MAX_APPEND_RETRIES {
            let Some(current) = self.store.read(key).await? else {
                return Err(AppError::storage(format!(
                    "Stream {key} was never initialized"
                )));
            };

            let mut next = current.session;
            next.meta = Some(meta.clone());
            next.updated_at = Utc::now();

            if self.store.write_if(key, current.version, next).await? {
                return Ok(());
            }
        }
        Err(AppError::conflict(format!(
            "Metadata write to stream {key} kept conflicting"
        )))
    }

    /// Move the stream status forward
    ///
    /// Transitions out of a terminal status are ignored so no late callback
    /// can resurrect a finished stream.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::append_content`].
    pub async fn transition(
        &self,
        key: &StreamKey,
        status: StreamStatus,
        error: Option<String>,
    ) -> AppResult<()> {
        for _ in 0..MAX_APPEND_RETRIES {
            let Some(current) = self.store.read(key).await? else {
                return Err(AppError::storage(format!(
                    "Stream {key} was never initialized"
                )));
            };
            if current.session.status.is_terminal() {
                debug!(
                    "Ignoring transition of terminal stream {key} to {status:?}"
                );
                return Ok(());
            }

            let mut next = current.session;
            next.status = status;
            next.error = error.clone();
            next.updated_at = Utc::now();

            if self.store.write_if(key, current.version, next).await? {
                return Ok(());
            }
        }
        Err(AppError::conflict(format!(
            "Transition of stream {key} kept conflicting"
        )))
    }

    /// Remove the record after the caller is done with it
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store is unreachable.
    pub async fn clear(&self, key: &StreamKey) -> AppResult<()> {
        self.store.remove(key).await
    }
}
