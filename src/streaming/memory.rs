// ABOUTME: In-memory versioned StreamStore backed by DashMap
// ABOUTME: Entry-level locking makes the conditional write a true compare-and-swap
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use async_trait::async_trait;
use dashmap::DashMap;

use super::{StreamKey, StreamSession, StreamStore, VersionedSession};
use crate::errors::AppResult;

/// In-memory stream record store
///
/// Each entry carries a monotonically increasing version; `write_if` holds
/// the shard lock for the key while comparing and swapping, so two writers
/// can never both succeed against the same base version.
#[derive(Default)]
pub struct MemoryStreamStore {
    sessions: DashMap<StreamKey, (u64, StreamSession)>,
}

impl MemoryStreamStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StreamStore for MemoryStreamStore {
    async fn put(&self, key: &StreamKey, session: StreamSession) -> AppResult<()> {
        self.sessions.insert(key.clone(), (0, session));
        Ok(())
    }

    async fn read(&self, key: &StreamKey) -> AppResult<Option<VersionedSession>> {
        Ok(self.sessions.get(key).map(|entry| {
            let (version, session) = entry.value();
            VersionedSession {
                session: session.clone(),
                version: *version,
            }
        }))
    }

    async fn write_if(
        &self,
        key: &StreamKey,
        expected_version: u64,
        session: StreamSession,
    ) -> AppResult<bool> {
        let Some(mut entry) = self.sessions.get_mut(key) else {
            return Ok(false);
        };
        let (version, stored) = entry.value_mut();
        if *version != expected_version {
            return Ok(false);
        }
        *version += 1;
        *stored = session;
        Ok(true)
    }

    async fn remove(&self, key: &StreamKey) -> AppResult<()> {
        self.sessions.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> StreamKey {
        StreamKey::new("u1", "s1", "st1")
    }

    #[tokio::test]
    async fn test_write_if_rejects_stale_version() {
        let store = MemoryStreamStore::new();
        store.put(&key(), StreamSession::pending()).await.unwrap();

        let current = store.read(&key()).await.unwrap().unwrap();
        assert!(store
            .write_if(&key(), current.version, current.session.clone())
            .await
            .unwrap());
        // The same version can no longer win
        assert!(!store
            .write_if(&key(), current.version, current.session)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_write_if_missing_record_is_conflict() {
        let store = MemoryStreamStore::new();
        assert!(!store
            .write_if(&key(), 0, StreamSession::pending())
            .await
            .unwrap());
    }
}
