// ABOUTME: Debounced content flusher bounding write amplification on the stream append path
// ABOUTME: Buffers token deltas and appends them at most once per debounce window
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

use super::{StreamKey, StreamSessionManager};
use crate::errors::AppResult;

/// Debounced appender for streamed token deltas
///
/// Token deltas arrive far faster than subscribers need updates; flushing on
/// every delta would hammer the store. The flusher buffers deltas and appends
/// at most once per window (and once at the end). A failed flush keeps the
/// buffered text, so the next attempt retries with everything accumulated so
/// far and byte order is preserved.
pub struct DebouncedFlusher {
    manager: Arc<StreamSessionManager>,
    key: StreamKey,
    window: Duration,
    buffer: String,
    last_flush: Instant,
    /// Bytes successfully appended so far
    delivered: usize,
}

impl DebouncedFlusher {
    #[must_use]
    pub fn new(manager: Arc<StreamSessionManager>, key: StreamKey, window: Duration) -> Self {
        Self {
            manager,
            key,
            window,
            buffer: String::new(),
            last_flush: Instant::now(),
            delivered: 0,
        }
    }

    /// Total bytes successfully appended to the stream record
    #[must_use]
    pub const fn delivered_bytes(&self) -> usize {
        self.delivered
    }

    /// Buffer a delta and flush if the debounce window has elapsed
    ///
    /// Flush failures are not propagated here; the text stays buffered and
    /// rides along with the next attempt.
    pub async fn push(&mut self, delta: &str) {
        self.buffer.push_str(delta);
        if !self.buffer.is_empty() && self.last_flush.elapsed() >= self.window {
            self.try_flush().await;
        }
    }

    /// Flush whatever is buffered, ignoring the debounce window
    ///
    /// # Errors
    ///
    /// Returns the append error when the final write fails; the caller
    /// decides whether that is fatal (mid-stream it is not).
    pub async fn finish(&mut self) -> AppResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        match self.manager.append_content(&self.key, &self.buffer).await {
            Ok(()) => {
                self.delivered += self.buffer.len();
                self.buffer.clear();
                Ok(())
            }
            Err(e) => {
                warn!("Final stream flush for {} failed: {e}", self.key);
                Err(e)
            }
        }
    }

    async fn try_flush(&mut self) {
        match self.manager.append_content(&self.key, &self.buffer).await {
            Ok(()) => {
                self.delivered += self.buffer.len();
                self.buffer.clear();
                self.last_flush = Instant::now();
            }
            Err(e) => {
                // Keep the buffer; the next window retries with the full text
                warn!("Stream flush for {} failed, will retry: {e}", self.key);
                self.last_flush = Instant::now();
            }
        }
    }
}
