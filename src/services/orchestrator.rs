// ABOUTME: Chat orchestrator running the bounded LLM tool loop and the streaming pipeline
// ABOUTME: Prefetches engine context, forwards tokens with debounce, falls back to chunked delivery
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Chat Orchestrator
//!
//! One orchestrator run is one chat request. The non-streaming entry point
//! drives a bounded tool-calling loop; the streaming entry point prefetches
//! the three engine contexts, injects them into the system prompt, and
//! forwards incremental tokens through the stream manager. A streaming
//! transport failure falls back to the non-streaming loop and simulates
//! incremental delivery so the client-visible contract (content grows
//! monotonically, terminal status is reached) holds either way.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::intelligence::{self, RecommendationPlan, RecentStats};
use crate::llm::prompts::{get_coach_system_prompt, PREFETCHED_CONTEXT_HEADER};
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::models::{ChatLogEntry, CoachReply};
use crate::store::CoachStore;
use crate::streaming::{
    DebouncedFlusher, StreamKey, StreamMeta, StreamSessionManager, StreamStatus,
};
use crate::tools::{self, ToolDispatcher, ToolIdentity};

/// Maximum tool-loop iterations before the circuit breaker trips
const MAX_TOOL_ITERATIONS: usize = 4;

/// Characters per simulated chunk when streaming falls back to chunked delivery
const SIMULATED_CHUNK_CHARS: usize = 64;

/// Delay between simulated chunks
const SIMULATED_CHUNK_DELAY: Duration = Duration::from_millis(30);

/// Canned reply when the loop exhausts its bound without a final answer
const LOOP_EXHAUSTED_REPLY: &str =
    "I wasn't able to narrow that down. Could you be more specific about \
     what you'd like to work on?";

/// Offer phrases that count as a call-to-action in the final reply
const CTA_PHRASES: &[&str] = &["Want me to", "Would you like", "Shall I"];

/// Result of one context prefetch: fresh engine output or a degraded default
///
/// A failed prefetch degrades context quality silently (logged, not surfaced);
/// the conversation still proceeds.
enum Prefetched<T> {
    Fresh(T),
    Degraded(T),
}

impl<T> Prefetched<T> {
    fn value(&self) -> &T {
        match self {
            Self::Fresh(value) | Self::Degraded(value) => value,
        }
    }
}

/// Drives LLM conversations for the coach
pub struct ChatOrchestrator {
    provider: Arc<dyn LlmProvider>,
    dispatcher: Arc<ToolDispatcher>,
    store: Arc<dyn CoachStore>,
    streams: Arc<StreamSessionManager>,
    run_budget: Duration,
    flush_window: Duration,
}

impl ChatOrchestrator {
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        dispatcher: Arc<ToolDispatcher>,
        store: Arc<dyn CoachStore>,
        streams: Arc<StreamSessionManager>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            store,
            streams,
            run_budget: config.run_budget,
            flush_window: config.stream_flush_window,
        }
    }

    // ========================================================================
    // Non-streaming tool loop
    // ========================================================================

    /// Run the bounded tool-calling conversation loop
    ///
    /// Each turn offers the full tool registry with `tool_choice=auto`. Tool
    /// calls are executed with server-authoritative identity and their
    /// results appended as `tool` messages keyed to the call id. A turn
    /// without tool calls is the final answer; exhausting the bound yields
    /// the deterministic fallback reply instead of an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the LLM backend fails outright.
    pub async fn run(
        &self,
        uid: &str,
        session_id: &str,
        user_message: &str,
    ) -> AppResult<CoachReply> {
        let mut messages = vec![
            ChatMessage::system(get_coach_system_prompt()),
            ChatMessage::user(user_message),
        ];
        self.run_loop(uid, session_id, &mut messages).await
    }

    async fn run_loop(
        &self,
        uid: &str,
        session_id: &str,
        messages: &mut Vec<ChatMessage>,
    ) -> AppResult<CoachReply> {
        let declarations = tools::declarations();
        let identity = ToolIdentity::new(uid, session_id);

        for iteration in 0..MAX_TOOL_ITERATIONS {
            let request = ChatRequest::new(messages.clone());
            let response = self
                .provider
                .complete_with_tools(&request, &declarations)
                .await?;

            if response.has_tool_calls() {
                let calls = response.tool_calls.unwrap_or_default();
                info!("Iteration {iteration}: executing {} tool calls", calls.len());

                // The assistant's tool-call turn goes into history verbatim
                messages.push(ChatMessage::assistant_tool_calls(
                    response.content.unwrap_or_default(),
                    calls.clone(),
                ));

                for call in calls {
                    let result = self
                        .dispatcher
                        .dispatch(&identity, &call.name, call.args.clone())
                        .await;
                    messages.push(ChatMessage::tool_result(
                        call.id,
                        result.to_message_content(),
                    ));
                }
                continue;
            }

            return Ok(parse_reply(&response.content.unwrap_or_default()));
        }

        debug!("Tool loop exhausted after {MAX_TOOL_ITERATIONS} iterations");
        Ok(CoachReply::text_only(LOOP_EXHAUSTED_REPLY))
    }

    // ========================================================================
    // Streaming pipeline
    // ========================================================================

    /// Run the streaming pipeline for one chat request
    ///
    /// Initializes the stream record (failure here aborts the request),
    /// then executes the run under the overall wall-clock budget. Any
    /// terminal failure, including the budget, transitions the stream to
    /// `error` so no subscriber is left waiting on a stuck record.
    ///
    /// # Errors
    ///
    /// Returns validation, upstream, or deadline errors; partial-context
    /// failures are absorbed as degraded context instead.
    pub async fn run_streaming(
        &self,
        uid: &str,
        session_id: &str,
        user_message: &str,
        stream_key: &StreamKey,
    ) -> AppResult<CoachReply> {
        self.streams.initialize(stream_key).await?;

        match timeout(
            self.run_budget,
            self.run_streaming_inner(uid, session_id, user_message, stream_key),
        )
        .await
        {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => {
                let _ = self
                    .streams
                    .transition(stream_key, StreamStatus::Error, Some(e.message.clone()))
                    .await;
                Err(e)
            }
            Err(_) => {
                let message = format!(
                    "Coach run exceeded its {}s time budget",
                    self.run_budget.as_secs()
                );
                let _ = self
                    .streams
                    .transition(stream_key, StreamStatus::Error, Some(message.clone()))
                    .await;
                Err(AppError::deadline_exceeded(message))
            }
        }
    }

    async fn run_streaming_inner(
        &self,
        uid: &str,
        session_id: &str,
        user_message: &str,
        stream_key: &StreamKey,
    ) -> AppResult<CoachReply> {
        let today = chrono::Local::now().date_naive();

        // The three context reads are independent; one failing degrades that
        // piece to its empty-input default instead of aborting the run.
        let (stats, risk, plan) = tokio::join!(
            self.prefetch_stats(uid, today),
            self.prefetch_risk(uid, today),
            self.prefetch_plan(uid, today),
        );

        let system_prompt = build_system_prompt(stats.value(), risk.value(), plan.value());
        let messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_message),
        ];

        self.streams
            .transition(stream_key, StreamStatus::Streaming, None)
            .await?;

        let mut flusher = DebouncedFlusher::new(
            Arc::clone(&self.streams),
            stream_key.clone(),
            self.flush_window,
        );

        let streamed = self.consume_stream(&messages, &mut flusher).await;

        let mut reply = match streamed {
            Some(full_text) => {
                if flusher.finish().await.is_err() {
                    // One more attempt with the retained buffer, then the
                    // persisted transcript is authoritative anyway.
                    let _ = flusher.finish().await;
                }
                parse_reply(&full_text)
            }
            None => {
                info!("Streaming transport failed, falling back to the tool loop");
                let reply = self.run(uid, session_id, user_message).await?;
                self.deliver_fallback(stream_key, &mut flusher, &reply.reply)
                    .await;
                reply
            }
        };

        // Conversational contract: a generated plan always ends with an
        // actionable next step, whether or not the model complied.
        if !has_call_to_action(&reply.reply) {
            let cta = &plan.value().cta;
            reply.reply = format!("{}\n\n{}", reply.reply.trim_end(), cta);
            let _ = self
                .streams
                .append_content(stream_key, &format!("\n\n{cta}"))
                .await;
        }

        self.streams
            .set_metadata(
                stream_key,
                StreamMeta {
                    highlights: reply.highlights.clone(),
                    actions: reply.actions.clone(),
                },
            )
            .await?;

        self.persist_transcript(uid, session_id, user_message, &reply.reply)
            .await;

        self.streams
            .transition(stream_key, StreamStatus::Done, None)
            .await?;

        Ok(reply)
    }

    /// Consume the streaming completion, forwarding deltas through the flusher
    ///
    /// Returns the accumulated text, or `None` when the transport failed and
    /// the caller should fall back to the non-streaming loop.
    async fn consume_stream(
        &self,
        messages: &[ChatMessage],
        flusher: &mut DebouncedFlusher,
    ) -> Option<String> {
        let request = ChatRequest::new(messages.to_vec());
        let mut stream = match self.provider.complete_stream(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Streaming completion request failed: {e}");
                return None;
            }
        };

        let mut full_text = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    full_text.push_str(&chunk.delta);
                    flusher.push(&chunk.delta).await;
                    if chunk.is_final {
                        return Some(full_text);
                    }
                }
                Err(e) => {
                    warn!("Streaming transport failed mid-answer: {e}");
                    return None;
                }
            }
        }
        Some(full_text)
    }

    /// Simulate incremental delivery of a fallback answer
    ///
    /// When nothing was delivered before the failure, the final text is
    /// chunk-appended with small delays so the client sees the same growing
    /// content it would from a real stream. When partial content already
    /// went out, the full answer is appended after a break instead; content
    /// stays monotonic and the persisted transcript is authoritative.
    async fn deliver_fallback(
        &self,
        stream_key: &StreamKey,
        flusher: &mut DebouncedFlusher,
        final_text: &str,
    ) {
        if flusher.delivered_bytes() == 0 {
            for chunk in char_chunks(final_text, SIMULATED_CHUNK_CHARS) {
                if let Err(e) = self.streams.append_content(stream_key, chunk).await {
                    warn!("Simulated chunk append failed: {e}");
                    return;
                }
                sleep(SIMULATED_CHUNK_DELAY).await;
            }
        } else if let Err(e) = self
            .streams
            .append_content(stream_key, &format!("\n\n{final_text}"))
            .await
        {
            warn!("Fallback append failed: {e}");
        }
    }

    /// Persist the authoritative transcript, best-effort
    async fn persist_transcript(
        &self,
        uid: &str,
        session_id: &str,
        user_message: &str,
        assistant_reply: &str,
    ) {
        let now = Utc::now();
        let entries = [
            ChatLogEntry {
                role: "user".to_owned(),
                content: user_message.to_owned(),
                logged_at: now,
            },
            ChatLogEntry {
                role: "assistant".to_owned(),
                content: assistant_reply.to_owned(),
                logged_at: now,
            },
        ];
        for entry in &entries {
            if let Err(e) = self.store.append_chat(uid, session_id, entry).await {
                warn!("Chat log append failed for {uid}/{session_id}: {e}");
            }
        }
    }

    // ========================================================================
    // Context prefetch
    // ========================================================================

    async fn prefetch_stats(&self, uid: &str, today: chrono::NaiveDate) -> Prefetched<RecentStats> {
        match self.store.list_records(uid).await {
            Ok(records) => Prefetched::Fresh(intelligence::recent_stats(&records, today, 4)),
            Err(e) => {
                warn!("Stats prefetch degraded for {uid}: {e}");
                Prefetched::Degraded(intelligence::recent_stats(&[], today, 4))
            }
        }
    }

    async fn prefetch_risk(&self, uid: &str, today: chrono::NaiveDate) -> Prefetched<Vec<String>> {
        match self.store.list_records(uid).await {
            Ok(records) => Prefetched::Fresh(intelligence::detect_risk(&records, today)),
            Err(e) => {
                warn!("Risk prefetch degraded for {uid}: {e}");
                Prefetched::Degraded(Vec::new())
            }
        }
    }

    async fn prefetch_plan(
        &self,
        uid: &str,
        today: chrono::NaiveDate,
    ) -> Prefetched<RecommendationPlan> {
        match self.dispatcher.build_plan(uid, today, &[]).await {
            Ok(plan) => Prefetched::Fresh(plan),
            Err(e) => {
                warn!("Recommendation prefetch degraded for {uid}: {e}");
                Prefetched::Degraded(intelligence::recommend_routine(&[], &[], today, &[]))
            }
        }
    }
}

/// Compose the streaming system prompt with the server-prefetched block
fn build_system_prompt(
    stats: &RecentStats,
    risk: &[String],
    plan: &RecommendationPlan,
) -> String {
    let context = json!({
        "recent_stats": stats,
        "risk_signals": risk,
        "recommendation": {
            "days": plan.days,
            "focus_categories": plan.focus_categories,
            "missing_exercise_types": plan.missing_exercise_types,
            "cta": plan.cta,
        },
    });

    format!(
        "{}\n\n{PREFETCHED_CONTEXT_HEADER}\n\n```json\n{context}\n```\n",
        get_coach_system_prompt()
    )
}

/// Parse the model's final text into a structured reply
///
/// Accepts the requested JSON shape, optionally wrapped in a code fence;
/// anything else degrades to a text-only reply.
fn parse_reply(text: &str) -> CoachReply {
    let trimmed = text.trim();
    let candidate = strip_code_fence(trimmed);

    match serde_json::from_str::<CoachReply>(candidate) {
        Ok(reply) => reply,
        Err(_) => CoachReply::text_only(trimmed),
    }
}

/// Strip a ``` / ```json fence if the whole text is wrapped in one
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Whether the reply already ends with an actionable next step
fn has_call_to_action(text: &str) -> bool {
    let trimmed = text.trim_end();
    trimmed.ends_with('?') || CTA_PHRASES.iter().any(|phrase| trimmed.contains(phrase))
}

/// Split text into chunks of at most `size` characters on char boundaries
fn char_chunks(text: &str, size: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (index, _) in text.char_indices() {
        if count == size {
            chunks.push(&text[start..index]);
            start = index;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply_structured() {
        let reply = parse_reply(
            r#"{"reply": "Nice squat progress.", "highlights": ["+5kg"], "actions": []}"#,
        );
        assert_eq!(reply.reply, "Nice squat progress.");
        assert_eq!(reply.highlights, vec!["+5kg"]);
    }

    #[test]
    fn test_parse_reply_fenced_json() {
        let reply = parse_reply("```json\n{\"reply\": \"ok\"}\n```");
        assert_eq!(reply.reply, "ok");
    }

    #[test]
    fn test_parse_reply_degrades_to_text() {
        let reply = parse_reply("Just keep lifting.");
        assert_eq!(reply.reply, "Just keep lifting.");
        assert!(reply.highlights.is_empty());
        assert!(reply.actions.is_empty());
    }

    #[test]
    fn test_call_to_action_detection() {
        assert!(has_call_to_action("Solid week. Ready for more?"));
        assert!(has_call_to_action("Want me to save this routine?"));
        assert!(!has_call_to_action("Solid week. Keep it up."));
    }

    #[test]
    fn test_char_chunks_respect_boundaries() {
        let chunks = char_chunks("ab©def", 2);
        assert_eq!(chunks, vec!["ab", "©d", "ef"]);
        assert_eq!(chunks.concat(), "ab©def");
    }
}
