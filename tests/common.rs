// ABOUTME: Shared test utilities: record builders, seeded stores, and a scripted LLM provider
// ABOUTME: Reduces duplication across the integration test suites
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

//! Shared test utilities for `milo_coach_server`

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::Value;

use milo_coach_server::config::ServerConfig;
use milo_coach_server::errors::AppError;
use milo_coach_server::llm::{
    ChatMessage, ChatRequest, ChatResponse, ChatResponseWithTools, ChatStream,
    FunctionDeclaration, LlmCapabilities, LlmProvider, StreamChunk, ToolCall,
};
use milo_coach_server::models::{
    ExerciseEntry, ExerciseTypeEntry, Intensity, SetEntry, TrainingRecord,
};
use milo_coach_server::resources::ServerResources;
use milo_coach_server::store::{MemoryStore, StaticTokenVerifier};
use milo_coach_server::streaming::MemoryStreamStore;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .init();
    });
}

// ============================================================================
// Record Builders
// ============================================================================

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn set(number: u32, weight: f64, reps: u32) -> SetEntry {
    SetEntry {
        set_number: number,
        weight,
        reps,
        created_at: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
    }
}

pub fn exercise(name: &str, category: &str, sets: Vec<SetEntry>) -> ExerciseEntry {
    ExerciseEntry {
        id: format!("ex-{name}"),
        name: name.to_owned(),
        category: category.to_owned(),
        order_index: 0,
        memo: None,
        sets,
    }
}

/// A training record whose per-category volume map is derived from its sets
pub fn record(
    id: &str,
    day: NaiveDate,
    intensity: Intensity,
    exercises: Vec<ExerciseEntry>,
) -> TrainingRecord {
    let mut volume_by_category: BTreeMap<String, f64> = BTreeMap::new();
    for entry in &exercises {
        let volume: f64 = entry.sets.iter().map(SetEntry::volume).sum();
        *volume_by_category.entry(entry.category.clone()).or_insert(0.0) += volume;
    }
    TrainingRecord {
        id: id.to_owned(),
        date: day,
        performed_at: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
        memo: None,
        intensity,
        volume_by_category,
        exercises,
        deleted: false,
    }
}

pub fn catalog_entry(id: &str, name: &str, category: &str) -> ExerciseTypeEntry {
    ExerciseTypeEntry {
        id: id.to_owned(),
        name: name.to_owned(),
        category: category.to_owned(),
        memo: None,
    }
}

// ============================================================================
// Scripted LLM Provider
// ============================================================================

/// One scripted completion turn
#[derive(Debug, Clone)]
pub enum ScriptTurn {
    /// Request these tool calls (name, args)
    ToolCalls(Vec<(&'static str, Value)>),
    /// Return this final text
    Final(String),
}

/// Behavior of the scripted streaming endpoint
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// Fail before delivering any bytes
    Fail,
    /// Deliver these deltas, then finish cleanly
    Chunks(Vec<&'static str>),
    /// Deliver these deltas, then fail mid-stream
    FailAfter(Vec<&'static str>),
    /// Never produce anything (budget-timeout testing)
    Hang,
}

/// Deterministic stand-in for the chat backend
///
/// `complete_with_tools` consumes scripted turns in order; when the script
/// runs dry the last turn repeats, which makes "model keeps requesting the
/// same tool" scenarios trivial to express.
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<ScriptTurn>>,
    last_turn: Mutex<Option<ScriptTurn>>,
    stream: Mutex<Option<StreamScript>>,
    /// Number of `complete_with_tools` invocations observed
    pub completions: AtomicUsize,
    /// Message lists captured per `complete_with_tools` invocation
    pub captured: Mutex<Vec<Vec<ChatMessage>>>,
    call_counter: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<ScriptTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            last_turn: Mutex::new(None),
            stream: Mutex::new(None),
            completions: AtomicUsize::new(0),
            captured: Mutex::new(Vec::new()),
            call_counter: AtomicUsize::new(0),
        }
    }

    pub fn with_stream(self, script: StreamScript) -> Self {
        *self.stream.lock().unwrap() = Some(script);
        self
    }

    /// A provider that answers every turn with the same final text
    pub fn always_final(text: &str) -> Self {
        Self::new(vec![ScriptTurn::Final(text.to_owned())])
    }

    fn next_turn(&self) -> ScriptTurn {
        let mut turns = self.turns.lock().unwrap();
        if let Some(turn) = turns.pop_front() {
            *self.last_turn.lock().unwrap() = Some(turn.clone());
            turn
        } else {
            self.last_turn
                .lock()
                .unwrap()
                .clone()
                .unwrap_or(ScriptTurn::Final("(script exhausted)".to_owned()))
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::full_featured()
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, AppError> {
        match self.next_turn() {
            ScriptTurn::Final(text) => Ok(ChatResponse {
                content: text,
                model: "scripted-model".to_owned(),
                usage: None,
                finish_reason: Some("stop".to_owned()),
            }),
            ScriptTurn::ToolCalls(_) => Err(AppError::internal(
                "complete() scripted with a tool-call turn",
            )),
        }
    }

    async fn complete_with_tools(
        &self,
        request: &ChatRequest,
        _tools: &[FunctionDeclaration],
    ) -> Result<ChatResponseWithTools, AppError> {
        self.completions.fetch_add(1, Ordering::SeqCst);
        self.captured.lock().unwrap().push(request.messages.clone());

        match self.next_turn() {
            ScriptTurn::ToolCalls(calls) => {
                let tool_calls = calls
                    .into_iter()
                    .map(|(name, args)| {
                        let id = self.call_counter.fetch_add(1, Ordering::SeqCst);
                        ToolCall {
                            id: format!("call-{id}"),
                            name: name.to_owned(),
                            args,
                        }
                    })
                    .collect();
                Ok(ChatResponseWithTools {
                    content: None,
                    tool_calls: Some(tool_calls),
                    model: "scripted-model".to_owned(),
                    usage: None,
                    finish_reason: Some("tool_calls".to_owned()),
                })
            }
            ScriptTurn::Final(text) => Ok(ChatResponseWithTools {
                content: Some(text),
                tool_calls: None,
                model: "scripted-model".to_owned(),
                usage: None,
                finish_reason: Some("stop".to_owned()),
            }),
        }
    }

    async fn complete_stream(&self, _request: &ChatRequest) -> Result<ChatStream, AppError> {
        let script = self
            .stream
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(StreamScript::Fail);

        match script {
            StreamScript::Fail => Err(AppError::external_service(
                "ScriptedProvider",
                "streaming disabled by script",
            )),
            StreamScript::Hang => Ok(Box::pin(futures_util::stream::pending::<
                Result<StreamChunk, AppError>,
            >())),
            StreamScript::Chunks(deltas) => {
                let chunks: Vec<Result<StreamChunk, AppError>> = deltas
                    .into_iter()
                    .map(|delta| {
                        Ok(StreamChunk {
                            delta: delta.to_owned(),
                            is_final: false,
                            finish_reason: None,
                        })
                    })
                    .chain(std::iter::once(Ok(StreamChunk {
                        delta: String::new(),
                        is_final: true,
                        finish_reason: Some("stop".to_owned()),
                    })))
                    .collect();
                Ok(Box::pin(futures_util::stream::iter(chunks)))
            }
            StreamScript::FailAfter(deltas) => {
                let chunks: Vec<Result<StreamChunk, AppError>> = deltas
                    .into_iter()
                    .map(|delta| {
                        Ok(StreamChunk {
                            delta: delta.to_owned(),
                            is_final: false,
                            finish_reason: None,
                        })
                    })
                    .chain(std::iter::once(Err(AppError::external_service(
                        "ScriptedProvider",
                        "stream cut by script",
                    ))))
                    .collect();
                Ok(Box::pin(futures_util::stream::iter(chunks)))
            }
        }
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(true)
    }
}

// ============================================================================
// Resource Wiring
// ============================================================================

/// Config with instant flushes and a short budget, suitable for tests
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.stream_flush_window = std::time::Duration::ZERO;
    config
}

/// Full resource graph over in-memory stores and the given provider
pub fn test_resources(
    provider: Arc<ScriptedProvider>,
    store: Arc<MemoryStore>,
) -> Arc<ServerResources> {
    init_test_logging();
    let verifier = StaticTokenVerifier::new();
    verifier.insert("test-token", "user-1");
    ServerResources::new(
        test_config(),
        store,
        Arc::new(verifier),
        provider,
        Arc::new(MemoryStreamStore::new()),
    )
}
