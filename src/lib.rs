// ABOUTME: Main library entry point for the Milo coach backend
// ABOUTME: Request-scoped LLM coaching pipeline with tool calling, streaming, and training analytics
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![deny(unsafe_code)]

//! # Milo Coach Server
//!
//! Backend for the in-app AI strength coach. Each chat request runs one
//! request-scoped pipeline: training analytics are prefetched, a bounded
//! LLM tool-calling loop produces the answer, and incremental output is
//! broadcast through a shared stream record with transactional appends.
//!
//! ## Architecture
//!
//! - **Intelligence**: pure aggregation, risk-detection, and recommendation
//!   engines over the user's training history
//! - **Tools**: the typed operation surface the model may invoke, with
//!   server-authoritative identity
//! - **LLM**: provider abstraction over OpenAI-compatible chat backends
//! - **Streaming**: the per-request `StreamSession` record clients subscribe
//!   to for token-by-token output
//! - **Services**: the chat orchestrator tying the layers together
//! - **Store**: collaborator traits for the document store and auth layer
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use milo_coach_server::config::ServerConfig;
//! use milo_coach_server::llm::OpenAiCompatibleProvider;
//! use milo_coach_server::resources::ServerResources;
//! use milo_coach_server::store::{MemoryStore, StaticTokenVerifier};
//! use milo_coach_server::streaming::MemoryStreamStore;
//!
//! # fn main() -> Result<(), milo_coach_server::errors::AppError> {
//! let config = ServerConfig::from_env()?;
//! let provider = Arc::new(OpenAiCompatibleProvider::new(config.llm.clone())?);
//! let resources = ServerResources::new(
//!     config,
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(StaticTokenVerifier::new()),
//!     provider,
//!     Arc::new(MemoryStreamStore::new()),
//! );
//! let app = milo_coach_server::routes::router(resources);
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

/// Environment-driven server configuration
pub mod config;

/// Unified error handling (`AppError`, `ErrorCode`, `AppResult`)
pub mod errors;

/// Training analytics engines (aggregation, risk, recommendation)
pub mod intelligence;

/// LLM provider abstraction and the OpenAI-compatible client
pub mod llm;

/// Structured logging setup
pub mod logging;

/// Core domain models
pub mod models;

/// Shared server resource container
pub mod resources;

/// HTTP route handlers
pub mod routes;

/// Domain services (chat orchestrator)
pub mod services;

/// Datastore and identity collaborator traits with in-memory implementations
pub mod store;

/// Stream session management with transactional appends
pub mod streaming;

/// Tool registry and dispatcher for model-invoked operations
pub mod tools;
