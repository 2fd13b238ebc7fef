// ABOUTME: Shared server resource container constructed once at startup
// ABOUTME: Explicit dependency injection; no ambient global state anywhere in the crate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Server Resources
//!
//! Everything a request handler needs, built once in `main` and shared via
//! `Arc`. Components receive their collaborators through constructors, which
//! keeps them swappable in tests (mock provider, in-memory stores).

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::llm::LlmProvider;
use crate::services::ChatOrchestrator;
use crate::store::{CoachStore, IdentityVerifier};
use crate::streaming::{StreamSessionManager, StreamStore};
use crate::tools::ToolDispatcher;

/// Shared resources for all request handling
pub struct ServerResources {
    pub config: ServerConfig,
    pub store: Arc<dyn CoachStore>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub streams: Arc<StreamSessionManager>,
    pub orchestrator: Arc<ChatOrchestrator>,
}

impl ServerResources {
    /// Wire the component graph from its leaf collaborators
    #[must_use]
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn CoachStore>,
        identity: Arc<dyn IdentityVerifier>,
        provider: Arc<dyn LlmProvider>,
        stream_store: Arc<dyn StreamStore>,
    ) -> Arc<Self> {
        let streams = Arc::new(StreamSessionManager::new(stream_store));
        let dispatcher = Arc::new(ToolDispatcher::new(Arc::clone(&store)));
        let orchestrator = Arc::new(ChatOrchestrator::new(
            provider,
            dispatcher,
            Arc::clone(&store),
            Arc::clone(&streams),
            &config,
        ));

        Arc::new(Self {
            config,
            store,
            identity,
            streams,
            orchestrator,
        })
    }
}
