// ABOUTME: Domain services built on top of the engines, tools, and streaming layers
// ABOUTME: Currently the chat orchestrator driving the bounded LLM tool loop
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

pub mod orchestrator;

pub use orchestrator::ChatOrchestrator;
