// ABOUTME: System prompts for the coach chat loop, loaded at compile time
// ABOUTME: Provides the base coaching instruction used for tool calling and streaming runs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # System Prompts
//!
//! Prompts are loaded at compile time from markdown files for easy
//! maintenance. The streaming entry point appends a server-prefetched context
//! block below the base prompt; the tool-calling path sends it as-is.

/// Milo coaching assistant system prompt
pub const COACH_SYSTEM_PROMPT: &str = include_str!("coach_system.md");

/// Get the base system prompt for the coach
#[must_use]
pub const fn get_coach_system_prompt() -> &'static str {
    COACH_SYSTEM_PROMPT
}

/// Header introducing the server-prefetched context block
pub const PREFETCHED_CONTEXT_HEADER: &str = "## Server-prefetched training context";
