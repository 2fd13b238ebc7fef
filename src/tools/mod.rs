// ABOUTME: Server-side tool surface the coach model is allowed to invoke
// ABOUTME: Typed invocation parsing, identity injection, dispatch, and LLM-facing schemas
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Tool Registry & Dispatcher
//!
//! Tool arguments arrive from the model as loose JSON. They are parsed into
//! a tagged union of known operations ([`ToolInvocation`]) with typed params
//! per variant; unknown operation names are rejected explicitly. Identity is
//! never taken from the model: the params structs have no uid/session fields,
//! and the dispatcher injects the server-authoritative [`ToolIdentity`]
//! resolved from the authenticated request.

mod invocation;
mod registry;

pub use invocation::ToolInvocation;
pub use registry::{declarations, ToolDispatcher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server-authoritative identity attached to every tool execution
///
/// Built from the authenticated request, regardless of anything the model
/// put into the call arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolIdentity {
    pub uid: String,
    pub session_id: String,
}

impl ToolIdentity {
    #[must_use]
    pub fn new(uid: &str, session_id: &str) -> Self {
        Self {
            uid: uid.to_owned(),
            session_id: session_id.to_owned(),
        }
    }
}

/// Uniform tool result envelope: `{ok, data | error}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResponse {
    /// Successful result carrying a data payload
    #[must_use]
    pub const fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed result carrying an error message
    #[must_use]
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Serialize for embedding into a tool-result chat message
    #[must_use]
    pub fn to_message_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{\"ok\":false}".to_owned())
    }
}
