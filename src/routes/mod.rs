// ABOUTME: HTTP route registration for the coach backend
// ABOUTME: Assembles the axum router from the per-surface route modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

pub mod chat;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::resources::ServerResources;

/// Build the complete application router
#[must_use]
pub fn router(resources: Arc<ServerResources>) -> Router {
    chat::CoachRoutes::routes(resources).layer(TraceLayer::new_for_http())
}
