// ABOUTME: Coach chat route handlers: the chat entry point and the stream snapshot endpoint
// ABOUTME: Validates the request, enforces identity, and spawns the orchestrator run
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Coach chat routes
//!
//! `POST /api/coach/chat` starts one request-scoped pipeline run and returns
//! the final reply once it completes; subscribers watch incremental output
//! through `GET /api/coach/sessions/{session_id}/streams/{stream_id}`. The
//! run is spawned as a task so a client disconnect does not cancel it; the
//! persisted transcript is authoritative independent of live delivery.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::errors::AppError;
use crate::models::CoachReply;
use crate::resources::ServerResources;
use crate::streaming::{StreamKey, StreamSession};

/// Inbound chat request
#[derive(Debug, Deserialize)]
pub struct CoachChatRequest {
    pub uid: String,
    pub session_id: String,
    pub message: String,
    pub stream_id: String,
}

/// Final reply returned once the run completes
#[derive(Debug, Serialize, Deserialize)]
pub struct CoachChatResponse {
    pub reply: String,
    pub highlights: Vec<String>,
    pub actions: Vec<crate::models::SuggestedAction>,
    pub stream_id: String,
}

/// Coach routes handler
pub struct CoachRoutes;

impl CoachRoutes {
    /// Create all coach routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/coach/chat", post(Self::chat))
            .route(
                "/api/coach/sessions/:session_id/streams/:stream_id",
                get(Self::stream_snapshot),
            )
            .with_state(resources)
    }

    /// Resolve the authenticated uid from the bearer token
    async fn authenticate(
        headers: &axum::http::HeaderMap,
        resources: &Arc<ServerResources>,
    ) -> Result<String, AppError> {
        let token = headers
            .get("authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(AppError::auth_required)?;

        resources.identity.verify(token).await
    }

    fn validate(request: &CoachChatRequest) -> Result<(), AppError> {
        if request.uid.trim().is_empty() {
            return Err(AppError::missing_field("uid"));
        }
        if request.session_id.trim().is_empty() {
            return Err(AppError::missing_field("session_id"));
        }
        if request.message.trim().is_empty() {
            return Err(AppError::missing_field("message"));
        }
        if request.stream_id.trim().is_empty() {
            return Err(AppError::missing_field("stream_id"));
        }
        Ok(())
    }

    /// Start one coach run and return the final reply
    async fn chat(
        State(resources): State<Arc<ServerResources>>,
        headers: axum::http::HeaderMap,
        Json(request): Json<CoachChatRequest>,
    ) -> Result<Response, AppError> {
        Self::validate(&request)?;

        let authenticated_uid = Self::authenticate(&headers, &resources).await?;
        if authenticated_uid != request.uid {
            return Err(AppError::permission_denied(
                "Request uid does not match the authenticated user",
            ));
        }

        let stream_key = StreamKey::new(&request.uid, &request.session_id, &request.stream_id);
        let stream_id = request.stream_id.clone();
        info!("Coach chat request for stream {stream_key}");

        // Spawned so a dropped connection cannot cancel the pipeline; the
        // handler merely awaits the task's completion.
        let orchestrator = Arc::clone(&resources.orchestrator);
        let run = tokio::spawn(async move {
            orchestrator
                .run_streaming(
                    &request.uid,
                    &request.session_id,
                    &request.message,
                    &stream_key,
                )
                .await
        });

        let reply: CoachReply = run
            .await
            .map_err(|e| AppError::internal(format!("Coach run task failed: {e}")))??;

        let response = CoachChatResponse {
            reply: reply.reply,
            highlights: reply.highlights,
            actions: reply.actions,
            stream_id,
        };

        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Snapshot the stream record for a subscriber
    async fn stream_snapshot(
        State(resources): State<Arc<ServerResources>>,
        headers: axum::http::HeaderMap,
        Path((session_id, stream_id)): Path<(String, String)>,
    ) -> Result<Response, AppError> {
        let uid = Self::authenticate(&headers, &resources).await?;
        let key = StreamKey::new(&uid, &session_id, &stream_id);

        let session: StreamSession = resources
            .streams
            .snapshot(&key)
            .await?
            .ok_or_else(|| AppError::not_found("Stream"))?;

        Ok((StatusCode::OK, Json(session)).into_response())
    }
}
