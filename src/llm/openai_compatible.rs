// ABOUTME: OpenAI-compatible chat-completions client for local and cloud endpoints
// ABOUTME: Supports plain completion, native tool calling, and SSE streaming
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # OpenAI-Compatible Provider
//!
//! Chat client for any endpoint implementing the OpenAI chat-completions API
//! (Ollama, vLLM, LocalAI, or a cloud gateway). Tool calls round-trip with
//! their call ids so multi-turn tool execution works against strict backends.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::sse::{SseEvent, SseLineBuffer};
use super::{
    ChatMessage, ChatRequest, ChatResponse, ChatResponseWithTools, ChatStream,
    FunctionDeclaration, LlmCapabilities, LlmProvider, StreamChunk, TokenUsage, ToolCall,
};
use crate::config::LlmBackendConfig;
use crate::errors::{AppError, ErrorCode};

/// Connection timeout (local servers can be slow to accept)
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Request timeout (local inference can be slower than cloud)
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Service label used in external-service error messages
const SERVICE: &str = "ChatBackend";

// ============================================================================
// API Request/Response Types (OpenAI-compatible format)
// ============================================================================

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&ChatMessage> for WireMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
            tool_calls: msg.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: call.id.clone(),
                        call_type: "function".to_owned(),
                        function: WireFunctionCall {
                            name: call.name.clone(),
                            arguments: call.args.to_string(),
                        },
                    })
                    .collect()
            }),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: FunctionDeclaration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default)]
    call_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded arguments object
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    choices: Vec<WireStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    delta: WireDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireErrorResponse {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Generic OpenAI-compatible LLM provider
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: LlmBackendConfig,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider for the configured backend
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: LlmBackendConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        info!(
            "Initializing chat backend: base_url={}, model={}",
            config.base_url, config.default_model
        );

        Ok(Self { client, config })
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    fn add_auth_header(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref api_key) = self.config.api_key {
            request.header("Authorization", format!("Bearer {api_key}"))
        } else {
            request
        }
    }

    fn connect_error(&self, e: &reqwest::Error) -> AppError {
        error!("Failed to reach chat backend: {e}");
        if e.is_connect() {
            AppError::external_service(
                SERVICE,
                format!(
                    "Cannot connect to the chat backend. Is the server running at {}?",
                    self.config.base_url
                ),
            )
        } else {
            AppError::external_service(SERVICE, format!("Failed to connect: {e}"))
        }
    }

    /// Map a non-success HTTP response to an `AppError`
    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> AppError {
        if let Ok(parsed) = serde_json::from_str::<WireErrorResponse>(body) {
            let error_type = parsed.error.error_type.unwrap_or_else(|| "unknown".to_owned());
            match status.as_u16() {
                401 => AppError::auth_invalid(format!(
                    "Chat backend authentication failed: {}",
                    parsed.error.message
                )),
                429 => AppError::new(
                    ErrorCode::ExternalRateLimited,
                    "Chat backend rate limit reached. Please wait a moment and try again.",
                ),
                400 => AppError::invalid_input(format!(
                    "Chat backend rejected the request: {}",
                    parsed.error.message
                )),
                404 => AppError::not_found(format!(
                    "Model or endpoint ({})",
                    parsed.error.message
                )),
                _ => AppError::external_service(
                    SERVICE,
                    format!("{error_type} - {}", parsed.error.message),
                ),
            }
        } else {
            match status.as_u16() {
                502..=504 => AppError::external_service(
                    SERVICE,
                    "Chat backend is not responding. Is the model server running?",
                ),
                _ => AppError::external_service(
                    SERVICE,
                    format!(
                        "API error ({status}): {}",
                        body.chars().take(200).collect::<String>()
                    ),
                ),
            }
        }
    }

    fn convert_messages(messages: &[ChatMessage]) -> Vec<WireMessage> {
        messages.iter().map(WireMessage::from).collect()
    }

    fn convert_tools(tools: &[FunctionDeclaration]) -> Vec<WireTool> {
        tools
            .iter()
            .map(|decl| WireTool {
                tool_type: "function".to_owned(),
                function: decl.clone(),
            })
            .collect()
    }

    fn convert_tool_calls(calls: Vec<WireToolCall>) -> Vec<ToolCall> {
        calls
            .into_iter()
            .map(|call| {
                debug!(
                    tool_call_id = %call.id,
                    function_name = %call.function.name,
                    "Model requested tool call"
                );
                let args: Value = serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::Null);
                ToolCall {
                    id: call.id,
                    name: call.function.name,
                    args,
                }
            })
            .collect()
    }

    async fn post_completion(&self, request: &WireRequest) -> Result<WireResponse, AppError> {
        let http_request = self
            .client
            .post(self.api_url("chat/completions"))
            .header("Content-Type", "application/json")
            .json(request);

        let response = self
            .add_auth_header(http_request)
            .send()
            .await
            .map_err(|e| self.connect_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::external_service(SERVICE, format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::parse_error_response(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            error!(
                "Failed to parse chat backend response: {e} - body: {}",
                &body[..body.len().min(500)]
            );
            AppError::external_service(SERVICE, format!("Failed to parse response: {e}"))
        })
    }

    fn first_choice(response: WireResponse) -> Result<(WireChoice, String, Option<WireUsage>), AppError> {
        let model = response.model;
        let usage = response.usage;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::external_service(SERVICE, "API returned no choices"))?;
        Ok((choice, model, usage))
    }
}

impl From<WireUsage> for TokenUsage {
    fn from(u: WireUsage) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::STREAMING
            | LlmCapabilities::FUNCTION_CALLING
            | LlmCapabilities::SYSTEM_MESSAGES
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let model = request.model.as_deref().unwrap_or(&self.config.default_model);
        debug!("Chat completion: model={model}, messages={}", request.messages.len());

        let wire = WireRequest {
            model: model.to_owned(),
            messages: Self::convert_messages(&request.messages),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: Some(false),
            tools: None,
            tool_choice: None,
        };

        let (choice, model, usage) = Self::first_choice(self.post_completion(&wire).await?)?;

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            model,
            usage: usage.map(TokenUsage::from),
            finish_reason: choice.finish_reason,
        })
    }

    async fn complete_with_tools(
        &self,
        request: &ChatRequest,
        tools: &[FunctionDeclaration],
    ) -> Result<ChatResponseWithTools, AppError> {
        let model = request.model.as_deref().unwrap_or(&self.config.default_model);
        debug!(
            "Chat completion with {} tools: model={model}, messages={}",
            tools.len(),
            request.messages.len()
        );

        let wire = WireRequest {
            model: model.to_owned(),
            messages: Self::convert_messages(&request.messages),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: Some(false),
            tools: Some(Self::convert_tools(tools)),
            tool_choice: Some("auto".to_owned()),
        };

        let (choice, model, usage) = Self::first_choice(self.post_completion(&wire).await?)?;

        let tool_calls = choice.message.tool_calls.map(|calls| {
            info!("Chat backend returned {} tool calls", calls.len());
            Self::convert_tool_calls(calls)
        });

        Ok(ChatResponseWithTools {
            content: choice.message.content,
            tool_calls,
            model,
            usage: usage.map(TokenUsage::from),
            finish_reason: choice.finish_reason,
        })
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        let model = request.model.as_deref().unwrap_or(&self.config.default_model);
        debug!("Streaming chat completion: model={model}");

        let wire = WireRequest {
            model: model.to_owned(),
            messages: Self::convert_messages(&request.messages),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: Some(true),
            tools: None,
            tool_choice: None,
        };

        let http_request = self
            .client
            .post(self.api_url("chat/completions"))
            .header("Content-Type", "application/json")
            .json(&wire);

        let response = self
            .add_auth_header(http_request)
            .send()
            .await
            .map_err(|e| self.connect_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error_response(status, &body));
        }

        let mut byte_stream = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer = SseLineBuffer::new();
            let mut finished = false;

            while let Some(chunk_result) = byte_stream.next().await {
                match chunk_result {
                    Ok(bytes) => {
                        for event in buffer.feed(&bytes) {
                            if let Some(chunk) = parse_stream_event(event) {
                                finished |= chunk.is_final;
                                yield Ok(chunk);
                            }
                        }
                    }
                    Err(e) => {
                        error!("Error reading completion stream: {e}");
                        yield Err(AppError::external_service(
                            SERVICE,
                            format!("Stream read error: {e}"),
                        ));
                        return;
                    }
                }
            }

            if let Some(chunk) = buffer.finish().and_then(parse_stream_event) {
                finished |= chunk.is_final;
                yield Ok(chunk);
            }

            // Transport closed without a terminal marker; synthesize one so
            // consumers always observe an end-of-stream chunk.
            if !finished {
                yield Ok(StreamChunk {
                    delta: String::new(),
                    is_final: true,
                    finish_reason: Some("stop".to_owned()),
                });
            }
        };

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        let http_request = self.client.get(self.api_url("models"));

        let response = self
            .add_auth_header(http_request)
            .send()
            .await
            .map_err(|e| self.connect_error(&e))?;

        let healthy = response.status().is_success();
        if !healthy {
            warn!("Chat backend health check failed: {}", response.status());
        }
        Ok(healthy)
    }
}

/// Convert one SSE event into a stream chunk, dropping empty keep-alives
fn parse_stream_event(event: SseEvent) -> Option<StreamChunk> {
    match event {
        SseEvent::Done => Some(StreamChunk {
            delta: String::new(),
            is_final: true,
            finish_reason: Some("stop".to_owned()),
        }),
        SseEvent::Data(json) => match serde_json::from_str::<WireStreamChunk>(&json) {
            Ok(chunk) => {
                let choice = chunk.choices.into_iter().next()?;
                let delta = choice.delta.content.unwrap_or_default();
                let is_final = choice.finish_reason.is_some();
                if delta.is_empty() && !is_final {
                    return None;
                }
                Some(StreamChunk {
                    delta,
                    is_final,
                    finish_reason: choice.finish_reason,
                })
            }
            Err(e) => {
                warn!("Failed to parse stream chunk: {e}");
                None
            }
        },
    }
}
