// ABOUTME: Environment-driven server configuration for the coach backend
// ABOUTME: Reads HTTP, LLM-backend, and orchestrator budget settings with sane defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Server Configuration
//!
//! Environment-only configuration, mirroring the deployment model of the rest
//! of the platform: no config files, every knob is an environment variable
//! with a documented default.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `MILO_HTTP_PORT` | `8081` | HTTP listen port |
//! | `MILO_LLM_BASE_URL` | `http://localhost:11434/v1` | OpenAI-compatible endpoint |
//! | `MILO_LLM_MODEL` | `qwen2.5:14b-instruct` | Default chat model |
//! | `MILO_LLM_API_KEY` | unset | Bearer key, optional for local servers |
//! | `MILO_RUN_BUDGET_SECS` | `180` | Wall-clock budget for one chat run |
//! | `MILO_STREAM_FLUSH_MS` | `200` | Debounce window for stream flushes |

use std::env;
use std::time::Duration;

use crate::errors::{AppError, AppResult};

/// Environment variable for the HTTP port
const HTTP_PORT_ENV: &str = "MILO_HTTP_PORT";

/// Environment variable for the LLM endpoint base URL
const LLM_BASE_URL_ENV: &str = "MILO_LLM_BASE_URL";

/// Environment variable for the default chat model
const LLM_MODEL_ENV: &str = "MILO_LLM_MODEL";

/// Environment variable for the optional LLM API key
const LLM_API_KEY_ENV: &str = "MILO_LLM_API_KEY";

/// Environment variable for the orchestrator wall-clock budget (seconds)
const RUN_BUDGET_ENV: &str = "MILO_RUN_BUDGET_SECS";

/// Environment variable for the stream flush debounce window (milliseconds)
const STREAM_FLUSH_ENV: &str = "MILO_STREAM_FLUSH_MS";

const DEFAULT_HTTP_PORT: u16 = 8081;
const DEFAULT_LLM_BASE_URL: &str = "http://localhost:11434/v1";
const DEFAULT_LLM_MODEL: &str = "qwen2.5:14b-instruct";
const DEFAULT_RUN_BUDGET_SECS: u64 = 180;
const DEFAULT_STREAM_FLUSH_MS: u64 = 200;

/// Connection settings for the OpenAI-compatible chat backend
#[derive(Debug, Clone)]
pub struct LlmBackendConfig {
    /// Base URL of the chat-completions endpoint
    pub base_url: String,
    /// Model requested when the caller does not specify one
    pub default_model: String,
    /// Optional bearer key (local servers usually run without one)
    pub api_key: Option<String>,
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Chat backend settings
    pub llm: LlmBackendConfig,
    /// Wall-clock budget for one orchestrator run
    pub run_budget: Duration,
    /// Debounce window for streaming content flushes
    pub stream_flush_window: Duration,
}

impl ServerConfig {
    /// Load configuration from the environment
    ///
    /// # Errors
    ///
    /// Returns a config error when a set variable fails to parse (an unset
    /// variable falls back to its default instead).
    pub fn from_env() -> AppResult<Self> {
        let http_port = parse_env(HTTP_PORT_ENV, DEFAULT_HTTP_PORT)?;
        let run_budget_secs = parse_env(RUN_BUDGET_ENV, DEFAULT_RUN_BUDGET_SECS)?;
        let stream_flush_ms = parse_env(STREAM_FLUSH_ENV, DEFAULT_STREAM_FLUSH_MS)?;

        let llm = LlmBackendConfig {
            base_url: env::var(LLM_BASE_URL_ENV)
                .unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.to_owned()),
            default_model: env::var(LLM_MODEL_ENV).unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_owned()),
            api_key: env::var(LLM_API_KEY_ENV).ok().filter(|k| !k.is_empty()),
        };

        Ok(Self {
            http_port,
            llm,
            run_budget: Duration::from_secs(run_budget_secs),
            stream_flush_window: Duration::from_millis(stream_flush_ms),
        })
    }

    /// One-line summary for startup logging (never includes the API key)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "http_port={} llm_base_url={} llm_model={} run_budget={}s flush_window={}ms",
            self.http_port,
            self.llm.base_url,
            self.llm.default_model,
            self.run_budget.as_secs(),
            self.stream_flush_window.as_millis()
        )
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            llm: LlmBackendConfig {
                base_url: DEFAULT_LLM_BASE_URL.to_owned(),
                default_model: DEFAULT_LLM_MODEL.to_owned(),
                api_key: None,
            },
            run_budget: Duration::from_secs(DEFAULT_RUN_BUDGET_SECS),
            stream_flush_window: Duration::from_millis(DEFAULT_STREAM_FLUSH_MS),
        }
    }
}

/// Parse an env var, falling back to `default` when unset
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::config(format!("Invalid value for {name}: '{raw}'"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        let config = ServerConfig::default();
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.llm.default_model, DEFAULT_LLM_MODEL);
        assert_eq!(config.run_budget.as_secs(), DEFAULT_RUN_BUDGET_SECS);
    }

    #[test]
    fn test_summary_excludes_api_key() {
        let mut config = ServerConfig::default();
        config.llm.api_key = Some("secret-key".to_owned());
        assert!(!config.summary().contains("secret-key"));
    }
}
