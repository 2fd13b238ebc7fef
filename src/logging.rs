// ABOUTME: Structured logging setup for the coach backend
// ABOUTME: Configures tracing-subscriber with env-filter driven levels and compact or JSON output
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Production logging configuration with structured output
//!
//! Log verbosity follows `RUST_LOG` (standard `EnvFilter` syntax); the output
//! format follows `MILO_LOG_FORMAT` (`compact` default, `json` for shipping
//! to a log collector).

use std::env;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::{AppError, AppResult};

/// Environment variable selecting the log output format
const LOG_FORMAT_ENV: &str = "MILO_LOG_FORMAT";

/// Initialize the global tracing subscriber from the environment
///
/// # Errors
///
/// Returns an error if a subscriber is already installed (double init).
pub fn init_from_env() -> AppResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_output = env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    let result = if json_output {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };

    result.map_err(|e| AppError::config(format!("Failed to initialize logging: {e}")))
}
