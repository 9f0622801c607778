// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging and tracing initialization.
//!
//! `RUST_LOG` takes precedence over the configured level. Extra directives
//! from [`LoggingConfig::directives`] are added on top of either.

use tracing::Level;
use tracing_subscriber::{
    filter::Directive, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{LogFormat, LoggingConfig};

// =============================================================================
// Logging Initialization
// =============================================================================

/// Installs the global subscriber described by `config`.
///
/// Fails if a directive does not parse or a global subscriber is already
/// installed.
pub fn try_init_logging(config: &LoggingConfig) -> ConfigResult<()> {
    let filter = build_filter(config)?;
    let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());

    let result = match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(config.with_target)
                    .with_thread_ids(config.with_thread_ids)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(is_terminal),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_thread_ids(config.with_thread_ids)
                    .with_ansi(is_terminal),
            )
            .try_init(),
        LogFormat::Full => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(config.with_target)
                    .with_thread_ids(config.with_thread_ids)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(is_terminal),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(config.with_target)
                    .with_thread_ids(config.with_thread_ids)
                    .with_file(true)
                    .with_line_number(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
    };

    result.map_err(|e| ConfigError::Logging {
        message: e.to_string(),
    })
}

/// Installs the global subscriber, logging a warning if one already exists.
pub fn init_logging(config: &LoggingConfig) {
    if let Err(e) = try_init_logging(config) {
        tracing::warn!("Logging not initialized: {}", e);
    }
}

fn build_filter(config: &LoggingConfig) -> ConfigResult<EnvFilter> {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    for raw in &config.directives {
        let directive: Directive = raw.parse().map_err(|e| {
            ConfigError::validation("logging.directives", format!("'{}': {}", raw, e))
        })?;
        filter = filter.add_directive(directive);
    }

    Ok(filter)
}

// =============================================================================
// Log Level Parsing
// =============================================================================

/// Parses a log level string into a `Level`, defaulting to `INFO`.
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

// =============================================================================
// Tests
// =============================================================================
