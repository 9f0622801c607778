// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema.
//!
//! ```text
//! BridgeConfig
//! ├── server: ServerConfig      (host, prog_id)
//! ├── session: SessionConfig    (channel_capacity, max_concurrent_tasks, default_kinds)
//! ├── groups: [GroupSpec]       (name, update_rate_ms, deadband, items)
//! └── logging: LoggingConfig
//! ```

use std::collections::HashSet;

use opcda_core::config::{validate_group_name, validate_group_parameters};
use opcda_core::{GroupSpec, SessionConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Default server host.
pub const DEFAULT_HOST: &str = "localhost";

// =============================================================================
// BridgeConfig
// =============================================================================

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// OPC server to connect to.
    pub server: ServerConfig,

    /// Session tuning.
    #[serde(default)]
    pub session: SessionConfig,

    /// Groups created after construction.
    #[serde(default)]
    pub groups: Vec<GroupSpec>,

    /// Logging setup.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Creates a configuration for `prog_id` on the default host.
    pub fn new(prog_id: impl Into<String>) -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_HOST.to_string(),
                prog_id: prog_id.into(),
            },
            session: SessionConfig::default(),
            groups: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validates the whole configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.server.validate()?;
        self.session
            .validate()
            .map_err(|e| ConfigError::from_bridge("session", e))?;

        let mut names = HashSet::new();
        for (i, group) in self.groups.iter().enumerate() {
            let field = format!("groups[{}]", i);
            validate_group_name(&group.name).map_err(|e| ConfigError::from_bridge(&field, e))?;
            validate_group_parameters(&group.name, group.update_rate_ms, group.deadband)
                .map_err(|e| ConfigError::from_bridge(&field, e))?;

            if !names.insert(group.name.as_str()) {
                return Err(ConfigError::DuplicateGroup {
                    name: group.name.clone(),
                });
            }

            let mut items = HashSet::new();
            for item in &group.items {
                if item.trim().is_empty() {
                    return Err(ConfigError::validation(
                        format!("{}.items", field),
                        "item identifiers must not be empty",
                    ));
                }
                if !items.insert(item.as_str()) {
                    return Err(ConfigError::DuplicateItem {
                        group: group.name.clone(),
                        item: item.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Returns the total number of configured items.
    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }
}

// =============================================================================
// ServerConfig
// =============================================================================

/// OPC server location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host name or address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Server ProgID, e.g. `Matrikon.OPC.Simulation.1`.
    #[serde(default)]
    pub prog_id: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

impl ServerConfig {
    /// Validates the server section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::missing_field("server.host"));
        }
        if self.prog_id.trim().is_empty() {
            return Err(ConfigError::missing_field("server.prog_id"));
        }
        Ok(())
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,

    /// Extra filter directives, e.g. `opcda_bridge::channel=trace`.
    #[serde(default)]
    pub directives: Vec<String>,

    /// Include targets in logs.
    #[serde(default = "default_enabled")]
    pub with_target: bool,

    /// Include thread IDs in logs.
    #[serde(default)]
    pub with_thread_ids: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            directives: Vec::new(),
            with_target: true,
            with_thread_ids: false,
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter string.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Pretty,
    /// Compact single-line text.
    Compact,
    /// Text with file and line.
    Full,
    /// JSON for log aggregation.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BridgeConfig {
        let mut config = BridgeConfig::new("Matrikon.OPC.Simulation.1");
        config.groups.push(
            GroupSpec::new("Fast")
                .with_update_rate(250)
                .with_item("Random.Int4")
                .with_item("Random.Real8"),
        );
        config
    }

    #[test]
    fn test_valid_config() {
        let config = sample();
        assert!(config.validate().is_ok());
        assert_eq!(config.item_count(), 2);
    }

    #[test]
    fn test_missing_prog_id() {
        let mut config = sample();
        config.server.prog_id.clear();
        assert!(matches!(config.validate(), Err(ConfigError::MissingField { .. })));
    }

    #[test]
    fn test_duplicate_group_and_item() {
        let mut config = sample();
        config.groups.push(GroupSpec::new("Fast"));
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateGroup { .. })));

        let mut config = sample();
        config.groups[0].items.push("Random.Int4".into());
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateItem { .. })));
    }

    #[test]
    fn test_group_parameters_checked() {
        let mut config = sample();
        config.groups[0].deadband = 101.0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));

        let mut config = sample();
        config.groups[0].name = "connection".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = sample();
        config.session.channel_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("verbose"), None);
        assert_eq!(LogLevel::Debug.as_str(), "debug");
    }
}
