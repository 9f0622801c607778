// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and pick the format from its extension
//! 2. Resolve `${VAR}` and `${VAR:default}` placeholders
//! 3. Parse YAML, TOML or JSON into [`BridgeConfig`]
//! 4. Apply `OPCDA_*` environment overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! OPCDA_SERVER_HOST=plc-gw-01
//! OPCDA_SERVER_PROG_ID=Kepware.KEPServerEX.V6
//! OPCDA_CHANNEL_CAPACITY=32
//! OPCDA_MAX_CONCURRENT_TASKS=8
//! OPCDA_LOG_LEVEL=debug
//! ```

use std::env;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{BridgeConfig, LogLevel};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "OPCDA";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader.
///
/// # Examples
///
/// ```no_run
/// use opcda_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("bridge.yaml").unwrap();
/// println!("{} groups", config.groups.len());
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix.
    env_prefix: String,

    /// Whether placeholders and overrides are applied.
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a loader with the `OPCDA` prefix.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The format follows the extension: `.yaml`/`.yml`, `.toml` or `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<BridgeConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let format = ConfigFormat::from_path(path)?;

        let config = self.load_from_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })?;

        debug!(
            groups = config.groups.len(),
            items = config.item_count(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<BridgeConfig> {
        let mut config: BridgeConfig = if self.resolve_env_vars {
            parse_str(&resolve_placeholders(content), format)?
        } else {
            parse_str(content, format)?
        };

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn var(&self, suffix: &str) -> (String, Option<String>) {
        let name = format!("{}_{}", self.env_prefix, suffix);
        let value = env::var(&name).ok();
        (name, value)
    }

    fn apply_env_overrides(&self, config: &mut BridgeConfig) -> ConfigResult<()> {
        if let (_, Some(value)) = self.var("SERVER_HOST") {
            config.server.host = value;
        }
        if let (_, Some(value)) = self.var("SERVER_PROG_ID") {
            config.server.prog_id = value;
        }

        if let (name, Some(value)) = self.var("CHANNEL_CAPACITY") {
            config.session.channel_capacity = value
                .parse()
                .map_err(|_| ConfigError::invalid_env_var(name, "expected a positive integer"))?;
        }
        if let (name, Some(value)) = self.var("MAX_CONCURRENT_TASKS") {
            config.session.max_concurrent_tasks = value
                .parse()
                .map_err(|_| ConfigError::invalid_env_var(name, "expected a positive integer"))?;
        }

        if let (name, Some(value)) = self.var("LOG_LEVEL") {
            match LogLevel::parse(&value) {
                Some(level) => config.logging.level = level,
                None => warn!("Ignoring {}={}: not a log level", name, value),
            }
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => parse_yaml(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

/// YAML goes through the `config` crate.
fn parse_yaml<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

/// Replaces `${VAR}` and `${VAR:default}`.
///
/// Unset variables without a default are left in place.
pub fn resolve_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };

        match (env::var(name), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                warn!("Environment variable '{}' not found", name);
                result.push_str(&rest[start..start + 2 + end + 1]);
            }
        }

        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<BridgeConfig> {
    ConfigLoader::new().load(path)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use opcda_core::{EventKind, EventKinds};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const YAML: &str = r#"
server:
  host: plant-opc
  prog_id: Matrikon.OPC.Simulation.1
session:
  channel_capacity: 16
  default_kinds: [dataChange, error]
groups:
  - name: Fast
    update_rate_ms: 250
    deadband: 0.5
    items:
      - Random.Int4
      - Random.Real8
  - name: Slow
logging:
  level: debug
  format: json
"#;

    fn write_temp(content: &str, suffix: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml() {
        let file = write_temp(YAML, ".yaml");
        let config = ConfigLoader::new()
            .with_env_prefix("OPCDA_TEST_YAML")
            .load(file.path())
            .unwrap();

        assert_eq!(config.server.host, "plant-opc");
        assert_eq!(config.session.channel_capacity, 16);
        assert_eq!(config.session.max_concurrent_tasks, 4);
        assert_eq!(
            config.session.default_kinds,
            EventKinds::from([EventKind::DataChange, EventKind::Error])
        );
        assert_eq!(config.groups.len(), 2);
        assert_eq!(config.groups[0].items.len(), 2);
        assert_eq!(config.groups[1].update_rate_ms, 1000);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
[server]
prog_id = "Kepware.KEPServerEX.V6"

[[groups]]
name = "Line1"
items = ["Channel1.Device1.Tag1"]
"#;
        let file = write_temp(toml, ".toml");
        let config = ConfigLoader::new()
            .with_env_prefix("OPCDA_TEST_TOML")
            .load(file.path())
            .unwrap();

        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.groups[0].name, "Line1");
        assert_eq!(config.session.channel_capacity, 10);
    }

    #[test]
    fn test_load_json() {
        let json = r#"{"server": {"host": "h", "prog_id": "p"}, "groups": []}"#;
        let config = ConfigLoader::new()
            .with_env_prefix("OPCDA_TEST_JSON")
            .load_from_str(json, ConfigFormat::Json)
            .unwrap();
        assert_eq!(config.server.prog_id, "p");
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("OPCDA_TEST_ENV_SERVER_HOST", "override-host");
        env::set_var("OPCDA_TEST_ENV_CHANNEL_CAPACITY", "64");
        env::set_var("OPCDA_TEST_ENV_LOG_LEVEL", "error");

        let file = write_temp(YAML, ".yml");
        let config = ConfigLoader::new()
            .with_env_prefix("OPCDA_TEST_ENV")
            .load(file.path())
            .unwrap();

        assert_eq!(config.server.host, "override-host");
        assert_eq!(config.session.channel_capacity, 64);
        assert_eq!(config.logging.level, LogLevel::Error);
    }

    #[test]
    fn test_invalid_env_override() {
        env::set_var("OPCDA_TEST_BAD_CHANNEL_CAPACITY", "lots");
        let err = ConfigLoader::new()
            .with_env_prefix("OPCDA_TEST_BAD")
            .load_from_str(YAML, ConfigFormat::Yaml)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));
    }

    #[test]
    fn test_placeholders() {
        env::set_var("OPCDA_TEST_PLACEHOLDER_HOST", "from-env");
        let resolved = resolve_placeholders(
            "a: ${OPCDA_TEST_PLACEHOLDER_HOST}\nb: ${OPCDA_TEST_UNSET_VAR:fallback}\nc: ${OPCDA_TEST_UNSET_VAR}\nd: ${open",
        );
        assert_eq!(
            resolved,
            "a: from-env\nb: fallback\nc: ${OPCDA_TEST_UNSET_VAR}\nd: ${open"
        );
    }

    #[test]
    fn test_placeholder_in_file() {
        let yaml = "server:\n  prog_id: ${OPCDA_TEST_UNSET_PROG:Sim.Server.1}\n";
        let config = ConfigLoader::new()
            .with_env_prefix("OPCDA_TEST_PH")
            .load_from_str(yaml, ConfigFormat::Yaml)
            .unwrap();
        assert_eq!(config.server.prog_id, "Sim.Server.1");
    }

    #[test]
    fn test_missing_file_and_bad_extension() {
        assert!(matches!(
            ConfigLoader::new().load("/nonexistent/bridge.yaml"),
            Err(ConfigError::FileNotFound { .. })
        ));
        assert!(matches!(
            ConfigFormat::from_path(Path::new("bridge.ini")),
            Err(ConfigError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_parse_error_carries_path() {
        let file = write_temp("server: [unclosed", ".yaml");
        let err = ConfigLoader::new().load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validation_runs() {
        let yaml = "server:\n  prog_id: P\ngroups:\n  - name: G\n  - name: G\n";
        let err = ConfigLoader::new()
            .with_env_prefix("OPCDA_TEST_VAL")
            .load_from_str(yaml, ConfigFormat::Yaml)
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateGroup { .. }));
    }
}
