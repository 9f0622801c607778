// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Config Integration Tests
//!
//! Loading bridge configuration from files and driving a session with it.

use std::io::Write;
use std::sync::Arc;

use opcda_bridge::Session;
use opcda_config::{
    try_init_logging, BridgeConfig, ConfigError, ConfigFormat, ConfigLoader, LogFormat, LogLevel,
    LoggingConfig,
};
use opcda_core::{EventKind, EventKinds};
use opcda_tests::common::*;
use tempfile::NamedTempFile;

fn loader(prefix: &str) -> ConfigLoader {
    ConfigLoader::new().with_env_prefix(prefix)
}

fn write_temp(content: &str, format: ConfigFormat) -> NamedTempFile {
    let suffix = format!(".{}", format.extension());
    let mut file = tempfile::Builder::new().suffix(&suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

// =============================================================================
// Formats
// =============================================================================

#[test]
fn test_all_formats_agree() {
    let yaml = loader("OPCDA_ITEST_FMT")
        .load(write_temp(ConfigFixtures::yaml(), ConfigFormat::Yaml).path())
        .unwrap();
    let toml = loader("OPCDA_ITEST_FMT")
        .load(write_temp(ConfigFixtures::toml(), ConfigFormat::Toml).path())
        .unwrap();
    let json = loader("OPCDA_ITEST_FMT")
        .load(write_temp(ConfigFixtures::json(), ConfigFormat::Json).path())
        .unwrap();

    assert_eq!(yaml, toml);
    assert_eq!(toml, json);

    assert_eq!(yaml.server.host, "localhost");
    assert_eq!(yaml.session.channel_capacity, 32);
    assert_eq!(yaml.groups, ConfigFixtures::groups());
    assert_eq!(yaml.logging.level, LogLevel::Debug);
    assert_eq!(yaml.logging.format, LogFormat::Compact);
}

#[test]
fn test_minimal_document_uses_defaults() {
    let config = loader("OPCDA_ITEST_MIN")
        .load_from_str("server:\n  prog_id: Sim.1\n", ConfigFormat::Yaml)
        .unwrap();

    assert_eq!(config, BridgeConfig::new("Sim.1"));
    assert_eq!(
        config.session.default_kinds,
        EventKinds::only(EventKind::DataChange)
    );
}

// =============================================================================
// Environment
// =============================================================================

#[test]
fn test_overrides_apply_after_placeholders() {
    std::env::set_var("OPCDA_ITEST_HOST", "plant-opc-02");
    std::env::set_var("OPCDA_ITEST_ENV_SERVER_PROG_ID", "Kepware.KEPServerEX.V6");
    std::env::set_var("OPCDA_ITEST_ENV_MAX_CONCURRENT_TASKS", "8");

    let yaml = "server:\n  host: ${OPCDA_ITEST_HOST:localhost}\n  prog_id: ${OPCDA_ITEST_PROG:Sim.1}\n";
    let config = loader("OPCDA_ITEST_ENV")
        .load_from_str(yaml, ConfigFormat::Yaml)
        .unwrap();

    assert_eq!(config.server.host, "plant-opc-02");
    assert_eq!(config.server.prog_id, "Kepware.KEPServerEX.V6");
    assert_eq!(config.session.max_concurrent_tasks, 8);
}

#[test]
fn test_env_resolution_can_be_disabled() {
    std::env::set_var("OPCDA_ITEST_OFF_SERVER_HOST", "ignored");
    let config = loader("OPCDA_ITEST_OFF")
        .with_env_vars(false)
        .load_from_str(ConfigFixtures::toml(), ConfigFormat::Toml)
        .unwrap();
    assert_eq!(config.server.host, "localhost");
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_invalid_documents() {
    let cases = [
        ("groups:\n  - name: G\n", ConfigFormat::Yaml),
        (
            "server:\n  prog_id: P\ngroups:\n  - name: G\n    update_rate_ms: 0\n",
            ConfigFormat::Yaml,
        ),
        (
            "server:\n  prog_id: P\nsession:\n  max_concurrent_tasks: 0\n",
            ConfigFormat::Yaml,
        ),
        (
            r#"{"server": {"prog_id": "P"}, "groups": [{"name": "G", "items": ["A", "A"]}]}"#,
            ConfigFormat::Json,
        ),
    ];

    for (content, format) in cases {
        let err = loader("OPCDA_ITEST_INVALID")
            .load_from_str(content, format)
            .unwrap_err();
        assert!(err.is_content_error(), "unexpected error: {}", err);
    }
}

#[test]
fn test_unknown_extension() {
    let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
    assert!(matches!(
        loader("OPCDA_ITEST_EXT").load(file.path()),
        Err(ConfigError::UnsupportedFormat { .. })
    ));
}

// =============================================================================
// Session From Config
// =============================================================================

#[tokio::test]
async fn test_session_from_loaded_config() {
    init_test_logging();
    let config = loader("OPCDA_ITEST_SESSION")
        .load_from_str(ConfigFixtures::json(), ConfigFormat::Json)
        .unwrap();

    let provider = ProviderFixtures::simulation();
    let session = Session::builder(Arc::clone(&provider) as _)
        .with_config(config.session.clone())
        .build()
        .unwrap();
    session.provision(&config.groups).unwrap();

    assert_eq!(session.group_names(), vec!["Fast", "Slow"]);
    assert_eq!(provider.items("Fast"), vec!["Random.Int4", "Random.Real8"]);

    let recorder = EventRecorder::new();
    session
        .subscribe("Fast", recorder.handler(), EventKinds::empty())
        .unwrap();
    assert_eq!(
        session.subscribed_kinds("Fast"),
        EventKinds::from([EventKind::DataChange, EventKind::Disconnect])
    );
}

#[test]
fn test_logging_installs_once() {
    let config = LoggingConfig {
        level: LogLevel::Warn,
        format: LogFormat::Json,
        ..LoggingConfig::default()
    };

    let _ = try_init_logging(&config);
    assert!(matches!(
        try_init_logging(&config),
        Err(ConfigError::Logging { .. })
    ));
}
