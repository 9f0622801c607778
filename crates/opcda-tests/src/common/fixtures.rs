// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built providers, item states, values and configuration documents.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use opcda_core::{GroupSpec, ItemState, Quality, Value, Variant};

use super::mocks::SimulatedProvider;

// =============================================================================
// Provider Fixtures
// =============================================================================

/// Pre-configured providers.
pub struct ProviderFixtures;

impl ProviderFixtures {
    /// Host used by every fixture.
    pub const HOST: &'static str = "localhost";

    /// ProgID used by every fixture.
    pub const PROG_ID: &'static str = "Matrikon.OPC.Simulation.1";

    /// A provider with a few simulation items and a two-level browse tree.
    pub fn simulation() -> Arc<SimulatedProvider> {
        let provider = SimulatedProvider::new();
        provider.set_value("Random.Int4", Variant::I4(42));
        provider.set_value("Random.Real8", Variant::R8(21.5));
        provider.set_value("Random.String", Variant::Bstr("hello".into()));
        provider.set_value("Random.Boolean", Variant::Bool(true));
        provider.set_value("Random.ArrayOfReal8", Variant::Other { vt: 0x2005 });

        provider.set_children("", &["Random", "Bucket Brigade", "Write Only"]);
        provider.set_children("Random", &["Random.Int4", "Random.Real8", "Random.String"]);
        Arc::new(provider)
    }

    /// A provider that refuses every connect.
    pub fn unreachable() -> Arc<SimulatedProvider> {
        let provider = SimulatedProvider::new();
        provider.set_fail_connect(true);
        Arc::new(provider)
    }
}

// =============================================================================
// Item State Fixtures
// =============================================================================

/// Item states as delivered by data-change callbacks.
pub struct ItemStateFixtures;

impl ItemStateFixtures {
    /// A good 32-bit integer.
    pub fn good_int(value: i32) -> ItemState {
        ItemState::good(Variant::I4(value))
    }

    /// A good double.
    pub fn good_real(value: f64) -> ItemState {
        ItemState::good(Variant::R8(value))
    }

    /// A value whose source is not reachable.
    pub fn not_connected() -> ItemState {
        ItemState::with_quality(Variant::Empty, Quality::BadNotConnected)
    }

    /// A value read through a failed communication link.
    pub fn comm_failure(value: f64) -> ItemState {
        ItemState::with_quality(Variant::R8(value), Quality::BadCommFailure)
    }
}

// =============================================================================
// Value Fixtures
// =============================================================================

/// Values for codec round trips.
pub struct ValueFixtures;

impl ValueFixtures {
    /// One value of every shape the provider can represent.
    pub fn writable() -> Vec<Value> {
        vec![
            Value::Null,
            Value::Bool(false),
            Value::Int32(-7),
            Value::Int64(9_007_199_254_740_993),
            Value::Float64(3.25),
            Value::String("pump-01".into()),
            Value::DateTime(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 15).unwrap()),
        ]
    }

    /// Values `write` must reject.
    pub fn unwritable() -> Vec<Value> {
        vec![
            Value::Array(vec![Value::Int32(1), Value::Int32(2)]),
            Value::Unsupported { vt: 0x2005 },
        ]
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Configuration documents and specs.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// Two groups with items in the simulation namespace.
    pub fn groups() -> Vec<GroupSpec> {
        vec![
            GroupSpec::new("Fast")
                .with_update_rate(250)
                .with_item("Random.Int4")
                .with_item("Random.Real8"),
            GroupSpec::new("Slow")
                .with_update_rate(5000)
                .with_deadband(1.5)
                .with_item("Random.String"),
        ]
    }

    /// A complete YAML document.
    pub fn yaml() -> &'static str {
        r#"
server:
  host: ${OPCDA_FIXTURE_HOST:localhost}
  prog_id: Matrikon.OPC.Simulation.1
session:
  channel_capacity: 32
  max_concurrent_tasks: 2
  default_kinds: [dataChange, disconnect]
groups:
  - name: Fast
    update_rate_ms: 250
    items: [Random.Int4, Random.Real8]
  - name: Slow
    update_rate_ms: 5000
    deadband: 1.5
    items: [Random.String]
logging:
  level: debug
  format: compact
"#
    }

    /// The same document in TOML.
    pub fn toml() -> &'static str {
        r#"
[server]
host = "localhost"
prog_id = "Matrikon.OPC.Simulation.1"

[session]
channel_capacity = 32
max_concurrent_tasks = 2
default_kinds = ["dataChange", "disconnect"]

[[groups]]
name = "Fast"
update_rate_ms = 250
items = ["Random.Int4", "Random.Real8"]

[[groups]]
name = "Slow"
update_rate_ms = 5000
deadband = 1.5
items = ["Random.String"]

[logging]
level = "debug"
format = "compact"
"#
    }

    /// The same document in JSON.
    pub fn json() -> &'static str {
        r#"{
  "server": { "host": "localhost", "prog_id": "Matrikon.OPC.Simulation.1" },
  "session": { "channel_capacity": 32, "max_concurrent_tasks": 2, "default_kinds": ["dataChange", "disconnect"] },
  "groups": [
    { "name": "Fast", "update_rate_ms": 250, "items": ["Random.Int4", "Random.Real8"] },
    { "name": "Slow", "update_rate_ms": 5000, "deadband": 1.5, "items": ["Random.String"] }
  ],
  "logging": { "level": "debug", "format": "compact" }
}"#
    }
}
