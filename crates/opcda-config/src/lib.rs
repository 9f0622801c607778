// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # opcda-config
//!
//! File configuration for the OPC DA bridge.
//!
//! ## Features
//!
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Placeholders**: `${VAR}` and `${VAR:default}` resolved before parsing
//! - **Environment Overrides**: `OPCDA_SERVER_HOST`, `OPCDA_SERVER_PROG_ID`,
//!   `OPCDA_CHANNEL_CAPACITY`, `OPCDA_MAX_CONCURRENT_TASKS`, `OPCDA_LOG_LEVEL`
//! - **Logging**: `tracing-subscriber` setup from [`LoggingConfig`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use opcda_config::{init_logging, load_config};
//!
//! let config = load_config("bridge.yaml").unwrap();
//! init_logging(&config.logging);
//!
//! println!("Server: {}", config.server.prog_id);
//! println!("Groups: {}", config.groups.len());
//! ```
//!
//! ## Example
//!
//! ```yaml
//! server:
//!   host: ${OPC_HOST:localhost}
//!   prog_id: Matrikon.OPC.Simulation.1
//! session:
//!   channel_capacity: 32
//!   default_kinds: [dataChange]
//! groups:
//!   - name: Fast
//!     update_rate_ms: 250
//!     items: [Random.Int4, Random.Real8]
//! logging:
//!   level: info
//!   format: json
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod logging;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, ConfigFormat, ConfigLoader};
pub use logging::{init_logging, try_init_logging};
pub use schema::{BridgeConfig, LogFormat, LogLevel, LoggingConfig, ServerConfig};
