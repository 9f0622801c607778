// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Common Test Utilities
//!
//! Shared providers, fixtures and harnesses for the integration tests.
//!
//! ## Module Structure
//!
//! - `mocks`: an in-memory provider with callback simulation
//! - `fixtures`: pre-built providers, item states, values and documents
//! - `harness`: a session under test and event recorders

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize test logging. Call this at the start of each test module.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("warn,opcda=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}
