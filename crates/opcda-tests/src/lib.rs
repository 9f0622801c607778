// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # OPC DA Bridge Integration Tests
//!
//! Test utilities and end-to-end suites for the bridge, driven by a
//! simulated provider.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p opcda-tests
//! cargo test -p opcda-tests --test integration_session
//! cargo test -p opcda-tests --test integration_config
//! ```
//!
//! ## Test Categories
//!
//! ### Session Tests (`integration_session.rs`)
//! - Connection lifecycle and `connect` / `disconnect` events
//! - Group creation, items and provisioning
//! - Subscription state per target
//! - Data-change routing and stale handles
//! - Read, write and browse tasks
//!
//! ### Config Tests (`integration_config.rs`)
//! - YAML, TOML and JSON documents
//! - Placeholders and environment overrides
//! - Provisioning a session from a loaded file

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
}
