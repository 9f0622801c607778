// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # opcda-core
//!
//! Shared types for the OPC DA bridge.
//!
//! ## Modules
//!
//! - [`types`]: caller [`Value`], provider [`Variant`], [`Quality`], [`HResult`] and handles
//! - [`codec`]: conversion between [`Variant`] and [`Value`]
//! - [`event`]: [`Event`], [`EventKind`], [`EventKinds`] and [`TargetKey`]
//! - [`error`]: [`BridgeError`] taxonomy
//! - [`config`]: [`SessionConfig`] and [`GroupSpec`]

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod types;

pub use codec::{to_value, to_variant, CodecError};
pub use config::{GroupSpec, SessionConfig, SessionConfigBuilder};
pub use error::{BridgeError, BridgeResult, ErrorCode, ErrorSeverity};
pub use event::{Event, EventKind, EventKinds, EventPayload, ItemUpdate, TargetKey, CONNECTION_TARGET};
pub use types::{ClientHandle, GroupHandle, HResult, ItemState, Quality, SessionId, Value, Variant};
