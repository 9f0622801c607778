// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # opcda-bridge
//!
//! Asynchronous, event-driven access to a synchronous, callback-driven OPC DA
//! provider.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Session                             │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │   Registry   │  │  TaskQueue   │  │  groups / link     │  │
//! │  │ key→Channel  │  │  semaphore + │  │  state             │  │
//! │  │              │  │ blocking pool│  │                    │  │
//! │  └──────┬───────┘  └──────┬───────┘  └────────────────────┘  │
//! └─────────┼─────────────────┼──────────────────────────────────┘
//!           │                 │
//!   ┌───────▼───────┐  ┌──────▼───────┐        ┌────────────────┐
//!   │    Channel    │  │  DaProvider  │◄──────►│ protocol engine│
//!   │ bounded, FIFO │  │  (blocking)  │        └───────┬────────┘
//!   └───────▲───────┘  └──────────────┘                │ callbacks
//!           │             ┌──────────────┐             │
//!           └─────────────│    router    │◄────────────┘
//!                         │ live handles │
//!                         └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`provider`]: the synchronous provider seam
//! - [`channel`]: bounded ordered delivery onto a tokio runtime
//! - [`registry`]: per-target subscription state machine
//! - [`task`]: blocking provider calls as awaitable tasks
//! - [`router`]: provider callback entry points
//! - [`session`]: the public facade
//! - [`stats`]: session counters

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod channel;
pub mod provider;
pub mod registry;
pub mod router;
pub mod session;
pub mod stats;
pub mod task;

pub use channel::{Channel, ChannelHandler, EventHandler, FnHandler};
pub use provider::{DaProvider, DataChangeCallback, DisconnectCallback, ProviderResult};
pub use registry::SubscriptionState;
pub use router::LiveHandle;
pub use session::{LinkState, Session, SessionBuilder};
pub use stats::StatsSnapshot;
pub use task::{PendingTask, TaskKind};

pub use opcda_core::{
    BridgeError, BridgeResult, Event, EventKind, EventKinds, EventPayload, GroupSpec, ItemUpdate,
    SessionConfig, TargetKey, Value,
};
