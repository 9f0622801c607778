// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! A session wired to a [`SimulatedProvider`] with a recording connection
//! handler, plus [`EventRecorder`] for observing any target.
//!
//! ```rust,ignore
//! let mut harness = BridgeHarness::connected().await;
//! harness.session.create_group("G", 1000, 0.0).unwrap();
//!
//! let mut events = harness.subscribe("G", EventKinds::only(EventKind::DataChange));
//! harness.provider.fire_data_change("G", "Tag1", &state, HResult::S_OK);
//! let event = events.expect(EventKind::DataChange).await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use opcda_bridge::{ChannelHandler, EventHandler, Session};
use opcda_core::{Event, EventKind, EventKinds, SessionConfig};

use super::fixtures::ProviderFixtures;
use super::mocks::SimulatedProvider;

/// How long to wait for an expected event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a target must stay silent to count as quiet.
pub const QUIET_PERIOD: Duration = Duration::from_millis(50);

// =============================================================================
// Event Recorder
// =============================================================================

/// Collects the events delivered to one handler.
pub struct EventRecorder {
    handler: Arc<ChannelHandler>,
    events: mpsc::Receiver<Event>,
}

impl EventRecorder {
    /// Creates a recorder.
    pub fn new() -> Self {
        let (handler, events) = ChannelHandler::with_channel(256);
        Self {
            handler: Arc::new(handler),
            events,
        }
    }

    /// Returns the handler to register with a session.
    pub fn handler(&self) -> Arc<dyn EventHandler> {
        Arc::clone(&self.handler) as Arc<dyn EventHandler>
    }

    /// Waits for the next event.
    pub async fn next(&mut self) -> Option<Event> {
        timeout(EVENT_TIMEOUT, self.events.recv()).await.ok().flatten()
    }

    /// Waits for the next event and asserts its kind.
    pub async fn expect(&mut self, kind: EventKind) -> Event {
        match self.next().await {
            Some(event) => {
                assert_eq!(event.kind(), kind, "unexpected event: {}", event);
                event
            }
            None => panic!("timed out waiting for a {} event", kind),
        }
    }

    /// Asserts that nothing arrives within [`QUIET_PERIOD`].
    pub async fn assert_quiet(&mut self) {
        tokio::time::sleep(QUIET_PERIOD).await;
        if let Ok(event) = self.events.try_recv() {
            panic!("expected no event, got {}", event);
        }
    }

    /// Returns every event already delivered.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Bridge Harness
// =============================================================================

/// A session over a simulated provider.
pub struct BridgeHarness {
    /// The provider behind the session.
    pub provider: Arc<SimulatedProvider>,

    /// The session under test.
    pub session: Session,

    /// Recorder installed on the `"connection"` target at construction.
    pub connection: EventRecorder,
}

impl BridgeHarness {
    /// Creates a harness over the simulation provider.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new() -> Self {
        Self::with_provider(ProviderFixtures::simulation(), SessionConfig::default())
    }

    /// Creates a harness over `provider`.
    pub fn with_provider(provider: Arc<SimulatedProvider>, config: SessionConfig) -> Self {
        let connection = EventRecorder::new();
        let session = Session::builder(Arc::clone(&provider) as _)
            .with_config(config)
            .with_connection_handler(connection.handler())
            .build()
            .expect("Failed to build session");

        Self {
            provider,
            session,
            connection,
        }
    }

    /// Creates a connected harness with the `init` and `connect` events
    /// already consumed.
    pub async fn connected() -> Self {
        let mut harness = Self::new();
        harness.connection.expect(EventKind::Init).await;
        assert!(harness.connect().await, "connect failed");
        harness.connection.expect(EventKind::Connect).await;
        harness
    }

    /// Connects and returns the success flag.
    pub async fn connect(&self) -> bool {
        self.session
            .connect(ProviderFixtures::HOST, ProviderFixtures::PROG_ID)
            .expect("connect rejected")
            .await
            .expect("connect task failed")
    }

    /// Subscribes a new recorder to `target`.
    pub fn subscribe(&self, target: &str, kinds: EventKinds) -> EventRecorder {
        let recorder = EventRecorder::new();
        self.session
            .subscribe(target, recorder.handler(), kinds)
            .expect("subscribe failed");
        recorder
    }
}
