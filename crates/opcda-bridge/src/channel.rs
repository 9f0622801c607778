// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bounded, ordered event delivery from provider threads to one runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  publish   ┌──────────────────────┐  handle   ┌──────────────┐
//! │ provider threads │ ─────────► │ queue (VecDeque)     │ ────────► │ EventHandler │
//! │ runtime tasks    │            │ space: Condvar       │  consumer │ (one at a    │
//! └──────────────────┘            │ ready: Notify        │  task     │  time)       │
//!                                 └──────────────────────┘           └──────────────┘
//! ```
//!
//! - Events from one producer are delivered in publish order, one at a time.
//! - [`Channel::publish`] blocks the calling thread while the queue holds
//!   `capacity` events. It is the provider-thread path and must not be
//!   called from an async task of the channel's runtime.
//! - [`Channel::enqueue`] never blocks. Events the bridge raises itself from
//!   async context take this path and may run past capacity.
//! - After [`Channel::release`] every publish is dropped and queued events
//!   are discarded.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use opcda_core::{BridgeError, BridgeResult, Event};
use parking_lot::{Condvar, Mutex};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};

// =============================================================================
// EventHandler
// =============================================================================

/// Consumer side of a channel.
///
/// Handlers run on the channel's runtime and are invoked one event at a time.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Handles one event.
    async fn handle(&self, event: Event);
}

/// A handler forwarding events into an mpsc channel.
pub struct ChannelHandler {
    sender: mpsc::Sender<Event>,
}

impl ChannelHandler {
    /// Creates a handler over an existing sender.
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a handler with a receiver.
    pub fn with_channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl EventHandler for ChannelHandler {
    async fn handle(&self, event: Event) {
        // Receiver gone means nobody is listening.
        let _ = self.sender.send(event).await;
    }
}

/// A handler calling a synchronous closure.
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(Event) + Send + Sync + 'static,
{
    /// Wraps a closure.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(Event) + Send + Sync + 'static,
{
    async fn handle(&self, event: Event) {
        (self.func)(event);
    }
}

// =============================================================================
// Channel
// =============================================================================

#[derive(Default)]
struct Queue {
    events: VecDeque<Event>,
    closed: bool,
}

struct Inner {
    label: String,
    capacity: usize,
    queue: Mutex<Queue>,
    space: Condvar,
    ready: Notify,
}

impl Inner {
    fn close(&self) -> usize {
        let discarded = {
            let mut queue = self.queue.lock();
            if queue.closed {
                return 0;
            }
            queue.closed = true;
            let n = queue.events.len();
            queue.events.clear();
            n
        };
        self.space.notify_all();
        self.ready.notify_one();
        discarded
    }
}

/// A bounded delivery channel bound to one runtime.
pub struct Channel {
    inner: Arc<Inner>,
}

impl Channel {
    /// Creates a channel and starts its consumer task on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InternalRegistration`] when `capacity` is zero.
    pub fn new(
        runtime: &Handle,
        label: impl Into<String>,
        capacity: usize,
        handler: Arc<dyn EventHandler>,
    ) -> BridgeResult<Self> {
        let label = label.into();
        if capacity == 0 {
            return Err(BridgeError::internal(format!(
                "channel '{}' requires a capacity of at least 1",
                label
            )));
        }

        let inner = Arc::new(Inner {
            label,
            capacity,
            queue: Mutex::new(Queue::default()),
            space: Condvar::new(),
            ready: Notify::new(),
        });

        runtime.spawn(consume(Arc::clone(&inner), handler));
        tracing::debug!(channel = %inner.label, capacity, "Channel opened");

        Ok(Self { inner })
    }

    /// Queues an event for delivery, waiting for space while the queue is
    /// full.
    ///
    /// Returns `false` if the channel was released, in which case the event
    /// is dropped.
    pub fn publish(&self, event: Event) -> bool {
        self.push(event, true)
    }

    /// Queues an event without waiting for space.
    ///
    /// Returns `false` if the channel was released.
    pub fn enqueue(&self, event: Event) -> bool {
        self.push(event, false)
    }

    fn push(&self, event: Event, wait_for_space: bool) -> bool {
        let mut queue = self.inner.queue.lock();

        if wait_for_space {
            while !queue.closed && queue.events.len() >= self.inner.capacity {
                self.inner.space.wait(&mut queue);
            }
        }

        if queue.closed {
            tracing::trace!(channel = %self.inner.label, kind = %event.kind(), "Dropped event after release");
            return false;
        }

        queue.events.push_back(event);
        drop(queue);
        self.inner.ready.notify_one();
        true
    }

    /// Releases the channel. Idempotent.
    pub fn release(&self) {
        let discarded = self.inner.close();
        tracing::debug!(channel = %self.inner.label, discarded, "Channel released");
    }

    /// Returns `true` once released.
    pub fn is_released(&self) -> bool {
        self.inner.queue.lock().closed
    }

    /// Returns the number of queued, undelivered events.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().events.len()
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Returns the channel label.
    pub fn label(&self) -> &str {
        &self.inner.label
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("label", &self.inner.label)
            .field("capacity", &self.inner.capacity)
            .field("pending", &self.pending())
            .field("released", &self.is_released())
            .finish()
    }
}

async fn consume(inner: Arc<Inner>, handler: Arc<dyn EventHandler>) {
    loop {
        let next = {
            let mut queue = inner.queue.lock();
            if queue.closed {
                break;
            }
            queue.events.pop_front()
        };

        match next {
            Some(event) => {
                inner.space.notify_one();
                handler.handle(event).await;
            }
            None => inner.ready.notified().await,
        }
    }

    tracing::trace!(channel = %inner.label, "Channel consumer stopped");
}

// =============================================================================
// Tests
// =============================================================================
