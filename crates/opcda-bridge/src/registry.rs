// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscription registry.
//!
//! Maps each [`TargetKey`] to at most one [`Subscription`]. The registry is
//! plain bookkeeping; the session owns it behind its mutex and performs the
//! provider-side effects that a [`Transition`] asks for.
//!
//! # State machine (per key)
//!
//! ```text
//!                   subscribe(kinds)
//!   Unregistered ───────────────────────► RegisteredActive ◄──┐
//!        ▲                                   │   │            │ unsubscribe(some)
//!        │                                   │   └────────────┘  kinds remain
//!        │         release                   │ unsubscribe(all) / kinds emptied
//!        └──────────── RegisteredNoKinds ◄───┘
//! ```
//!
//! `RegisteredNoKinds` exists only between emptying a kind set and releasing
//! the channel; it is never observable from outside the session mutex.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use opcda_core::{EventKinds, GroupHandle, TargetKey};
use serde::Serialize;

use crate::channel::Channel;

// =============================================================================
// SubscriptionState
// =============================================================================

/// Registration state of one target key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    /// No subscription.
    #[default]
    Unregistered,
    /// Subscription present with an empty kind set, pending release.
    RegisteredNoKinds,
    /// Subscription present and receiving events.
    RegisteredActive,
}

impl SubscriptionState {
    /// Returns `true` while a subscription is installed.
    #[inline]
    pub fn is_registered(&self) -> bool {
        !matches!(self, Self::Unregistered)
    }

    /// Returns `true` if events are delivered.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::RegisteredActive)
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unregistered => write!(f, "Unregistered"),
            Self::RegisteredNoKinds => write!(f, "Registered (no kinds)"),
            Self::RegisteredActive => write!(f, "Registered (active)"),
        }
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// One installed subscription.
#[derive(Debug)]
pub struct Subscription {
    kinds: EventKinds,
    channel: Arc<Channel>,
    router: Option<GroupHandle>,
}

impl Subscription {
    /// Creates a subscription.
    pub fn new(kinds: EventKinds, channel: Arc<Channel>) -> Self {
        Self {
            kinds,
            channel,
            router: None,
        }
    }

    /// Marks the group whose data-change callback routes to this subscription.
    pub fn with_router(mut self, group: GroupHandle) -> Self {
        self.router = Some(group);
        self
    }

    /// Returns the subscribed kinds.
    #[inline]
    pub fn kinds(&self) -> EventKinds {
        self.kinds
    }

    /// Returns the delivery channel.
    #[inline]
    pub fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }

    /// Returns the group with a registered router callback, if any.
    #[inline]
    pub fn router(&self) -> Option<GroupHandle> {
        self.router
    }

    /// Returns the current state.
    pub fn state(&self) -> SubscriptionState {
        if self.kinds.is_empty() {
            SubscriptionState::RegisteredNoKinds
        } else {
            SubscriptionState::RegisteredActive
        }
    }
}

// =============================================================================
// Transition
// =============================================================================

/// Effect of one registry edit.
#[derive(Debug)]
pub enum Transition {
    /// Unregistered -> RegisteredActive.
    Installed,
    /// The key was occupied; the rejected subscription is handed back so
    /// the caller can release its channel.
    Occupied(Subscription),
    /// Kinds removed, subscription still active.
    Narrowed(EventKinds),
    /// Subscription removed; caller releases its channel and router.
    Removed(Subscription),
    /// Nothing registered under the key.
    Unknown,
}

// =============================================================================
// Registry
// =============================================================================

/// Target key to subscription map.
#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<TargetKey, Subscription>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `subscription` unless the key is occupied.
    pub fn subscribe(&mut self, key: TargetKey, subscription: Subscription) -> Transition {
        if self.entries.contains_key(&key) {
            return Transition::Occupied(subscription);
        }
        tracing::debug!(target_key = %key, kinds = %subscription.kinds(), "Subscription installed");
        self.entries.insert(key, subscription);
        Transition::Installed
    }

    /// Removes `kinds` from the key, or everything when `kinds` is empty.
    pub fn unsubscribe(&mut self, key: &TargetKey, kinds: EventKinds) -> Transition {
        let Some(entry) = self.entries.get_mut(key) else {
            return Transition::Unknown;
        };

        if !kinds.is_empty() {
            entry.kinds = entry.kinds.difference(kinds);
            if entry.state().is_active() {
                tracing::debug!(target_key = %key, kinds = %entry.kinds, "Subscription narrowed");
                return Transition::Narrowed(entry.kinds);
            }
        }

        match self.entries.remove(key) {
            Some(removed) => {
                tracing::debug!(target_key = %key, "Subscription removed");
                Transition::Removed(removed)
            }
            None => Transition::Unknown,
        }
    }

    /// Returns the subscription for `key`.
    pub fn get(&self, key: &TargetKey) -> Option<&Subscription> {
        self.entries.get(key)
    }

    /// Returns the state of `key`.
    pub fn state(&self, key: &TargetKey) -> SubscriptionState {
        self.entries
            .get(key)
            .map(Subscription::state)
            .unwrap_or_default()
    }

    /// Returns the registered keys.
    pub fn keys(&self) -> impl Iterator<Item = &TargetKey> {
        self.entries.keys()
    }

    /// Returns the number of subscriptions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every subscription.
    pub fn drain(&mut self) -> Vec<(TargetKey, Subscription)> {
        std::mem::take(&mut self.entries).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelHandler;
    use opcda_core::EventKind;
    use tokio::runtime::Handle;

    fn subscription(kinds: EventKinds) -> Subscription {
        let (handler, _rx) = ChannelHandler::with_channel(1);
        let channel = Channel::new(&Handle::current(), "test", 4, Arc::new(handler)).unwrap();
        Subscription::new(kinds, Arc::new(channel))
    }

    #[tokio::test]
    async fn test_at_most_one_per_key() {
        let mut registry = Registry::new();
        let key = TargetKey::group("G");
        let kinds = EventKinds::only(EventKind::DataChange);

        assert!(matches!(registry.subscribe(key.clone(), subscription(kinds)), Transition::Installed));
        assert!(matches!(registry.subscribe(key.clone(), subscription(kinds)), Transition::Occupied(_)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.state(&key), SubscriptionState::RegisteredActive);
    }

    #[tokio::test]
    async fn test_partial_then_full_removal() {
        let mut registry = Registry::new();
        let key = TargetKey::Connection;
        registry.subscribe(key.clone(), subscription(EventKinds::CONNECTION));

        match registry.unsubscribe(&key, EventKinds::only(EventKind::Error)) {
            Transition::Narrowed(left) => {
                assert!(left.contains(EventKind::Connect));
                assert!(!left.contains(EventKind::Error));
            }
            other => panic!("unexpected transition: {:?}", other),
        }

        let rest = EventKinds::from([EventKind::Connect, EventKind::Disconnect]);
        assert!(matches!(registry.unsubscribe(&key, rest), Transition::Removed(_)));
        assert_eq!(registry.state(&key), SubscriptionState::Unregistered);
    }

    #[tokio::test]
    async fn test_empty_kinds_removes_everything() {
        let mut registry = Registry::new();
        let key = TargetKey::group("G");
        registry.subscribe(key.clone(), subscription(EventKinds::only(EventKind::DataChange)));

        assert!(matches!(registry.unsubscribe(&key, EventKinds::empty()), Transition::Removed(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_key() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.unsubscribe(&TargetKey::group("nope"), EventKinds::empty()),
            Transition::Unknown
        ));
        assert!(!registry.state(&TargetKey::Connection).is_registered());
    }

    #[tokio::test]
    async fn test_drain() {
        let mut registry = Registry::new();
        registry.subscribe(TargetKey::Connection, subscription(EventKinds::CONNECTION));
        registry.subscribe(TargetKey::group("G"), subscription(EventKinds::only(EventKind::DataChange)));

        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
    }
}
