// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bridge session.
//!
//! A [`Session`] owns one provider connection, the groups created on it and
//! the subscription registry, all behind a single mutex.
//!
//! # Architecture
//!
//! ```text
//!                    ┌───────────────────────────── Session ──────────────────────────┐
//!  caller ──────────►│ create_group / add_item / subscribe / unsubscribe / disconnect │
//!                    │        (synchronous, under the session mutex)                  │
//!                    │ connect / read / write / browse ──► TaskQueue ──► blocking pool│
//!                    └───────────────┬────────────────────────────────────────────────┘
//!                                    │ registry: TargetKey -> Subscription(Channel)
//!  provider threads ──► router ──────┘──► Channel ──► EventHandler (caller runtime)
//! ```
//!
//! # Teardown
//!
//! [`Session::close`] (also run on drop) marks the session torn down and,
//! under the same mutex, removes its handles from the router, releases
//! every channel, clears every provider callback, releases every group and
//! disconnects. Tasks already submitted keep running. Their results still
//! resolve, but events they would raise are dropped, and a connect that
//! lands after close is disconnected again.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use opcda_core::codec::{to_value, to_variant};
use opcda_core::config::{validate_group_name, validate_group_parameters};
use opcda_core::{
    BridgeError, BridgeResult, ClientHandle, Event, EventKind, EventKinds, GroupHandle, GroupSpec,
    HResult, ItemState, ItemUpdate, SessionConfig, SessionId, TargetKey, Value,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;

use crate::channel::{Channel, EventHandler};
use crate::provider::DaProvider;
use crate::registry::{Registry, Subscription, SubscriptionState, Transition};
use crate::router::{self, LiveHandle};
use crate::stats::{BridgeStats, StatsSnapshot};
use crate::task::{PendingTask, TaskKind, TaskQueue};

// =============================================================================
// LinkState
// =============================================================================

/// Provider link state as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// No connect has completed yet.
    #[default]
    Idle,
    /// Connected.
    Connected,
    /// Disconnected by the caller or lost.
    Disconnected,
}

impl LinkState {
    /// Returns `true` if connected.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` if the link went down after being requested.
    #[inline]
    pub fn is_down(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}

// =============================================================================
// SessionShared
// =============================================================================

#[derive(Default)]
struct SessionState {
    link: LinkState,
    groups: BTreeMap<String, GroupHandle>,
    registry: Registry,
    torn_down: bool,
}

/// State reachable from the router and from running tasks.
pub(crate) struct SessionShared {
    id: SessionId,
    provider: Arc<dyn DaProvider>,
    client: ClientHandle,
    runtime: Handle,
    config: SessionConfig,
    stats: Arc<BridgeStats>,
    state: Mutex<SessionState>,
}

impl SessionShared {
    /// Provider-thread path; waits for space.
    fn publish(&self, channel: &Channel, event: Event) {
        let accepted = channel.publish(event);
        self.stats.record_publish(accepted);
    }

    /// Path for events the bridge raises itself; never waits.
    fn announce(&self, channel: &Channel, event: Event) {
        let accepted = channel.enqueue(event);
        self.stats.record_publish(accepted);
    }

    /// Channel of `target` if it is subscribed to `kind`.
    fn channel_for(state: &SessionState, target: &TargetKey, kind: EventKind) -> Option<Arc<Channel>> {
        state
            .registry
            .get(target)
            .filter(|sub| sub.kinds().contains(kind))
            .map(|sub| Arc::clone(sub.channel()))
    }

    fn publish_connection(&self, event: Event) {
        let channel = {
            let state = self.state.lock();
            if state.torn_down {
                return;
            }
            Self::channel_for(&state, &TargetKey::Connection, event.kind())
        };

        if let Some(channel) = channel {
            self.announce(&channel, event);
        }
    }

    pub(crate) fn route_data_change(
        &self,
        target: &TargetKey,
        item: &str,
        item_state: &ItemState,
        result: HResult,
    ) {
        let update = ItemUpdate {
            item: item.to_string(),
            value: to_value(&item_state.value),
            quality: item_state.quality(),
            timestamp: item_state.timestamp,
        };

        let event = if result.is_failure() {
            Event::source_lost(
                format!("Connection lost via data change: {}", result.describe()),
                update,
            )
        } else if update.quality.is_source_unreachable() {
            let reason = format!("Data source unreachable: {}", update.quality);
            Event::source_lost(reason, update)
        } else {
            Event::data_change(update)
        };

        let channel = {
            let state = self.state.lock();
            if state.torn_down || (state.link.is_down() && event.kind() == EventKind::DataChange) {
                None
            } else {
                Self::channel_for(&state, target, event.kind())
            }
        };

        match channel {
            Some(channel) => {
                self.stats.record_callback_routed();
                tracing::trace!(session = %self.id, target_key = %target, item, event = %event, "Routing data change");
                self.publish(&channel, event);
            }
            None => {
                self.stats.record_callback_ignored();
                tracing::trace!(session = %self.id, target_key = %target, item, "Data change not delivered");
            }
        }
    }

    pub(crate) fn route_disconnect(&self, result: HResult) {
        let channel = {
            let mut state = self.state.lock();
            if state.torn_down {
                None
            } else {
                state.link = LinkState::Disconnected;
                Some(Self::channel_for(&state, &TargetKey::Connection, EventKind::Disconnect))
            }
        };

        let Some(channel) = channel else {
            self.stats.record_callback_ignored();
            return;
        };

        self.stats.record_callback_routed();
        tracing::warn!(session = %self.id, code = %result, "Provider reported disconnect");

        if let Some(channel) = channel {
            self.publish(
                &channel,
                Event::disconnect(format!("Server disconnected: {}", result.describe())),
            );
        }
    }

    fn finish_connect(&self, result: BridgeResult<()>) -> bool {
        match result {
            Ok(()) => {
                {
                    let mut state = self.state.lock();
                    if state.torn_down {
                        drop(state);
                        tracing::debug!(session = %self.id, "Connect finished after close, disconnecting");
                        self.provider.disconnect();
                        return false;
                    }
                    state.link = LinkState::Connected;
                }
                tracing::info!(session = %self.id, "Connected");
                self.publish_connection(Event::connected());
                true
            }
            Err(BridgeError::ConnectionLost { reason, .. }) => {
                tracing::warn!(session = %self.id, reason = %reason, "Connect failed");
                self.publish_connection(Event::connect_failed(reason));
                false
            }
            Err(other) => {
                self.publish_connection(Event::connect_failed("Connection failed"));
                self.publish_connection(Event::error(other.to_string()));
                false
            }
        }
    }
}

// =============================================================================
// SessionBuilder
// =============================================================================

/// Builder for [`Session`].
pub struct SessionBuilder {
    provider: Arc<dyn DaProvider>,
    config: SessionConfig,
    runtime: Option<Handle>,
    connection_handler: Option<Arc<dyn EventHandler>>,
}

impl SessionBuilder {
    /// Sets the session configuration.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the runtime events are delivered on. Defaults to the current one.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Installs a handler on the `"connection"` target at construction.
    ///
    /// It receives `connect`, `disconnect` and `error` events, preceded by
    /// one `init` event.
    pub fn with_connection_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.connection_handler = Some(handler);
        self
    }

    /// Builds the session.
    pub fn build(self) -> BridgeResult<Session> {
        self.config.validate()?;

        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current()
                .map_err(|_| BridgeError::internal("no tokio runtime to deliver events on"))?,
        };

        let stats = Arc::new(BridgeStats::new());
        let client = self.provider.client_handle();
        let shared = Arc::new(SessionShared {
            id: SessionId::new(),
            provider: Arc::clone(&self.provider),
            client,
            runtime: runtime.clone(),
            config: self.config.clone(),
            stats: Arc::clone(&stats),
            state: Mutex::new(SessionState::default()),
        });

        router::register(LiveHandle::Client(client), &shared, TargetKey::Connection)?;
        self.provider.set_disconnect_callback(Some(router::on_disconnect));

        let session = Session {
            tasks: TaskQueue::new(runtime, self.config.max_concurrent_tasks, stats),
            shared,
        };
        tracing::info!(session = %session.id(), %client, "Session created");

        if let Some(handler) = self.connection_handler {
            session.install(TargetKey::Connection, handler, EventKinds::CONNECTION, true)?;
        }

        Ok(session)
    }
}

// =============================================================================
// Session
// =============================================================================

/// An asynchronous facade over one provider connection.
///
/// # Examples
///
/// ```ignore
/// let (handler, mut events) = ChannelHandler::with_channel(32);
/// let session = Session::builder(provider)
///     .with_connection_handler(Arc::new(handler))
///     .build()?;
///
/// session.connect("localhost", "Matrikon.OPC.Simulation.1")?;
/// session.create_group("Fast", 250, 0.0)?;
/// session.add_item("Fast", "Random.Real8")?;
/// ```
pub struct Session {
    shared: Arc<SessionShared>,
    tasks: TaskQueue,
}

impl Session {
    /// Creates a builder.
    pub fn builder(provider: Arc<dyn DaProvider>) -> SessionBuilder {
        SessionBuilder {
            provider,
            config: SessionConfig::default(),
            runtime: None,
            connection_handler: None,
        }
    }

    /// Creates a session with default configuration on the current runtime.
    pub fn new(provider: Arc<dyn DaProvider>) -> BridgeResult<Self> {
        Self::builder(provider).build()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the session id.
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    /// Returns the provider connection handle.
    pub fn client_handle(&self) -> ClientHandle {
        self.shared.client
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Returns `true` once a connect succeeded and no disconnect followed.
    pub fn is_connected(&self) -> bool {
        self.shared.state.lock().link.is_connected()
    }

    /// Returns the link state.
    pub fn link_state(&self) -> LinkState {
        self.shared.state.lock().link
    }

    /// Returns the names of created groups in order.
    pub fn group_names(&self) -> Vec<String> {
        self.shared.state.lock().groups.keys().cloned().collect()
    }

    /// Returns the handle of a created group.
    pub fn group(&self, name: &str) -> Option<GroupHandle> {
        self.shared.state.lock().groups.get(name).copied()
    }

    /// Returns the subscription state of `target`.
    pub fn subscription_state(&self, target: &str) -> SubscriptionState {
        match target.parse::<TargetKey>() {
            Ok(key) => self.shared.state.lock().registry.state(&key),
            Err(_) => SubscriptionState::Unregistered,
        }
    }

    /// Returns the subscribed kinds of `target`, empty if unsubscribed.
    pub fn subscribed_kinds(&self, target: &str) -> EventKinds {
        let Ok(key) = target.parse::<TargetKey>() else {
            return EventKinds::empty();
        };
        self.shared
            .state
            .lock()
            .registry
            .get(&key)
            .map(Subscription::kinds)
            .unwrap_or_default()
    }

    /// Returns a statistics snapshot.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Returns `true` once closed.
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().torn_down
    }

    fn ensure_open(&self) -> BridgeResult<()> {
        if self.is_closed() {
            return Err(BridgeError::internal("session is closed"));
        }
        Ok(())
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Connects to `prog_id` on `host`.
    ///
    /// The outcome is published as a `connect` event on the `"connection"`
    /// target. The returned task resolves to the same success flag.
    pub fn connect(&self, host: &str, prog_id: &str) -> BridgeResult<PendingTask<bool>> {
        require("host", host)?;
        require("prog_id", prog_id)?;
        self.ensure_open()?;

        let provider = Arc::clone(&self.shared.provider);
        let orphan_provider = Arc::clone(&provider);
        let session = Arc::downgrade(&self.shared);
        let (host, prog_id) = (host.to_string(), prog_id.to_string());

        tracing::info!(session = %self.id(), host = %host, prog_id = %prog_id, "Connecting");

        Ok(self.tasks.submit_then(
            TaskKind::Connect,
            move || {
                provider.connect(&host, &prog_id).map_err(|code| {
                    BridgeError::connection_lost(
                        format!("Connection failed: {}", code.describe()),
                        Some(code),
                    )
                })
            },
            move |result| {
                let connected = match session.upgrade() {
                    Some(shared) => shared.finish_connect(result),
                    None => {
                        // The session was dropped while connecting.
                        if result.is_ok() {
                            orphan_provider.disconnect();
                        }
                        false
                    }
                };
                Ok(connected)
            },
        ))
    }

    /// Disconnects and publishes a `disconnect` event to `"connection"`.
    pub fn disconnect(&self) {
        let channel = {
            let mut state = self.shared.state.lock();
            if state.torn_down {
                return;
            }
            self.shared.provider.disconnect();
            state.link = LinkState::Disconnected;
            SessionShared::channel_for(&state, &TargetKey::Connection, EventKind::Disconnect)
        };

        tracing::info!(session = %self.id(), "Disconnected");
        if let Some(channel) = channel {
            self.shared.announce(&channel, Event::disconnect("Disconnected by client"));
        }
    }

    // =========================================================================
    // Groups and Items
    // =========================================================================

    /// Creates a monitoring group.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Validation`] for an empty or reserved name
    /// - [`BridgeError::Creation`] for a duplicate name, a rate or deadband
    ///   out of range, or a provider refusal
    pub fn create_group(&self, name: &str, update_rate_ms: u32, deadband: f32) -> BridgeResult<GroupHandle> {
        validate_group_name(name)?;
        validate_group_parameters(name, update_rate_ms, deadband)?;

        let mut state = self.shared.state.lock();
        if state.torn_down {
            return Err(BridgeError::internal("session is closed"));
        }
        if state.groups.contains_key(name) {
            return Err(BridgeError::creation(name, "group name already in use"));
        }

        let handle = self
            .shared
            .provider
            .create_group(name, update_rate_ms, deadband)
            .map_err(|code| BridgeError::creation_refused(name, code))?;

        // Registered under the session lock so a concurrent close either
        // precedes the group or unregisters it.
        if let Err(e) = router::register(LiveHandle::Group(handle), &self.shared, TargetKey::group(name)) {
            self.shared.provider.release_group(handle);
            return Err(e);
        }
        state.groups.insert(name.to_string(), handle);
        drop(state);

        tracing::info!(session = %self.id(), group = name, %handle, update_rate_ms, deadband, "Group created");
        Ok(handle)
    }

    /// Adds an item to a group.
    pub fn add_item(&self, group: &str, item: &str) -> BridgeResult<()> {
        require("group", group)?;
        require("item", item)?;

        let state = self.shared.state.lock();
        if state.torn_down {
            return Err(BridgeError::internal("session is closed"));
        }
        let handle = *state
            .groups
            .get(group)
            .ok_or_else(|| BridgeError::group_not_found(group))?;

        self.shared
            .provider
            .add_item(handle, item)
            .map_err(|code| BridgeError::add_refused(group, item, code))?;

        tracing::debug!(session = %self.id(), group, item, "Item added");
        Ok(())
    }

    /// Creates every group in `specs` and adds its items, stopping at the
    /// first failure.
    pub fn provision(&self, specs: &[GroupSpec]) -> BridgeResult<()> {
        for spec in specs {
            self.create_group(&spec.name, spec.update_rate_ms, spec.deadband)?;
            for item in &spec.items {
                self.add_item(&spec.name, item)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribes `handler` to `target` for `kinds`.
    ///
    /// An empty `kinds` means the configured default. Subscribing an
    /// occupied target is a no-op and `handler` receives nothing.
    pub fn subscribe(&self, target: &str, handler: Arc<dyn EventHandler>, kinds: EventKinds) -> BridgeResult<()> {
        let key = parse_target(target)?;
        let kinds = if kinds.is_empty() {
            self.shared.config.default_kinds
        } else {
            kinds
        };
        self.install(key, handler, kinds, false)
    }

    fn install(
        &self,
        key: TargetKey,
        handler: Arc<dyn EventHandler>,
        kinds: EventKinds,
        announce_init: bool,
    ) -> BridgeResult<()> {
        let channel = Arc::new(Channel::new(
            &self.shared.runtime,
            key.to_string(),
            self.shared.config.channel_capacity,
            handler,
        )?);

        let mut state = self.shared.state.lock();
        if state.torn_down {
            return Err(BridgeError::internal("session is closed"));
        }

        let group = match &key {
            TargetKey::Connection => None,
            TargetKey::Group(name) => Some(
                *state
                    .groups
                    .get(name)
                    .ok_or_else(|| BridgeError::group_not_found(name))?,
            ),
        };

        if state.registry.state(&key).is_registered() {
            drop(state);
            channel.release();
            tracing::debug!(session = %self.id(), target_key = %key, "Already subscribed, new handler discarded");
            return Ok(());
        }

        let mut subscription = Subscription::new(kinds, Arc::clone(&channel));
        if let Some(handle) = group.filter(|_| kinds.contains(EventKind::DataChange)) {
            self.shared
                .provider
                .set_data_change_callback(handle, Some(router::on_data_change))
                .map_err(|code| {
                    BridgeError::internal(format!(
                        "data-change callback for '{}' was refused: {}",
                        key,
                        code.describe()
                    ))
                })?;
            subscription = subscription.with_router(handle);
        }

        // The channel is not yet reachable by any producer.
        if announce_init {
            self.shared.announce(&channel, Event::init(state.link.is_connected()));
        }
        if kinds.contains(EventKind::Connect) && state.link.is_connected() {
            self.shared.announce(&channel, Event::connected());
        }

        if let Transition::Occupied(rejected) = state.registry.subscribe(key, subscription) {
            rejected.channel().release();
        }
        Ok(())
    }

    /// Removes `kinds` from `target`, or the whole subscription when `kinds`
    /// is empty or becomes empty. Unknown targets are ignored.
    pub fn unsubscribe(&self, target: &str, kinds: EventKinds) -> BridgeResult<()> {
        let key = parse_target(target)?;

        let mut state = self.shared.state.lock();
        if let Transition::Removed(subscription) = state.registry.unsubscribe(&key, kinds) {
            self.retire(&key, &subscription);
        }
        Ok(())
    }

    /// Removes the `"connection"` subscription.
    pub fn unsubscribe_connection(&self) {
        let mut state = self.shared.state.lock();
        if let Transition::Removed(subscription) =
            state.registry.unsubscribe(&TargetKey::Connection, EventKinds::empty())
        {
            self.retire(&TargetKey::Connection, &subscription);
        }
    }

    fn retire(&self, key: &TargetKey, subscription: &Subscription) {
        subscription.channel().release();
        if let Some(group) = subscription.router() {
            if let Err(code) = self.shared.provider.set_data_change_callback(group, None) {
                tracing::warn!(session = %self.id(), target_key = %key, code = %code, "Failed to clear data-change callback");
            }
        }
    }

    // =========================================================================
    // Asynchronous I/O
    // =========================================================================

    /// Reads an item.
    pub fn read(&self, item: &str) -> BridgeResult<PendingTask<Value>> {
        require("item", item)?;
        self.ensure_open()?;

        let provider = Arc::clone(&self.shared.provider);
        let item = item.to_string();
        Ok(self.tasks.submit(TaskKind::Read, move || {
            provider
                .read(&item)
                .map(|state| to_value(&state.value))
                .map_err(|code| BridgeError::read_failed(&item, code))
        }))
    }

    /// Writes an item.
    ///
    /// Values without a provider representation resolve with a write error
    /// without reaching the provider.
    pub fn write(&self, item: &str, value: Value) -> BridgeResult<PendingTask<()>> {
        require("item", item)?;
        self.ensure_open()?;

        let variant = match to_variant(&value) {
            Ok(variant) => variant,
            Err(e) => return Ok(PendingTask::ready(Err(BridgeError::write_rejected(item, e.to_string())))),
        };

        let provider = Arc::clone(&self.shared.provider);
        let item = item.to_string();
        Ok(self.tasks.submit(TaskKind::Write, move || {
            provider
                .write(&item, &variant)
                .map_err(|code| BridgeError::write_failed(&item, code))
        }))
    }

    /// Lists the children of `start`, or of the root when `None`.
    pub fn browse(&self, start: Option<&str>) -> BridgeResult<PendingTask<Vec<String>>> {
        self.ensure_open()?;

        let provider = Arc::clone(&self.shared.provider);
        let position = start.unwrap_or_default().to_string();
        Ok(self.tasks.submit(TaskKind::Browse, move || {
            provider
                .browse(&position)
                .map_err(|code| BridgeError::browse_failed(&position, code))
        }))
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Tears the session down. Idempotent.
    pub fn close(&self) {
        let mut state = self.shared.state.lock();
        if state.torn_down {
            return;
        }
        state.torn_down = true;
        let unrouted = router::unregister_session(&self.shared);

        let subscriptions = state.registry.drain();
        for (_, subscription) in &subscriptions {
            subscription.channel().release();
        }
        for (key, subscription) in &subscriptions {
            if let Some(group) = subscription.router() {
                if let Err(code) = self.shared.provider.set_data_change_callback(group, None) {
                    tracing::warn!(session = %self.id(), target_key = %key, code = %code, "Failed to clear data-change callback");
                }
            }
        }
        self.shared.provider.set_disconnect_callback(None);

        for handle in std::mem::take(&mut state.groups).into_values() {
            self.shared.provider.release_group(handle);
        }

        self.shared.provider.disconnect();
        state.link = LinkState::Disconnected;

        tracing::info!(
            session = %self.id(),
            subscriptions = subscriptions.len(),
            handles = unrouted,
            "Session closed"
        );
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.shared.id)
            .field("client", &self.shared.client)
            .field("link", &self.link_state())
            .field("groups", &self.group_names())
            .finish()
    }
}

fn require(field: &str, value: &str) -> BridgeResult<()> {
    if value.trim().is_empty() {
        return Err(BridgeError::validation(field, "must not be empty"));
    }
    Ok(())
}

fn parse_target(target: &str) -> BridgeResult<TargetKey> {
    target
        .parse::<TargetKey>()
        .map_err(|message| BridgeError::validation("target", message))
}
