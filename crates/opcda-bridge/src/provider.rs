// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Synchronous provider interface.
//!
//! The protocol engine is consumed through [`DaProvider`]. Every method is
//! blocking and may be called from any thread; the bridge never calls it
//! from a callback it registered. Implementations must not invoke a
//! registered callback synchronously from inside one of these methods, since
//! the bridge may hold its session lock while calling them.
//!
//! Callbacks are plain function pointers so the provider never holds a
//! reference into a session. The router resolves the owning session from the
//! handle it is called with.

use opcda_core::{ClientHandle, GroupHandle, HResult, ItemState, Variant};

/// Data-change callback: group, item, state, result code.
pub type DataChangeCallback = fn(GroupHandle, &str, &ItemState, HResult);

/// Disconnect callback: client, result code.
pub type DisconnectCallback = fn(ClientHandle, HResult);

/// Result of a provider call.
pub type ProviderResult<T> = Result<T, HResult>;

/// A synchronous OPC DA client connection.
///
/// Implementations issue process-unique client and group handles.
///
/// Registered callbacks must be invoked from threads that may block. A
/// callback waits while the target's channel is full, so it must never run
/// inside an async task of the runtime events are delivered on. Providers
/// built on tokio dispatch callbacks through `spawn_blocking` or their own
/// threads.
pub trait DaProvider: Send + Sync + 'static {
    /// Returns the handle identifying this connection.
    fn client_handle(&self) -> ClientHandle;

    /// Connects to `prog_id` on `host`.
    fn connect(&self, host: &str, prog_id: &str) -> ProviderResult<()>;

    /// Disconnects. A no-op when not connected.
    fn disconnect(&self);

    /// Returns `true` while connected.
    fn is_connected(&self) -> bool;

    /// Creates a monitoring group.
    fn create_group(&self, name: &str, update_rate_ms: u32, deadband: f32)
        -> ProviderResult<GroupHandle>;

    /// Looks up a group by name.
    fn group(&self, name: &str) -> Option<GroupHandle>;

    /// Adds an item to a group.
    fn add_item(&self, group: GroupHandle, item: &str) -> ProviderResult<()>;

    /// Installs or clears the data-change callback of a group.
    fn set_data_change_callback(
        &self,
        group: GroupHandle,
        callback: Option<DataChangeCallback>,
    ) -> ProviderResult<()>;

    /// Reads an item.
    fn read(&self, item: &str) -> ProviderResult<ItemState>;

    /// Writes an item.
    fn write(&self, item: &str, value: &Variant) -> ProviderResult<()>;

    /// Lists the children of a browse position; the empty string is the root.
    fn browse(&self, position: &str) -> ProviderResult<Vec<String>>;

    /// Installs or clears the session-level disconnect callback.
    fn set_disconnect_callback(&self, callback: Option<DisconnectCallback>);

    /// Releases a group. Providers that release groups on disconnect may
    /// keep the default.
    fn release_group(&self, _group: GroupHandle) {}
}
