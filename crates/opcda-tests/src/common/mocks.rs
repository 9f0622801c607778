// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! An in-memory [`DaProvider`] for driving a session without a COM server.
//!
//! ## Design Principles
//!
//! - Configurable failure injection per operation
//! - Interaction counters for verification
//! - Callbacks fired explicitly by the test, from any thread

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use opcda_bridge::provider::{DaProvider, DataChangeCallback, DisconnectCallback, ProviderResult};
use opcda_core::{ClientHandle, GroupHandle, HResult, ItemState, Variant};

/// Handles are unique across every provider in the test process.
static NEXT_HANDLE: AtomicU32 = AtomicU32::new(1);

fn next_handle() -> u32 {
    NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)
}

// =============================================================================
// Simulated Provider
// =============================================================================

struct GroupRecord {
    handle: GroupHandle,
    items: Vec<String>,
    callback: Option<DataChangeCallback>,
}

/// A configurable in-memory OPC DA provider.
pub struct SimulatedProvider {
    client: ClientHandle,

    /// Connection state.
    connected: AtomicBool,

    /// Groups by name.
    groups: Mutex<HashMap<String, GroupRecord>>,

    /// Item values served by `read`.
    values: Mutex<HashMap<String, Variant>>,

    /// Browse tree: position -> children.
    tree: Mutex<HashMap<String, Vec<String>>>,

    /// Installed disconnect callback.
    disconnect_callback: Mutex<Option<DisconnectCallback>>,

    /// Force connect to fail.
    fail_connect: AtomicBool,

    /// Force group creation to fail.
    fail_create_group: AtomicBool,

    /// Force writes to fail.
    fail_writes: AtomicBool,

    /// Latency added to `connect` and `read`, in milliseconds.
    call_delay_ms: AtomicU64,

    connect_count: AtomicU64,
    disconnect_count: AtomicU64,
    read_count: AtomicU64,
    write_count: AtomicU64,
    add_count: AtomicU64,
    released_groups: AtomicU64,

    /// Write history for verification.
    write_history: Mutex<Vec<(String, Variant)>>,
}

impl SimulatedProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self {
            client: ClientHandle::new(next_handle()),
            connected: AtomicBool::new(false),
            groups: Mutex::new(HashMap::new()),
            values: Mutex::new(HashMap::new()),
            tree: Mutex::new(HashMap::new()),
            disconnect_callback: Mutex::new(None),
            fail_connect: AtomicBool::new(false),
            fail_create_group: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            call_delay_ms: AtomicU64::new(0),
            connect_count: AtomicU64::new(0),
            disconnect_count: AtomicU64::new(0),
            read_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
            add_count: AtomicU64::new(0),
            released_groups: AtomicU64::new(0),
            write_history: Mutex::new(Vec::new()),
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Sets the value served for `item`.
    pub fn set_value(&self, item: impl Into<String>, value: Variant) {
        self.values.lock().insert(item.into(), value);
    }

    /// Returns the stored value of `item`.
    pub fn value(&self, item: &str) -> Option<Variant> {
        self.values.lock().get(item).cloned()
    }

    /// Sets the children of a browse position.
    pub fn set_children(&self, position: impl Into<String>, children: &[&str]) {
        self.tree
            .lock()
            .insert(position.into(), children.iter().map(|c| c.to_string()).collect());
    }

    /// Makes the next connects fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Makes group creation fail.
    pub fn set_fail_create_group(&self, fail: bool) {
        self.fail_create_group.store(fail, Ordering::SeqCst);
    }

    /// Makes writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes `connect` and `read` block for `delay` before answering.
    pub fn set_call_delay(&self, delay: Duration) {
        self.call_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn simulate_latency(&self) {
        let delay = self.call_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
    }

    // =========================================================================
    // Callback Simulation
    // =========================================================================

    /// Invokes the data-change callback of `group` as the protocol engine
    /// would. Returns `false` if none is installed.
    pub fn fire_data_change(&self, group: &str, item: &str, state: &ItemState, result: HResult) -> bool {
        let target = self
            .groups
            .lock()
            .get(group)
            .and_then(|g| g.callback.map(|cb| (g.handle, cb)));

        match target {
            Some((handle, callback)) => {
                callback(handle, item, state, result);
                true
            }
            None => false,
        }
    }

    /// Invokes the disconnect callback. Returns `false` if none is installed.
    pub fn fire_disconnect(&self, result: HResult) -> bool {
        self.connected.store(false, Ordering::SeqCst);
        let callback = *self.disconnect_callback.lock();
        match callback {
            Some(callback) => {
                callback(self.client, result);
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Returns `true` if `group` has a data-change callback installed.
    pub fn has_data_change_callback(&self, group: &str) -> bool {
        self.groups
            .lock()
            .get(group)
            .map(|g| g.callback.is_some())
            .unwrap_or(false)
    }

    /// Returns `true` if a disconnect callback is installed.
    pub fn has_disconnect_callback(&self) -> bool {
        self.disconnect_callback.lock().is_some()
    }

    /// Returns the items added to `group`.
    pub fn items(&self, group: &str) -> Vec<String> {
        self.groups
            .lock()
            .get(group)
            .map(|g| g.items.clone())
            .unwrap_or_default()
    }

    /// Returns the number of live groups.
    pub fn group_count(&self) -> usize {
        self.groups.lock().len()
    }

    /// Get connect count.
    pub fn connect_count(&self) -> u64 {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// Get disconnect count.
    pub fn disconnect_count(&self) -> u64 {
        self.disconnect_count.load(Ordering::SeqCst)
    }

    /// Get read count.
    pub fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::SeqCst)
    }

    /// Get write count.
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::SeqCst)
    }

    /// Get add-item count.
    pub fn add_count(&self) -> u64 {
        self.add_count.load(Ordering::SeqCst)
    }

    /// Get released group count.
    pub fn released_groups(&self) -> u64 {
        self.released_groups.load(Ordering::SeqCst)
    }

    /// Get write history.
    pub fn write_history(&self) -> Vec<(String, Variant)> {
        self.write_history.lock().clone()
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SimulatedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedProvider")
            .field("client", &self.client)
            .field("connected", &self.is_connected())
            .field("groups", &self.group_count())
            .finish()
    }
}

impl DaProvider for SimulatedProvider {
    fn client_handle(&self) -> ClientHandle {
        self.client
    }

    fn connect(&self, _host: &str, _prog_id: &str) -> ProviderResult<()> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency();
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(HResult::RPC_S_SERVER_UNAVAILABLE);
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.disconnect_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn create_group(&self, name: &str, _update_rate_ms: u32, _deadband: f32) -> ProviderResult<GroupHandle> {
        if self.fail_create_group.load(Ordering::SeqCst) {
            return Err(HResult::E_FAIL);
        }

        let mut groups = self.groups.lock();
        if groups.contains_key(name) {
            return Err(HResult::OPC_E_DUPLICATENAME);
        }

        let handle = GroupHandle::new(next_handle());
        groups.insert(
            name.to_string(),
            GroupRecord {
                handle,
                items: Vec::new(),
                callback: None,
            },
        );
        Ok(handle)
    }

    fn group(&self, name: &str) -> Option<GroupHandle> {
        self.groups.lock().get(name).map(|g| g.handle)
    }

    fn add_item(&self, group: GroupHandle, item: &str) -> ProviderResult<()> {
        let mut groups = self.groups.lock();
        let record = groups
            .values_mut()
            .find(|g| g.handle == group)
            .ok_or(HResult::OPC_E_INVALIDHANDLE)?;

        if item.starts_with('!') {
            return Err(HResult::OPC_E_INVALIDITEMID);
        }

        self.add_count.fetch_add(1, Ordering::SeqCst);
        record.items.push(item.to_string());
        Ok(())
    }

    fn set_data_change_callback(
        &self,
        group: GroupHandle,
        callback: Option<DataChangeCallback>,
    ) -> ProviderResult<()> {
        let mut groups = self.groups.lock();
        let record = groups
            .values_mut()
            .find(|g| g.handle == group)
            .ok_or(HResult::OPC_E_INVALIDHANDLE)?;
        record.callback = callback;
        Ok(())
    }

    fn read(&self, item: &str) -> ProviderResult<ItemState> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency();
        self.values
            .lock()
            .get(item)
            .cloned()
            .map(ItemState::good)
            .ok_or(HResult::OPC_E_UNKNOWNITEMID)
    }

    fn write(&self, item: &str, value: &Variant) -> ProviderResult<()> {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(HResult::OPC_E_BADRIGHTS);
        }
        self.values.lock().insert(item.to_string(), value.clone());
        self.write_history.lock().push((item.to_string(), value.clone()));
        Ok(())
    }

    fn browse(&self, position: &str) -> ProviderResult<Vec<String>> {
        self.tree
            .lock()
            .get(position)
            .cloned()
            .ok_or(HResult::E_INVALIDARG)
    }

    fn set_disconnect_callback(&self, callback: Option<DisconnectCallback>) {
        *self.disconnect_callback.lock() = callback;
    }

    fn release_group(&self, group: GroupHandle) {
        let mut groups = self.groups.lock();
        let before = groups.len();
        groups.retain(|_, g| g.handle != group);
        if groups.len() < before {
            self.released_groups.fetch_add(1, Ordering::SeqCst);
        }
    }
}
