// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Provider callback router.
//!
//! The provider calls [`on_data_change`] and [`on_disconnect`] on its own
//! threads with nothing but a handle. Both resolve the owning session
//! through a process-wide map of live handles holding weak references, so a
//! callback racing a session teardown finds either nothing or a session that
//! is already marked torn down.
//!
//! Lock order: a session mutex may be held while the live-handle lock is
//! taken, never the reverse. Callbacks take the live-handle lock alone,
//! release it, and only then take the session mutex.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use opcda_core::{BridgeError, BridgeResult, ClientHandle, GroupHandle, HResult, ItemState, TargetKey};
use parking_lot::Mutex;

use crate::session::SessionShared;

/// A provider handle that routes to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiveHandle {
    /// Connection handle; routes disconnect callbacks.
    Client(ClientHandle),
    /// Group handle; routes data-change callbacks.
    Group(GroupHandle),
}

impl fmt::Display for LiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client(h) => write!(f, "{}", h),
            Self::Group(h) => write!(f, "{}", h),
        }
    }
}

struct LiveEntry {
    session: Weak<SessionShared>,
    target: TargetKey,
}

static LIVE_HANDLES: Lazy<Mutex<HashMap<LiveHandle, LiveEntry>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

// =============================================================================
// Registration
// =============================================================================

/// Registers `handle` as routing to `session`.
///
/// An entry left behind by a dropped session is replaced. A handle owned by
/// a live session is a collision.
pub(crate) fn register(
    handle: LiveHandle,
    session: &Arc<SessionShared>,
    target: TargetKey,
) -> BridgeResult<()> {
    let mut live = LIVE_HANDLES.lock();

    if let Some(existing) = live.get(&handle) {
        if existing.session.strong_count() > 0 {
            return Err(BridgeError::internal(format!(
                "provider handle {} is already routed to another session",
                handle
            )));
        }
    }

    live.insert(
        handle,
        LiveEntry {
            session: Arc::downgrade(session),
            target,
        },
    );
    Ok(())
}

/// Removes every handle routed to `session`; returns how many were removed.
pub(crate) fn unregister_session(session: &Arc<SessionShared>) -> usize {
    let target = Arc::as_ptr(session);
    let mut live = LIVE_HANDLES.lock();
    let before = live.len();
    live.retain(|_, entry| !std::ptr::eq(entry.session.as_ptr(), target));
    before - live.len()
}

fn resolve(handle: LiveHandle) -> Option<(Arc<SessionShared>, TargetKey)> {
    let (session, target) = {
        let live = LIVE_HANDLES.lock();
        let entry = live.get(&handle)?;
        (entry.session.clone(), entry.target.clone())
    };
    session.upgrade().map(|s| (s, target))
}

/// Returns `true` if `handle` currently routes to a live session.
pub fn is_live(handle: LiveHandle) -> bool {
    resolve(handle).is_some()
}

// =============================================================================
// Entry Points
// =============================================================================

/// Data-change entry point installed on provider groups.
pub fn on_data_change(group: GroupHandle, item: &str, state: &ItemState, result: HResult) {
    match resolve(LiveHandle::Group(group)) {
        Some((session, target)) => session.route_data_change(&target, item, state, result),
        None => tracing::warn!(%group, item, "Data change for unknown or released group ignored"),
    }
}

/// Disconnect entry point installed on the provider connection.
pub fn on_disconnect(client: ClientHandle, result: HResult) {
    match resolve(LiveHandle::Client(client)) {
        Some((session, _)) => session.route_disconnect(result),
        None => tracing::warn!(%client, code = %result, "Disconnect for unknown or released client ignored"),
    }
}
