// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Events delivered to subscribers and the keys they are delivered under.
//!
//! Every event has one [`EventKind`], and subscribers choose which kinds they
//! receive through an [`EventKinds`] set. Events are immutable once built.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Quality, Value};

/// Reserved target key for the connection channel.
pub const CONNECTION_TARGET: &str = "connection";

// =============================================================================
// EventKind
// =============================================================================

/// Kind of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// Initial state of a freshly constructed session.
    Init,
    /// Outcome of a connect request.
    Connect,
    /// Loss of the provider connection or of a data source.
    Disconnect,
    /// Item value change.
    DataChange,
    /// Asynchronous failure without a dedicated kind.
    Error,
}

impl EventKind {
    /// All kinds in declaration order.
    pub const ALL: [EventKind; 5] = [
        EventKind::Init,
        EventKind::Connect,
        EventKind::Disconnect,
        EventKind::DataChange,
        EventKind::Error,
    ];

    /// Returns the wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::DataChange => "dataChange",
            Self::Error => "error",
        }
    }

    #[inline]
    const fn bit(self) -> u8 {
        match self {
            Self::Init => 1 << 0,
            Self::Connect => 1 << 1,
            Self::Disconnect => 1 << 2,
            Self::DataChange => 1 << 3,
            Self::Error => 1 << 4,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Self::Init),
            "connect" => Ok(Self::Connect),
            "disconnect" => Ok(Self::Disconnect),
            "dataChange" | "data_change" => Ok(Self::DataChange),
            "error" => Ok(Self::Error),
            other => Err(format!("Unknown event kind: {}", other)),
        }
    }
}

// =============================================================================
// EventKinds
// =============================================================================

/// A set of event kinds.
///
/// # Examples
///
/// ```
/// use opcda_core::event::{EventKind, EventKinds};
///
/// let kinds = EventKinds::from([EventKind::Connect, EventKind::Disconnect]);
/// assert!(kinds.contains(EventKind::Connect));
/// assert!(!kinds.contains(EventKind::DataChange));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventKinds(u8);

impl EventKinds {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Kinds installed for the connection handler given at construction.
    pub const CONNECTION: Self =
        Self(EventKind::Connect.bit() | EventKind::Disconnect.bit() | EventKind::Error.bit());

    /// Creates an empty set.
    #[inline]
    pub const fn empty() -> Self {
        Self::EMPTY
    }

    /// Creates a set with a single kind.
    #[inline]
    pub const fn only(kind: EventKind) -> Self {
        Self(kind.bit())
    }

    /// Returns `true` if no kind is present.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if `kind` is present.
    #[inline]
    pub const fn contains(&self, kind: EventKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Adds a kind.
    #[inline]
    pub fn insert(&mut self, kind: EventKind) {
        self.0 |= kind.bit();
    }

    /// Returns the union of both sets.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns the kinds of `self` not present in `other`.
    #[inline]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Returns the number of kinds present.
    #[inline]
    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates the kinds present in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = EventKind> + '_ {
        EventKind::ALL.into_iter().filter(|k| self.contains(*k))
    }
}

impl<const N: usize> From<[EventKind; N]> for EventKinds {
    fn from(kinds: [EventKind; N]) -> Self {
        kinds.into_iter().collect()
    }
}

impl FromIterator<EventKind> for EventKinds {
    fn from_iter<I: IntoIterator<Item = EventKind>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

impl fmt::Debug for EventKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for EventKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|k| k.as_str()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

impl Serialize for EventKinds {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for EventKinds {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let kinds = Vec::<EventKind>::deserialize(deserializer)?;
        Ok(kinds.into_iter().collect())
    }
}

// =============================================================================
// TargetKey
// =============================================================================

/// Registry key: the connection or a named group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetKey {
    /// The `"connection"` target.
    Connection,
    /// A monitoring group by name.
    Group(String),
}

impl TargetKey {
    /// Creates a group key.
    pub fn group(name: impl Into<String>) -> Self {
        Self::Group(name.into())
    }

    /// Returns `true` for the connection key.
    #[inline]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection)
    }

    /// Returns the key as it appears on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Connection => CONNECTION_TARGET,
            Self::Group(name) => name,
        }
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err("Target must not be empty".to_string()),
            CONNECTION_TARGET => Ok(Self::Connection),
            name => Ok(Self::Group(name.to_string())),
        }
    }
}

impl From<&str> for TargetKey {
    fn from(s: &str) -> Self {
        if s == CONNECTION_TARGET {
            Self::Connection
        } else {
            Self::Group(s.to_string())
        }
    }
}

// =============================================================================
// Event
// =============================================================================

/// One item update carried by a `dataChange` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdate {
    /// Item identifier.
    pub item: String,
    /// Converted value.
    pub value: Value,
    /// Item quality.
    pub quality: Quality,
    /// Source timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EventPayload {
    /// Session constructed.
    Init {
        /// Connection state at construction.
        connected: bool,
    },
    /// Connect completed.
    Connect {
        /// Whether the provider accepted the connection.
        success: bool,
        /// Failure text when `success` is false.
        error: Option<String>,
    },
    /// Connection or data source lost.
    Disconnect {
        /// Human-readable reason.
        reason: String,
        /// Last update received when raised from a data change.
        item: Option<ItemUpdate>,
    },
    /// Item value changed.
    DataChange(ItemUpdate),
    /// Asynchronous failure.
    Error {
        /// Human-readable reason.
        reason: String,
    },
}

/// An immutable event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event payload.
    pub payload: EventPayload,
    /// When the bridge built the event.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    fn new(payload: EventPayload) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Creates an `init` event.
    pub fn init(connected: bool) -> Self {
        Self::new(EventPayload::Init { connected })
    }

    /// Creates a successful `connect` event.
    pub fn connected() -> Self {
        Self::new(EventPayload::Connect {
            success: true,
            error: None,
        })
    }

    /// Creates a failed `connect` event.
    pub fn connect_failed(error: impl Into<String>) -> Self {
        Self::new(EventPayload::Connect {
            success: false,
            error: Some(error.into()),
        })
    }

    /// Creates a `disconnect` event.
    pub fn disconnect(reason: impl Into<String>) -> Self {
        Self::new(EventPayload::Disconnect {
            reason: reason.into(),
            item: None,
        })
    }

    /// Creates a `disconnect` event raised by an item update.
    pub fn source_lost(reason: impl Into<String>, item: ItemUpdate) -> Self {
        Self::new(EventPayload::Disconnect {
            reason: reason.into(),
            item: Some(item),
        })
    }

    /// Creates a `dataChange` event.
    pub fn data_change(update: ItemUpdate) -> Self {
        Self::new(EventPayload::DataChange(update))
    }

    /// Creates an `error` event.
    pub fn error(reason: impl Into<String>) -> Self {
        Self::new(EventPayload::Error {
            reason: reason.into(),
        })
    }

    /// Returns the event kind.
    pub fn kind(&self) -> EventKind {
        match &self.payload {
            EventPayload::Init { .. } => EventKind::Init,
            EventPayload::Connect { .. } => EventKind::Connect,
            EventPayload::Disconnect { .. } => EventKind::Disconnect,
            EventPayload::DataChange(_) => EventKind::DataChange,
            EventPayload::Error { .. } => EventKind::Error,
        }
    }

    /// Returns the item update, if any.
    pub fn item(&self) -> Option<&ItemUpdate> {
        match &self.payload {
            EventPayload::DataChange(update) => Some(update),
            EventPayload::Disconnect { item, .. } => item.as_ref(),
            _ => None,
        }
    }

    /// Returns the reason text of `disconnect`, `error` and failed `connect`.
    pub fn reason(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Disconnect { reason, .. } | EventPayload::Error { reason } => {
                Some(reason)
            }
            EventPayload::Connect { error, .. } => error.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            EventPayload::Init { connected } => write!(f, "init(connected={})", connected),
            EventPayload::Connect { success, .. } => write!(f, "connect(success={})", success),
            EventPayload::Disconnect { reason, .. } => write!(f, "disconnect({})", reason),
            EventPayload::DataChange(u) => write!(f, "dataChange({}={} [{}])", u.item, u.value, u.quality),
            EventPayload::Error { reason } => write!(f, "error({})", reason),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
