// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session tuning and group declarations.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};
use crate::event::{EventKind, EventKinds, CONNECTION_TARGET};

/// Default channel queue depth.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10;

/// Default number of provider calls allowed in flight.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 4;

/// Largest accepted deadband, in percent.
pub const MAX_DEADBAND: f32 = 100.0;

// =============================================================================
// SessionConfig
// =============================================================================

/// Per-session tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Pending events a channel holds before provider threads block.
    pub channel_capacity: usize,

    /// Provider calls allowed in flight at once.
    pub max_concurrent_tasks: usize,

    /// Kinds used when `subscribe` is called with an empty set.
    pub default_kinds: EventKinds,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            default_kinds: EventKinds::only(EventKind::DataChange),
        }
    }
}

impl SessionConfig {
    /// Creates a builder.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.channel_capacity == 0 {
            return Err(BridgeError::internal("channel capacity must be at least 1"));
        }
        if self.max_concurrent_tasks == 0 {
            return Err(BridgeError::validation(
                "max_concurrent_tasks",
                "must be at least 1",
            ));
        }
        if self.default_kinds.is_empty() {
            return Err(BridgeError::validation("default_kinds", "must not be empty"));
        }
        Ok(())
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Sets the channel capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Sets the concurrent task limit.
    pub fn with_max_concurrent_tasks(mut self, limit: usize) -> Self {
        self.config.max_concurrent_tasks = limit;
        self
    }

    /// Sets the default subscription kinds.
    pub fn with_default_kinds(mut self, kinds: EventKinds) -> Self {
        self.config.default_kinds = kinds;
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> BridgeResult<SessionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// GroupSpec
// =============================================================================

/// A monitoring group to create, with the items to add to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    /// Group name.
    pub name: String,

    /// Update rate in milliseconds.
    #[serde(default = "default_update_rate")]
    pub update_rate_ms: u32,

    /// Percent deadband.
    #[serde(default)]
    pub deadband: f32,

    /// Item identifiers.
    #[serde(default)]
    pub items: Vec<String>,
}

fn default_update_rate() -> u32 {
    1000
}

impl GroupSpec {
    /// Creates a group spec with default rate and no deadband.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            update_rate_ms: default_update_rate(),
            deadband: 0.0,
            items: Vec::new(),
        }
    }

    /// Sets the update rate.
    pub fn with_update_rate(mut self, rate_ms: u32) -> Self {
        self.update_rate_ms = rate_ms;
        self
    }

    /// Sets the deadband.
    pub fn with_deadband(mut self, deadband: f32) -> Self {
        self.deadband = deadband;
        self
    }

    /// Adds an item.
    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.items.push(item.into());
        self
    }

    /// Validates name, rate and deadband.
    pub fn validate(&self) -> BridgeResult<()> {
        validate_group_name(&self.name)?;
        validate_group_parameters(&self.name, self.update_rate_ms, self.deadband)
    }
}

/// Checks a group name: non-empty and not the reserved connection key.
pub fn validate_group_name(name: &str) -> BridgeResult<()> {
    if name.trim().is_empty() {
        return Err(BridgeError::validation("name", "group name must not be empty"));
    }
    if name == CONNECTION_TARGET {
        return Err(BridgeError::validation(
            "name",
            "'connection' is reserved and cannot name a group",
        ));
    }
    Ok(())
}

/// Checks rate and deadband against the provider-accepted ranges.
pub fn validate_group_parameters(name: &str, rate_ms: u32, deadband: f32) -> BridgeResult<()> {
    if rate_ms == 0 {
        return Err(BridgeError::creation(name, "update rate must be above 0 ms"));
    }
    if !deadband.is_finite() || !(0.0..=MAX_DEADBAND).contains(&deadband) {
        return Err(BridgeError::creation(
            name,
            format!("deadband {} is outside 0..=100 percent", deadband),
        ));
    }
    Ok(())
}
