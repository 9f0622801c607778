// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bridge error taxonomy.
//!
//! # Error Categories
//!
//! ```text
//! BridgeError
//! ├── Validation           - Malformed arguments, rejected synchronously
//! ├── NotFound             - Unknown group
//! ├── Creation             - Group could not be created
//! ├── Add                  - Item could not be added to a group
//! ├── Read                 - Provider read failed
//! ├── Write                - Value not writable or provider write failed
//! ├── Browse               - Provider browse failed
//! ├── ConnectionLost       - Provider connection gone
//! └── InternalRegistration - Channel or handle registration failed
//! ```
//!
//! Structural errors are returned synchronously from the operation that
//! detected them. Provider failures on asynchronous operations resolve the
//! pending task with the matching variant.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

use crate::types::HResult;

// =============================================================================
// BridgeError
// =============================================================================

/// The error type of every bridge operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// An argument is malformed or out of range.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// Offending argument.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A named entity does not exist.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Entity kind (for example `Group`).
        kind: &'static str,
        /// Requested name.
        name: String,
    },

    /// A group could not be created.
    #[error("Failed to create group '{group}': {reason}")]
    Creation {
        /// Group name.
        group: String,
        /// Failure reason.
        reason: String,
        /// Provider result code, if the provider refused.
        code: Option<HResult>,
    },

    /// An item could not be added.
    #[error("Failed to add item '{item}' to group '{group}': {reason}")]
    Add {
        /// Group name.
        group: String,
        /// Item identifier.
        item: String,
        /// Failure reason.
        reason: String,
        /// Provider result code.
        code: Option<HResult>,
    },

    /// A read failed.
    #[error("Failed to read '{item}': {reason}")]
    Read {
        /// Item identifier.
        item: String,
        /// Failure reason.
        reason: String,
        /// Provider result code.
        code: Option<HResult>,
    },

    /// A write failed or the value cannot be written.
    #[error("Failed to write '{item}': {reason}")]
    Write {
        /// Item identifier.
        item: String,
        /// Failure reason.
        reason: String,
        /// Provider result code, `None` when rejected before the provider.
        code: Option<HResult>,
    },

    /// A browse failed.
    #[error("Failed to browse '{position}': {reason}")]
    Browse {
        /// Browse position (empty for the root).
        position: String,
        /// Failure reason.
        reason: String,
        /// Provider result code.
        code: Option<HResult>,
    },

    /// The provider connection is gone.
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// Failure reason.
        reason: String,
        /// Provider result code.
        code: Option<HResult>,
    },

    /// A channel, handle or task could not be registered.
    #[error("Internal registration failed: {message}")]
    InternalRegistration {
        /// What failed.
        message: String,
    },
}

impl BridgeError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a group-not-found error.
    pub fn group_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Group",
            name: name.into(),
        }
    }

    /// Creates a group creation error.
    pub fn creation(group: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Creation {
            group: group.into(),
            reason: reason.into(),
            code: None,
        }
    }

    /// Creates a group creation error from a provider refusal.
    pub fn creation_refused(group: impl Into<String>, code: HResult) -> Self {
        Self::Creation {
            group: group.into(),
            reason: code.describe(),
            code: Some(code),
        }
    }

    /// Creates an add-item error from a provider refusal.
    pub fn add_refused(group: impl Into<String>, item: impl Into<String>, code: HResult) -> Self {
        Self::Add {
            group: group.into(),
            item: item.into(),
            reason: code.describe(),
            code: Some(code),
        }
    }

    /// Creates a read error from a provider failure.
    pub fn read_failed(item: impl Into<String>, code: HResult) -> Self {
        Self::Read {
            item: item.into(),
            reason: code.describe(),
            code: Some(code),
        }
    }

    /// Creates a write error raised before the provider is called.
    pub fn write_rejected(item: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Write {
            item: item.into(),
            reason: reason.into(),
            code: None,
        }
    }

    /// Creates a write error from a provider failure.
    pub fn write_failed(item: impl Into<String>, code: HResult) -> Self {
        Self::Write {
            item: item.into(),
            reason: code.describe(),
            code: Some(code),
        }
    }

    /// Creates a browse error from a provider failure.
    pub fn browse_failed(position: impl Into<String>, code: HResult) -> Self {
        Self::Browse {
            position: position.into(),
            reason: code.describe(),
            code: Some(code),
        }
    }

    /// Creates a connection lost error.
    pub fn connection_lost(reason: impl Into<String>, code: Option<HResult>) -> Self {
        Self::ConnectionLost {
            reason: reason.into(),
            code,
        }
    }

    /// Creates an internal registration error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalRegistration {
            message: message.into(),
        }
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns the provider result code, if any.
    pub fn provider_code(&self) -> Option<HResult> {
        match self {
            Self::Creation { code, .. }
            | Self::Add { code, .. }
            | Self::Read { code, .. }
            | Self::Write { code, .. }
            | Self::Browse { code, .. }
            | Self::ConnectionLost { code, .. } => *code,
            _ => None,
        }
    }

    /// Returns `true` if retrying the same call may succeed.
    ///
    /// Only provider-side failures on I/O operations are retryable; bad
    /// arguments and unknown names are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Read { code, .. } | Self::Write { code, .. } | Self::Browse { code, .. } => {
                code.is_some_and(|c| {
                    c != HResult::OPC_E_UNKNOWNITEMID
                        && c != HResult::OPC_E_INVALIDITEMID
                        && c != HResult::OPC_E_BADRIGHTS
                        && c != HResult::OPC_E_BADTYPE
                })
            }
            Self::ConnectionLost { .. } => true,
            _ => false,
        }
    }

    /// Returns the suggested retry delay, `None` if not retryable.
    pub fn suggested_retry_delay(&self) -> Option<Duration> {
        if !self.is_retryable() {
            return None;
        }

        match self {
            Self::ConnectionLost { .. } => Some(Duration::from_secs(5)),
            _ => Some(Duration::from_millis(500)),
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Validation { .. } | Self::NotFound { .. } => ErrorSeverity::Info,
            Self::Read { .. } | Self::Write { .. } | Self::Browse { .. } | Self::Add { .. } => {
                ErrorSeverity::Warning
            }
            Self::Creation { .. } | Self::ConnectionLost { .. } => ErrorSeverity::Error,
            Self::InternalRegistration { .. } => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Creation { .. } => "creation",
            Self::Add { .. } => "add",
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
            Self::Browse { .. } => "browse",
            Self::ConnectionLost { .. } => "connection_lost",
            Self::InternalRegistration { .. } => "internal_registration",
        }
    }

    /// Returns a structured error code.
    pub fn error_code(&self) -> ErrorCode {
        let provider = u8::from(self.provider_code().is_some());
        match self {
            Self::Validation { .. } => ErrorCode::new(1, 1),
            Self::NotFound { .. } => ErrorCode::new(2, 1),
            Self::Creation { .. } => ErrorCode::new(3, 1 + provider),
            Self::Add { .. } => ErrorCode::new(4, 1 + provider),
            Self::Read { .. } => ErrorCode::new(5, 1 + provider),
            Self::Write { .. } => ErrorCode::new(6, 1 + provider),
            Self::Browse { .. } => ErrorCode::new(7, 1 + provider),
            Self::ConnectionLost { .. } => ErrorCode::new(8, 1 + provider),
            Self::InternalRegistration { .. } => ErrorCode::new(9, 1),
        }
    }

    /// Returns recovery hints for this error.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Validation { .. } => vec!["Check the argument against the documented range"],
            Self::NotFound { .. } => vec!["Create the group before adding items or subscribing"],
            Self::Creation { .. } => vec![
                "Use a group name that is not already in use",
                "Use an update rate above zero and a deadband between 0 and 100",
            ],
            Self::Add { .. } | Self::Read { .. } | Self::Write { .. } => vec![
                "Verify the item ID exists on the server",
                "Check the item's access rights",
            ],
            Self::Browse { .. } => vec!["Verify the browse position exists on the server"],
            Self::ConnectionLost { .. } => vec![
                "Check that the OPC server is running",
                "Reconnect and re-create groups",
            ],
            Self::InternalRegistration { .. } => vec!["Check the session configuration"],
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - caller mistake, no server action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code.
///
/// Format: `DA-XXYY` where XX is the category and YY the specific error.
/// YY is `01` for bridge-side failures and `02` when the provider supplied a
/// result code.
///
/// Categories:
/// - 1: Validation
/// - 2: NotFound
/// - 3: Creation
/// - 4: Add
/// - 5: Read
/// - 6: Write
/// - 7: Browse
/// - 8: ConnectionLost
/// - 9: InternalRegistration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category (1-9).
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the full error code as a u16.
    pub fn as_u16(&self) -> u16 {
        (u16::from(self.category) << 8) | u16::from(self.code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DA-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A Result type with BridgeError.
pub type BridgeResult<T> = Result<T, BridgeError>;

// =============================================================================
// Tests
// =============================================================================
