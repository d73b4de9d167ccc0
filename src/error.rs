//! Error types for the remote session driver.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use cros_session_driver::{Result, Error};
//!
//! async fn example(session: &mut RemoteSession) -> Result<()> {
//!     session.start().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Setup | [`Error::Setup`] |
//! | Login | [`Error::Login`] |
//! | Bounded waits | [`Error::Timeout`] |
//! | Transient interaction | [`Error::TabCrashed`], [`Error::ConnectionGone`], [`Error::NoSuchTab`] |
//! | Channel | [`Error::Device`], [`Error::Script`] |
//! | External | [`Error::Io`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Setup Errors
    // ========================================================================
    /// Session setup precondition failure.
    ///
    /// Returned when the browser process cannot be located, the version
    /// query is empty, the UI service fails to restart in time, or the
    /// device hardware id is missing on a branch that requires it.
    #[error("Setup error: {message}")]
    Setup {
        /// Description of the setup failure.
        message: String,
    },

    // ========================================================================
    // Login Errors
    // ========================================================================
    /// Onboarding/login-flow failure.
    ///
    /// Carries the last observed sign-in UI state where one was read.
    #[error("Login error: {message}")]
    Login {
        /// Description of the login failure.
        message: String,
        /// Last sign-in UI state observed before failing, if any.
        last_state: Option<i64>,
    },

    // ========================================================================
    // Bounded-Wait Errors
    // ========================================================================
    /// Bounded wait expired.
    ///
    /// Produced by the poll utility when a predicate does not hold within
    /// its deadline.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Transient Interaction Errors
    // ========================================================================
    /// The tab backing a JavaScript evaluation crashed.
    ///
    /// Tolerated at call sites where the interaction itself restarts the
    /// browser (guest login), retried in the new-tab loop elsewhere.
    #[error("Tab crashed")]
    TabCrashed,

    /// The browser connection dropped mid-interaction.
    #[error("Browser connection gone")]
    ConnectionGone,

    /// A tab index no longer resolves to a tab.
    ///
    /// The tab list can be re-enumerated under us while the browser
    /// respawns windows.
    #[error("No tab at index {index}")]
    NoSuchTab {
        /// The index that failed to resolve.
        index: usize,
    },

    // ========================================================================
    // Channel Errors
    // ========================================================================
    /// Remote command channel failure.
    ///
    /// Returned when a device command cannot be executed or a file
    /// transfer fails.
    #[error("Device error: {message}")]
    Device {
        /// Description of the channel failure.
        message: String,
    },

    /// JavaScript evaluation failure that is not a crash or disconnect.
    #[error("Script error: {message}")]
    Script {
        /// Error message from the evaluation channel.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a setup error.
    #[inline]
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
        }
    }

    /// Creates a login error with no observed sign-in state.
    #[inline]
    pub fn login(message: impl Into<String>) -> Self {
        Self::Login {
            message: message.into(),
            last_state: None,
        }
    }

    /// Creates a login error carrying the last observed sign-in state.
    #[inline]
    pub fn login_with_state(message: impl Into<String>, last_state: i64) -> Self {
        Self::Login {
            message: message.into(),
            last_state: Some(last_state),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a missing-tab error.
    #[inline]
    pub fn no_such_tab(index: usize) -> Self {
        Self::NoSuchTab { index }
    }

    /// Creates a device channel error.
    #[inline]
    pub fn device(message: impl Into<String>) -> Self {
        Self::Device {
            message: message.into(),
        }
    }

    /// Creates a script error.
    #[inline]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a bounded-wait timeout.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if this is a transient interaction failure.
    ///
    /// Transient failures (tab crash, connection loss, stale tab index)
    /// may succeed on retry; the new-tab loop retries them a bounded
    /// number of times.
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TabCrashed | Self::ConnectionGone | Self::NoSuchTab { .. }
        )
    }

    /// Returns `true` if this is a login-flow failure.
    #[inline]
    #[must_use]
    pub fn is_login_error(&self) -> bool {
        matches!(self, Self::Login { .. })
    }

    /// Returns the last observed sign-in state, if this error carries one.
    #[inline]
    #[must_use]
    pub fn last_signin_state(&self) -> Option<i64> {
        match self {
            Self::Login { last_state, .. } => *last_state,
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
