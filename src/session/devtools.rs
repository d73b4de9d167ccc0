//! Browser-side control channel.
//!
//! The generic devtools lifecycle (attaching to the debugging port,
//! enumerating targets, driving pages) lives outside this crate; the
//! session controller consumes it through the [`Devtools`] trait. The
//! two JavaScript entry points run against the onboarding surface and
//! may fail with a tab crash or a dropped connection. Specific call
//! sites tolerate those; everything else propagates them.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

// ============================================================================
// SigninState
// ============================================================================

/// Sign-in sub-screen currently shown by the onboarding UI.
///
/// The onboarding surface exposes this as an integer on its login
/// header element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i64)]
pub enum SigninState {
    /// No sign-in surface visible.
    Hidden = 0,
    /// Primary sign-in form.
    GaiaSignin = 1,
    /// Account picker, where the guest button lives.
    AccountPicker = 2,
    /// Device blocked on a bad hardware id.
    WrongHwidWarning = 3,
    /// Supervised-user creation flow.
    SupervisedUserCreation = 4,
}

impl SigninState {
    /// Maps a raw state value from the onboarding UI.
    #[must_use]
    pub const fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(Self::Hidden),
            1 => Some(Self::GaiaSignin),
            2 => Some(Self::AccountPicker),
            3 => Some(Self::WrongHwidWarning),
            4 => Some(Self::SupervisedUserCreation),
            _ => None,
        }
    }

    /// Returns `true` when login input is possible from this screen.
    #[inline]
    #[must_use]
    pub const fn accepts_login(self) -> bool {
        matches!(self, Self::GaiaSignin | Self::AccountPicker)
    }
}

// ============================================================================
// Devtools
// ============================================================================

/// Capability surface consumed from the devtools lifecycle.
#[async_trait]
pub trait Devtools: Send + Sync {
    /// Blocks until the browser answers on `debug_port`.
    ///
    /// With `wait_for_extensions` set, additionally waits until every
    /// configured extension has finished loading.
    async fn wait_until_ready(&self, debug_port: u16, wait_for_extensions: bool) -> Result<()>;

    /// Returns whether the onboarding surface currently exists.
    async fn oobe_exists(&self) -> Result<bool>;

    /// Evaluates an expression against the onboarding surface.
    ///
    /// May fail with [`crate::Error::TabCrashed`] or
    /// [`crate::Error::ConnectionGone`].
    async fn evaluate_oobe(&self, expr: &str) -> Result<Value>;

    /// Executes a statement against the onboarding surface.
    ///
    /// Same failure modes as [`Devtools::evaluate_oobe`].
    async fn execute_oobe(&self, stmt: &str) -> Result<()>;

    /// Number of open tabs.
    async fn tab_count(&self) -> Result<usize>;

    /// Opens a new tab.
    async fn open_tab(&self) -> Result<()>;

    /// Navigates the most recently opened tab.
    ///
    /// Fails with [`crate::Error::NoSuchTab`] when the tab list was
    /// re-enumerated under us.
    async fn navigate_last_tab(&self, url: &str) -> Result<()>;

    /// Locates and closes the legacy startup surface.
    ///
    /// Returns `Ok(true)` once found and closed, `Ok(false)` when not
    /// present yet.
    async fn close_startup_surface(&self) -> Result<bool>;
}

// ============================================================================
// Tests
// ============================================================================
