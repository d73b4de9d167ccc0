//! Session configuration options.
//!
//! Provides a type-safe interface for configuring a remote browser
//! session: login mode, credentials, extensions to provision, and
//! profile handling.
//!
//! # Example
//!
//! ```
//! use cros_session_driver::session::{LoginMode, SessionOptions};
//!
//! let options = SessionOptions::new()
//!     .with_credentials("test@example.com", "hunter2")
//!     .with_extension("./ext/perf-probe")
//!     .with_arg("--enable-logging");
//!
//! assert_eq!(options.login_mode, LoginMode::NamedUser);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ============================================================================
// LoginMode
// ============================================================================

/// How the session signs in once the browser is up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoginMode {
    /// Ephemeral guest session; no persistent state, no extensions.
    Guest,

    /// Persistent session for the configured username.
    #[default]
    NamedUser,
}

impl LoginMode {
    /// Returns `true` for guest sessions.
    #[inline]
    #[must_use]
    pub const fn is_guest(self) -> bool {
        matches!(self, Self::Guest)
    }
}

// ============================================================================
// SessionOptions
// ============================================================================

/// Remote session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Guest or named-user login.
    pub login_mode: LoginMode,

    /// Account to sign in as (named-user mode).
    pub username: String,

    /// Password for the account (named-user mode).
    pub password: String,

    /// Drive the login flow automatically once the browser is up.
    pub auto_login: bool,

    /// Local extension directories to provision onto the device.
    pub extensions: Vec<PathBuf>,

    /// Local directory of the login helper extension, for branches
    /// without the scripted login API.
    pub login_ext_dir: Option<PathBuf>,

    /// Replacement profile to push over the device profile directory.
    pub profile_dir: Option<PathBuf>,

    /// Wipe the user's existing on-device state before login.
    pub override_profile: bool,

    /// Additional browser command-line arguments.
    pub extra_args: Vec<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            login_mode: LoginMode::NamedUser,
            username: String::new(),
            password: String::new(),
            auto_login: true,
            extensions: Vec::new(),
            login_ext_dir: None,
            profile_dir: None,
            override_profile: true,
            extra_args: Vec::new(),
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl SessionOptions {
    /// Creates options with default settings (named user, auto login).
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options configured for a guest session.
    #[inline]
    #[must_use]
    pub fn guest() -> Self {
        Self {
            login_mode: LoginMode::Guest,
            ..Default::default()
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SessionOptions {
    /// Switches to guest login.
    #[inline]
    #[must_use]
    pub fn with_guest(mut self) -> Self {
        self.login_mode = LoginMode::Guest;
        self
    }

    /// Sets the account credentials and selects named-user login.
    #[inline]
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.login_mode = LoginMode::NamedUser;
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Disables the automatic login flow.
    #[inline]
    #[must_use]
    pub fn with_manual_login(mut self) -> Self {
        self.auto_login = false;
        self
    }

    /// Adds a local extension directory to provision.
    #[inline]
    #[must_use]
    pub fn with_extension(mut self, path: impl Into<PathBuf>) -> Self {
        self.extensions.push(path.into());
        self
    }

    /// Supplies the login helper extension used on branches without the
    /// scripted login API.
    #[inline]
    #[must_use]
    pub fn with_login_extension(mut self, path: impl Into<PathBuf>) -> Self {
        self.login_ext_dir = Some(path.into());
        self
    }

    /// Pushes a replacement profile over the device profile directory.
    #[inline]
    #[must_use]
    pub fn with_profile_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile_dir = Some(path.into());
        self
    }

    /// Keeps the user's existing on-device state.
    #[inline]
    #[must_use]
    pub fn keep_profile(mut self) -> Self {
        self.override_profile = false;
        self
    }

    /// Adds a custom browser command-line argument.
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Adds multiple custom browser command-line arguments.
    #[inline]
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionOptions {
    /// Validates the option combination.
    ///
    /// # Errors
    ///
    /// Returns an error message if named-user auto login is requested
    /// without credentials, or extensions are requested for a guest
    /// session.
    pub fn validate(&self) -> Result<(), String> {
        if self.login_mode.is_guest() && !self.extensions.is_empty() {
            return Err("guest sessions do not support extensions".to_string());
        }
        if self.auto_login && !self.login_mode.is_guest() && self.username.is_empty() {
            return Err("named-user auto login requires a username".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
