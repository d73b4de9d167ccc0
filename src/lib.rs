//! Remote browser session driver for session-managed devices.
//!
//! This library brings a browser instance on a remote target device to a
//! known-ready, logged-in state and tears it down deterministically
//! afterwards. Over unreliable, asynchronous channels it coordinates
//! process respawn, debugging-port tunnelling, extension provisioning,
//! and a multi-branch login flow, all bounded by explicit timeouts.
//!
//! # Architecture
//!
//! The controller consumes two external channels and owns everything in
//! between:
//!
//! - **Device channel** ([`device::DeviceChannel`]): runs commands,
//!   transfers files, and queries processes/mounts on the target.
//! - **Devtools channel** ([`session::Devtools`]): readiness checks and
//!   JavaScript evaluation against the onboarding surface.
//!
//! [`RemoteSession`] sequences the startup phases strictly forward
//! (version discovery → provisioning → UI restart → relaunch → tunnel →
//! login → ready) and guarantees that [`RemoteSession::close`] runs on
//! every exit path, including failures mid-startup.
//!
//! # Quick Start
//!
//! ```no_run
//! use cros_session_driver::{RemoteSession, Result, SessionOptions};
//! # use std::sync::Arc;
//!
//! # async fn example(
//! #     device: Arc<dyn cros_session_driver::device::DeviceChannel>,
//! #     devtools: Arc<dyn cros_session_driver::session::Devtools>,
//! # ) -> Result<()> {
//! let mut session = RemoteSession::builder()
//!     .device(device)
//!     .devtools(devtools)
//!     .options(SessionOptions::new().with_credentials("test@example.com", "pw"))
//!     .build()?;
//!
//! session.start().await?;
//! // ... drive the browser through the debugging port ...
//! session.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`backend`] | Minimal browser-backend trait |
//! | [`device`] | Device channel trait and port forwarding |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`poll`] | Bounded polling primitives |
//! | [`session`] | Session controller, login navigation, provisioning |

// ============================================================================
// Modules
// ============================================================================

/// Minimal browser-backend capability set.
///
/// [`RemoteSession`] is the remote-device implementation of
/// [`BrowserBackend`].
pub mod backend;

/// Remote device access: command channel and port forwarding.
pub mod device;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Bounded polling primitives.
///
/// Every wait in the session sequence goes through [`poll::wait_for`].
pub mod poll;

/// Session controller, login navigation, and extension provisioning.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

// Backend trait
pub use backend::BrowserBackend;

// Device types
pub use device::{DeviceChannel, Forwarder, ForwarderFactory, PortPair, SshForwarderFactory};

// Error types
pub use error::{Error, Result};

// Polling types
pub use poll::RetryPolicy;

// Session types
pub use session::{
    Capabilities, Devtools, ExtensionProvisioner, ExtensionRecord, LoginMode, LoginNavigator,
    Phase, RemoteSession, SessionBuilder, SessionOptions, SigninState, VersionBranch, WaitTuning,
};
