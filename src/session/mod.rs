//! Remote browser session orchestration.
//!
//! This module contains the session state machine and its collaborators:
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RemoteSession`] | Controller sequencing startup, login, teardown |
//! | [`SessionBuilder`] | Fluent configuration builder |
//! | [`SessionOptions`] | Login mode, credentials, extensions, profile |
//! | [`LoginNavigator`] | Guest and named-user onboarding navigation |
//! | [`ExtensionProvisioner`] | Copies extensions onto the device |
//! | [`VersionBranch`] / [`Capabilities`] | Branch-gated behavior table |
//! | [`Devtools`] | Consumed browser-side control channel |
//! | [`WaitTuning`] | Per-wait timing policies |
//!
//! # Example
//!
//! ```no_run
//! use cros_session_driver::{RemoteSession, SessionOptions};
//! # use std::sync::Arc;
//! # async fn example(
//! #     device: Arc<dyn cros_session_driver::device::DeviceChannel>,
//! #     devtools: Arc<dyn cros_session_driver::session::Devtools>,
//! # ) -> cros_session_driver::Result<()> {
//! let mut session = RemoteSession::builder()
//!     .device(device)
//!     .devtools(devtools)
//!     .options(SessionOptions::guest())
//!     .build()?;
//!
//! session.start().await?;
//! session.close().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Version-branch capability table.
pub mod capabilities;

/// Session controller and state machine.
pub mod core;

/// Consumed browser-side control channel.
pub mod devtools;

/// Extension provisioning onto the device.
pub mod extensions;

/// Startup flags and transport escaping.
pub mod flags;

/// Guest and named-user login navigation.
pub mod login;

/// Session configuration options.
pub mod options;

/// Browser process discovery.
pub mod process;

/// Per-wait timing policies.
pub mod tuning;

// ============================================================================
// Re-exports
// ============================================================================

pub use capabilities::{Capabilities, VersionBranch};
pub use core::{PROFILE_DIRECTORY, Phase, RemoteSession, SessionBuilder};
pub use devtools::{Devtools, SigninState};
pub use extensions::{ExtensionProvisioner, ExtensionRecord, SERVICE_ACCOUNT};
pub use login::LoginNavigator;
pub use options::{LoginMode, SessionOptions};
pub use process::BrowserProcess;
pub use tuning::WaitTuning;
