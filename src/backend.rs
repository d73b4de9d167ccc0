//! Minimal browser-backend capability set.
//!
//! Backends that bring a browser under test differ wildly in transport
//! (local process, remote device, emulator), but callers only need the
//! lifecycle surface below. [`crate::RemoteSession`] is the
//! remote-device implementation; others live outside this crate.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// BrowserBackend
// ============================================================================

/// Lifecycle surface shared by all browser backends.
#[async_trait]
pub trait BrowserBackend: Send {
    /// Brings the browser to a known-ready state.
    async fn start(&mut self) -> Result<()>;

    /// Tears the session down. Idempotent; never fails.
    async fn close(&mut self);

    /// Returns whether the browser process is currently running.
    async fn is_running(&self) -> bool;

    /// The command-line arguments the browser is (or would be)
    /// relaunched with.
    fn startup_args(&self) -> Vec<String>;
}
