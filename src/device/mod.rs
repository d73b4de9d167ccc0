//! Remote device access.
//!
//! This module defines the capability surface the session controller
//! consumes from the target device:
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DeviceChannel`] | Command execution, file transfer, process and mount queries |
//! | [`ProcessEntry`] | One row of the device process listing |
//! | [`Forwarder`] | A live local↔remote TCP tunnel |
//! | [`ForwarderFactory`] | Opens tunnels for the debugging port |
//!
//! The concrete transport (an ssh connection, a local shell for
//! co-located runs) is supplied by the embedder; everything in this crate
//! talks to the device exclusively through [`DeviceChannel`].

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// TCP tunnel management for the remote debugging port.
pub mod forwarder;

#[cfg(test)]
pub(crate) mod fake;

// ============================================================================
// Re-exports
// ============================================================================

pub use forwarder::{Forwarder, ForwarderFactory, PortPair, SshForwarderFactory};

// ============================================================================
// ProcessEntry
// ============================================================================

/// One row of the device process listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEntry {
    /// Process id.
    pub pid: u32,

    /// Full command line, binary path first.
    pub cmdline: String,

    /// Parent process id.
    pub ppid: u32,
}

impl ProcessEntry {
    /// Creates a process entry.
    #[inline]
    #[must_use]
    pub fn new(pid: u32, cmdline: impl Into<String>, ppid: u32) -> Self {
        Self {
            pid,
            cmdline: cmdline.into(),
            ppid,
        }
    }
}

// ============================================================================
// DeviceChannel
// ============================================================================

/// Command channel to the target device.
///
/// All methods are best understood as remote syscalls: they execute on the
/// device and report what the device observed. Implementations must be
/// safe to share across the controller, the provisioner, and the login
/// navigator (`Send + Sync`); the controller holds the only long-lived
/// handle and releases it on close.
#[async_trait]
pub trait DeviceChannel: Send + Sync {
    /// Runs a command on the device, returning `(stdout, stderr)`.
    async fn run_cmd(&self, argv: &[&str]) -> Result<(String, String)>;

    /// Copies a local file or directory into `remote_dir`.
    async fn push_file(&self, local: &Path, remote_dir: &str) -> Result<()>;

    /// Re-assigns ownership of `remote_path` to the browser service account.
    async fn chown(&self, remote_path: &str) -> Result<()>;

    /// Recursively removes `remote_path`.
    async fn rm_rf(&self, remote_path: &str) -> Result<()>;

    /// Lists the processes currently running on the device.
    async fn list_processes(&self) -> Result<Vec<ProcessEntry>>;

    /// Returns whether the named init service is running.
    async fn is_service_running(&self, name: &str) -> Result<bool>;

    /// Reserves a port on the device for remote debugging.
    async fn get_remote_port(&self) -> Result<u16>;

    /// Returns the per-user encrypted home directory path for `user`.
    async fn cryptohome_path(&self, user: &str) -> Result<String>;

    /// Returns whether the cryptohome for `user` is mounted.
    async fn is_cryptohome_mounted(&self, user: &str) -> Result<bool>;

    /// Returns the filesystem type mounted at `path`, if any.
    async fn filesystem_mounted_at(&self, path: &str) -> Result<Option<String>>;

    /// Captures a diagnostic screenshot on the device, tagged with `label`.
    async fn take_screenshot(&self, label: &str) -> Result<()>;

    /// Returns `true` when the controller runs on the device itself.
    ///
    /// Co-located sessions skip tunnelling and use the remote debugging
    /// port directly.
    fn is_local(&self) -> bool;
}

// ============================================================================
// Tests
// ============================================================================
