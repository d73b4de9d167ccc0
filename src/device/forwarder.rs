//! TCP tunnel management for the remote debugging port.
//!
//! When the controller does not run on the same host as the browser, the
//! remote debugging port has to be reachable locally. A [`Forwarder`]
//! owns one local↔remote tunnel for the lifetime of a session; the stock
//! [`SshForwarderFactory`] implements it with an `ssh -N -L` child
//! process that is killed on close and on drop.
//!
//! # Example
//!
//! ```no_run
//! use cros_session_driver::device::{ForwarderFactory, PortPair, SshForwarderFactory};
//!
//! # async fn example() -> cros_session_driver::Result<()> {
//! let factory = SshForwarderFactory::new("198.51.100.4", 22, "root");
//! let mut tunnel = factory.open(PortPair::new(9222, 9222)).await?;
//! // ... drive the browser through 127.0.0.1:9222 ...
//! tunnel.close().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::{Error, Result};

// ============================================================================
// PortPair
// ============================================================================

/// A local↔remote port mapping for one tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortPair {
    /// Port on the controller host.
    pub local: u16,

    /// Port on the device.
    pub remote: u16,
}

impl PortPair {
    /// Creates a port pair.
    #[inline]
    #[must_use]
    pub const fn new(local: u16, remote: u16) -> Self {
        Self { local, remote }
    }
}

// ============================================================================
// Port Allocation
// ============================================================================

/// Picks an unused local port by binding `127.0.0.1:0` and reading back
/// the assigned port.
///
/// # Errors
///
/// Returns [`Error::Io`] if binding fails.
pub fn pick_unused_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    let port = listener.local_addr()?.port();
    debug!(port, "Reserved local port for tunnel");
    Ok(port)
}

// ============================================================================
// Forwarder
// ============================================================================

/// A live local↔remote TCP tunnel.
///
/// At most one forwarder is live per session; the session controller owns
/// it exclusively and closes it during teardown.
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// The port pair this tunnel serves.
    fn port_pair(&self) -> PortPair;

    /// Tears the tunnel down. Safe to call more than once.
    async fn close(&mut self);
}

/// Opens tunnels to the device.
///
/// The controller creates its factory once and reuses it for the
/// session's lifetime.
#[async_trait]
pub trait ForwarderFactory: Send + Sync {
    /// Establishes a tunnel for `pair`.
    async fn open(&self, pair: PortPair) -> Result<Box<dyn Forwarder>>;
}

// ============================================================================
// TunnelGuard
// ============================================================================

/// Guards the ssh child process and ensures it is killed when dropped.
struct TunnelGuard {
    /// The child process handle.
    child: Option<Child>,
    /// Process ID for logging.
    pid: u32,
}

impl TunnelGuard {
    /// Creates a new tunnel guard.
    fn new(child: Child) -> Self {
        let pid = child.id().unwrap_or(0);
        debug!(pid, "Tunnel guard created");
        Self {
            child: Some(child),
            pid,
        }
    }

    /// Kills the process and waits for it to exit.
    async fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            debug!(pid = self.pid, "Killing tunnel process");
            if let Err(e) = child.kill().await {
                debug!(pid = self.pid, error = %e, "Failed to kill tunnel process");
            }
            if let Err(e) = child.wait().await {
                debug!(pid = self.pid, error = %e, "Failed to wait for tunnel process");
            }
            info!(pid = self.pid, "Tunnel process terminated");
        }
    }
}

impl Drop for TunnelGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take()
            && let Err(e) = child.start_kill()
        {
            debug!(pid = self.pid, error = %e, "Failed to send kill signal in Drop");
        }
    }
}

// ============================================================================
// SshForwarderFactory
// ============================================================================

/// Opens tunnels by spawning `ssh -N -L` against the device.
#[derive(Debug, Clone)]
pub struct SshForwarderFactory {
    /// Device hostname or address.
    host: String,
    /// Device ssh port.
    ssh_port: u16,
    /// Login user on the device.
    user: String,
    /// Optional identity file.
    identity: Option<PathBuf>,
}

impl SshForwarderFactory {
    /// Creates a factory for the given device endpoint.
    #[inline]
    #[must_use]
    pub fn new(host: impl Into<String>, ssh_port: u16, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ssh_port,
            user: user.into(),
            identity: None,
        }
    }

    /// Uses an identity file for authentication.
    #[inline]
    #[must_use]
    pub fn with_identity(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity = Some(path.into());
        self
    }

    /// Builds the ssh argument list for `pair`.
    fn ssh_args(&self, pair: PortPair) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-p".to_string(),
            self.ssh_port.to_string(),
        ];

        if let Some(identity) = &self.identity {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }

        args.push("-N".to_string());
        args.push("-L".to_string());
        args.push(format!("{}:127.0.0.1:{}", pair.local, pair.remote));
        args.push(format!("{}@{}", self.user, self.host));
        args
    }
}

#[async_trait]
impl ForwarderFactory for SshForwarderFactory {
    async fn open(&self, pair: PortPair) -> Result<Box<dyn Forwarder>> {
        let args = self.ssh_args(pair);
        debug!(
            host = %self.host,
            local = pair.local,
            remote = pair.remote,
            "Opening ssh tunnel"
        );

        let child = Command::new("ssh")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::device(format!("failed to spawn ssh tunnel: {e}")))?;

        info!(host = %self.host, local = pair.local, remote = pair.remote, "Tunnel open");

        Ok(Box::new(SshForwarder {
            guard: TunnelGuard::new(child),
            pair,
        }))
    }
}

// ============================================================================
// SshForwarder
// ============================================================================

/// A tunnel backed by a live ssh child process.
pub struct SshForwarder {
    /// Guarded child process.
    guard: TunnelGuard,
    /// Forwarded port pair.
    pair: PortPair,
}

#[async_trait]
impl Forwarder for SshForwarder {
    #[inline]
    fn port_pair(&self) -> PortPair {
        self.pair
    }

    async fn close(&mut self) {
        self.guard.kill().await;
    }
}

// ============================================================================
// Tests
// ============================================================================
