//! Browser process discovery.
//!
//! The browser spawns one process per renderer and pids wrap around once
//! exhausted, so "smallest pid" does not identify the main process. The
//! reliable rule: the main browser process is the direct child of the
//! device's session-manager process whose command line starts with one of
//! the known installation paths.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::device::ProcessEntry;

// ============================================================================
// Constants
// ============================================================================

/// Known browser installation paths.
///
/// Developer workflows run the browser from `/usr/local/...` instead of
/// the default location (debug builds are too large for the root
/// filesystem), so both paths are checked.
pub const BROWSER_PATHS: [&str; 2] = [
    "/opt/google/chrome/chrome ",
    "/usr/local/opt/google/chrome/chrome ",
];

/// Command-line prefix of the session-manager process.
pub const SESSION_MANAGER_PREFIX: &str = "/sbin/session_manager ";

// ============================================================================
// BrowserProcess
// ============================================================================

/// The main browser process as found in the device process listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserProcess {
    /// Process id.
    pub pid: u32,

    /// Installation path the process was launched from.
    pub path: String,

    /// Full command line, flags included.
    pub args: String,
}

// ============================================================================
// Discovery
// ============================================================================

/// Returns the pid of the session-manager process, if present.
#[must_use]
pub fn session_manager_pid(procs: &[ProcessEntry]) -> Option<u32> {
    procs
        .iter()
        .find(|p| p.cmdline.starts_with(SESSION_MANAGER_PREFIX))
        .map(|p| p.pid)
}

/// Locates the main browser process.
///
/// Returns `None` when the session manager is not running or none of its
/// direct children matches a known installation path.
#[must_use]
pub fn find_browser_process(procs: &[ProcessEntry]) -> Option<BrowserProcess> {
    let manager_pid = session_manager_pid(procs)?;

    for entry in procs {
        if entry.ppid != manager_pid {
            continue;
        }
        for path in BROWSER_PATHS {
            if entry.cmdline.starts_with(path) {
                return Some(BrowserProcess {
                    pid: entry.pid,
                    path: path.trim_end().to_string(),
                    args: entry.cmdline.clone(),
                });
            }
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
