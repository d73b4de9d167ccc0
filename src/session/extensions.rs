//! Extension provisioning onto the device.
//!
//! Extensions load from device-local paths, so each local extension
//! directory is copied into a unique remote temp directory before the
//! browser relaunches. The copy is chowned to the browser service
//! account; the browser refuses to load extensions it does not own.
//!
//! Every [`ExtensionRecord`] created here is removed exactly once during
//! teardown, including on early-abort paths; cleanup is idempotent per
//! record.

// ============================================================================
// Imports
// ============================================================================

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::device::DeviceChannel;
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Service account the browser runs under.
pub const SERVICE_ACCOUNT: &str = "chronos";

/// Template handed to `mktemp -d` for extension staging directories.
const EXTENSION_DIR_TEMPLATE: &str = "/tmp/extension_XXXXX";

// ============================================================================
// ExtensionRecord
// ============================================================================

/// A provisioned extension: the local source and its remote staging dir.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRecord {
    /// Local extension directory the copy came from.
    pub local_path: PathBuf,

    /// Unique remote temp directory holding the copy.
    pub remote_dir: String,

    /// Account owning the remote copy.
    pub owning_user: String,

    /// Whether cleanup already removed the remote directory.
    removed: bool,
}

impl ExtensionRecord {
    /// Device path of the extension itself (staging dir + local basename).
    #[must_use]
    pub fn remote_path(&self) -> String {
        match self.local_path.file_name() {
            Some(name) => format!("{}/{}", self.remote_dir, name.to_string_lossy()),
            None => self.remote_dir.clone(),
        }
    }

    /// Returns `true` once the remote directory has been removed.
    #[inline]
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

// ============================================================================
// ExtensionProvisioner
// ============================================================================

/// Copies extensions onto the device and cleans them up afterwards.
pub struct ExtensionProvisioner {
    /// Channel to the device.
    device: Arc<dyn DeviceChannel>,
}

impl ExtensionProvisioner {
    /// Creates a provisioner over `device`.
    #[inline]
    #[must_use]
    pub fn new(device: Arc<dyn DeviceChannel>) -> Self {
        Self { device }
    }

    /// Copies `local_dir` into a fresh remote temp directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Setup`] if the device fails to allocate a temp
    /// directory, or a channel error if the copy or chown fails.
    pub async fn push(&self, local_dir: &Path) -> Result<ExtensionRecord> {
        let (stdout, _) = self
            .device
            .run_cmd(&["mktemp", "-d", EXTENSION_DIR_TEMPLATE])
            .await?;
        let remote_dir = stdout.trim().to_string();
        if remote_dir.is_empty() {
            return Err(Error::setup("device failed to allocate extension temp dir"));
        }

        self.device.push_file(local_dir, &remote_dir).await?;
        self.device.chown(&remote_dir).await?;

        info!(
            local = %local_dir.display(),
            remote = %remote_dir,
            "Extension provisioned"
        );

        Ok(ExtensionRecord {
            local_path: local_dir.to_path_buf(),
            remote_dir,
            owning_user: SERVICE_ACCOUNT.to_string(),
            removed: false,
        })
    }

    /// Removes the record's remote directory.
    ///
    /// Independently callable and idempotent: repeat calls on the same
    /// record issue no further remote commands.
    ///
    /// # Errors
    ///
    /// Returns a channel error if the removal itself fails; the record
    /// stays un-removed so a later retry can still clean it up.
    pub async fn cleanup(&self, record: &mut ExtensionRecord) -> Result<()> {
        if record.removed {
            return Ok(());
        }

        self.device.rm_rf(&record.remote_dir).await?;
        record.removed = true;
        debug!(remote = %record.remote_dir, "Extension staging dir removed");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::device::fake::FakeDevice;

    fn provisioner(device: &Arc<FakeDevice>) -> ExtensionProvisioner {
        ExtensionProvisioner::new(Arc::clone(device) as Arc<dyn DeviceChannel>)
    }

    #[tokio::test]
    async fn test_push_records_mapping() {
        let staging = tempfile::tempdir().unwrap();
        let local = staging.path().join("perf-probe");
        std::fs::create_dir(&local).unwrap();

        let device = Arc::new(FakeDevice::new());
        let record = provisioner(&device).push(&local).await.unwrap();

        assert!(record.remote_dir.starts_with("/tmp/extension_"));
        assert_eq!(record.owning_user, SERVICE_ACCOUNT);
        assert_eq!(
            record.remote_path(),
            format!("{}/perf-probe", record.remote_dir)
        );
        assert!(!record.is_removed());

        let log = device.command_log();
        assert!(log.iter().any(|c| c.starts_with("mktemp")));
        assert!(log.iter().any(|c| c.starts_with("push ")));
        assert!(log.iter().any(|c| c.starts_with("chown ")));
    }

    #[tokio::test]
    async fn test_push_creates_distinct_dirs() {
        let device = Arc::new(FakeDevice::new());
        let provisioner = provisioner(&device);

        let a = provisioner.push(Path::new("./ext/a")).await.unwrap();
        let b = provisioner.push(Path::new("./ext/b")).await.unwrap();
        let c = provisioner.push(Path::new("./ext/c")).await.unwrap();

        assert_ne!(a.remote_dir, b.remote_dir);
        assert_ne!(b.remote_dir, c.remote_dir);
        assert_ne!(a.remote_dir, c.remote_dir);
    }

    #[tokio::test]
    async fn test_push_empty_mktemp_is_setup_error() {
        let device = Arc::new(FakeDevice::new());
        device.fail_mktemp();

        let err = provisioner(&device)
            .push(Path::new("./ext/a"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Setup { .. }));
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let device = Arc::new(FakeDevice::new());
        let provisioner = provisioner(&device);

        let mut record = provisioner.push(Path::new("./ext/a")).await.unwrap();

        provisioner.cleanup(&mut record).await.unwrap();
        assert!(record.is_removed());
        let removals_after_first = device.removed_paths().len();

        provisioner.cleanup(&mut record).await.unwrap();
        assert_eq!(device.removed_paths().len(), removals_after_first);
    }

    #[tokio::test]
    async fn test_cleanup_removes_the_staged_dir() {
        let device = Arc::new(FakeDevice::new());
        let provisioner = provisioner(&device);

        let mut record = provisioner.push(Path::new("./ext/a")).await.unwrap();
        let staged = record.remote_dir.clone();
        provisioner.cleanup(&mut record).await.unwrap();

        assert_eq!(device.removed_paths(), vec![staged]);
    }
}
