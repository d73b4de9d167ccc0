//! Remote session controller.
//!
//! [`RemoteSession`] sequences everything needed to bring the browser on
//! a session-managed device to a known-ready state: locating the running
//! browser and its version branch, provisioning extensions, restarting
//! the device UI, relaunching the browser under test instrumentation,
//! tunnelling the debugging port, and driving login. Teardown runs the
//! same steps in reverse.
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
//!     .options(SessionOptions::new().with_credentials("test@example.com", "pw"))
//!     .build()?;
//!
//! let result = session.start().await;
//! // ... run the measurement ...
//! session.close().await;
//! result
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::BrowserBackend;
use crate::device::forwarder::{Forwarder, ForwarderFactory, PortPair, pick_unused_port};
use crate::device::DeviceChannel;
use crate::error::{Error, Result};
use crate::poll::{RetryPolicy, wait_for, wait_until};
use crate::session::capabilities::{Capabilities, VersionBranch};
use crate::session::devtools::Devtools;
use crate::session::extensions::{ExtensionProvisioner, ExtensionRecord};
use crate::session::flags::{relaunch_argv, startup_flags};
use crate::session::login::LoginNavigator;
use crate::session::options::SessionOptions;
use crate::session::process::{BrowserProcess, find_browser_process};
use crate::session::tuning::WaitTuning;

// ============================================================================
// Constants
// ============================================================================

/// On-device profile directory of the browser service account.
pub const PROFILE_DIRECTORY: &str = "/home/chronos/Default";

/// Device UI service managed by init.
const UI_SERVICE: &str = "ui";

/// Attempts allowed for the post-login blank-tab navigation after the
/// first one fails transiently.
const NEW_TAB_RETRIES: u32 = 3;

// ============================================================================
// Phase
// ============================================================================

/// Session lifecycle phase.
///
/// Phases advance strictly forward; `Failed` and `Closed` are terminal
/// and reachable from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Session constructed, nothing touched yet.
    Created,
    /// Locating the browser process and resolving its version branch.
    DeterminingVersion,
    /// Copying extensions onto the device.
    Provisioning,
    /// Restarting the device UI service.
    UiRestarting,
    /// Relaunching the browser with test flags.
    Launching,
    /// Debugging port reachable (tunnelled or direct).
    TunnelEstablished,
    /// Waiting for the onboarding surface.
    AwaitingOnboarding,
    /// Driving the login flow.
    LoggingIn,
    /// Browser is up and logged in.
    Ready,
    /// Startup failed; teardown ran.
    Failed,
    /// Session closed.
    Closed,
}

impl Phase {
    /// Returns `true` for terminal phases.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed | Self::Closed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::DeterminingVersion => "determining-version",
            Self::Provisioning => "provisioning",
            Self::UiRestarting => "ui-restarting",
            Self::Launching => "launching",
            Self::TunnelEstablished => "tunnel-established",
            Self::AwaitingOnboarding => "awaiting-onboarding",
            Self::LoggingIn => "logging-in",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// RemoteSession
// ============================================================================

/// Controller for one browser session on a remote device.
///
/// A controller instance represents exactly one session at a time; it
/// exclusively owns the tunnel and every provisioned extension
/// directory. [`RemoteSession::close`] is safe from any phase, including
/// mid-failure, and issues no remote commands once the device handle has
/// been released.
pub struct RemoteSession {
    /// Command channel; released on close.
    device: Option<Arc<dyn DeviceChannel>>,
    /// Browser-side control channel.
    devtools: Arc<dyn Devtools>,
    /// Tunnel factory, created once and reused.
    forwarder_factory: Option<Arc<dyn ForwarderFactory>>,
    /// Session configuration.
    options: SessionOptions,
    /// Timing policies for every bounded wait.
    tuning: WaitTuning,
    /// Current lifecycle phase.
    phase: Phase,
    /// Version branch, resolved during startup.
    branch: Option<VersionBranch>,
    /// Debugging port on the device.
    remote_debug_port: u16,
    /// Local end of the debugging port (equals the remote port when
    /// co-located).
    debug_port: u16,
    /// Live tunnel, when not co-located.
    tunnel: Option<Box<dyn Forwarder>>,
    /// Provisioned login helper extension, on branches that need it.
    login_ext: Option<ExtensionRecord>,
    /// Provisioned extensions.
    extensions: Vec<ExtensionRecord>,
    /// Identity for log correlation.
    session_id: Uuid,
}

impl fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSession")
            .field("session_id", &self.session_id)
            .field("phase", &self.phase)
            .field("branch", &self.branch)
            .field("debug_port", &self.debug_port)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RemoteSession - Public API
// ============================================================================

impl RemoteSession {
    /// Creates a configuration builder for the session.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Brings the browser to a known-ready, logged-in state.
    ///
    /// On any failure the session transitions to [`Phase::Failed`],
    /// teardown runs automatically, and the error propagates; callers
    /// never have to clean up a half-started session themselves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Setup`] for precondition failures,
    /// [`Error::Login`] for login-flow failures, and the underlying
    /// error for everything else.
    pub async fn start(&mut self) -> Result<()> {
        info!(session_id = %self.session_id, "Starting remote browser session");

        match self.run_start().await {
            Ok(()) => {
                self.set_phase(Phase::Ready);
                info!(session_id = %self.session_id, "Browser is up");
                Ok(())
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Session start failed");
                self.set_phase(Phase::Failed);
                self.close().await;
                Err(e)
            }
        }
    }

    /// Tears the session down.
    ///
    /// Safe to call from any phase and more than once. Each step is
    /// skipped when its resource was never acquired or already released;
    /// errors are logged and suppressed so later steps still run. After
    /// the first call the device handle is released and subsequent calls
    /// issue no remote commands.
    pub async fn close(&mut self) {
        debug!(session_id = %self.session_id, phase = %self.phase, "Closing session");

        if let Some(device) = self.device.clone() {
            // Logs the user out.
            if let Err(e) = Self::restart_ui(&device).await {
                warn!(error = %e, "UI restart during teardown failed");
            }
        }

        if let Some(mut tunnel) = self.tunnel.take() {
            tunnel.close().await;
        }

        if let Some(device) = self.device.clone() {
            let provisioner = ExtensionProvisioner::new(device);

            if let Some(mut record) = self.login_ext.take()
                && let Err(e) = provisioner.cleanup(&mut record).await
            {
                warn!(error = %e, "Failed to remove login extension dir");
            }

            for mut record in self.extensions.drain(..) {
                if let Err(e) = provisioner.cleanup(&mut record).await {
                    warn!(error = %e, remote = %record.remote_dir, "Failed to remove extension dir");
                }
            }
        }

        self.device = None;
        if self.phase != Phase::Failed {
            self.set_phase(Phase::Closed);
        }
        info!(session_id = %self.session_id, "Session closed");
    }

    /// Returns whether the main browser process is currently running.
    pub async fn is_running(&self) -> bool {
        match &self.device {
            Some(device) => match device.list_processes().await {
                Ok(procs) => find_browser_process(&procs).is_some(),
                Err(_) => false,
            },
            None => false,
        }
    }

    /// The version branch resolved at startup, if any.
    #[inline]
    #[must_use]
    pub fn version_branch(&self) -> Option<VersionBranch> {
        self.branch
    }

    /// Current lifecycle phase.
    #[inline]
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Local end of the debugging port.
    #[inline]
    #[must_use]
    pub fn debug_port(&self) -> u16 {
        self.debug_port
    }

    /// The flag list the browser is relaunched with.
    #[must_use]
    pub fn startup_args(&self) -> Vec<String> {
        let caps = self
            .branch
            .map(VersionBranch::capabilities)
            .unwrap_or_else(|| Capabilities::for_branch(u32::MAX));
        startup_flags(
            &self.options,
            caps,
            self.remote_debug_port,
            self.login_ext.as_ref().map(|r| r.remote_dir.as_str()),
        )
    }
}

// ============================================================================
// RemoteSession - Startup Sequence
// ============================================================================

impl RemoteSession {
    /// The phase sequence behind [`RemoteSession::start`].
    async fn run_start(&mut self) -> Result<()> {
        self.options.validate().map_err(Error::setup)?;
        let device = self
            .device
            .clone()
            .ok_or_else(|| Error::setup("session already closed"))?;
        let devtools = Arc::clone(&self.devtools);
        let tuning = self.tuning;

        // Locate the browser and resolve its version branch.
        self.set_phase(Phase::DeterminingVersion);
        self.remote_debug_port = device.get_remote_port().await?;
        let browser =
            Self::wait_for_browser_process(&device, tuning.browser_process, "browser-process")
                .await?;
        let (version, _) = device
            .run_cmd(&[browser.path.as_str(), "--version"])
            .await?;
        let branch = VersionBranch::parse(&version)?;
        info!(session_id = %self.session_id, branch = %branch, "Resolved version branch");
        self.branch = Some(branch);
        let caps = branch.capabilities();

        // Copy extensions to unique temp directories on the device.
        self.set_phase(Phase::Provisioning);
        let provisioner = ExtensionProvisioner::new(Arc::clone(&device));
        for ext in self.options.extensions.clone() {
            let record = provisioner.push(&ext).await?;
            self.extensions.push(record);
        }
        let wants_login_ext =
            self.options.auto_login && !self.options.login_mode.is_guest() && !caps.api_login;
        if wants_login_ext {
            let source = self.options.login_ext_dir.clone().ok_or_else(|| {
                Error::setup("login helper extension required for branches without scripted login")
            })?;
            info!(session_id = %self.session_id, "Provisioning login helper extension");
            self.login_ext = Some(provisioner.push(&source).await?);
        }

        // Ensure the UI is running and logged out.
        self.set_phase(Phase::UiRestarting);
        Self::restart_ui(&device).await?;
        Self::wait_for_browser_process(&device, tuning.browser_restart, "ui-restart").await?;
        self.reset_profile(&device).await?;

        // Relaunch the browser with the test flag set.
        self.set_phase(Phase::Launching);
        let flags = startup_flags(
            &self.options,
            caps,
            self.remote_debug_port,
            self.login_ext.as_ref().map(|r| r.remote_dir.as_str()),
        );
        info!(session_id = %self.session_id, "Relaunching browser with test flags");
        let argv = relaunch_argv(&flags);
        let argv_refs: Vec<&str> = argv.iter().map(String::as_str).collect();
        device.run_cmd(&argv_refs).await?;

        // Expose the debugging port locally.
        if device.is_local() {
            self.debug_port = self.remote_debug_port;
        } else {
            let local = pick_unused_port()?;
            let factory = self.forwarder_factory.clone().ok_or_else(|| {
                Error::setup("no forwarder factory configured for a non-local device")
            })?;
            let tunnel = factory
                .open(PortPair::new(local, self.remote_debug_port))
                .await?;
            self.debug_port = local;
            self.tunnel = Some(tunnel);
        }
        self.set_phase(Phase::TunnelEstablished);

        // Extensions have not loaded yet; only the port has to answer.
        devtools.wait_until_ready(self.debug_port, false).await?;

        // Hard precondition on old branches: without a hardware id the
        // device sticks on the bad-hwid screen and login can never work.
        if caps.needs_hwid {
            let (hwid, _) = device.run_cmd(&["/usr/bin/crossystem", "hwid"]).await?;
            if hwid.trim().is_empty() {
                return Err(Error::setup(
                    "hardware id not set; --skip-hwid-check is unsupported on branches 1500 and earlier",
                ));
            }
        }

        // The login navigator re-validates, so a miss here is not fatal.
        self.set_phase(Phase::AwaitingOnboarding);
        let devtools_ref = &devtools;
        let oobe_wait = wait_until(tuning.onboarding, "onboarding surface", move || async move {
            devtools_ref.oobe_exists().await
        })
        .await;
        if let Err(e) = oobe_wait {
            debug!(error = %e, "Onboarding surface not confirmed yet");
        }

        if self.options.auto_login {
            self.set_phase(Phase::LoggingIn);
            let navigator = LoginNavigator::new(
                device.as_ref(),
                devtools.as_ref(),
                caps,
                tuning,
                self.debug_port,
            );

            if self.options.login_mode.is_guest() {
                let pid_before = Self::browser_pid(&device).await?;
                navigator.navigate_guest().await?;
                // Guest browsing respawns the browser in a new process.
                Self::wait_for_guest_respawn(&device, tuning.guest_respawn, pid_before).await?;
                devtools.wait_until_ready(self.debug_port, true).await?;
            } else {
                navigator
                    .navigate_user(&self.options.username, &self.options.password)
                    .await?;
            }

            self.reconcile_readiness(&device, &devtools, caps).await?;
        }

        Ok(())
    }

    /// Removes stale per-user state and applies a profile override.
    async fn reset_profile(&self, device: &Arc<dyn DeviceChannel>) -> Result<()> {
        if self.options.override_profile
            && !self.options.login_mode.is_guest()
            && !self.options.username.is_empty()
        {
            let user_flag = format!("--user={}", self.options.username);
            device
                .run_cmd(&["cryptohome", "--action=remove", "--force", user_flag.as_str()])
                .await?;
        }

        if let Some(profile) = &self.options.profile_dir {
            device.rm_rf(PROFILE_DIRECTORY).await?;
            device
                .push_file(&profile.join("Default"), PROFILE_DIRECTORY)
                .await?;
            device.chown(PROFILE_DIRECTORY).await?;
        }
        Ok(())
    }

    /// Post-login readiness: close the legacy startup window, or park a
    /// tab on a blank page.
    async fn reconcile_readiness(
        &self,
        device: &Arc<dyn DeviceChannel>,
        devtools: &Arc<dyn Devtools>,
        caps: Capabilities,
    ) -> Result<()> {
        if caps.startup_window {
            let devtools_ref = devtools;
            let result = wait_until(
                self.tuning.startup_window,
                "startup window",
                move || async move { devtools_ref.close_startup_surface().await },
            )
            .await;
            return match result {
                Err(e) if e.is_timeout() => {
                    Self::screenshot(device, "startup-window").await;
                    Err(Error::setup("startup window never appeared"))
                }
                other => other,
            };
        }

        let mut retries = NEW_TAB_RETRIES;
        loop {
            match Self::blank_tab(devtools).await {
                Ok(()) => return Ok(()),
                Err(e) if (e.is_transient() || e.is_timeout()) && retries > 0 => {
                    retries -= 1;
                    warn!(error = %e, remaining = retries, "Transient failure parking a blank tab");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One attempt at opening/reusing a tab and navigating it blank.
    async fn blank_tab(devtools: &Arc<dyn Devtools>) -> Result<()> {
        if devtools.tab_count().await? == 0 {
            devtools.open_tab().await?;
        }
        devtools.navigate_last_tab("about:blank").await
    }
}

// ============================================================================
// RemoteSession - Device Helpers
// ============================================================================

impl RemoteSession {
    /// Restarts (or starts) the device UI service, logging any user out.
    async fn restart_ui(device: &Arc<dyn DeviceChannel>) -> Result<()> {
        info!("(Re)starting the device UI");
        if device.is_service_running(UI_SERVICE).await? {
            device.run_cmd(&["restart", UI_SERVICE]).await?;
        } else {
            device.run_cmd(&["start", UI_SERVICE]).await?;
        }
        Ok(())
    }

    /// Waits for the main browser process to appear.
    async fn wait_for_browser_process(
        device: &Arc<dyn DeviceChannel>,
        policy: RetryPolicy,
        label: &str,
    ) -> Result<BrowserProcess> {
        let result = wait_for(policy, label, move || async move {
            Ok(find_browser_process(&device.list_processes().await?))
        })
        .await;

        match result {
            Err(e) if e.is_timeout() => {
                Self::screenshot(device, label).await;
                Err(Error::setup(format!(
                    "browser process not found within {}ms",
                    policy.timeout_ms()
                )))
            }
            other => other,
        }
    }

    /// Current main browser pid, if the browser is up.
    async fn browser_pid(device: &Arc<dyn DeviceChannel>) -> Result<Option<u32>> {
        Ok(find_browser_process(&device.list_processes().await?).map(|p| p.pid))
    }

    /// Waits for the browser to come back under a different pid.
    async fn wait_for_guest_respawn(
        device: &Arc<dyn DeviceChannel>,
        policy: RetryPolicy,
        pid_before: Option<u32>,
    ) -> Result<()> {
        let result = wait_until(policy, "guest respawn", move || async move {
            let pid = Self::browser_pid(device).await?;
            Ok(pid.is_some() && pid != pid_before)
        })
        .await;

        match result {
            Err(e) if e.is_timeout() => {
                Self::screenshot(device, "guest-respawn").await;
                Err(Error::login("guest browser never respawned"))
            }
            other => other,
        }
    }

    /// Best-effort diagnostic screenshot labeled by failure site.
    async fn screenshot(device: &Arc<dyn DeviceChannel>, label: &str) {
        if let Err(e) = device.take_screenshot(label).await {
            warn!(error = %e, label, "Failed to capture diagnostic screenshot");
        }
    }

    /// Records a phase transition.
    fn set_phase(&mut self, phase: Phase) {
        debug!(session_id = %self.session_id, from = %self.phase, to = %phase, "Phase transition");
        self.phase = phase;
    }
}

// ============================================================================
// BrowserBackend Implementation
// ============================================================================

#[async_trait]
impl BrowserBackend for RemoteSession {
    async fn start(&mut self) -> Result<()> {
        RemoteSession::start(self).await
    }

    async fn close(&mut self) {
        RemoteSession::close(self).await;
    }

    async fn is_running(&self) -> bool {
        RemoteSession::is_running(self).await
    }

    fn startup_args(&self) -> Vec<String> {
        RemoteSession::startup_args(self)
    }
}

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for configuring a [`RemoteSession`].
///
/// Use [`RemoteSession::builder()`] to create one.
#[derive(Default)]
pub struct SessionBuilder {
    /// Command channel to the device.
    device: Option<Arc<dyn DeviceChannel>>,
    /// Browser-side control channel.
    devtools: Option<Arc<dyn Devtools>>,
    /// Tunnel factory for non-local devices.
    forwarder_factory: Option<Arc<dyn ForwarderFactory>>,
    /// Session configuration.
    options: SessionOptions,
    /// Timing policies.
    tuning: WaitTuning,
}

impl SessionBuilder {
    /// Creates a builder with default options and timing.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            device: None,
            devtools: None,
            forwarder_factory: None,
            options: SessionOptions::default(),
            tuning: WaitTuning::default(),
        }
    }

    /// Sets the device command channel.
    #[inline]
    #[must_use]
    pub fn device(mut self, device: Arc<dyn DeviceChannel>) -> Self {
        self.device = Some(device);
        self
    }

    /// Sets the browser-side control channel.
    #[inline]
    #[must_use]
    pub fn devtools(mut self, devtools: Arc<dyn Devtools>) -> Self {
        self.devtools = Some(devtools);
        self
    }

    /// Sets the tunnel factory used when the device is not local.
    #[inline]
    #[must_use]
    pub fn forwarder_factory(mut self, factory: Arc<dyn ForwarderFactory>) -> Self {
        self.forwarder_factory = Some(factory);
        self
    }

    /// Sets the session options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Overrides the per-wait timing policies.
    #[inline]
    #[must_use]
    pub fn tuning(mut self, tuning: WaitTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Builds the session controller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Setup`] when the device or devtools channel is
    /// missing, or the option combination is invalid.
    pub fn build(self) -> Result<RemoteSession> {
        let device = self
            .device
            .ok_or_else(|| Error::setup("device channel is required"))?;
        let devtools = self
            .devtools
            .ok_or_else(|| Error::setup("devtools channel is required"))?;
        self.options.validate().map_err(Error::setup)?;

        Ok(RemoteSession {
            device: Some(device),
            devtools,
            forwarder_factory: self.forwarder_factory,
            options: self.options,
            tuning: self.tuning,
            phase: Phase::Created,
            branch: None,
            remote_debug_port: 0,
            debug_port: 0,
            tunnel: None,
            login_ext: None,
            extensions: Vec::new(),
            session_id: Uuid::new_v4(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
