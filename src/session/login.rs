//! Onboarding navigation for guest and named-user login.
//!
//! The onboarding surface is a live web UI on the device; this module
//! drives it through the JS-evaluation channel, branching on the
//! session's capability table. Button clicks are best-effort: the
//! polling step that follows each click re-validates actual device
//! state, so a tab crash mid-click is tolerated where the click itself
//! restarts the browser.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicI64, Ordering};

use tracing::{debug, error, info, warn};

use crate::device::DeviceChannel;
use crate::error::{Error, Result};
use crate::poll::wait_until;
use crate::session::capabilities::Capabilities;
use crate::session::devtools::{Devtools, SigninState};
use crate::session::process::find_browser_process;
use crate::session::tuning::WaitTuning;

// ============================================================================
// Constants
// ============================================================================

/// Pseudo-user the guest filesystem mounts under.
const GUEST_USER: &str = "$guest";

/// Filesystem type of a mounted guest session.
const GUEST_FS_TYPE: &str = "guestfs";

/// Reads the sign-in sub-screen state off the login header element.
const SIGNIN_STATE_JS: &str = r"
    loginHeader = document.getElementById('login-header-bar')
    if (loginHeader) {
      loginHeader.signinUIState_;
    }
";

/// Clicks the guest button on the account picker, if present.
const GUEST_BUTTON_JS: &str = r#"
    var guest = document.getElementById("guest-user-button");
    if (guest) {
      guest.click();
    }
"#;

/// Dismisses the user image selection screen, if present.
const OK_BUTTON_JS: &str = r#"
    var ok = document.getElementById("ok-button");
    if (ok) {
      ok.click();
    }
"#;

/// Whether the onboarding scripting object exists yet.
const OOBE_DEFINED_JS: &str = "typeof Oobe !== 'undefined'";

/// Whether the scripted login entry point is absent.
const LOGIN_API_MISSING_JS: &str = "typeof Oobe.loginForTesting == 'undefined'";

// ============================================================================
// JS Escaping
// ============================================================================

/// Renders `value` as a single-quoted JS string literal.
fn js_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

// ============================================================================
// LoginNavigator
// ============================================================================

/// Drives the onboarding UI to a logged-in state.
pub struct LoginNavigator<'a> {
    /// Command channel to the device.
    device: &'a dyn DeviceChannel,
    /// Browser-side control channel.
    devtools: &'a dyn Devtools,
    /// Branch capability table for this session.
    capabilities: Capabilities,
    /// Timing policies for the login waits.
    tuning: WaitTuning,
    /// Local end of the debugging port.
    debug_port: u16,
}

impl<'a> LoginNavigator<'a> {
    /// Creates a navigator over the session's channels.
    #[must_use]
    pub fn new(
        device: &'a dyn DeviceChannel,
        devtools: &'a dyn Devtools,
        capabilities: Capabilities,
        tuning: WaitTuning,
        debug_port: u16,
    ) -> Self {
        Self {
            device,
            devtools,
            capabilities,
            tuning,
            debug_port,
        }
    }
}

// ============================================================================
// LoginNavigator - Guest Path
// ============================================================================

impl LoginNavigator<'_> {
    /// Navigates through the onboarding screen as guest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Login`] if the onboarding surface is missing,
    /// the sign-in screen never accepts input, or the guest filesystem
    /// does not mount.
    pub async fn navigate_guest(&self) -> Result<()> {
        if !self.devtools.oobe_exists().await? {
            return Err(Error::login("onboarding missing"));
        }
        self.wait_for_signin_screen().await?;
        self.click_browse_as_guest().await?;
        self.wait_for_guest_fs().await
    }

    /// Waits for the sign-in or account-picker screen.
    async fn wait_for_signin_screen(&self) -> Result<()> {
        let last = AtomicI64::new(-1);
        let this = self;
        let observed = &last;

        let result = wait_until(self.tuning.signin_screen, "signin screen", move || {
            async move {
                match this.signin_ui_state().await? {
                    Some(raw) => {
                        observed.store(raw, Ordering::SeqCst);
                        Ok(SigninState::from_raw(raw).is_some_and(SigninState::accepts_login))
                    }
                    None => Ok(false),
                }
            }
        })
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_timeout() => {
                let state = last.load(Ordering::SeqCst);
                self.screenshot("guest-screen").await;
                Err(Error::login_with_state(
                    format!("timed out waiting for signin screen, state {state}"),
                    state,
                ))
            }
            Err(e) => Err(e),
        }
    }

    /// Reads the sign-in UI state off the onboarding surface.
    async fn signin_ui_state(&self) -> Result<Option<i64>> {
        let value = self.devtools.evaluate_oobe(SIGNIN_STATE_JS).await?;
        Ok(value.as_i64())
    }

    /// Clicks the guest button.
    ///
    /// Guest browsing shuts the current browser down and respawns it, so
    /// a tab crash or a dropped connection here is expected.
    async fn click_browse_as_guest(&self) -> Result<()> {
        match self.devtools.evaluate_oobe(GUEST_BUTTON_JS).await {
            Ok(_) => Ok(()),
            Err(Error::TabCrashed | Error::ConnectionGone) => {
                debug!("Browser went away clicking the guest button");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Waits for the guest filesystem mount.
    async fn wait_for_guest_fs(&self) -> Result<()> {
        let guest_path = self.device.cryptohome_path(GUEST_USER).await?;
        let this = self;
        let path = guest_path.as_str();

        let result = wait_until(self.tuning.guest_fs, "guest filesystem", move || async move {
            Ok(this.device.filesystem_mounted_at(path).await?.as_deref() == Some(GUEST_FS_TYPE))
        })
        .await;

        match result {
            Err(e) if e.is_timeout() => {
                self.screenshot("guest-fs").await;
                Err(Error::login("timed out waiting for guest filesystem mount"))
            }
            other => other,
        }
    }
}

// ============================================================================
// LoginNavigator - Named-User Path
// ============================================================================

impl LoginNavigator<'_> {
    /// Navigates through the onboarding screen as the named user.
    ///
    /// On branches with the scripted login API the call goes through
    /// `Oobe.loginForTesting`; older branches rely on the provisioned
    /// login helper extension, so only the logged-in wait applies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Login`] if the login flow does not complete, or
    /// re-raises the readiness timeout if extensions never load.
    pub async fn navigate_user(&self, username: &str, password: &str) -> Result<()> {
        if self.capabilities.api_login {
            self.invoke_login_api(username, password).await?;
        }
        self.wait_for_logged_in(username).await?;
        self.wait_for_extensions().await
    }

    /// Signs in through the onboarding scripting API.
    async fn invoke_login_api(&self, username: &str, password: &str) -> Result<()> {
        info!("Invoking scripted login");
        if !self.devtools.oobe_exists().await? {
            return Err(Error::login("onboarding missing"));
        }

        let this = self;
        let api_wait = wait_until(self.tuning.login_api, "login api", move || async move {
            Ok(this
                .devtools
                .evaluate_oobe(OOBE_DEFINED_JS)
                .await?
                .as_bool()
                .unwrap_or(false))
        })
        .await;
        match api_wait {
            Ok(()) => {}
            Err(e) if e.is_timeout() => {
                self.screenshot("login-api").await;
                return Err(Error::login("onboarding scripting object never defined"));
            }
            Err(e) => return Err(e),
        }

        let missing = self
            .devtools
            .evaluate_oobe(LOGIN_API_MISSING_JS)
            .await?
            .as_bool()
            .unwrap_or(true);
        if missing {
            return Err(Error::login("Oobe.loginForTesting js api missing"));
        }

        let stmt = format!(
            "Oobe.loginForTesting({}, {});",
            js_string_literal(username),
            js_string_literal(password)
        );
        self.devtools.execute_oobe(&stmt).await
    }

    /// Waits until the cryptohome is mounted and onboarding is gone.
    async fn wait_for_logged_in(&self, username: &str) -> Result<()> {
        let this = self;
        let user = username;

        let result = wait_until(self.tuning.logged_in, "login screen", move || async move {
            if this.capabilities.user_image_screen {
                this.dismiss_user_image_screen().await?;
            }
            Ok(this.device.is_cryptohome_mounted(user).await?
                && !this.devtools.oobe_exists().await?)
        })
        .await;

        match result {
            Err(e) if e.is_timeout() => {
                self.screenshot("login-screen").await;
                Err(Error::login("timed out going through login screen"))
            }
            other => other,
        }
    }

    /// Clicks past the user image selection screen if login stalls there.
    async fn dismiss_user_image_screen(&self) -> Result<()> {
        match self.devtools.evaluate_oobe(OK_BUTTON_JS).await {
            Ok(_) => Ok(()),
            Err(Error::TabCrashed) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Waits for configured extensions to finish loading.
    ///
    /// On timeout, dumps the browser's current argument list and
    /// captures a screenshot before re-raising.
    async fn wait_for_extensions(&self) -> Result<()> {
        match self.devtools.wait_until_ready(self.debug_port, true).await {
            Err(e) if e.is_timeout() => {
                if let Ok(procs) = self.device.list_processes().await
                    && let Some(browser) = find_browser_process(&procs)
                {
                    error!(args = %browser.args, "Extensions never finished loading");
                }
                self.screenshot("extension-timeout").await;
                Err(e)
            }
            other => other,
        }
    }
}

// ============================================================================
// LoginNavigator - Diagnostics
// ============================================================================

impl LoginNavigator<'_> {
    /// Best-effort diagnostic screenshot labeled by failure site.
    async fn screenshot(&self, label: &str) {
        if let Err(e) = self.device.take_screenshot(label).await {
            warn!(error = %e, label, "Failed to capture diagnostic screenshot");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
