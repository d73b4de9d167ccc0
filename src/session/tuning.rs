//! Per-wait timing policies for the session state machine.
//!
//! Every bounded wait in the startup sequence has its own policy here,
//! with defaults matching how long the device is realistically allowed
//! to take at each step. Tests shrink them uniformly with
//! [`WaitTuning::uniform`] so timeout paths run in milliseconds.

// ============================================================================
// Imports
// ============================================================================

use crate::poll::RetryPolicy;

// ============================================================================
// WaitTuning
// ============================================================================

/// Timing policy for each bounded wait in the session sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTuning {
    /// Browser process appearing in the process list at session start.
    pub browser_process: RetryPolicy,

    /// Browser process reappearing after the UI service restart.
    pub browser_restart: RetryPolicy,

    /// Onboarding surface appearing after the test relaunch.
    pub onboarding: RetryPolicy,

    /// Sign-in UI reaching a state that accepts login.
    pub signin_screen: RetryPolicy,

    /// Scripted login API becoming defined on the onboarding surface.
    pub login_api: RetryPolicy,

    /// Cryptohome mounted and onboarding surface dismissed.
    pub logged_in: RetryPolicy,

    /// Guest filesystem mounted after the guest button.
    pub guest_fs: RetryPolicy,

    /// Browser respawning under a new pid after guest login.
    pub guest_respawn: RetryPolicy,

    /// Legacy startup window appearing after login.
    pub startup_window: RetryPolicy,
}

impl Default for WaitTuning {
    fn default() -> Self {
        Self {
            browser_process: RetryPolicy::timeout_secs(30),
            browser_restart: RetryPolicy::timeout_secs(20),
            onboarding: RetryPolicy::timeout_secs(10),
            signin_screen: RetryPolicy::timeout_secs(60),
            login_api: RetryPolicy::timeout_secs(10),
            logged_in: RetryPolicy::timeout_secs(60),
            guest_fs: RetryPolicy::timeout_secs(20),
            guest_respawn: RetryPolicy::timeout_secs(10),
            startup_window: RetryPolicy::timeout_secs(20),
        }
    }
}

impl WaitTuning {
    /// Applies one policy to every wait.
    #[must_use]
    pub const fn uniform(policy: RetryPolicy) -> Self {
        Self {
            browser_process: policy,
            browser_restart: policy,
            onboarding: policy,
            signin_screen: policy,
            login_api: policy,
            logged_in: policy,
            guest_fs: policy,
            guest_respawn: policy,
            startup_window: policy,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
