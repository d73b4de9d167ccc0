//! Version-branch capability table.
//!
//! The behavior of the on-device browser varies by release branch: newer
//! branches expose a scripting API for test login, older ones need a
//! helper extension, the oldest gate onboarding on a hardware id and show
//! a startup window that has to be dismissed. Rather than scattering
//! `branch > N` checks through the controller, the branch number is
//! resolved once into a [`Capabilities`] table and every branch point
//! reads from it.

// ============================================================================
// Imports
// ============================================================================

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

// ============================================================================
// VersionBranch
// ============================================================================

/// Release branch of the browser under test.
///
/// Determined once at session start from the binary's `--version` output
/// and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionBranch(pub u32);

impl VersionBranch {
    /// Parses the branch number out of a `--version` string.
    ///
    /// The branch is the third dotted component of the version, e.g.
    /// `1453` in `Google Chrome 27.0.1453.116`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Setup`] if the string is empty or carries no
    /// four-component version.
    pub fn parse(version: &str) -> Result<Self> {
        if version.trim().is_empty() {
            return Err(Error::setup("browser version query returned nothing"));
        }

        let pattern = Regex::new(r"\d+\.\d+\.(\d+)\.\d+").map_err(|e| Error::setup(e.to_string()))?;
        let branch = pattern
            .captures(version)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .ok_or_else(|| {
                Error::setup(format!("unparseable browser version: {}", version.trim()))
            })?;

        Ok(Self(branch))
    }

    /// The raw branch number.
    #[inline]
    #[must_use]
    pub const fn number(self) -> u32 {
        self.0
    }

    /// Resolves the capability table for this branch.
    #[inline]
    #[must_use]
    pub const fn capabilities(self) -> Capabilities {
        Capabilities::for_branch(self.0)
    }
}

impl fmt::Display for VersionBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Branch-gated behavior variants, resolved once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// `Oobe.loginForTesting` is available (introduced after branch 1599).
    /// When absent, named-user login goes through the helper extension.
    pub api_login: bool,

    /// The hardware id must be set on the device; `--skip-hwid-check`
    /// is not supported on branches 1500 and earlier.
    pub needs_hwid: bool,

    /// A startup window opens after login and must be closed
    /// (branches before 1500).
    pub startup_window: bool,

    /// Login can stall on the user image selection screen, which has to
    /// be dismissed (branches 1547 and earlier).
    pub user_image_screen: bool,
}

impl Capabilities {
    /// Resolves the table for a raw branch number.
    #[must_use]
    pub const fn for_branch(branch: u32) -> Self {
        Self {
            api_login: branch > 1599,
            needs_hwid: branch <= 1500,
            startup_window: branch < 1500,
            user_image_screen: branch <= 1547,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release_version() {
        let branch = VersionBranch::parse("Google Chrome 27.0.1453.116").unwrap();
        assert_eq!(branch.number(), 1453);
    }

    #[test]
    fn test_parse_with_suffix() {
        let branch = VersionBranch::parse("Chromium 29.0.1548.0 dev\n").unwrap();
        assert_eq!(branch.number(), 1548);
    }

    #[test]
    fn test_parse_empty_is_setup_error() {
        let err = VersionBranch::parse("  \n").unwrap_err();
        assert!(matches!(err, Error::Setup { .. }));
    }

    #[test]
    fn test_parse_garbage_is_setup_error() {
        let err = VersionBranch::parse("no version here").unwrap_err();
        assert!(matches!(err, Error::Setup { .. }));
    }

    #[test]
    fn test_api_login_boundary() {
        assert!(!Capabilities::for_branch(1599).api_login);
        assert!(Capabilities::for_branch(1600).api_login);
    }

    #[test]
    fn test_hwid_boundary() {
        assert!(Capabilities::for_branch(1500).needs_hwid);
        assert!(!Capabilities::for_branch(1501).needs_hwid);
    }

    #[test]
    fn test_startup_window_boundary() {
        assert!(Capabilities::for_branch(1499).startup_window);
        assert!(!Capabilities::for_branch(1500).startup_window);
    }

    #[test]
    fn test_user_image_boundary() {
        assert!(Capabilities::for_branch(1547).user_image_screen);
        assert!(!Capabilities::for_branch(1548).user_image_screen);
    }

    #[test]
    fn test_modern_branch_capabilities() {
        let caps = VersionBranch(1700).capabilities();
        assert!(caps.api_login);
        assert!(!caps.needs_hwid);
        assert!(!caps.startup_window);
        assert!(!caps.user_image_screen);
    }
}
