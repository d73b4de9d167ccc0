//! Browser startup flags and transport escaping.
//!
//! The relaunch request hands the browser's flag list to the device's
//! session-manager service over dbus, and `dbus-send` serializes a string
//! array by joining its elements with commas. Any comma inside a flag
//! value therefore has to be escaped before transmission and restored
//! verbatim on the receiving side; [`escape_flag`]/[`split_flags`] make
//! that round trip exact.

// ============================================================================
// Imports
// ============================================================================

use crate::session::capabilities::Capabilities;
use crate::session::options::SessionOptions;

// ============================================================================
// Constants
// ============================================================================

/// Delimiter `dbus-send` uses between string-array elements.
const TRANSPORT_DELIMITER: char = ',';

/// Verbose-logging pattern for login flake triage.
const LOGIN_VMODULE: &str = "--vmodule=*/browser/automation/*=2,*/chromeos/net/*=2,\
                             */chromeos/login/*=2,*/extensions/*=2,\
                             */device_policy_decoder_chromeos.cc=2";

// ============================================================================
// Flag Construction
// ============================================================================

/// Builds the full flag list for the test relaunch.
///
/// The base set pins down rendering and focus behavior so measurements
/// stay comparable across runs, skips the post-login onboarding screens,
/// and opens the remote debugging port. Guest sessions jump straight to
/// the login screen; named-user sessions on branches without the login
/// API point the browser at the provisioned helper extension instead.
#[must_use]
pub fn startup_flags(
    options: &SessionOptions,
    capabilities: Capabilities,
    remote_debug_port: u16,
    login_ext_dir: Option<&str>,
) -> Vec<String> {
    let mut flags: Vec<String> = vec![
        "--enable-smooth-scrolling".into(),
        "--enable-threaded-compositing".into(),
        "--enable-per-tile-painting".into(),
        "--force-compositing-mode".into(),
        // External apps can steal focus and skew measurements.
        "--disable-default-apps".into(),
        "--oobe-skip-postlogin".into(),
        format!("--remote-debugging-port={remote_debug_port}"),
        "--start-maximized".into(),
        LOGIN_VMODULE.into(),
    ];

    flags.extend(options.extra_args.iter().cloned());

    if options.login_mode.is_guest() {
        // Jump to the login screen, skipping network selection and eula.
        flags.push("--login-screen=login".into());
        flags.push("--skip-hwid-check".into());
    } else if !capabilities.api_login
        && let Some(dir) = login_ext_dir
    {
        // This extension bypasses the signin service and logs us in.
        flags.push(format!("--auth-ext-path={dir}"));
    }

    flags
}

// ============================================================================
// Transport Escaping
// ============================================================================

/// Escapes transport delimiters inside one flag value.
#[must_use]
pub fn escape_flag(flag: &str) -> String {
    flag.replace(TRANSPORT_DELIMITER, "\\,")
}

/// Joins escaped flags into the wire form of the string array.
#[must_use]
pub fn join_flags(flags: &[String]) -> String {
    flags
        .iter()
        .map(|f| escape_flag(f))
        .collect::<Vec<_>>()
        .join(",")
}

/// Splits the wire form back into flags, restoring escaped delimiters.
///
/// This is the receiving side of the round trip: splitting happens on
/// unescaped delimiters only, and every `\,` becomes `,` again.
#[must_use]
pub fn split_flags(wire: &str) -> Vec<String> {
    let mut flags = Vec::new();
    let mut current = String::new();
    let mut chars = wire.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) => current.push(next),
                None => current.push('\\'),
            },
            TRANSPORT_DELIMITER => {
                flags.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() || !wire.is_empty() {
        flags.push(current);
    }
    flags
}

// ============================================================================
// Relaunch Request
// ============================================================================

/// Builds the `dbus-send` argv asking the session manager to relaunch
/// the browser under test instrumentation with `flags`.
#[must_use]
pub fn relaunch_argv(flags: &[String]) -> Vec<String> {
    vec![
        "dbus-send".into(),
        "--system".into(),
        "--type=method_call".into(),
        "--dest=org.chromium.SessionManager".into(),
        "/org/chromium/SessionManager".into(),
        "org.chromium.SessionManagerInterface.EnableChromeTesting".into(),
        "boolean:true".into(),
        format!("array:string:\"{}\"", join_flags(flags)),
    ]
}

// ============================================================================
// Tests
// ============================================================================
