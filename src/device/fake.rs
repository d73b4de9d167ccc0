//! Recording fakes for unit tests.
//!
//! `FakeDevice` and `FakeDevtools` script the observable device/browser
//! behavior and record every command the controller issues, so tests can
//! assert on exactly which remote operations happened. `FakeDevtools`
//! optionally holds a handle to the `FakeDevice` so UI actions produce
//! their device-side effects (guest click respawns the browser, the
//! scripted login mounts the cryptohome).

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::device::forwarder::{Forwarder, ForwarderFactory, PortPair};
use crate::device::{DeviceChannel, ProcessEntry};
use crate::error::{Error, Result};
use crate::session::devtools::Devtools;

/// Opt-in tracing output for tests (`RUST_LOG=debug cargo test`).
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// FakeDevice
// ============================================================================

pub(crate) struct FakeDevice {
    log: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
    screenshots: Mutex<Vec<String>>,
    mktemp_counter: AtomicU32,
    mktemp_fails: AtomicBool,
    version: Mutex<String>,
    hwid: Mutex<String>,
    browser_pid: AtomicU32,
    browser_present: AtomicBool,
    session_manager_present: AtomicBool,
    ui_running: AtomicBool,
    cryptohome_mounted: AtomicBool,
    guest_fs: Mutex<Option<String>>,
    local: AtomicBool,
    relaunch_wire: Mutex<Option<String>>,
}

impl FakeDevice {
    pub(crate) fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            screenshots: Mutex::new(Vec::new()),
            mktemp_counter: AtomicU32::new(0),
            mktemp_fails: AtomicBool::new(false),
            version: Mutex::new("Google Chrome 32.0.1700.107".to_string()),
            hwid: Mutex::new("TESTDEVICE A1B-C2D".to_string()),
            browser_pid: AtomicU32::new(340),
            browser_present: AtomicBool::new(true),
            session_manager_present: AtomicBool::new(true),
            ui_running: AtomicBool::new(true),
            cryptohome_mounted: AtomicBool::new(false),
            guest_fs: Mutex::new(Some("guestfs".to_string())),
            local: AtomicBool::new(true),
            relaunch_wire: Mutex::new(None),
        }
    }

    // ------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------

    pub(crate) fn set_version(&self, version: &str) {
        *self.version.lock() = version.to_string();
    }

    pub(crate) fn set_hwid(&self, hwid: &str) {
        *self.hwid.lock() = hwid.to_string();
    }

    pub(crate) fn set_local(&self, local: bool) {
        self.local.store(local, Ordering::SeqCst);
    }

    pub(crate) fn fail_mktemp(&self) {
        self.mktemp_fails.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_cryptohome_mounted(&self, mounted: bool) {
        self.cryptohome_mounted.store(mounted, Ordering::SeqCst);
    }

    pub(crate) fn set_guest_fs(&self, fs: Option<&str>) {
        *self.guest_fs.lock() = fs.map(str::to_string);
    }

    pub(crate) fn bump_browser_pid(&self) {
        self.browser_pid.fetch_add(1, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Assertions
    // ------------------------------------------------------------------

    pub(crate) fn command_log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub(crate) fn command_count(&self) -> usize {
        self.log.lock().len()
    }

    pub(crate) fn removed_paths(&self) -> Vec<String> {
        self.removed.lock().clone()
    }

    pub(crate) fn screenshots(&self) -> Vec<String> {
        self.screenshots.lock().clone()
    }

    pub(crate) fn relaunch_wire(&self) -> Option<String> {
        self.relaunch_wire.lock().clone()
    }

    fn record(&self, entry: String) {
        self.log.lock().push(entry);
    }
}

#[async_trait]
impl DeviceChannel for FakeDevice {
    async fn run_cmd(&self, argv: &[&str]) -> Result<(String, String)> {
        self.record(argv.join(" "));

        match argv.first().copied() {
            Some("mktemp") => {
                if self.mktemp_fails.load(Ordering::SeqCst) {
                    return Ok((String::new(), "mktemp: failed".to_string()));
                }
                let n = self.mktemp_counter.fetch_add(1, Ordering::SeqCst);
                Ok((format!("/tmp/extension_{n:05}\n"), String::new()))
            }
            Some("dbus-send") => {
                *self.relaunch_wire.lock() = argv.last().map(|s| (*s).to_string());
                Ok((String::new(), String::new()))
            }
            Some("/usr/bin/crossystem") => Ok((self.hwid.lock().clone(), String::new())),
            Some("restart") | Some("start") => {
                self.ui_running.store(true, Ordering::SeqCst);
                Ok((String::new(), String::new()))
            }
            Some(bin) if argv.get(1) == Some(&"--version") && bin.ends_with("/chrome") => {
                Ok((self.version.lock().clone(), String::new()))
            }
            _ => Ok((String::new(), String::new())),
        }
    }

    async fn push_file(&self, local: &Path, remote_dir: &str) -> Result<()> {
        self.record(format!("push {} {}", local.display(), remote_dir));
        Ok(())
    }

    async fn chown(&self, remote_path: &str) -> Result<()> {
        self.record(format!("chown {remote_path}"));
        Ok(())
    }

    async fn rm_rf(&self, remote_path: &str) -> Result<()> {
        self.record(format!("rm -rf {remote_path}"));
        self.removed.lock().push(remote_path.to_string());
        Ok(())
    }

    async fn list_processes(&self) -> Result<Vec<ProcessEntry>> {
        let mut procs = vec![ProcessEntry::new(1, "/sbin/init", 0)];
        if self.session_manager_present.load(Ordering::SeqCst) {
            procs.push(ProcessEntry::new(212, "/sbin/session_manager --uid=1000", 1));
        }
        if self.browser_present.load(Ordering::SeqCst) {
            let pid = self.browser_pid.load(Ordering::SeqCst);
            procs.push(ProcessEntry::new(
                pid,
                "/opt/google/chrome/chrome --login-manager --remote-debugging-port=9222",
                212,
            ));
            procs.push(ProcessEntry::new(
                pid + 15,
                "/opt/google/chrome/chrome --type=renderer",
                pid,
            ));
        }
        Ok(procs)
    }

    async fn is_service_running(&self, name: &str) -> Result<bool> {
        Ok(name == "ui" && self.ui_running.load(Ordering::SeqCst))
    }

    async fn get_remote_port(&self) -> Result<u16> {
        Ok(9222)
    }

    async fn cryptohome_path(&self, user: &str) -> Result<String> {
        Ok(format!("/home/user/{user}"))
    }

    async fn is_cryptohome_mounted(&self, _user: &str) -> Result<bool> {
        Ok(self.cryptohome_mounted.load(Ordering::SeqCst))
    }

    async fn filesystem_mounted_at(&self, _path: &str) -> Result<Option<String>> {
        Ok(self.guest_fs.lock().clone())
    }

    async fn take_screenshot(&self, label: &str) -> Result<()> {
        self.screenshots.lock().push(label.to_string());
        Ok(())
    }

    fn is_local(&self) -> bool {
        self.local.load(Ordering::SeqCst)
    }
}

// ============================================================================
// FakeDevtools
// ============================================================================

/// Scripted failure kinds for tab interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TabFailure {
    Crash,
    Gone,
    NoTab,
    Timeout,
}

impl TabFailure {
    fn to_error(self) -> Error {
        match self {
            Self::Crash => Error::TabCrashed,
            Self::Gone => Error::ConnectionGone,
            Self::NoTab => Error::no_such_tab(0),
            Self::Timeout => Error::timeout("navigate", 10_000),
        }
    }
}

pub(crate) struct FakeDevtools {
    device: Option<Arc<FakeDevice>>,
    oobe_exists: AtomicBool,
    oobe_checks: AtomicUsize,
    oobe_defined: AtomicBool,
    login_api_missing: AtomicBool,
    signin_states: Mutex<VecDeque<i64>>,
    last_signin: Mutex<i64>,
    guest_click_failure: Mutex<Option<TabFailure>>,
    js_log: Mutex<Vec<String>>,
    ready_calls: Mutex<Vec<(u16, bool)>>,
    extension_wait_fails: AtomicBool,
    tab_count: AtomicUsize,
    tab_failures: Mutex<VecDeque<TabFailure>>,
    navigations: Mutex<Vec<String>>,
    startup_surface_present: AtomicBool,
}

impl FakeDevtools {
    pub(crate) fn new() -> Self {
        Self {
            device: None,
            oobe_exists: AtomicBool::new(true),
            oobe_checks: AtomicUsize::new(0),
            oobe_defined: AtomicBool::new(true),
            login_api_missing: AtomicBool::new(false),
            signin_states: Mutex::new(VecDeque::new()),
            last_signin: Mutex::new(2),
            guest_click_failure: Mutex::new(None),
            js_log: Mutex::new(Vec::new()),
            ready_calls: Mutex::new(Vec::new()),
            extension_wait_fails: AtomicBool::new(false),
            tab_count: AtomicUsize::new(1),
            tab_failures: Mutex::new(VecDeque::new()),
            navigations: Mutex::new(Vec::new()),
            startup_surface_present: AtomicBool::new(false),
        }
    }

    /// Links UI actions to their device-side effects.
    pub(crate) fn with_device(device: Arc<FakeDevice>) -> Self {
        let mut fake = Self::new();
        fake.device = Some(device);
        fake
    }

    // ------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------

    pub(crate) fn set_oobe_exists(&self, exists: bool) {
        self.oobe_exists.store(exists, Ordering::SeqCst);
    }

    pub(crate) fn set_login_api_missing(&self, missing: bool) {
        self.login_api_missing.store(missing, Ordering::SeqCst);
    }

    /// Queues sign-in states; the last one repeats once drained.
    pub(crate) fn script_signin_states(&self, states: &[i64]) {
        let mut queue = self.signin_states.lock();
        queue.clear();
        queue.extend(states.iter().copied());
        if let Some(last) = states.last() {
            *self.last_signin.lock() = *last;
        }
    }

    pub(crate) fn fail_guest_click(&self, failure: TabFailure) {
        *self.guest_click_failure.lock() = Some(failure);
    }

    pub(crate) fn fail_extension_wait(&self) {
        self.extension_wait_fails.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_tab_count(&self, count: usize) {
        self.tab_count.store(count, Ordering::SeqCst);
    }

    pub(crate) fn script_tab_failures(&self, failures: &[TabFailure]) {
        let mut queue = self.tab_failures.lock();
        queue.clear();
        queue.extend(failures.iter().copied());
    }

    pub(crate) fn set_startup_surface_present(&self, present: bool) {
        self.startup_surface_present.store(present, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Assertions
    // ------------------------------------------------------------------

    pub(crate) fn js_log(&self) -> Vec<String> {
        self.js_log.lock().clone()
    }

    pub(crate) fn oobe_check_count(&self) -> usize {
        self.oobe_checks.load(Ordering::SeqCst)
    }

    pub(crate) fn ready_calls(&self) -> Vec<(u16, bool)> {
        self.ready_calls.lock().clone()
    }

    pub(crate) fn navigations(&self) -> Vec<String> {
        self.navigations.lock().clone()
    }

    fn next_signin_state(&self) -> i64 {
        let mut queue = self.signin_states.lock();
        match queue.pop_front() {
            Some(state) => {
                *self.last_signin.lock() = state;
                state
            }
            None => *self.last_signin.lock(),
        }
    }
}

#[async_trait]
impl Devtools for FakeDevtools {
    async fn wait_until_ready(&self, debug_port: u16, wait_for_extensions: bool) -> Result<()> {
        self.ready_calls.lock().push((debug_port, wait_for_extensions));
        if wait_for_extensions && self.extension_wait_fails.load(Ordering::SeqCst) {
            return Err(Error::timeout("extensions loaded", 30_000));
        }
        Ok(())
    }

    async fn oobe_exists(&self) -> Result<bool> {
        self.oobe_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.oobe_exists.load(Ordering::SeqCst))
    }

    async fn evaluate_oobe(&self, expr: &str) -> Result<Value> {
        self.js_log.lock().push(expr.to_string());

        if expr.contains("signinUIState_") {
            return Ok(json!(self.next_signin_state()));
        }
        if expr.contains("typeof Oobe !==") {
            return Ok(json!(self.oobe_defined.load(Ordering::SeqCst)));
        }
        if expr.contains("typeof Oobe.loginForTesting") {
            return Ok(json!(self.login_api_missing.load(Ordering::SeqCst)));
        }
        if expr.contains("guest-user-button") {
            if let Some(device) = &self.device {
                device.bump_browser_pid();
            }
            self.oobe_exists.store(false, Ordering::SeqCst);
            if let Some(failure) = self.guest_click_failure.lock().take() {
                return Err(failure.to_error());
            }
            return Ok(Value::Null);
        }
        Ok(Value::Null)
    }

    async fn execute_oobe(&self, stmt: &str) -> Result<()> {
        self.js_log.lock().push(stmt.to_string());

        if stmt.contains("Oobe.loginForTesting") {
            self.oobe_exists.store(false, Ordering::SeqCst);
            if let Some(device) = &self.device {
                device.set_cryptohome_mounted(true);
            }
        }
        Ok(())
    }

    async fn tab_count(&self) -> Result<usize> {
        Ok(self.tab_count.load(Ordering::SeqCst))
    }

    async fn open_tab(&self) -> Result<()> {
        self.tab_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn navigate_last_tab(&self, url: &str) -> Result<()> {
        if let Some(failure) = self.tab_failures.lock().pop_front() {
            return Err(failure.to_error());
        }
        self.navigations.lock().push(url.to_string());
        Ok(())
    }

    async fn close_startup_surface(&self) -> Result<bool> {
        Ok(self.startup_surface_present.swap(false, Ordering::SeqCst))
    }
}

// ============================================================================
// FakeForwarderFactory
// ============================================================================

pub(crate) struct FakeForwarderFactory {
    opened: Mutex<Vec<PortPair>>,
    closed: Arc<AtomicUsize>,
}

impl FakeForwarderFactory {
    pub(crate) fn new() -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn opened(&self) -> Vec<PortPair> {
        self.opened.lock().clone()
    }

    pub(crate) fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForwarderFactory for FakeForwarderFactory {
    async fn open(&self, pair: PortPair) -> Result<Box<dyn Forwarder>> {
        self.opened.lock().push(pair);
        Ok(Box::new(FakeForwarder {
            pair,
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct FakeForwarder {
    pair: PortPair,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl Forwarder for FakeForwarder {
    fn port_pair(&self) -> PortPair {
        self.pair
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
