//! Application session
//!
//! Holds the connection to one external application and its main window.
//! The process and window handles are resolved lazily on the first action,
//! replaced wholesale on reconnect, and never released explicitly: when the
//! application exits the next failed dispatch is what notices.
//!
//! A failed dispatch is retried exactly once after re-locating the window,
//! which covers the usual cause (the application recreated its window, for
//! example while switching to fullscreen) without masking a process that is
//! gone for good.

use anyhow::Context;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::automation::{Automation, ProcessHandle, WindowHandle};
use crate::error::{Error, Result};
use crate::keys::KeySequence;
use crate::shortcuts::ShortcutConfig;

/// Action whose successful dispatch flips the fullscreen flag
pub const FULLSCREEN_ACTION: &str = "fullscreen";

// ============================================================================
// Options, State, Outcome
// ============================================================================

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// How long to wait for a window to appear
    pub wait_time: Duration,
    /// Delay between window list polls
    pub poll_interval: Duration,
    /// Pause after restoring a minimized or hidden window
    pub restore_settle: Duration,
    /// Only accept windows whose title matches
    pub window_title: Option<Regex>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            wait_time: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            restore_settle: Duration::from_secs(1),
            window_title: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Sent on the first attempt
    Sent,
    /// Sent after re-locating the window
    Recovered,
    /// No key sequence mapped; nothing was sent
    Unknown,
}

/// Shared read handle on the session's fullscreen flag
///
/// The flag only mirrors what we *think* the application is doing: it flips
/// whenever the fullscreen action is sent successfully and is never checked
/// against the real window state.
#[derive(Debug, Clone, Default)]
pub struct FullscreenFlag(Arc<AtomicBool>);

impl FullscreenFlag {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Flip the flag and return the new value
    fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::SeqCst)
    }
}

// ============================================================================
// ApplicationSession
// ============================================================================

pub struct ApplicationSession {
    app_name: String,
    app_path: PathBuf,
    shortcuts: HashMap<String, KeySequence>,
    automation: Arc<dyn Automation>,
    options: SessionOptions,
    process: Option<ProcessHandle>,
    window: Option<WindowHandle>,
    fullscreen: FullscreenFlag,
    state: SessionState,
}

impl ApplicationSession {
    /// Build a disconnected session for `app_name`
    pub fn new(
        app_name: &str,
        config: &ShortcutConfig,
        automation: Arc<dyn Automation>,
        options: SessionOptions,
    ) -> Result<Self> {
        let entry = config.app(app_name)?;

        let mut shortcuts = HashMap::with_capacity(entry.shortcuts.len());
        for (action, seq) in &entry.shortcuts {
            let keys = KeySequence::parse(seq).map_err(|e| {
                Error::config(format!("bad key sequence for {}.{}: {}", app_name, action, e))
            })?;
            shortcuts.insert(action.clone(), keys);
        }

        Ok(Self {
            app_name: app_name.to_string(),
            app_path: entry.app_path.clone(),
            shortcuts,
            automation,
            options,
            process: None,
            window: None,
            fullscreen: FullscreenFlag::default(),
            state: SessionState::Disconnected,
        })
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen.get()
    }

    pub fn fullscreen_flag(&self) -> FullscreenFlag {
        self.fullscreen.clone()
    }

    /// Configured action names, sorted
    pub fn actions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shortcuts.keys().cloned().collect();
        names.sort();
        names
    }

    /// Attach to a running instance (or launch one) and resolve its window
    ///
    /// Not guarded: calling it again re-attaches and re-resolves.
    pub fn connect(&mut self) -> Result<()> {
        self.state = SessionState::Connecting;
        match self.try_connect() {
            Ok(()) => {
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Disconnected;
                log::error!("❌ Failed to connect to '{}': {}", self.app_name, e);
                Err(e)
            }
        }
    }

    fn try_connect(&mut self) -> Result<()> {
        let path = &self.app_path;
        let process = match self.automation.attach(path) {
            Ok(Some(process)) => {
                log::info!("Attached to '{}' (pid {})", self.app_name, process.pid);
                process
            }
            Ok(None) => {
                log::info!("'{}' is not running; launching {}", self.app_name, path.display());
                self.automation
                    .launch(path)
                    .map_err(|e| Error::process(path, &e))?
            }
            Err(e) => return Err(Error::process(path, &e)),
        };

        let window = self.find_window(
            process,
            self.options.wait_time,
            self.options.poll_interval,
            self.options.window_title.as_ref(),
        )?;

        self.process = Some(process);
        self.window = Some(window);
        Ok(())
    }

    /// Re-resolve the window with the configured options
    pub fn refresh(&mut self) -> Result<WindowHandle> {
        let process = self.attached_process()?;
        let window = self.find_window(
            process,
            self.options.wait_time,
            self.options.poll_interval,
            self.options.window_title.as_ref(),
        )?;
        self.window = Some(window);
        Ok(window)
    }

    /// Poll for a window of the attached process, restore it if needed and
    /// give it focus
    pub fn locate_window(
        &mut self,
        timeout: Duration,
        poll_interval: Duration,
        title: Option<&Regex>,
    ) -> Result<WindowHandle> {
        let process = self.attached_process()?;
        let window = self.find_window(process, timeout, poll_interval, title)?;
        self.window = Some(window);
        Ok(window)
    }

    fn attached_process(&self) -> Result<ProcessHandle> {
        self.process.ok_or_else(|| Error::Process {
            path: self.app_path.clone(),
            reason: "not attached to a process".to_string(),
        })
    }

    fn find_window(
        &self,
        process: ProcessHandle,
        timeout: Duration,
        poll_interval: Duration,
        title: Option<&Regex>,
    ) -> Result<WindowHandle> {
        let window = self.wait_for_window(process, timeout, poll_interval, title)?;
        let os = &self.automation;

        if os.is_minimized(window).unwrap_or(false) {
            log::info!("Window is minimized; restoring...");
            if let Err(e) = os.restore(window) {
                log::warn!("Restore failed: {:#}", e);
            }
            thread::sleep(self.options.restore_settle);
        }

        if !os.is_visible(window).unwrap_or(true) {
            log::info!("Window is hidden; attempting to restore...");
            if let Err(e) = os.restore(window) {
                log::warn!("Restore failed: {:#}", e);
            }
            thread::sleep(self.options.restore_settle);
        }

        if let Err(e) = os.set_focus(window) {
            log::warn!("Could not focus window: {:#}", e);
        }
        Ok(window)
    }

    fn wait_for_window(
        &self,
        process: ProcessHandle,
        timeout: Duration,
        poll_interval: Duration,
        title: Option<&Regex>,
    ) -> Result<WindowHandle> {
        let start = Instant::now();
        loop {
            match self.automation.windows(process, title) {
                Ok(windows) => {
                    if let Some(&window) = windows.first() {
                        let name = self.automation.window_title(window).unwrap_or_default();
                        log::info!("Window found: {}", name);
                        return Ok(window);
                    }
                }
                Err(e) => log::debug!("Window enumeration failed: {:#}", e),
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                break;
            }
            log::debug!("Waiting for window... ({:.1}s)", elapsed.as_secs_f64());
            thread::sleep(poll_interval.min(timeout - elapsed));
        }

        Err(Error::WindowTimeout {
            app: self.app_name.clone(),
            waited: start.elapsed(),
        })
    }

    /// Send the key sequence mapped to `action`
    ///
    /// Connects first if needed. An unmapped action is logged and ignored.
    pub fn perform(&mut self, action: &str) -> Result<ActionOutcome> {
        if !self.is_connected() {
            self.connect()?;
        }

        let keys = match self.lookup(action) {
            Ok(keys) => keys.clone(),
            Err(e) => {
                log::warn!("{}", e);
                return Ok(ActionOutcome::Unknown);
            }
        };

        let window = match self.window {
            Some(window) => window,
            None => self.refresh()?,
        };

        let outcome = match self.dispatch(window, &keys) {
            Ok(()) => ActionOutcome::Sent,
            Err(first) => {
                log::warn!(
                    "Error sending action '{}': {:#}. Refreshing window handle...",
                    action,
                    first
                );
                let window = self.refresh()?;
                if let Err(second) = self.dispatch(window, &keys) {
                    let err = Error::dispatch(action, &second);
                    log::error!("❌ {}", err);
                    return Err(err);
                }
                ActionOutcome::Recovered
            }
        };

        log::info!("✅ Sent '{}' ({})", action, keys);
        if action == FULLSCREEN_ACTION {
            let now = self.fullscreen.toggle();
            log::debug!("Fullscreen flag is now {} (assumed)", now);
        }
        Ok(outcome)
    }

    fn lookup(&self, action: &str) -> Result<&KeySequence> {
        self.shortcuts
            .get(action)
            .filter(|keys| !keys.is_empty())
            .ok_or_else(|| Error::UnknownAction(action.to_string()))
    }

    fn dispatch(&self, window: WindowHandle, keys: &KeySequence) -> anyhow::Result<()> {
        let os = &self.automation;
        os.set_focus(window).context("set_focus")?;
        os.set_foreground(window).context("set_foreground")?;
        os.send_keys(window, keys).context("send_keys")
    }
}
