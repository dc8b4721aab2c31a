//! macOS backend: NSWorkspace for processes, Accessibility for windows,
//! CoreGraphics events for keystrokes
//!
//! Window handles carry the window's position in the application's
//! `AXWindows` list, so every call looks the window up again and fails with a
//! stale-handle error when the list has shrunk underneath us.

mod ffi;
mod keycodes;

use anyhow::{Result, anyhow, bail};
use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation, CGKeyCode};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use objc2::runtime::AnyObject;
use objc2::{class, msg_send};
use regex::Regex;
use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use self::ffi::AXElement;
use super::{Automation, ProcessHandle, WindowHandle, same_executable, spawn_process};
use crate::keys::{Key, KeySequence, KeyStroke, Modifiers};

/// Pause between key down and key up, and between strokes
const KEY_DELAY: Duration = Duration::from_millis(10);
/// How long `open` gets to bring an app bundle up before we give up attaching
const BUNDLE_LAUNCH_WAIT: Duration = Duration::from_secs(10);

/// NSApplicationActivateIgnoringOtherApps
const ACTIVATE_IGNORING_OTHER_APPS: usize = 1 << 1;

pub struct MacAutomation;

impl MacAutomation {
    pub fn new() -> Self {
        if !unsafe { ffi::AXIsProcessTrusted() } {
            log::warn!(
                "Accessibility permissions not granted; window control will fail until \
                enabled in System Settings > Privacy & Security > Accessibility"
            );
        }
        MacAutomation
    }

    fn window(&self, window: WindowHandle) -> Result<AXElement> {
        let app = AXElement::application(window.pid)?;
        let mut windows = app.children("AXWindows")?;
        let idx = usize::try_from(window.raw).map_err(|_| anyhow!("window handle is stale"))?;
        if idx >= windows.len() {
            bail!("window handle is stale");
        }
        Ok(windows.swap_remove(idx))
    }
}

// ============================================================================
// NSWorkspace Helpers
// ============================================================================

unsafe fn nsstring_to_string(ns_string: *mut AnyObject) -> Option<String> {
    if ns_string.is_null() {
        return None;
    }
    let utf8: *const libc::c_char = unsafe { msg_send![ns_string, UTF8String] };
    if utf8.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(utf8) }.to_string_lossy().into_owned())
}

unsafe fn url_path(url: *mut AnyObject) -> Option<PathBuf> {
    if url.is_null() {
        return None;
    }
    let path: *mut AnyObject = unsafe { msg_send![url, path] };
    unsafe { nsstring_to_string(path) }.map(PathBuf::from)
}

/// Pid of the first running application whose executable or bundle is `path`
unsafe fn find_running_pid(path: &Path) -> Option<i32> {
    unsafe {
        let workspace: *mut AnyObject = msg_send![class!(NSWorkspace), sharedWorkspace];
        if workspace.is_null() {
            return None;
        }
        let running_apps: *mut AnyObject = msg_send![workspace, runningApplications];
        if running_apps.is_null() {
            return None;
        }
        let count: usize = msg_send![running_apps, count];

        for i in 0..count {
            let app: *mut AnyObject = msg_send![running_apps, objectAtIndex: i];
            if app.is_null() {
                continue;
            }
            let executable = url_path(msg_send![app, executableURL]);
            let bundle = url_path(msg_send![app, bundleURL]);
            let matches = [executable, bundle]
                .iter()
                .flatten()
                .any(|candidate| same_executable(candidate, path));
            if matches {
                return Some(msg_send![app, processIdentifier]);
            }
        }
        None
    }
}

unsafe fn running_app(pid: u32) -> Result<*mut AnyObject> {
    let app: *mut AnyObject = unsafe {
        msg_send![
            class!(NSRunningApplication),
            runningApplicationWithProcessIdentifier: pid as i32
        ]
    };
    if app.is_null() {
        bail!("No running application with pid {}", pid);
    }
    Ok(app)
}

// ============================================================================
// Keystrokes
// ============================================================================

fn event_flags(modifiers: Modifiers) -> CGEventFlags {
    let mut flags = CGEventFlags::CGEventFlagNull;
    if modifiers.shift {
        flags |= CGEventFlags::CGEventFlagShift;
    }
    if modifiers.ctrl {
        flags |= CGEventFlags::CGEventFlagControl;
    }
    if modifiers.alt {
        flags |= CGEventFlags::CGEventFlagAlternate;
    }
    flags
}

fn post_key(source: &CGEventSource, code: CGKeyCode, flags: CGEventFlags, text: Option<&str>) -> Result<()> {
    for down in [true, false] {
        let event = CGEvent::new_keyboard_event(source.clone(), code, down)
            .map_err(|_| anyhow!("Failed to create keyboard event"))?;
        event.set_flags(flags);
        if let Some(text) = text {
            event.set_string(text);
        }
        event.post(CGEventTapLocation::HID);
        std::thread::sleep(KEY_DELAY);
    }
    Ok(())
}

fn post_stroke(source: &CGEventSource, stroke: &KeyStroke) -> Result<()> {
    match stroke.key {
        Key::Named(key) => {
            let code = keycodes::named_key_code(key)
                .ok_or_else(|| anyhow!("'{}' has no key code on macOS", stroke.key))?;
            post_key(source, code, event_flags(stroke.modifiers), None)
        }
        Key::Char(c) => match keycodes::char_key_code(c) {
            Some((code, needs_shift)) => {
                let mods = Modifiers {
                    shift: stroke.modifiers.shift || needs_shift,
                    ..stroke.modifiers
                };
                post_key(source, code, event_flags(mods), None)
            }
            // Outside the US layout: type it as text
            None if stroke.modifiers.is_empty() => {
                post_key(source, 0, CGEventFlags::CGEventFlagNull, Some(&c.to_string()))
            }
            None => bail!("cannot combine modifiers with '{}'", c),
        },
    }
}

// ============================================================================
// Automation
// ============================================================================

impl Automation for MacAutomation {
    fn attach(&self, path: &Path) -> Result<Option<ProcessHandle>> {
        let pid = unsafe { find_running_pid(path) };
        Ok(pid.map(|pid| ProcessHandle { pid: pid as u32 }))
    }

    fn launch(&self, path: &Path) -> Result<ProcessHandle> {
        if path.extension().is_none_or(|ext| ext != "app") {
            return spawn_process(path);
        }

        let status = Command::new("open").arg(path).status()?;
        if !status.success() {
            bail!("Failed to launch {}: open exited with {}", path.display(), status);
        }
        let start = Instant::now();
        while start.elapsed() < BUNDLE_LAUNCH_WAIT {
            if let Some(process) = self.attach(path)? {
                log::info!("Launched {} (pid {})", path.display(), process.pid);
                return Ok(process);
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        bail!("{} did not start within {:?}", path.display(), BUNDLE_LAUNCH_WAIT)
    }

    fn windows(&self, process: ProcessHandle, title: Option<&Regex>) -> Result<Vec<WindowHandle>> {
        let app = AXElement::application(process.pid)?;
        let windows = app.children("AXWindows")?;
        Ok(windows
            .iter()
            .enumerate()
            .filter(|(_, w)| {
                title.is_none_or(|re| re.is_match(&w.string("AXTitle").unwrap_or_default()))
            })
            .map(|(i, _)| WindowHandle {
                pid: process.pid,
                raw: i as isize,
            })
            .collect())
    }

    fn window_title(&self, window: WindowHandle) -> Result<String> {
        self.window(window)?.string("AXTitle")
    }

    fn is_minimized(&self, window: WindowHandle) -> Result<bool> {
        self.window(window)?.boolean("AXMinimized")
    }

    fn is_visible(&self, window: WindowHandle) -> Result<bool> {
        let app = unsafe { running_app(window.pid)? };
        let hidden: bool = unsafe { msg_send![app, isHidden] };
        Ok(!hidden)
    }

    fn restore(&self, window: WindowHandle) -> Result<()> {
        let element = self.window(window)?;
        unsafe {
            let app = running_app(window.pid)?;
            let _: bool = msg_send![app, unhide];
        }
        element.set_boolean("AXMinimized", false)
    }

    fn set_focus(&self, window: WindowHandle) -> Result<()> {
        let element = self.window(window)?;
        element.perform("AXRaise")?;
        if let Err(e) = element.set_boolean("AXMain", true) {
            log::debug!("Could not mark window as main: {:#}", e);
        }
        Ok(())
    }

    fn set_foreground(&self, window: WindowHandle) -> Result<()> {
        let activated: bool = unsafe {
            let app = running_app(window.pid)?;
            msg_send![app, activateWithOptions: ACTIVATE_IGNORING_OTHER_APPS]
        };
        if !activated {
            bail!("Failed to activate pid {}", window.pid);
        }
        Ok(())
    }

    fn send_keys(&self, window: WindowHandle, keys: &KeySequence) -> Result<()> {
        // Confirm the window still exists before typing into whatever has focus
        self.window(window)?;
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| anyhow!("Failed to create CGEventSource"))?;
        for stroke in keys.strokes() {
            post_stroke(&source, stroke)?;
        }
        log::debug!("Sent {} stroke(s): {}", keys.strokes().len(), keys);
        Ok(())
    }

    fn foreground_title(&self) -> Result<Option<String>> {
        let system_wide = AXElement::system_wide()?;
        let Ok(app) = system_wide.element("AXFocusedApplication") else {
            return Ok(None);
        };
        let Ok(window) = app.element("AXFocusedWindow") else {
            return Ok(None);
        };
        let title = window.string("AXTitle").unwrap_or_default();
        Ok((!title.is_empty()).then_some(title))
    }
}
