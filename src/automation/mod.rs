//! OS automation surface
//!
//! Everything the session needs from the operating system goes through the
//! [`Automation`] trait: finding and launching the target process, listing
//! its windows, restoring and focusing them, and typing key sequences.
//!
//! One backend is compiled per platform. `platform()` returns it.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use crate::keys::KeySequence;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(windows)]
mod win32;
#[cfg(not(any(target_os = "macos", windows)))]
mod unsupported;

#[cfg(test)]
pub mod mock;

// ============================================================================
// Handles
// ============================================================================

/// An attached or launched process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessHandle {
    pub pid: u32,
}

/// A top-level window of a process
///
/// `raw` is backend specific: an HWND on Windows, a position in the
/// application's AX window list on macOS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle {
    pub pid: u32,
    pub raw: isize,
}

// ============================================================================
// Automation Trait
// ============================================================================

pub trait Automation: Send + Sync {
    /// Find a running instance by executable path; `None` when not running
    fn attach(&self, path: &Path) -> Result<Option<ProcessHandle>>;

    /// Start a new instance of the executable
    fn launch(&self, path: &Path) -> Result<ProcessHandle> {
        spawn_process(path)
    }

    /// Top-level windows of the process, hidden and minimized ones included
    fn windows(&self, process: ProcessHandle, title: Option<&Regex>) -> Result<Vec<WindowHandle>>;

    fn window_title(&self, window: WindowHandle) -> Result<String>;

    fn is_minimized(&self, window: WindowHandle) -> Result<bool>;

    fn is_visible(&self, window: WindowHandle) -> Result<bool>;

    fn restore(&self, window: WindowHandle) -> Result<()>;

    /// Give the window keyboard focus
    fn set_focus(&self, window: WindowHandle) -> Result<()>;

    /// Make the window the system foreground window
    fn set_foreground(&self, window: WindowHandle) -> Result<()>;

    /// Type the sequence into the (focused) window
    fn send_keys(&self, window: WindowHandle, keys: &KeySequence) -> Result<()>;

    /// Title of whatever window currently has the foreground
    fn foreground_title(&self) -> Result<Option<String>>;
}

/// Backend for the platform we were compiled for
pub fn platform() -> Arc<dyn Automation> {
    #[cfg(target_os = "macos")]
    {
        Arc::new(macos::MacAutomation::new())
    }
    #[cfg(windows)]
    {
        Arc::new(win32::WinAutomation::new())
    }
    #[cfg(not(any(target_os = "macos", windows)))]
    {
        Arc::new(unsupported::UnsupportedAutomation)
    }
}

/// Launch an executable directly and return its pid
pub fn spawn_process(path: &Path) -> Result<ProcessHandle> {
    let child = Command::new(path)
        .spawn()
        .with_context(|| format!("Failed to launch {}", path.display()))?;
    log::info!("Launched {} (pid {})", path.display(), child.id());
    Ok(ProcessHandle { pid: child.id() })
}

/// Compare executable paths the way the host file system does
pub fn same_executable(a: &Path, b: &Path) -> bool {
    if cfg!(any(windows, target_os = "macos")) {
        a.to_string_lossy()
            .eq_ignore_ascii_case(&b.to_string_lossy())
    } else {
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_missing_executable_fails() {
        let err = spawn_process(Path::new("/no/such/player-binary")).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to launch"));
    }

    #[test]
    fn test_same_executable() {
        assert!(same_executable(Path::new("/a/b"), Path::new("/a/b")));
        assert!(!same_executable(Path::new("/a/b"), Path::new("/a/c")));
    }
}
