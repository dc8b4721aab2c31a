//! Fallback backend for platforms without a window automation API we drive
//!
//! Every call fails, so the server still starts and reports a clear error for
//! each action instead of refusing to run.

use anyhow::{Result, bail};
use regex::Regex;
use std::path::Path;

use super::{Automation, ProcessHandle, WindowHandle};
use crate::keys::KeySequence;

pub struct UnsupportedAutomation;

const MSG: &str = "window automation is only available on macOS and Windows";

impl Automation for UnsupportedAutomation {
    fn attach(&self, _path: &Path) -> Result<Option<ProcessHandle>> {
        bail!(MSG)
    }

    fn launch(&self, _path: &Path) -> Result<ProcessHandle> {
        bail!(MSG)
    }

    fn windows(&self, _process: ProcessHandle, _title: Option<&Regex>) -> Result<Vec<WindowHandle>> {
        bail!(MSG)
    }

    fn window_title(&self, _window: WindowHandle) -> Result<String> {
        bail!(MSG)
    }

    fn is_minimized(&self, _window: WindowHandle) -> Result<bool> {
        bail!(MSG)
    }

    fn is_visible(&self, _window: WindowHandle) -> Result<bool> {
        bail!(MSG)
    }

    fn restore(&self, _window: WindowHandle) -> Result<()> {
        bail!(MSG)
    }

    fn set_focus(&self, _window: WindowHandle) -> Result<()> {
        bail!(MSG)
    }

    fn set_foreground(&self, _window: WindowHandle) -> Result<()> {
        bail!(MSG)
    }

    fn send_keys(&self, _window: WindowHandle, _keys: &KeySequence) -> Result<()> {
        bail!(MSG)
    }

    fn foreground_title(&self) -> Result<Option<String>> {
        Ok(None)
    }
}
