//! Recording automation backend for tests
//!
//! Never touches the OS. Every call is appended to a log that tests inspect.

use anyhow::{Result, bail};
use regex::Regex;
use std::path::Path;
use std::sync::Mutex;

use super::{Automation, ProcessHandle, WindowHandle};
use crate::keys::KeySequence;

pub const PID: u32 = 4242;

#[derive(Debug)]
struct MockState {
    calls: Vec<String>,
    running: bool,
    fail_launch: bool,
    /// Number of `windows` polls that fail before windows appear;
    /// `None` means every poll succeeds with an empty list
    failing_polls: Option<usize>,
    titles: Vec<String>,
    minimized: bool,
    visible: bool,
    /// Number of upcoming `send_keys` calls that fail
    failing_sends: usize,
    foreground: Option<String>,
    next_raw: isize,
}

pub struct MockAutomation {
    state: Mutex<MockState>,
}

impl MockAutomation {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                calls: Vec::new(),
                running: true,
                fail_launch: false,
                failing_polls: Some(0),
                titles: vec!["Player".to_string()],
                minimized: false,
                visible: true,
                failing_sends: 0,
                foreground: None,
                next_raw: 1,
            }),
        }
    }

    pub fn set_running(&self, running: bool) {
        self.state.lock().unwrap().running = running;
    }

    pub fn set_fail_launch(&self, fail: bool) {
        self.state.lock().unwrap().fail_launch = fail;
    }

    pub fn set_failing_polls(&self, polls: Option<usize>) {
        self.state.lock().unwrap().failing_polls = polls;
    }

    pub fn set_titles(&self, titles: &[&str]) {
        self.state.lock().unwrap().titles = titles.iter().map(|t| t.to_string()).collect();
    }

    pub fn set_minimized(&self, minimized: bool) {
        self.state.lock().unwrap().minimized = minimized;
    }

    pub fn set_visible(&self, visible: bool) {
        self.state.lock().unwrap().visible = visible;
    }

    pub fn fail_next_sends(&self, count: usize) {
        self.state.lock().unwrap().failing_sends = count;
    }

    pub fn set_foreground(&self, title: Option<&str>) {
        self.state.lock().unwrap().foreground = title.map(str::to_string);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| *c == name || c.starts_with(&format!("{}:", name)))
            .count()
    }

    pub fn sent_keys(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.strip_prefix("send_keys:").map(str::to_string))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn note(&self, call: impl Into<String>) {
        self.state.lock().unwrap().calls.push(call.into());
    }
}

impl Automation for MockAutomation {
    fn attach(&self, _path: &Path) -> Result<Option<ProcessHandle>> {
        self.note("attach");
        let running = self.state.lock().unwrap().running;
        Ok(running.then_some(ProcessHandle { pid: PID }))
    }

    fn launch(&self, path: &Path) -> Result<ProcessHandle> {
        self.note("launch");
        let mut state = self.state.lock().unwrap();
        if state.fail_launch {
            bail!("Failed to launch {}", path.display());
        }
        state.running = true;
        Ok(ProcessHandle { pid: PID })
    }

    fn windows(&self, process: ProcessHandle, title: Option<&Regex>) -> Result<Vec<WindowHandle>> {
        self.note("windows");
        let mut state = self.state.lock().unwrap();
        match state.failing_polls {
            None => return Ok(Vec::new()),
            Some(0) => {}
            Some(n) => {
                state.failing_polls = Some(n - 1);
                bail!("window list not ready");
            }
        }

        // Fresh raw ids each time, like a window that was recreated
        let base = state.next_raw;
        state.next_raw += state.titles.len() as isize;
        Ok(state
            .titles
            .iter()
            .enumerate()
            .filter(|(_, t)| title.is_none_or(|re| re.is_match(t)))
            .map(|(i, _)| WindowHandle {
                pid: process.pid,
                raw: base + i as isize,
            })
            .collect())
    }

    fn window_title(&self, window: WindowHandle) -> Result<String> {
        let state = self.state.lock().unwrap();
        let base = state.next_raw - state.titles.len() as isize;
        let idx = (window.raw - base).max(0) as usize;
        Ok(state.titles.get(idx).cloned().unwrap_or_default())
    }

    fn is_minimized(&self, _window: WindowHandle) -> Result<bool> {
        Ok(self.state.lock().unwrap().minimized)
    }

    fn is_visible(&self, _window: WindowHandle) -> Result<bool> {
        Ok(self.state.lock().unwrap().visible)
    }

    fn restore(&self, _window: WindowHandle) -> Result<()> {
        self.note("restore");
        Ok(())
    }

    fn set_focus(&self, _window: WindowHandle) -> Result<()> {
        self.note("set_focus");
        Ok(())
    }

    fn set_foreground(&self, _window: WindowHandle) -> Result<()> {
        self.note("set_foreground");
        Ok(())
    }

    fn send_keys(&self, _window: WindowHandle, keys: &KeySequence) -> Result<()> {
        self.note(format!("send_keys:{}", keys.as_str()));
        let mut state = self.state.lock().unwrap();
        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            bail!("stale window handle");
        }
        Ok(())
    }

    fn foreground_title(&self) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().foreground.clone())
    }
}
