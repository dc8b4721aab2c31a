//! Windows backend: Win32 window management and `SendInput` keystrokes

use anyhow::{Result, bail};
use regex::Regex;
use std::mem;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ::windows::Win32::Foundation::{BOOL, CloseHandle, FALSE, HWND, LPARAM, TRUE};
use ::windows::Win32::System::ProcessStatus::EnumProcesses;
use ::windows::Win32::System::Threading::{
    OpenProcess, PROCESS_NAME_FORMAT, PROCESS_QUERY_LIMITED_INFORMATION,
    QueryFullProcessImageNameW,
};
use ::windows::Win32::UI::Input::KeyboardAndMouse::*;
use ::windows::Win32::UI::WindowsAndMessaging::{
    BringWindowToTop, EnumWindows, GetForegroundWindow, GetWindowTextW,
    GetWindowThreadProcessId, IsIconic, IsWindow, IsWindowVisible, SW_RESTORE,
    SetForegroundWindow, ShowWindow,
};
use ::windows::core::PWSTR;

use super::{Automation, ProcessHandle, WindowHandle, same_executable};
use crate::keys::{Key, KeySequence, KeyStroke, Modifiers, NamedKey};

/// Pause between strokes so slow applications keep up
const STROKE_DELAY: Duration = Duration::from_millis(10);

pub struct WinAutomation;

impl WinAutomation {
    pub fn new() -> Self {
        WinAutomation
    }
}

fn hwnd(window: WindowHandle) -> HWND {
    HWND(window.raw as *mut _)
}

// ============================================================================
// Process / Window Enumeration
// ============================================================================

unsafe fn process_ids() -> Vec<u32> {
    let mut pids = vec![0u32; 4096];
    let mut needed = 0u32;
    let size = (pids.len() * mem::size_of::<u32>()) as u32;
    if unsafe { EnumProcesses(pids.as_mut_ptr(), size, &mut needed) }.is_err() {
        return Vec::new();
    }
    pids.truncate(needed as usize / mem::size_of::<u32>());
    pids
}

unsafe fn image_path(pid: u32) -> Option<PathBuf> {
    if pid == 0 {
        return None;
    }
    let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, FALSE, pid) }.ok()?;
    let mut buf = [0u16; 1024];
    let mut len = buf.len() as u32;
    let ok = unsafe {
        QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_FORMAT(0),
            PWSTR(buf.as_mut_ptr()),
            &mut len,
        )
    };
    let _ = unsafe { CloseHandle(handle) };
    ok.ok()?;
    Some(PathBuf::from(String::from_utf16_lossy(&buf[..len as usize])))
}

unsafe extern "system" fn enum_windows_cb(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let vec = unsafe { &mut *(lparam.0 as *mut Vec<isize>) };
    vec.push(hwnd.0 as isize);
    TRUE
}

unsafe fn top_level_windows() -> Vec<isize> {
    let mut hwnds: Vec<isize> = Vec::new();
    let _ = unsafe {
        EnumWindows(
            Some(enum_windows_cb),
            LPARAM(&mut hwnds as *mut Vec<isize> as isize),
        )
    };
    hwnds
}

unsafe fn text_of(hwnd: HWND) -> String {
    let mut buf = [0u16; 512];
    let len = unsafe { GetWindowTextW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..len.max(0) as usize])
}

// ============================================================================
// Keystrokes
// ============================================================================

fn named_vk(key: NamedKey) -> VIRTUAL_KEY {
    match key {
        NamedKey::Space => VK_SPACE,
        NamedKey::Enter => VK_RETURN,
        NamedKey::Tab => VK_TAB,
        NamedKey::Escape => VK_ESCAPE,
        NamedKey::Backspace => VK_BACK,
        NamedKey::Delete => VK_DELETE,
        NamedKey::Insert => VK_INSERT,
        NamedKey::Home => VK_HOME,
        NamedKey::End => VK_END,
        NamedKey::PageUp => VK_PRIOR,
        NamedKey::PageDown => VK_NEXT,
        NamedKey::Up => VK_UP,
        NamedKey::Down => VK_DOWN,
        NamedKey::Left => VK_LEFT,
        NamedKey::Right => VK_RIGHT,
        NamedKey::F(n) => VIRTUAL_KEY(VK_F1.0 + u16::from(n) - 1),
        NamedKey::VolumeUp => VK_VOLUME_UP,
        NamedKey::VolumeDown => VK_VOLUME_DOWN,
        NamedKey::VolumeMute => VK_VOLUME_MUTE,
        NamedKey::MediaPlayPause => VK_MEDIA_PLAY_PAUSE,
        NamedKey::MediaNextTrack => VK_MEDIA_NEXT_TRACK,
        NamedKey::MediaPrevTrack => VK_MEDIA_PREV_TRACK,
        NamedKey::MediaStop => VK_MEDIA_STOP,
    }
}

/// Extended flag needed for navigation keys
fn is_extended_key(vk: VIRTUAL_KEY) -> bool {
    matches!(
        vk,
        VK_UP | VK_DOWN | VK_LEFT | VK_RIGHT | VK_INSERT | VK_DELETE | VK_HOME | VK_END
            | VK_PRIOR | VK_NEXT
    )
}

fn keyboard_input(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn vk_press(inputs: &mut Vec<INPUT>, vk: VIRTUAL_KEY, down: bool) {
    let mut flags = if is_extended_key(vk) {
        KEYEVENTF_EXTENDEDKEY
    } else {
        KEYBD_EVENT_FLAGS(0)
    };
    if !down {
        flags |= KEYEVENTF_KEYUP;
    }
    inputs.push(keyboard_input(vk, 0, flags));
}

fn modifier_vks(modifiers: Modifiers) -> Vec<VIRTUAL_KEY> {
    let mut vks = Vec::new();
    if modifiers.ctrl {
        vks.push(VK_CONTROL);
    }
    if modifiers.alt {
        vks.push(VK_MENU);
    }
    if modifiers.shift {
        vks.push(VK_SHIFT);
    }
    vks
}

/// Build the INPUT events for one stroke
fn stroke_inputs(stroke: &KeyStroke) -> Result<Vec<INPUT>> {
    let mut inputs = Vec::new();

    let (mods, vk) = match stroke.key {
        Key::Named(key) => (stroke.modifiers, named_vk(key)),
        Key::Char(c) if stroke.modifiers.is_empty() => {
            // Plain characters go in as Unicode so layout does not matter
            let mut units = [0u16; 2];
            for &unit in c.encode_utf16(&mut units).iter() {
                inputs.push(keyboard_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE));
                inputs.push(keyboard_input(
                    VIRTUAL_KEY(0),
                    unit,
                    KEYEVENTF_UNICODE | KEYEVENTF_KEYUP,
                ));
            }
            return Ok(inputs);
        }
        Key::Char(c) => {
            let mut units = [0u16; 2];
            let encoded = c.encode_utf16(&mut units);
            if encoded.len() != 1 {
                bail!("cannot combine modifiers with '{}'", c);
            }
            let scan = unsafe { VkKeyScanW(encoded[0]) };
            if scan == -1 {
                bail!("no key on the current layout types '{}'", c);
            }
            let shift_state = (scan >> 8) & 0xff;
            let mods = Modifiers {
                shift: stroke.modifiers.shift || shift_state & 1 != 0,
                ctrl: stroke.modifiers.ctrl || shift_state & 2 != 0,
                alt: stroke.modifiers.alt || shift_state & 4 != 0,
            };
            (mods, VIRTUAL_KEY((scan & 0xff) as u16))
        }
    };

    let mods = modifier_vks(mods);
    for &m in &mods {
        vk_press(&mut inputs, m, true);
    }
    vk_press(&mut inputs, vk, true);
    vk_press(&mut inputs, vk, false);
    for &m in mods.iter().rev() {
        vk_press(&mut inputs, m, false);
    }
    Ok(inputs)
}

// ============================================================================
// Automation
// ============================================================================

impl Automation for WinAutomation {
    fn attach(&self, path: &Path) -> Result<Option<ProcessHandle>> {
        let found = unsafe { process_ids() }.into_iter().find(|&pid| {
            unsafe { image_path(pid) }.is_some_and(|image| same_executable(&image, path))
        });
        Ok(found.map(|pid| ProcessHandle { pid }))
    }

    fn windows(&self, process: ProcessHandle, title: Option<&Regex>) -> Result<Vec<WindowHandle>> {
        let mut found: Vec<(bool, WindowHandle)> = Vec::new();
        for raw in unsafe { top_level_windows() } {
            let h = HWND(raw as *mut _);
            let mut pid = 0u32;
            unsafe { GetWindowThreadProcessId(h, Some(&mut pid)) };
            if pid != process.pid {
                continue;
            }
            let text = unsafe { text_of(h) };
            if title.is_some_and(|re| !re.is_match(&text)) {
                continue;
            }
            // Titled, visible windows first; IME helpers and the like sink
            let likely_main = !text.is_empty() && unsafe { IsWindowVisible(h) }.as_bool();
            found.push((!likely_main, WindowHandle { pid, raw }));
        }
        found.sort_by_key(|(rank, _)| *rank);
        Ok(found.into_iter().map(|(_, w)| w).collect())
    }

    fn window_title(&self, window: WindowHandle) -> Result<String> {
        Ok(unsafe { text_of(hwnd(window)) })
    }

    fn is_minimized(&self, window: WindowHandle) -> Result<bool> {
        Ok(unsafe { IsIconic(hwnd(window)) }.as_bool())
    }

    fn is_visible(&self, window: WindowHandle) -> Result<bool> {
        Ok(unsafe { IsWindowVisible(hwnd(window)) }.as_bool())
    }

    fn restore(&self, window: WindowHandle) -> Result<()> {
        let _ = unsafe { ShowWindow(hwnd(window), SW_RESTORE) };
        Ok(())
    }

    fn set_focus(&self, window: WindowHandle) -> Result<()> {
        let h = hwnd(window);
        if !unsafe { IsWindow(h) }.as_bool() {
            bail!("window handle is no longer valid");
        }
        if unsafe { IsIconic(h) }.as_bool() {
            let _ = unsafe { ShowWindow(h, SW_RESTORE) };
        }
        let _ = unsafe { BringWindowToTop(h) };
        Ok(())
    }

    fn set_foreground(&self, window: WindowHandle) -> Result<()> {
        let h = hwnd(window);
        if !unsafe { SetForegroundWindow(h) }.as_bool() {
            bail!("SetForegroundWindow refused");
        }
        Ok(())
    }

    fn send_keys(&self, window: WindowHandle, keys: &KeySequence) -> Result<()> {
        if !unsafe { IsWindow(hwnd(window)) }.as_bool() {
            bail!("window handle is no longer valid");
        }
        for stroke in keys.strokes() {
            let inputs = stroke_inputs(stroke)?;
            let sent = unsafe { SendInput(&inputs, mem::size_of::<INPUT>() as i32) };
            if sent as usize != inputs.len() {
                bail!("SendInput delivered {} of {} events", sent, inputs.len());
            }
            std::thread::sleep(STROKE_DELAY);
        }
        log::debug!("Sent {} stroke(s): {}", keys.strokes().len(), keys);
        Ok(())
    }

    fn foreground_title(&self) -> Result<Option<String>> {
        let h = unsafe { GetForegroundWindow() };
        if h.0.is_null() {
            return Ok(None);
        }
        let text = unsafe { text_of(h) };
        Ok((!text.is_empty()).then_some(text))
    }
}
