//! Windows 全局热键后端
//!
//! 使用 `RegisterHotKey` 注册组合，通过线程消息队列中的 `WM_HOTKEY` 接收触发。
//! 注册与轮询必须在同一线程上进行。

use std::collections::BTreeMap;

use tracing::{debug, warn};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    HOT_KEY_MODIFIERS, MAPVK_VSC_TO_VK, MOD_ALT, MOD_CONTROL, MOD_NOREPEAT, MOD_SHIFT,
    MapVirtualKeyW, RegisterHotKey, UnregisterHotKey, VK_DECIMAL, VK_NUMLOCK, VK_NUMPAD0,
    VK_NUMPAD1,
};
use windows::Win32::UI::WindowsAndMessaging::{MSG, PM_REMOVE, PeekMessageW, WM_HOTKEY, WaitMessage};

use super::HotkeyBackend;
use crate::hotkey::error::{HotkeyError, HotkeyResult};
use crate::hotkey::types::{Hotkey, HotkeyId, Scancode};

/// 基于 Win32 全局热键的后端
#[derive(Debug, Default)]
pub struct WindowsBackend {
    registered: BTreeMap<HotkeyId, Hotkey>,
}

impl WindowsBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn modifiers(hotkey: &Hotkey) -> HOT_KEY_MODIFIERS {
    let mut mods = MOD_NOREPEAT;
    if hotkey.mods.ctrl() {
        mods |= MOD_CONTROL;
    }
    if hotkey.mods.alt() {
        mods |= MOD_ALT;
    }
    if hotkey.mods.shift() {
        mods |= MOD_SHIFT;
    }
    mods
}

/// 热键对应的虚拟键码
///
/// NumLock 打开时小键盘扫描码映射到数字键，其余按键由原始扫描码换算。
fn virtual_key(hotkey: &Hotkey) -> u32 {
    if hotkey.mods.num() {
        match hotkey.scancode {
            code @ Scancode(89..=97) => {
                return u32::from(VK_NUMPAD1.0) + u32::from(code.0 - Scancode::KP_1.0);
            }
            Scancode::KP_0 => return u32::from(VK_NUMPAD0.0),
            Scancode::KP_PERIOD => return u32::from(VK_DECIMAL.0),
            Scancode::NUM_LOCK => return u32::from(VK_NUMLOCK.0),
            _ => {}
        }
    }
    unsafe { MapVirtualKeyW(u32::from(hotkey.raw), MAPVK_VSC_TO_VK) }
}

impl HotkeyBackend for WindowsBackend {
    fn register(&mut self, id: HotkeyId, hotkey: &Hotkey) -> HotkeyResult<()> {
        let vk = virtual_key(hotkey);
        if vk == 0 {
            return Err(HotkeyError::RegistrationFailed {
                hotkey: hotkey.name(),
                reason: format!("no virtual key for scancode {:#x}", hotkey.raw),
            });
        }

        unsafe { RegisterHotKey(None, id.0, modifiers(hotkey), vk) }.map_err(|e| {
            HotkeyError::RegistrationFailed {
                hotkey: hotkey.name(),
                reason: e.message().to_string(),
            }
        })?;

        debug!(id = id.0, vk, "RegisterHotKey succeeded");
        self.registered.insert(id, *hotkey);
        Ok(())
    }

    fn unregister(&mut self, id: HotkeyId) -> HotkeyResult<()> {
        unsafe { UnregisterHotKey(None, id.0) }.map_err(|e| {
            HotkeyError::UnregistrationFailed {
                hotkey: id.to_string(),
                reason: e.message().to_string(),
            }
        })?;
        self.registered.remove(&id);
        Ok(())
    }

    fn poll(&mut self, may_block: bool) -> Vec<HotkeyId> {
        if may_block {
            if let Err(e) = unsafe { WaitMessage() } {
                warn!("WaitMessage failed: {}", e);
            }
        }

        let mut fired = Vec::new();
        let mut msg = MSG::default();
        while unsafe { PeekMessageW(&mut msg, None, WM_HOTKEY, WM_HOTKEY, PM_REMOVE) }.as_bool() {
            fired.push(HotkeyId(msg.wParam.0 as i32));
        }
        fired
    }
}

impl Drop for WindowsBackend {
    fn drop(&mut self) {
        for id in std::mem::take(&mut self.registered).into_keys() {
            if let Err(e) = unsafe { UnregisterHotKey(None, id.0) } {
                warn!("Failed to release hotkey {}: {}", id, e);
            }
        }
    }
}
