//! 热键值类型
//!
//! 扫描码采用 USB HID 用途编号（与 SDL 扫描码一致），修饰键掩码采用 SDL 的位布局。
//! 仅支持 Ctrl、Alt、Shift 与 NumLock 四类修饰键，其余位在存储或比较前都会被清除。

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use super::error::HotkeyError;
use super::keys;

/// 物理按键扫描码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Scancode(pub u16);

impl Scancode {
    /// 未知按键，表示空闲槽位
    pub const UNKNOWN: Scancode = Scancode(0);
    /// 有效扫描码的上界（不含）
    pub const COUNT: u16 = 512;

    pub const ESCAPE: Scancode = Scancode(41);
    pub const F12: Scancode = Scancode(69);
    pub const SCROLL_LOCK: Scancode = Scancode(71);
    pub const DELETE: Scancode = Scancode(76);
    pub const NUM_LOCK: Scancode = Scancode(83);
    pub const KP_1: Scancode = Scancode(89);
    pub const KP_9: Scancode = Scancode(97);
    pub const KP_0: Scancode = Scancode(98);
    pub const KP_PERIOD: Scancode = Scancode(99);
    /// 第一个修饰键扫描码（左 Ctrl），其后均为修饰键或保留码
    pub const LCTRL: Scancode = Scancode(224);

    pub fn is_known(self) -> bool {
        self != Self::UNKNOWN && self.0 < Self::COUNT
    }

    /// 修饰键本身（Ctrl/Shift/Alt/GUI 及以后的编号）
    pub fn is_modifier(self) -> bool {
        self >= Self::LCTRL
    }

    /// 人类可读的按键名称
    pub fn name(self) -> String {
        keys::scancode_name(self)
    }
}

/// 修饰键掩码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modifiers(pub u16);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const LSHIFT: Modifiers = Modifiers(0x0001);
    pub const RSHIFT: Modifiers = Modifiers(0x0002);
    pub const LCTRL: Modifiers = Modifiers(0x0040);
    pub const RCTRL: Modifiers = Modifiers(0x0080);
    pub const LALT: Modifiers = Modifiers(0x0100);
    pub const RALT: Modifiers = Modifiers(0x0200);
    pub const LGUI: Modifiers = Modifiers(0x0400);
    pub const RGUI: Modifiers = Modifiers(0x0800);
    pub const NUM: Modifiers = Modifiers(0x1000);
    pub const CAPS: Modifiers = Modifiers(0x2000);

    pub const SHIFT: Modifiers = Modifiers(0x0003);
    pub const CTRL: Modifiers = Modifiers(0x00C0);
    pub const ALT: Modifiers = Modifiers(0x0300);

    /// 允许存储的全部位
    pub const SUPPORTED: Modifiers = Modifiers(0x0003 | 0x00C0 | 0x0300 | 0x1000);

    pub fn contains_any(self, other: Modifiers) -> bool {
        self.0 & other.0 != 0
    }

    pub fn ctrl(self) -> bool {
        self.contains_any(Self::CTRL)
    }

    pub fn alt(self) -> bool {
        self.contains_any(Self::ALT)
    }

    pub fn shift(self) -> bool {
        self.contains_any(Self::SHIFT)
    }

    pub fn num(self) -> bool {
        self.contains_any(Self::NUM)
    }

    /// 清除不支持的位
    pub fn strip_unsupported(self) -> Modifiers {
        Modifiers(self.0 & Self::SUPPORTED.0)
    }

    pub fn is_supported(self) -> bool {
        self.0 & !Self::SUPPORTED.0 == 0
    }

    /// 不含 NumLock 的组合（区分左右侧之前的 Ctrl/Alt/Shift）
    pub fn chord(self) -> (bool, bool, bool) {
        (self.ctrl(), self.alt(), self.shift())
    }

    /// 名称前缀，固定顺序 "Ctrl+" "Alt+" "Shift+"
    pub fn prefix(self) -> String {
        let mut prefix = String::new();
        if self.ctrl() {
            prefix.push_str("Ctrl+");
        }
        if self.alt() {
            prefix.push_str("Alt+");
        }
        if self.shift() {
            prefix.push_str("Shift+");
        }
        prefix
    }
}

impl BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

/// 热键注册表中的槽位编号，-1 表示未绑定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HotkeyId(pub i32);

impl HotkeyId {
    pub const NULL: HotkeyId = HotkeyId(-1);

    pub fn is_null(self) -> bool {
        self.0 < 0
    }

    /// 对应的表索引
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl Default for HotkeyId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for HotkeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 按键组合：扫描码、平台原始键码与修饰键掩码
///
/// 持久化格式为 `{"scancode": .., "raw": .., "mod": ..}`，
/// 反序列化时拒绝越界扫描码和不支持的修饰键位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "HotkeyRecord", into = "HotkeyRecord")]
pub struct Hotkey {
    pub scancode: Scancode,
    pub raw: u16,
    pub mods: Modifiers,
}

impl Hotkey {
    /// 创建热键，清除不支持的修饰键位
    pub fn new(scancode: Scancode, raw: u16, mods: Modifiers) -> Self {
        Self {
            scancode,
            raw,
            mods: mods.strip_unsupported(),
        }
    }

    /// 显示名称，例如 "Ctrl+Shift+F5"
    pub fn name(&self) -> String {
        format!("{}{}", self.mods.prefix(), self.scancode.name())
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// 热键的持久化记录
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HotkeyRecord {
    pub scancode: u16,
    pub raw: u16,
    #[serde(rename = "mod")]
    pub mods: u16,
}

impl TryFrom<HotkeyRecord> for Hotkey {
    type Error = HotkeyError;

    fn try_from(record: HotkeyRecord) -> Result<Self, Self::Error> {
        if record.scancode >= Scancode::COUNT {
            return Err(HotkeyError::InvalidRecord(format!(
                "scancode {} is out of range",
                record.scancode
            )));
        }
        let mods = Modifiers(record.mods);
        if !mods.is_supported() {
            return Err(HotkeyError::InvalidRecord(format!(
                "modifier mask {:#06x} has unsupported bits",
                record.mods
            )));
        }
        Ok(Hotkey {
            scancode: Scancode(record.scancode),
            raw: record.raw,
            mods,
        })
    }
}

impl From<Hotkey> for HotkeyRecord {
    fn from(hotkey: Hotkey) -> Self {
        Self {
            scancode: hotkey.scancode.0,
            raw: hotkey.raw,
            mods: hotkey.mods.0,
        }
    }
}
