//! 键盘模拟模块
//!
//! 按原始扫描码向系统注入按下/松开事件，用于按键说话。
//!
//! # 使用示例
//!
//! ```ignore
//! use viboard_lib::input::{KeyInjector, KeyboardSimulator};
//!
//! let mut keyboard = KeyboardSimulator::new()?;
//! keyboard.send_key(0x2f, true)?;  // 按下
//! keyboard.send_key(0x2f, false)?; // 松开
//! ```
//!
//! # 平台支持
//!
//! | 平台 | 原始扫描码注入 | 备注 |
//! |------|----------------|------|
//! | Windows | ✅ | 通过 SendInput 发送扫描码 |
//! | macOS | ✅ | 需要辅助功能权限 |
//! | Linux (X11) | ✅ | 需要 X11 |

use super::error::{InputError, InputResult};
use enigo::{Direction, Enigo, Keyboard, Settings};

/// 按键注入接口
pub trait KeyInjector {
    /// 发送一次按下（`pressed = true`）或松开事件
    fn send_key(&mut self, raw: u16, pressed: bool) -> InputResult<()>;
}

/// 键盘模拟器
///
/// 封装 enigo 库，按平台原始键码注入按键事件
pub struct KeyboardSimulator {
    /// enigo 实例
    enigo: Enigo,
}

impl KeyboardSimulator {
    /// 创建新的键盘模拟器
    ///
    /// # Errors
    ///
    /// - `InputError::SimulatorUnavailable` - 初始化失败（例如没有显示服务器）
    pub fn new() -> InputResult<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| InputError::SimulatorUnavailable(format!("Failed to initialize: {}", e)))?;

        tracing::debug!("Keyboard simulator initialized");

        Ok(Self { enigo })
    }
}

impl KeyInjector for KeyboardSimulator {
    fn send_key(&mut self, raw: u16, pressed: bool) -> InputResult<()> {
        let direction = if pressed {
            Direction::Press
        } else {
            Direction::Release
        };

        tracing::debug!(raw, pressed, "Injecting key");

        self.enigo.raw(raw, direction).map_err(|e| {
            InputError::KeyboardSimulationFailed(format!("Failed to send key {:#x}: {}", raw, e))
        })
    }
}

/// 不可用的注入器，所有调用都返回错误
///
/// 在键盘模拟器无法初始化时代替它，使按键说话退化为不注入。
#[derive(Debug, Clone)]
pub struct UnavailableInjector {
    reason: String,
}

impl UnavailableInjector {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl KeyInjector for UnavailableInjector {
    fn send_key(&mut self, _raw: u16, _pressed: bool) -> InputResult<()> {
        Err(InputError::SimulatorUnavailable(self.reason.clone()))
    }
}

/// 当前平台的默认注入器
pub fn platform_injector() -> Box<dyn KeyInjector> {
    match KeyboardSimulator::new() {
        Ok(keyboard) => Box::new(keyboard),
        Err(e) => {
            tracing::warn!("Push-to-talk key injection disabled: {}", e);
            Box::new(UnavailableInjector::new(e.to_string()))
        }
    }
}
