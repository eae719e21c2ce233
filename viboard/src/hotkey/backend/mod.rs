//! 热键平台后端
//!
//! 后端负责向操作系统注册/注销按键组合，并在每个轮询周期取出已触发的热键编号。

mod forwarded;
#[cfg(windows)]
mod win32;

pub use forwarded::{ForwardedBackend, ForwardedKeys};
#[cfg(windows)]
pub use win32::WindowsBackend;

use super::error::HotkeyResult;
use super::types::{Hotkey, HotkeyId};

/// 平台热键接口
pub trait HotkeyBackend {
    /// 向系统注册按键组合，失败时不得留下任何注册状态
    fn register(&mut self, id: HotkeyId, hotkey: &Hotkey) -> HotkeyResult<()>;

    /// 注销按键组合
    fn unregister(&mut self, id: HotkeyId) -> HotkeyResult<()>;

    /// 取出自上次调用以来触发的热键
    ///
    /// `may_block` 为真时，若当前没有待处理的事件，后端可以阻塞等待系统消息。
    fn poll(&mut self, may_block: bool) -> Vec<HotkeyId>;
}

/// 当前平台的默认后端
///
/// Windows 上使用系统全局热键，不需要转发句柄；其他平台上热键只能通过转发的按键事件
/// 触发，同时返回转发句柄，由界面层把按键交给它。
pub fn platform_backend() -> (Box<dyn HotkeyBackend>, Option<ForwardedKeys>) {
    #[cfg(windows)]
    {
        (Box::new(WindowsBackend::new()), None)
    }

    #[cfg(not(windows))]
    {
        tracing::warn!("No global hotkey backend on this platform, hotkeys need forwarded key events");
        let (backend, keys) = ForwardedBackend::new();
        (Box::new(backend), Some(keys))
    }
}
