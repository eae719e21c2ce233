//! 热键管理模块
//!
//! 提供全局热键的注册、管理和事件分发功能
//!
//! # 功能
//!
//! - 热键注册表：编号到按键组合与回调的映射，编号永不复用
//! - 热键分发：每个轮询周期从平台后端取出触发的热键并同步执行回调
//! - 按键捕获：分配热键时决定一次按键是绑定、清除、取消还是忽略
//!
//! # 使用方法
//!
//! ```ignore
//! use viboard_lib::hotkey::{platform_backend, process_hotkey_presses, HotkeyRegistry};
//!
//! let (backend, _forwarded) = platform_backend();
//! let mut registry: HotkeyRegistry<App> = HotkeyRegistry::new(backend);
//! let id = registry.register(hotkey, |app: &mut App| app.stop())?;
//!
//! // 每个轮询周期
//! process_hotkey_presses(&mut app);
//! ```

mod backend;
mod capture;
mod error;
mod keys;
mod registry;
mod types;

pub use backend::{platform_backend, ForwardedBackend, ForwardedKeys, HotkeyBackend};
#[cfg(windows)]
pub use backend::WindowsBackend;
pub use capture::{classify_hotkey_press, classify_push_to_talk_press, CaptureOutcome};
pub use error::{HotkeyError, HotkeyResult};
pub use keys::scancode_name;
pub use registry::{
    process_hotkey_presses, HotkeyBinding, HotkeyCallback, HotkeyHost, HotkeyRegistry,
};
pub use types::{Hotkey, HotkeyId, HotkeyRecord, Modifiers, Scancode};
