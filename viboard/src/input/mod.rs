//! 输入模块
//!
//! 提供按键注入与按键说话功能
//!
//! # 子模块
//!
//! - [`error`] - 错误类型定义
//! - [`keyboard`] - 按原始扫描码注入按键
//! - [`ptt`] - 按键说话控制器
//!
//! # 使用示例
//!
//! ```ignore
//! use viboard_lib::input::{platform_injector, PushToTalkController, PushToTalkKey};
//!
//! let mut ptt = PushToTalkController::new(platform_injector());
//! ptt.set_key(Some(PushToTalkKey::new(scancode, raw)));
//! ptt.set_enabled(true);
//!
//! // 每个轮询周期
//! ptt.step(session.is_active());
//! ```

pub mod error;
pub mod keyboard;
pub mod ptt;

// Re-export commonly used types
pub use error::{InputError, InputResult};
pub use keyboard::{platform_injector, KeyInjector, KeyboardSimulator, UnavailableInjector};
pub use ptt::{KeyTransition, PushToTalkController, PushToTalkKey};
