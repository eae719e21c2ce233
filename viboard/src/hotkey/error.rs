//! 热键相关错误类型

use thiserror::Error;

/// 热键相关错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HotkeyError {
    /// 无效的热键（未知扫描码或缺少原始键码）
    #[error("Invalid hotkey: {0}")]
    InvalidHotkey(String),

    /// 持久化的热键记录超出范围
    #[error("Invalid hotkey record: {0}")]
    InvalidRecord(String),

    /// 热键注册失败
    #[error("Failed to register hotkey '{hotkey}': {reason}")]
    RegistrationFailed { hotkey: String, reason: String },

    /// 热键注销失败
    #[error("Failed to unregister hotkey '{hotkey}': {reason}")]
    UnregistrationFailed { hotkey: String, reason: String },

    /// 热键未注册
    #[error("Hotkey {0} is not registered")]
    NotRegistered(i32),

    /// 当前平台不支持全局热键
    #[error("Global hotkeys are not supported on this platform")]
    PlatformNotSupported,
}

/// 热键模块的结果类型
pub type HotkeyResult<T> = Result<T, HotkeyError>;
