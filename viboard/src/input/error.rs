//! 输入模块错误类型
//!
//! 定义按键注入相关的错误类型

use thiserror::Error;

/// 输入操作错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    /// 键盘模拟器初始化失败
    #[error("Keyboard simulator unavailable: {0}")]
    SimulatorUnavailable(String),

    /// 键盘模拟失败
    #[error("Keyboard simulation failed: {0}")]
    KeyboardSimulationFailed(String),

    /// 平台不支持
    #[error("Platform not supported: {0}")]
    PlatformNotSupported(String),
}

/// 输入操作结果类型
pub type InputResult<T> = Result<T, InputError>;
