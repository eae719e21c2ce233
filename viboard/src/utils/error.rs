//! 全局错误处理模块
//!
//! 提供统一的应用错误类型和用户友好的错误消息
//!
//! # 功能
//!
//! - 统一的 `AppError` 类型，聚合所有模块错误
//! - 错误分类：IO 类、外部（平台/设备）类、逻辑类
//! - 错误代码用于界面层处理
//! - 错误恢复建议
//!
//! # 使用示例
//!
//! ```
//! use viboard_lib::utils::error::{AppError, ErrorKind};
//!
//! let err = AppError::Internal("test".to_string());
//! assert_eq!(err.kind(), ErrorKind::Logic);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::error::AudioError;
use crate::hotkey::HotkeyError;
use crate::input::error::InputError;
use crate::state::config::ConfigError;

/// 应用错误类型
///
/// 聚合所有模块的错误类型，提供统一的错误处理接口
#[derive(Error, Debug)]
pub enum AppError {
    /// 音频错误
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// 热键错误
    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    /// 输入错误
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// 文件读取、解码、设置文件
    Io,
    /// 操作系统或音频设备拒绝请求
    External,
    /// 调用方传入了无效参数
    Logic,
}

/// 错误代码
///
/// 用于界面层识别和处理特定错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 音频错误
    /// 不支持的文件类型
    AudioUnsupportedFormat,
    /// 文件解码失败
    AudioDecodeFailed,
    /// 文件夹无法读取
    AudioFolderUnreadable,
    /// 增益越界
    AudioGainOutOfRange,
    /// 找不到输出设备
    AudioDeviceNotFound,
    /// 设备索引越界
    AudioDeviceIndexOutOfRange,
    /// 音频流错误
    AudioStreamError,
    /// 格式被设备拒绝
    AudioFormatRejected,
    /// 重采样失败
    AudioResampleFailed,

    // 热键错误
    /// 热键无效
    HotkeyInvalid,
    /// 注册失败（通常是组合键已被占用）
    HotkeyRegistrationFailed,
    /// 注销失败
    HotkeyUnregistrationFailed,
    /// 热键未注册
    HotkeyNotRegistered,
    /// 平台不支持全局热键
    HotkeyPlatformNotSupported,

    // 输入错误
    /// 按键模拟器不可用
    InputSimulatorUnavailable,
    /// 按键注入失败
    InputInjectionFailed,

    // 配置错误
    /// 配置读写失败
    ConfigIoFailed,
    /// 配置无效
    ConfigInvalid,

    // 通用错误
    /// 内部错误
    InternalError,
}

/// 错误上下文信息
///
/// 提供用户友好的错误信息和恢复建议
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// 错误代码
    pub code: ErrorCode,
    /// 错误分类
    pub kind: ErrorKind,
    /// 用户友好的错误消息
    pub message: String,
    /// 详细错误信息（用于日志）
    pub detail: Option<String>,
    /// 恢复建议
    pub recovery_hint: Option<String>,
}

impl ErrorContext {
    /// 创建新的错误上下文
    pub fn new(code: ErrorCode, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code,
            kind,
            message: message.into(),
            detail: None,
            recovery_hint: None,
        }
    }

    /// 设置详细信息
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// 设置恢复建议
    pub fn with_recovery_hint(mut self, hint: impl Into<String>) -> Self {
        self.recovery_hint = Some(hint.into());
        self
    }
}

impl AppError {
    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Audio(e) => match e {
                AudioError::UnsupportedFormat(_) => ErrorCode::AudioUnsupportedFormat,
                AudioError::Decode { .. } => ErrorCode::AudioDecodeFailed,
                AudioError::FolderUnreadable { .. } => ErrorCode::AudioFolderUnreadable,
                AudioError::GainOutOfRange(_) => ErrorCode::AudioGainOutOfRange,
                AudioError::DeviceNotFound => ErrorCode::AudioDeviceNotFound,
                AudioError::DeviceIndexOutOfRange { .. } => ErrorCode::AudioDeviceIndexOutOfRange,
                AudioError::FormatRejected(_) => ErrorCode::AudioFormatRejected,
                AudioError::ResampleFailed(_) => ErrorCode::AudioResampleFailed,
                _ => ErrorCode::AudioStreamError,
            },

            AppError::Hotkey(e) => match e {
                HotkeyError::InvalidHotkey(_) | HotkeyError::InvalidRecord(_) => {
                    ErrorCode::HotkeyInvalid
                }
                HotkeyError::RegistrationFailed { .. } => ErrorCode::HotkeyRegistrationFailed,
                HotkeyError::UnregistrationFailed { .. } => ErrorCode::HotkeyUnregistrationFailed,
                HotkeyError::NotRegistered(_) => ErrorCode::HotkeyNotRegistered,
                HotkeyError::PlatformNotSupported => ErrorCode::HotkeyPlatformNotSupported,
            },

            AppError::Input(InputError::KeyboardSimulationFailed(_)) => {
                ErrorCode::InputInjectionFailed
            }
            AppError::Input(_) => ErrorCode::InputSimulatorUnavailable,

            AppError::Config(ConfigError::Json(_)) => ErrorCode::ConfigInvalid,
            AppError::Config(_) => ErrorCode::ConfigIoFailed,

            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// 获取错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Audio(
                AudioError::UnsupportedFormat(_)
                | AudioError::Decode { .. }
                | AudioError::FolderUnreadable { .. },
            ) => ErrorKind::Io,
            AppError::Audio(
                AudioError::GainOutOfRange(_) | AudioError::DeviceIndexOutOfRange { .. },
            ) => ErrorKind::Logic,
            AppError::Audio(_) => ErrorKind::External,

            AppError::Hotkey(
                HotkeyError::InvalidHotkey(_)
                | HotkeyError::InvalidRecord(_)
                | HotkeyError::NotRegistered(_),
            ) => ErrorKind::Logic,
            AppError::Hotkey(_) => ErrorKind::External,

            AppError::Input(_) => ErrorKind::External,
            AppError::Config(_) => ErrorKind::Io,
            AppError::Internal(_) => ErrorKind::Logic,
        }
    }

    /// 获取用户友好的错误消息
    ///
    /// 返回适合直接显示给用户的错误消息
    pub fn user_message(&self) -> String {
        match self {
            AppError::Audio(AudioError::UnsupportedFormat(path)) => {
                format!("不支持的文件类型: {}", path)
            }
            AppError::Audio(AudioError::Decode { path, .. }) => {
                format!("无法加载 {}", path.display())
            }
            AppError::Audio(AudioError::FolderUnreadable { path, .. }) => {
                format!("无法读取文件夹 {}", path.display())
            }
            AppError::Audio(AudioError::DeviceNotFound) => {
                "找不到音频输出设备".to_string()
            }
            AppError::Audio(AudioError::StreamBuildFailed(_)) => {
                "无法打开音频输出".to_string()
            }
            AppError::Audio(_) => "播放出错，请检查输出设备".to_string(),

            AppError::Hotkey(HotkeyError::RegistrationFailed { hotkey, .. }) => {
                format!("热键 {} 已被其他程序占用", hotkey)
            }
            AppError::Hotkey(HotkeyError::PlatformNotSupported) => {
                "当前系统不支持全局热键".to_string()
            }
            AppError::Hotkey(_) => "热键设置失败".to_string(),

            AppError::Input(_) => "无法模拟按键说话".to_string(),

            AppError::Config(ConfigError::Json(_)) => "设置文件格式错误，已使用默认设置".to_string(),
            AppError::Config(_) => "无法读写设置文件".to_string(),

            AppError::Internal(msg) => format!("内部错误: {}", msg),
        }
    }

    /// 获取完整的错误上下文
    pub fn context(&self) -> ErrorContext {
        let mut ctx = ErrorContext::new(self.code(), self.kind(), self.user_message())
            .with_detail(self.to_string());
        ctx.recovery_hint = self.recovery_hint();
        ctx
    }

    /// 获取恢复建议
    pub fn recovery_hint(&self) -> Option<String> {
        match self {
            AppError::Audio(AudioError::DeviceNotFound) => {
                Some("请连接音频输出设备后重试".to_string())
            }
            AppError::Audio(AudioError::Decode { .. }) => {
                Some("请确认文件是有效的 WAV 或 MP3".to_string())
            }
            AppError::Hotkey(HotkeyError::RegistrationFailed { .. }) => {
                Some("请换一个组合键".to_string())
            }
            AppError::Input(InputError::SimulatorUnavailable(_)) => {
                Some("请检查系统是否允许模拟键盘输入".to_string())
            }
            _ => None,
        }
    }
}

/// 应用结果类型
pub type AppResult<T> = Result<T, AppError>;

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
