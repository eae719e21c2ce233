//! 应用配置模块
//!
//! 提供设置文档的加载、保存和校验
//!
//! # 配置存储位置
//!
//! `<文档目录>/ViBoard/settings.json`
//!
//! # 校验
//!
//! 增益超出 [0, 2]、热键扫描码越界或修饰键掩码含不支持的位、主题超出 [0, 3]
//! 都会导致整个文档加载失败，不会做任何修正，也不会应用任何部分内容。
//!
//! # 使用示例
//!
//! ```ignore
//! use viboard_lib::state::config::ConfigManager;
//!
//! let manager = ConfigManager::new(ConfigManager::storage_dir()?);
//! let settings = manager.load()?;
//! manager.save(&settings)?;
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::{Gain, GainOverride, GAIN_SLOTS, OUTPUT_SLOTS};
use crate::hotkey::Hotkey;

/// 配置文件名
pub const SETTINGS_FILE: &str = "settings.json";

/// 存储目录名
pub const STORAGE_DIR: &str = "ViBoard";

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误（包括越界值）
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 路径错误
    #[error("Path error: {0}")]
    Path(String),
}

/// 配置结果类型
pub type ConfigResult<T> = Result<T, ConfigError>;

/// 界面主题编号，取值 0..=3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Theme(u8);

impl Theme {
    pub const MAX: u8 = 3;

    pub fn index(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Theme {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= Self::MAX {
            Ok(Self(value))
        } else {
            Err(format!("theme {} is out of range", value))
        }
    }
}

impl From<Theme> for u8 {
    fn from(theme: Theme) -> u8 {
        theme.0
    }
}

/// 单个声音的持久化设置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SoundRecord {
    /// 每个输出槽位的增益覆盖
    pub gains: [GainOverride; GAIN_SLOTS],
    /// 绑定的热键
    pub hotkey: Option<Hotkey>,
}

/// 音板的持久化设置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SoundboardRecord {
    /// 文件夹路径
    pub path: PathBuf,
    /// 以声音文件绝对路径为键
    #[serde(default)]
    pub sounds: BTreeMap<String, SoundRecord>,
}

/// 输出槽位的持久化设置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaybackRecord {
    /// 偏好的设备名称
    pub preferred: String,
    /// 槽位增益
    pub gain: Gain,
}

/// 设置文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// 是否显示欢迎界面
    pub show_welcome: bool,
    /// 音板列表
    pub soundboards: Vec<SoundboardRecord>,
    /// 两个输出槽位
    pub playback: [PlaybackRecord; OUTPUT_SLOTS],
    /// 是否启用第二输出
    pub dual_playback: bool,
    /// 停止热键
    pub stop_hotkey: Option<Hotkey>,
    /// 主题
    pub theme: Theme,
    /// 最小化到托盘
    pub minimize_to_tray: bool,
    /// 启动时最小化
    pub start_minimized: bool,
    /// 按键说话扫描码，0 表示未设置
    pub ptt_scancode: u16,
    /// 按键说话原始键码
    pub ptt_raw: u16,
    /// 是否启用按键说话
    pub use_ptt: bool,
    /// 按键说话开关热键
    pub ptt_toggle_hotkey: Option<Hotkey>,
    /// 窗口是否最大化
    pub maximized: bool,
    pub window_x: i32,
    pub window_y: i32,
    pub window_width: i32,
    pub window_height: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_welcome: true,
            soundboards: Vec::new(),
            playback: Default::default(),
            dual_playback: false,
            stop_hotkey: None,
            theme: Theme::default(),
            minimize_to_tray: false,
            start_minimized: false,
            ptt_scancode: 0,
            ptt_raw: 0,
            use_ptt: false,
            ptt_toggle_hotkey: None,
            maximized: false,
            window_x: 0,
            window_y: 0,
            window_width: 0,
            window_height: 0,
        }
    }
}

impl Settings {
    /// 从 JSON 文本解析并校验
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// 序列化为格式化的 JSON 文本
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// 配置管理器
///
/// 提供设置文件的加载和保存
#[derive(Debug, Clone)]
pub struct ConfigManager {
    dir: PathBuf,
}

impl ConfigManager {
    /// 使用给定存储目录
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 默认存储目录：`<文档目录>/ViBoard`
    pub fn storage_dir() -> ConfigResult<PathBuf> {
        dirs::document_dir()
            .or_else(dirs::home_dir)
            .map(|dir| dir.join(STORAGE_DIR))
            .ok_or_else(|| ConfigError::Path("no documents directory".to_string()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 设置文件路径
    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    /// 加载设置
    ///
    /// 文件不存在时返回默认设置
    pub fn load(&self) -> ConfigResult<Settings> {
        let path = self.settings_path();

        tracing::debug!(path = %path.display(), "Loading settings");

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let settings = Settings::from_json(&content)?;
            tracing::info!(path = %path.display(), "Settings loaded successfully");
            Ok(settings)
        } else {
            tracing::info!("Settings file not found, using defaults");
            Ok(Settings::default())
        }
    }

    /// 保存设置
    pub fn save(&self, settings: &Settings) -> ConfigResult<()> {
        let path = self.settings_path();

        tracing::debug!(path = %path.display(), "Saving settings");

        // 确保目录存在
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)?;
        }

        std::fs::write(&path, settings.to_json()?)?;

        tracing::info!(path = %path.display(), "Settings saved successfully");
        Ok(())
    }
}
