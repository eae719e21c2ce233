//! 状态持久化模块
//!
//! # 模块结构
//!
//! - `config` - 设置文档及其加载、保存
//! - `instance` - 单实例标记

pub mod config;
mod instance;

pub use config::{
    ConfigError, ConfigManager, ConfigResult, PlaybackRecord, Settings, SoundRecord,
    SoundboardRecord, Theme,
};
pub use instance::{InstanceGuard, INSTANCE_FILE};
