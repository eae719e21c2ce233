//! 应用组合根
//!
//! `App` 拥有所有组件：音板、播放会话、热键注册表、按键说话控制器和设备监视器。
//! 界面层通过它的方法操作核心，事件循环每个周期调用一次 [`App::run_cycle`]。
//!
//! # 轮询周期
//!
//! ```text
//! 1. 取走文件夹选择结果，添加音板
//! 2. 重新枚举输出设备，把增删事件交给播放会话
//! 3. 分发触发的热键（回调可修改 App 的任意状态）
//! 4. 重新打开流已失效的槽位；所有队列播放完毕后允许休眠
//! 5. 按播放活动推进按键说话
//! ```
//!
//! # 使用示例
//!
//! ```ignore
//! use viboard_lib::app::{App, AppParts};
//!
//! let mut app = App::new(AppParts::platform_default());
//! app.apply_settings(&settings);
//! while app.is_running() {
//!     app.run_cycle();
//! }
//! let settings = app.capture_settings();
//! ```

mod completion;

pub use completion::CompletionCell;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::audio::{
    AudioError, CpalBackend, DeviceWatcher, OutputBackend, PlaybackSessionManager, SoundAsset,
    OUTPUT_SLOTS,
};
use crate::hotkey::{
    platform_backend, process_hotkey_presses, ForwardedKeys, Hotkey, HotkeyBackend, HotkeyBinding,
    HotkeyHost, HotkeyId, HotkeyRegistry, Modifiers, Scancode,
};
use crate::input::{platform_injector, KeyInjector, PushToTalkController, PushToTalkKey};
use crate::soundboard::{BoardId, SoundHandle, Soundboard};
use crate::state::{PlaybackRecord, Settings, SoundRecord, SoundboardRecord};
use crate::utils::error::{AppError, AppResult};

/// 每隔多少个周期重新枚举一次输出设备
pub const DEVICE_POLL_INTERVAL: u32 = 200;

/// 组装 `App` 所需的平台组件
pub struct AppParts {
    pub output: Box<dyn OutputBackend>,
    pub hotkeys: Box<dyn HotkeyBackend>,
    /// 热键后端依赖转发按键时的转发句柄
    pub forwarded_keys: Option<ForwardedKeys>,
    pub injector: Box<dyn KeyInjector>,
}

impl AppParts {
    /// 当前平台的默认组件
    pub fn platform_default() -> Self {
        let (hotkeys, forwarded_keys) = platform_backend();
        Self {
            output: Box::new(CpalBackend::new()),
            hotkeys,
            forwarded_keys,
            injector: platform_injector(),
        }
    }
}

/// 热键分配目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyTarget {
    /// 播放某个声音
    Sound(SoundHandle),
    /// 停止所有播放
    Stop,
    /// 切换按键说话
    PushToTalkToggle,
}

/// 应用状态
pub struct App {
    soundboards: Vec<Soundboard>,
    session: PlaybackSessionManager,
    hotkeys: HotkeyRegistry<App>,
    forwarded_keys: Option<ForwardedKeys>,
    ptt: PushToTalkController,
    device_watcher: DeviceWatcher,
    stop_hotkey: Option<HotkeyBinding>,
    ptt_toggle_hotkey: Option<HotkeyBinding>,
    folder_request: Arc<CompletionCell<PathBuf>>,
    /// 不由核心解释的设置项（主题、窗口位置等），原样保存
    preferences: Settings,
    inactive: bool,
    running: bool,
    notices: Vec<AppError>,
}

impl App {
    pub fn new(parts: AppParts) -> Self {
        Self {
            soundboards: Vec::new(),
            session: PlaybackSessionManager::new(parts.output),
            hotkeys: HotkeyRegistry::new(parts.hotkeys),
            forwarded_keys: parts.forwarded_keys,
            ptt: PushToTalkController::new(parts.injector),
            device_watcher: DeviceWatcher::new(DEVICE_POLL_INTERVAL),
            stop_hotkey: None,
            ptt_toggle_hotkey: None,
            folder_request: Arc::new(CompletionCell::new()),
            preferences: Settings::default(),
            inactive: false,
            running: true,
            notices: Vec::new(),
        }
    }

    // ====== 设置 ======

    /// 应用设置
    ///
    /// 现有音板和热键全部被替换。音板从磁盘重新扫描，增益覆盖和热键按文件路径恢复；
    /// 不存在的文件夹保留为空音板。失败记录到通知列表中，不会中断。
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.soundboards.clear();
        self.stop_hotkey = None;
        self.ptt_toggle_hotkey = None;
        self.hotkeys.reclaim();

        for (slot, record) in settings.playback.iter().enumerate() {
            self.session.set_preferred(slot, record.preferred.clone());
            self.session.set_slot_gain(slot, record.gain);
        }
        match self.session.set_dual_output(settings.dual_playback) {
            Ok(()) | Err(AudioError::DeviceNotFound) => {}
            Err(e) => self.notices.push(e.into()),
        }

        for record in &settings.soundboards {
            self.restore_soundboard(record);
        }

        if let Some(hotkey) = settings.stop_hotkey {
            if let Err(e) = self.assign_hotkey(HotkeyTarget::Stop, Some(hotkey)) {
                self.notices.push(e);
            }
        }
        if let Some(hotkey) = settings.ptt_toggle_hotkey {
            if let Err(e) = self.assign_hotkey(HotkeyTarget::PushToTalkToggle, Some(hotkey)) {
                self.notices.push(e);
            }
        }

        let key = (settings.ptt_scancode != 0)
            .then(|| PushToTalkKey::new(Scancode(settings.ptt_scancode), settings.ptt_raw));
        self.ptt.set_key(key);
        self.ptt.set_enabled(settings.use_ptt);

        self.preferences = settings.clone();
        info!(
            soundboards = self.soundboards.len(),
            hotkeys = self.hotkeys.bound_count(),
            "Settings applied"
        );
    }

    fn restore_soundboard(&mut self, record: &SoundboardRecord) {
        let (mut board, errors) = Soundboard::scan(&record.path);
        self.notices.extend(errors.into_iter().map(AppError::from));

        let board_id = board.id();
        for sound in board.sounds_mut() {
            let key = sound.path().to_string_lossy().into_owned();
            let Some(saved) = record.sounds.get(&key) else {
                continue;
            };
            for (slot, gain) in saved.gains.iter().enumerate() {
                sound.set_gain_override(slot, *gain);
            }
            if let Some(hotkey) = saved.hotkey {
                let handle = SoundHandle {
                    board: board_id,
                    sound: sound.id(),
                };
                match self.hotkeys.register_binding(hotkey, move |app: &mut App| {
                    app.play_sound(handle)
                }) {
                    Ok(binding) => sound.bind_hotkey(binding),
                    Err(e) => {
                        warn!("Failed to restore hotkey for {}: {}", sound.name(), e);
                        self.notices.push(e.into());
                    }
                }
            }
        }
        self.soundboards.push(board);
    }

    /// 当前状态的设置文档
    pub fn capture_settings(&self) -> Settings {
        let mut settings = self.preferences.clone();

        settings.soundboards = self
            .soundboards
            .iter()
            .map(|board| SoundboardRecord {
                path: board.path().to_path_buf(),
                sounds: board
                    .sounds()
                    .iter()
                    .map(|sound| {
                        (
                            sound.path().to_string_lossy().into_owned(),
                            self.sound_record(sound),
                        )
                    })
                    .collect(),
            })
            .collect();

        for slot in 0..OUTPUT_SLOTS {
            let config = self.session.slot(slot);
            settings.playback[slot] = PlaybackRecord {
                preferred: config.preferred().to_string(),
                gain: config.gain(),
            };
        }
        settings.dual_playback = self.session.dual_output();

        settings.stop_hotkey = self.bound_hotkey(self.stop_hotkey.as_ref());
        settings.ptt_toggle_hotkey = self.bound_hotkey(self.ptt_toggle_hotkey.as_ref());

        let key = self.ptt.key();
        settings.ptt_scancode = key.map_or(0, |key| key.scancode.0);
        settings.ptt_raw = key.map_or(0, |key| key.raw);
        settings.use_ptt = self.ptt.is_enabled();

        settings
    }

    fn sound_record(&self, sound: &SoundAsset) -> SoundRecord {
        SoundRecord {
            gains: *sound.gain_overrides(),
            hotkey: self.hotkeys.get(sound.hotkey()),
        }
    }

    fn bound_hotkey(&self, binding: Option<&HotkeyBinding>) -> Option<Hotkey> {
        binding.and_then(|binding| self.hotkeys.get(binding.id()))
    }

    /// 界面主题、窗口位置等原样保存的设置项
    pub fn preferences_mut(&mut self) -> &mut Settings {
        &mut self.preferences
    }

    // ====== 音板 ======

    pub fn soundboards(&self) -> &[Soundboard] {
        &self.soundboards
    }

    pub fn soundboard(&self, id: BoardId) -> Option<&Soundboard> {
        self.soundboards.iter().find(|board| board.id() == id)
    }

    /// 句柄指向的声音，音板或声音已删除时为 `None`
    pub fn sound(&self, handle: SoundHandle) -> Option<&SoundAsset> {
        self.soundboard(handle.board)?.find(handle.sound)
    }

    pub fn sound_mut(&mut self, handle: SoundHandle) -> Option<&mut SoundAsset> {
        find_sound_mut(&mut self.soundboards, handle)
    }

    /// 扫描文件夹并添加为新音板
    pub fn add_soundboard(&mut self, path: impl Into<PathBuf>) -> BoardId {
        let (board, errors) = Soundboard::scan(path);
        self.notices.extend(errors.into_iter().map(AppError::from));
        let id = board.id();
        self.soundboards.push(board);
        id
    }

    /// 删除音板，其声音的热键一并注销
    pub fn remove_soundboard(&mut self, id: BoardId) -> bool {
        let before = self.soundboards.len();
        self.soundboards.retain(|board| board.id() != id);
        let removed = self.soundboards.len() != before;
        if removed {
            self.hotkeys.reclaim();
            info!("Removed soundboard");
        }
        removed
    }

    /// 重新扫描音板的文件夹
    ///
    /// 已删除文件的热键被注销，仍存在的文件保留原有设置。
    pub fn refresh_soundboard(&mut self, id: BoardId) -> bool {
        let Some(board) = self.soundboards.iter_mut().find(|board| board.id() == id) else {
            return false;
        };
        let errors = board.refresh();
        self.notices.extend(errors.into_iter().map(AppError::from));
        self.hotkeys.reclaim();
        true
    }

    /// 文件夹选择结果的投递单元，可交给对话框线程
    pub fn folder_request(&self) -> Arc<CompletionCell<PathBuf>> {
        Arc::clone(&self.folder_request)
    }

    // ====== 播放 ======

    pub fn session(&self) -> &PlaybackSessionManager {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut PlaybackSessionManager {
        &mut self.session
    }

    /// 在所有启用的槽位上播放声音
    ///
    /// 句柄失效时什么也不做。单个槽位的失败记录到通知列表。
    pub fn play_sound(&mut self, handle: SoundHandle) {
        let Some(sound) = self
            .soundboards
            .iter()
            .find(|board| board.id() == handle.board)
            .and_then(|board| board.find(handle.sound))
        else {
            debug!(?handle, "Ignoring play of a removed sound");
            return;
        };

        let report = self.session.play(sound, self.ptt.is_armed());
        self.notices
            .extend(report.failures.into_iter().map(|(_, e)| AppError::from(e)));
    }

    pub fn stop(&mut self) {
        self.session.stop();
    }

    // ====== 热键 ======

    /// 分配或清除热键
    ///
    /// 旧热键先被释放，因此可以把同一组合键重新分配给同一目标。
    ///
    /// # Errors
    ///
    /// - `AppError::Hotkey` - 系统拒绝注册，目标保持未绑定
    /// - `AppError::Internal` - 声音已不存在
    pub fn assign_hotkey(&mut self, target: HotkeyTarget, hotkey: Option<Hotkey>) -> AppResult<()> {
        match target {
            HotkeyTarget::Sound(handle) => {
                let sound = find_sound_mut(&mut self.soundboards, handle)
                    .ok_or_else(|| AppError::Internal("sound no longer exists".to_string()))?;
                sound.clear_hotkey();
                self.hotkeys.reclaim();

                if let Some(hotkey) = hotkey {
                    let binding = self
                        .hotkeys
                        .register_binding(hotkey, move |app: &mut App| app.play_sound(handle))?;
                    if let Some(sound) = find_sound_mut(&mut self.soundboards, handle) {
                        sound.bind_hotkey(binding);
                    }
                }
            }
            HotkeyTarget::Stop => {
                self.stop_hotkey = None;
                self.hotkeys.reclaim();
                if let Some(hotkey) = hotkey {
                    self.stop_hotkey = Some(
                        self.hotkeys
                            .register_binding(hotkey, |app: &mut App| app.stop())?,
                    );
                }
            }
            HotkeyTarget::PushToTalkToggle => {
                self.ptt_toggle_hotkey = None;
                self.hotkeys.reclaim();
                if let Some(hotkey) = hotkey {
                    self.ptt_toggle_hotkey =
                        Some(self.hotkeys.register_binding(hotkey, |app: &mut App| {
                            app.ptt.toggle();
                        })?);
                }
            }
        }
        Ok(())
    }

    /// 目标当前热键的显示名称，未绑定时为 "None"
    pub fn hotkey_name(&self, target: HotkeyTarget) -> String {
        let id = match target {
            HotkeyTarget::Sound(handle) => self.sound(handle).map_or(HotkeyId::NULL, SoundAsset::hotkey),
            HotkeyTarget::Stop => self.stop_hotkey.as_ref().map_or(HotkeyId::NULL, HotkeyBinding::id),
            HotkeyTarget::PushToTalkToggle => self
                .ptt_toggle_hotkey
                .as_ref()
                .map_or(HotkeyId::NULL, HotkeyBinding::id),
        };
        self.hotkeys.name(id)
    }

    pub fn hotkey_registry(&self) -> &HotkeyRegistry<App> {
        &self.hotkeys
    }

    /// 把界面层收到的按键交给转发后端
    ///
    /// 匹配到的热键在下一个周期执行。使用系统全局热键的平台上总是返回 `false`。
    pub fn forward_key(&self, scancode: Scancode, mods: Modifiers) -> bool {
        self.forwarded_keys
            .as_ref()
            .is_some_and(|keys| keys.press(scancode, mods))
    }

    // ====== 按键说话 ======

    pub fn push_to_talk(&self) -> &PushToTalkController {
        &self.ptt
    }

    pub fn set_push_to_talk_key(&mut self, key: Option<PushToTalkKey>) {
        self.ptt.set_key(key);
    }

    pub fn set_push_to_talk_enabled(&mut self, enabled: bool) {
        self.ptt.set_enabled(enabled);
    }

    // ====== 事件循环 ======

    /// 窗口最小化或隐藏时为 `true`，此时空闲周期允许阻塞
    pub fn set_inactive(&mut self, inactive: bool) {
        self.inactive = inactive;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn request_quit(&mut self) {
        self.running = false;
    }

    /// 取走累积的通知
    pub fn take_notices(&mut self) -> Vec<AppError> {
        std::mem::take(&mut self.notices)
    }

    /// 执行一个轮询周期，返回执行的热键回调数量
    pub fn run_cycle(&mut self) -> usize {
        if let Some(folder) = self.folder_request.take() {
            info!(folder = %folder.display(), "Adding soundboard from folder request");
            self.add_soundboard(folder);
        }

        let events = self.device_watcher.poll(self.session.backend_mut());
        for event in events {
            self.session.handle_device_event(event);
        }

        let handled = process_hotkey_presses(self);

        self.session.recover_failed_channels();
        self.session.refresh_sleep_state();
        self.ptt.step(self.session.is_active());

        handled
    }
}

impl HotkeyHost for App {
    fn hotkeys(&mut self) -> &mut HotkeyRegistry<App> {
        &mut self.hotkeys
    }

    fn may_block(&self) -> bool {
        self.inactive && self.session.can_sleep()
    }
}

fn find_sound_mut(boards: &mut [Soundboard], handle: SoundHandle) -> Option<&mut SoundAsset> {
    boards
        .iter_mut()
        .find(|board| board.id() == handle.board)?
        .find_mut(handle.sound)
}
