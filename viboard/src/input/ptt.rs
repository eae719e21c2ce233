//! 按键说话控制
//!
//! 每个轮询周期采样一次“是否有声音仍在播放”，把电平转换为边沿：
//! 需要按下且上次未按下时注入按下，不需要且上次按下时注入松开，其余情况什么也不做。
//! 注入失败时状态保持不变，下一周期重试，因此活动停止后松开事件最终一定会发出。

use super::error::InputError;
use super::keyboard::KeyInjector;
use crate::hotkey::Scancode;

/// 按键说话使用的按键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushToTalkKey {
    pub scancode: Scancode,
    /// 注入时使用的平台原始扫描码
    pub raw: u16,
}

impl PushToTalkKey {
    pub fn new(scancode: Scancode, raw: u16) -> Self {
        Self { scancode, raw }
    }
}

/// 一次注入的按键事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Down,
    Up,
}

/// 按键说话控制器
pub struct PushToTalkController {
    key: Option<PushToTalkKey>,
    enabled: bool,
    /// 当前处于按下状态的原始键码
    held: Option<u16>,
    injector: Box<dyn KeyInjector>,
    last_error: Option<InputError>,
}

impl PushToTalkController {
    pub fn new(injector: Box<dyn KeyInjector>) -> Self {
        Self {
            key: None,
            enabled: false,
            held: None,
            injector,
            last_error: None,
        }
    }

    pub fn key(&self) -> Option<PushToTalkKey> {
        self.key
    }

    /// 按键名称，未设置时为 "None"
    pub fn key_name(&self) -> String {
        self.key
            .map_or_else(|| "None".to_string(), |key| key.scancode.name())
    }

    /// 更换按键，已按下的旧按键会先被松开
    pub fn set_key(&mut self, key: Option<PushToTalkKey>) {
        if self.key == key {
            return;
        }
        self.release();
        self.key = key;
        tracing::info!(key = %self.key_name(), "Push-to-talk key set");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 启用或停用，停用后下一周期松开按键
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// 切换启用状态，返回新状态
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        tracing::info!(enabled = self.enabled, "Push-to-talk toggled");
        self.enabled
    }

    /// 已启用且设置了按键
    pub fn is_armed(&self) -> bool {
        self.enabled && self.key.is_some()
    }

    /// 按键当前是否处于注入的按下状态
    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }

    /// 采样一次播放活动，必要时注入按键事件
    pub fn step(&mut self, activity: bool) -> Option<KeyTransition> {
        let want_pressed = self.is_armed() && activity;

        match (want_pressed, self.held, self.key) {
            (true, None, Some(key)) => {
                self.send(key.raw, true)?;
                self.held = Some(key.raw);
                Some(KeyTransition::Down)
            }
            (false, Some(raw), _) => {
                self.send(raw, false)?;
                self.held = None;
                Some(KeyTransition::Up)
            }
            _ => None,
        }
    }

    fn send(&mut self, raw: u16, pressed: bool) -> Option<()> {
        match self.injector.send_key(raw, pressed) {
            Ok(()) => {
                self.last_error = None;
                Some(())
            }
            Err(e) => {
                if self.last_error.as_ref() != Some(&e) {
                    tracing::warn!(raw, pressed, "Push-to-talk injection failed: {}", e);
                } else {
                    tracing::debug!(raw, pressed, "Push-to-talk injection still failing");
                }
                self.last_error = Some(e);
                None
            }
        }
    }

    fn release(&mut self) {
        if let Some(raw) = self.held.take() {
            if self.send(raw, false).is_none() {
                tracing::error!(raw, "Failed to release push-to-talk key");
            }
        }
    }
}

impl Drop for PushToTalkController {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::error::InputResult;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Recorder {
        events: Rc<RefCell<Vec<(u16, bool)>>>,
        failures: Rc<RefCell<usize>>,
    }

    impl KeyInjector for Recorder {
        fn send_key(&mut self, raw: u16, pressed: bool) -> InputResult<()> {
            let mut failures = self.failures.borrow_mut();
            if *failures > 0 {
                *failures -= 1;
                return Err(InputError::KeyboardSimulationFailed("busy".into()));
            }
            self.events.borrow_mut().push((raw, pressed));
            Ok(())
        }
    }

    fn armed(recorder: &Recorder) -> PushToTalkController {
        let mut ptt = PushToTalkController::new(Box::new(recorder.clone()));
        ptt.set_key(Some(PushToTalkKey::new(Scancode(25), 0x2f)));
        ptt.set_enabled(true);
        ptt
    }

    #[test]
    fn test_edges_only() {
        let recorder = Recorder::default();
        let mut ptt = armed(&recorder);

        let transitions: Vec<_> = [false, false, true, true, false]
            .into_iter()
            .map(|active| ptt.step(active))
            .collect();

        assert_eq!(
            transitions,
            vec![None, None, Some(KeyTransition::Down), None, Some(KeyTransition::Up)]
        );
        assert_eq!(*recorder.events.borrow(), vec![(0x2f, true), (0x2f, false)]);
    }

    #[test]
    fn test_disabled_never_presses() {
        let recorder = Recorder::default();
        let mut ptt = armed(&recorder);
        ptt.set_enabled(false);

        assert_eq!(ptt.step(true), None);
        assert!(recorder.events.borrow().is_empty());
    }

    #[test]
    fn test_disable_while_held_releases() {
        let recorder = Recorder::default();
        let mut ptt = armed(&recorder);

        assert_eq!(ptt.step(true), Some(KeyTransition::Down));
        ptt.set_enabled(false);
        assert_eq!(ptt.step(true), Some(KeyTransition::Up));
        assert!(!ptt.is_held());
    }

    #[test]
    fn test_failed_release_is_retried() {
        let recorder = Recorder::default();
        let mut ptt = armed(&recorder);
        ptt.step(true);

        *recorder.failures.borrow_mut() = 1;
        assert_eq!(ptt.step(false), None);
        assert!(ptt.is_held());
        assert_eq!(ptt.step(false), Some(KeyTransition::Up));
        assert_eq!(*recorder.events.borrow(), vec![(0x2f, true), (0x2f, false)]);
    }

    #[test]
    fn test_key_change_releases_old_key() {
        let recorder = Recorder::default();
        let mut ptt = armed(&recorder);
        ptt.step(true);

        ptt.set_key(Some(PushToTalkKey::new(Scancode(26), 0x11)));
        assert!(!ptt.is_held());
        assert_eq!(ptt.step(true), Some(KeyTransition::Down));
        assert_eq!(
            *recorder.events.borrow(),
            vec![(0x2f, true), (0x2f, false), (0x11, true)]
        );
    }

    #[test]
    fn test_drop_releases_held_key() {
        let recorder = Recorder::default();
        let mut ptt = armed(&recorder);
        ptt.step(true);
        drop(ptt);

        assert_eq!(recorder.events.borrow().last(), Some(&(0x2f, false)));
    }

    #[test]
    fn test_toggle_and_name() {
        let recorder = Recorder::default();
        let mut ptt = PushToTalkController::new(Box::new(recorder));
        assert_eq!(ptt.key_name(), "None");
        assert!(!ptt.is_armed());

        ptt.set_key(Some(PushToTalkKey::new(Scancode(25), 0x2f)));
        assert_eq!(ptt.key_name(), "V");
        assert!(ptt.toggle());
        assert!(ptt.is_armed());
        assert!(!ptt.toggle());
    }
}
