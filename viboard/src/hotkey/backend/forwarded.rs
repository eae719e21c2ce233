//! 转发按键后端
//!
//! 在没有系统全局热键的平台上，由界面层把按键事件转发给 [`ForwardedKeys`]，
//! 匹配到的热键在下一次轮询时交给分发器。测试中也用它代替系统。

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::rc::Rc;

use tracing::debug;

use super::HotkeyBackend;
use crate::hotkey::error::{HotkeyError, HotkeyResult};
use crate::hotkey::types::{Hotkey, HotkeyId, Modifiers, Scancode};

type Chord = (Scancode, (bool, bool, bool));

fn chord(scancode: Scancode, mods: Modifiers) -> Chord {
    (scancode, mods.chord())
}

#[derive(Debug, Default)]
struct ForwardedState {
    bindings: BTreeMap<HotkeyId, Hotkey>,
    reserved: HashSet<Chord>,
    pending: VecDeque<HotkeyId>,
    polls: usize,
}

/// 由转发按键驱动的后端
#[derive(Debug)]
pub struct ForwardedBackend {
    state: Rc<RefCell<ForwardedState>>,
}

/// 向 [`ForwardedBackend`] 转发按键的句柄
#[derive(Debug, Clone)]
pub struct ForwardedKeys {
    state: Rc<RefCell<ForwardedState>>,
}

impl ForwardedBackend {
    /// 创建后端及其按键转发句柄
    pub fn new() -> (Self, ForwardedKeys) {
        let state = Rc::new(RefCell::new(ForwardedState::default()));
        (
            Self {
                state: Rc::clone(&state),
            },
            ForwardedKeys { state },
        )
    }
}

impl HotkeyBackend for ForwardedBackend {
    fn register(&mut self, id: HotkeyId, hotkey: &Hotkey) -> HotkeyResult<()> {
        let mut state = self.state.borrow_mut();
        let wanted = chord(hotkey.scancode, hotkey.mods);

        let taken = state.reserved.contains(&wanted)
            || state
                .bindings
                .values()
                .any(|bound| chord(bound.scancode, bound.mods) == wanted);
        if taken {
            return Err(HotkeyError::RegistrationFailed {
                hotkey: hotkey.name(),
                reason: "combination is already in use".to_string(),
            });
        }

        state.bindings.insert(id, *hotkey);
        Ok(())
    }

    fn unregister(&mut self, id: HotkeyId) -> HotkeyResult<()> {
        let mut state = self.state.borrow_mut();
        match state.bindings.remove(&id) {
            Some(_) => {
                state.pending.retain(|pending| *pending != id);
                Ok(())
            }
            None => Err(HotkeyError::UnregistrationFailed {
                hotkey: id.to_string(),
                reason: "not registered with the backend".to_string(),
            }),
        }
    }

    fn poll(&mut self, _may_block: bool) -> Vec<HotkeyId> {
        let mut state = self.state.borrow_mut();
        state.polls += 1;
        state.pending.drain(..).collect()
    }
}

impl ForwardedKeys {
    /// 转发一次按键，返回是否匹配到已注册的热键
    ///
    /// Ctrl/Alt/Shift 不区分左右，NumLock 状态不参与匹配。
    pub fn press(&self, scancode: Scancode, mods: Modifiers) -> bool {
        let mut state = self.state.borrow_mut();
        let pressed = chord(scancode, mods);
        let matched = state
            .bindings
            .iter()
            .find(|(_, hotkey)| chord(hotkey.scancode, hotkey.mods) == pressed)
            .map(|(id, _)| *id);

        match matched {
            Some(id) => {
                debug!("Forwarded key matched hotkey {}", id);
                state.pending.push_back(id);
                true
            }
            None => false,
        }
    }

    /// 模拟被其他程序占用的组合，之后注册该组合会失败
    pub fn reserve(&self, scancode: Scancode, mods: Modifiers) {
        self.state.borrow_mut().reserved.insert(chord(scancode, mods));
    }

    /// 当前在后端注册的热键数量
    pub fn registered(&self) -> usize {
        self.state.borrow().bindings.len()
    }

    /// 某个编号是否仍在后端注册
    pub fn is_registered(&self, id: HotkeyId) -> bool {
        self.state.borrow().bindings.contains_key(&id)
    }

    /// 后端被轮询的次数
    pub fn polls(&self) -> usize {
        self.state.borrow().polls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hotkey(code: u16, mods: Modifiers) -> Hotkey {
        Hotkey::new(Scancode(code), code, mods)
    }

    #[test]
    fn test_press_matches_either_side() {
        let (mut backend, keys) = ForwardedBackend::new();
        backend
            .register(HotkeyId(0), &hotkey(4, Modifiers::LCTRL))
            .unwrap();

        assert!(keys.press(Scancode(4), Modifiers::RCTRL | Modifiers::NUM));
        assert!(!keys.press(Scancode(4), Modifiers::NONE));
        assert_eq!(backend.poll(false), vec![HotkeyId(0)]);
        assert!(backend.poll(false).is_empty());
    }

    #[test]
    fn test_duplicate_and_reserved_combinations_fail() {
        let (mut backend, keys) = ForwardedBackend::new();
        backend
            .register(HotkeyId(0), &hotkey(5, Modifiers::NONE))
            .unwrap();
        assert!(backend.register(HotkeyId(1), &hotkey(5, Modifiers::NONE)).is_err());

        keys.reserve(Scancode(6), Modifiers::LALT);
        assert!(backend.register(HotkeyId(2), &hotkey(6, Modifiers::RALT)).is_err());
        assert_eq!(keys.registered(), 1);
    }

    #[test]
    fn test_unregister_drops_pending() {
        let (mut backend, keys) = ForwardedBackend::new();
        backend
            .register(HotkeyId(0), &hotkey(7, Modifiers::NONE))
            .unwrap();
        keys.press(Scancode(7), Modifiers::NONE);
        backend.unregister(HotkeyId(0)).unwrap();

        assert!(backend.poll(false).is_empty());
        assert!(backend.unregister(HotkeyId(0)).is_err());
    }
}
