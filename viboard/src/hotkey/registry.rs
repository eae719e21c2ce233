//! 热键注册表与分发
//!
//! 注册表是只追加的槽位数组，编号即数组下标。注销只把槽位置为空闲，
//! 槽位永不回收，因此已发出的编号不会被悄悄赋予新的含义。
//!
//! 回调以宿主的可变引用为参数，在轮询线程上同步执行。回调执行期间其槽位中的
//! 闭包被临时取出，因此回调可以自由地注册、注销其他热键或修改宿主状态。

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, error, info, warn};

use super::backend::HotkeyBackend;
use super::error::{HotkeyError, HotkeyResult};
use super::types::{Hotkey, HotkeyId};

/// 热键回调，参数为拥有注册表的宿主
pub type HotkeyCallback<C> = Box<dyn FnMut(&mut C)>;

type ReleaseQueue = Rc<RefCell<Vec<HotkeyId>>>;

/// 槽位状态
enum Slot<C> {
    /// 已注销
    Free,
    /// 已注册；回调执行期间 `callback` 为 `None`
    Bound {
        hotkey: Hotkey,
        callback: Option<HotkeyCallback<C>>,
    },
}

/// 热键注册表
pub struct HotkeyRegistry<C> {
    slots: Vec<Slot<C>>,
    backend: Box<dyn HotkeyBackend>,
    releases: ReleaseQueue,
}

impl<C> HotkeyRegistry<C> {
    /// 使用给定后端创建空注册表
    pub fn new(backend: Box<dyn HotkeyBackend>) -> Self {
        Self {
            slots: Vec::new(),
            backend,
            releases: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// 注册热键
    ///
    /// 不支持的修饰键位会被清除。系统注册失败时不会新增槽位。
    ///
    /// # Errors
    ///
    /// - `HotkeyError::InvalidHotkey` - 扫描码未知或缺少原始键码
    /// - `HotkeyError::RegistrationFailed` - 系统拒绝注册
    pub fn register(
        &mut self,
        hotkey: Hotkey,
        callback: impl FnMut(&mut C) + 'static,
    ) -> HotkeyResult<HotkeyId> {
        self.reclaim();

        if !hotkey.scancode.is_known() {
            return Err(HotkeyError::InvalidHotkey(format!(
                "unknown scancode {}",
                hotkey.scancode.0
            )));
        }
        if hotkey.raw == 0 {
            return Err(HotkeyError::InvalidHotkey(format!(
                "{} has no raw key code",
                hotkey.name()
            )));
        }

        let hotkey = Hotkey::new(hotkey.scancode, hotkey.raw, hotkey.mods);
        let id = HotkeyId(self.slots.len() as i32);
        self.backend.register(id, &hotkey)?;

        self.slots.push(Slot::Bound {
            hotkey,
            callback: Some(Box::new(callback)),
        });
        info!(id = id.0, hotkey = %hotkey, "Registered hotkey");
        Ok(id)
    }

    /// 注册热键并返回其所有权句柄
    pub fn register_binding(
        &mut self,
        hotkey: Hotkey,
        callback: impl FnMut(&mut C) + 'static,
    ) -> HotkeyResult<HotkeyBinding> {
        let id = self.register(hotkey, callback)?;
        Ok(self.binding(id))
    }

    /// 注销热键
    ///
    /// # Errors
    ///
    /// - `HotkeyError::NotRegistered` - 编号越界或槽位空闲
    /// - `HotkeyError::UnregistrationFailed` - 系统拒绝注销，槽位保持注册状态
    pub fn unregister(&mut self, id: HotkeyId) -> HotkeyResult<()> {
        let hotkey = self.get(id).ok_or(HotkeyError::NotRegistered(id.0))?;
        self.backend.unregister(id)?;

        if let Some(slot) = id.index().and_then(|i| self.slots.get_mut(i)) {
            *slot = Slot::Free;
        }
        info!(id = id.0, hotkey = %hotkey, "Unregistered hotkey");
        Ok(())
    }

    /// 编号是否指向已注册的槽位
    pub fn is_valid(&self, id: HotkeyId) -> bool {
        self.get(id).is_some()
    }

    /// 已注册槽位的按键组合
    pub fn get(&self, id: HotkeyId) -> Option<Hotkey> {
        match id.index().and_then(|i| self.slots.get(i)) {
            Some(Slot::Bound { hotkey, .. }) => Some(*hotkey),
            _ => None,
        }
    }

    /// 显示名称，无效编号为 "None"
    pub fn name(&self, id: HotkeyId) -> String {
        self.get(id)
            .map_or_else(|| "None".to_string(), |hotkey| hotkey.name())
    }

    /// 为编号创建所有权句柄，句柄被丢弃时热键在下一次 [`reclaim`](Self::reclaim) 时注销
    pub fn binding(&self, id: HotkeyId) -> HotkeyBinding {
        HotkeyBinding {
            id,
            releases: Rc::downgrade(&self.releases),
        }
    }

    /// 注销所有句柄已被丢弃的热键
    ///
    /// 失败只记录日志，不会中断。
    pub fn reclaim(&mut self) {
        let released: Vec<HotkeyId> = self.releases.borrow_mut().drain(..).collect();
        for id in released {
            if !self.is_valid(id) {
                debug!(id = id.0, "Released hotkey was already unregistered");
                continue;
            }
            if let Err(e) = self.unregister(id) {
                error!(id = id.0, "Failed to release hotkey: {}", e);
            }
        }
    }

    /// 注销所有热键
    pub fn unregister_all(&mut self) {
        let bound: Vec<HotkeyId> = (0..self.slots.len())
            .map(|i| HotkeyId(i as i32))
            .filter(|id| self.is_valid(*id))
            .collect();
        for id in bound {
            if let Err(e) = self.unregister(id) {
                error!(id = id.0, "Failed to unregister hotkey: {}", e);
            }
        }
    }

    /// 已分配的槽位总数（包括空闲槽位）
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 已注册的热键数量
    pub fn bound_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Bound { .. }))
            .count()
    }

    fn take_callback(&mut self, id: HotkeyId) -> Option<HotkeyCallback<C>> {
        match id.index().and_then(|i| self.slots.get_mut(i)) {
            Some(Slot::Bound { callback, .. }) => callback.take(),
            _ => None,
        }
    }

    fn restore_callback(&mut self, id: HotkeyId, restored: HotkeyCallback<C>) {
        if let Some(Slot::Bound { callback, .. }) = id.index().and_then(|i| self.slots.get_mut(i))
        {
            if callback.is_none() {
                *callback = Some(restored);
            }
        }
    }
}

impl<C> fmt::Debug for HotkeyRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotkeyRegistry")
            .field("slots", &self.slots.len())
            .field("bound", &self.bound_count())
            .finish()
    }
}

impl<C> Drop for HotkeyRegistry<C> {
    fn drop(&mut self) {
        self.releases.borrow_mut().clear();
        self.unregister_all();
    }
}

/// 热键所有权句柄
///
/// 持有者被丢弃时，热键会在注册表下一次回收时注销。注册表已销毁时什么也不做。
pub struct HotkeyBinding {
    id: HotkeyId,
    releases: Weak<RefCell<Vec<HotkeyId>>>,
}

impl HotkeyBinding {
    pub fn id(&self) -> HotkeyId {
        self.id
    }
}

impl fmt::Debug for HotkeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HotkeyBinding").field(&self.id).finish()
    }
}

impl Drop for HotkeyBinding {
    fn drop(&mut self) {
        if let Some(releases) = self.releases.upgrade() {
            releases.borrow_mut().push(self.id);
        }
    }
}

/// 拥有热键注册表的宿主
pub trait HotkeyHost: Sized {
    fn hotkeys(&mut self) -> &mut HotkeyRegistry<Self>;

    /// 本周期内是否允许阻塞等待系统消息
    fn may_block(&self) -> bool;
}

/// 执行一次热键分发
///
/// 先回收已丢弃的绑定，再从后端取出本周期触发的热键并依次同步调用回调。
/// 返回执行的回调数量。
pub fn process_hotkey_presses<H: HotkeyHost>(host: &mut H) -> usize {
    let may_block = host.may_block();
    let fired = {
        let registry = host.hotkeys();
        registry.reclaim();
        registry.backend.poll(may_block)
    };

    let mut handled = 0;
    for id in fired {
        let Some(mut callback) = host.hotkeys().take_callback(id) else {
            warn!(id = id.0, "Hotkey fired but is not registered");
            continue;
        };
        debug!(id = id.0, "Dispatching hotkey");
        callback(host);
        host.hotkeys().restore_callback(id, callback);
        handled += 1;
    }
    handled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::backend::{ForwardedBackend, ForwardedKeys};
    use crate::hotkey::types::{Modifiers, Scancode};

    struct Host {
        hotkeys: HotkeyRegistry<Host>,
        fired: Vec<&'static str>,
        extra: Option<HotkeyId>,
    }

    impl HotkeyHost for Host {
        fn hotkeys(&mut self) -> &mut HotkeyRegistry<Host> {
            &mut self.hotkeys
        }

        fn may_block(&self) -> bool {
            false
        }
    }

    fn host() -> (Host, ForwardedKeys) {
        let (backend, keys) = ForwardedBackend::new();
        let host = Host {
            hotkeys: HotkeyRegistry::new(Box::new(backend)),
            fired: Vec::new(),
            extra: None,
        };
        (host, keys)
    }

    fn key(code: u16) -> Hotkey {
        Hotkey::new(Scancode(code), code + 100, Modifiers::NONE)
    }

    // ====== 注册测试 ======

    #[test]
    fn test_register_and_lookup() {
        let (mut host, keys) = host();
        let id = host.hotkeys.register(key(4), |_| {}).unwrap();

        assert_eq!(id, HotkeyId(0));
        assert!(host.hotkeys.is_valid(id));
        assert_eq!(host.hotkeys.get(id), Some(key(4)));
        assert_eq!(host.hotkeys.name(id), "A");
        assert_eq!(keys.registered(), 1);
    }

    #[test]
    fn test_unregister_frees_without_reuse() {
        let (mut host, _keys) = host();
        let first = host.hotkeys.register(key(4), |_| {}).unwrap();
        host.hotkeys.unregister(first).unwrap();

        assert!(!host.hotkeys.is_valid(first));
        assert_eq!(host.hotkeys.name(first), "None");

        let second = host.hotkeys.register(key(4), |_| {}).unwrap();
        assert_ne!(first, second);
        assert_eq!(host.hotkeys.len(), 2);
        assert_eq!(host.hotkeys.bound_count(), 1);
    }

    #[test]
    fn test_invalid_lookups_are_safe() {
        let (mut host, _keys) = host();
        assert!(!host.hotkeys.is_valid(HotkeyId::NULL));
        assert!(!host.hotkeys.is_valid(HotkeyId(99)));
        assert_eq!(host.hotkeys.name(HotkeyId::NULL), "None");
        assert_eq!(
            host.hotkeys.unregister(HotkeyId(5)),
            Err(HotkeyError::NotRegistered(5))
        );
    }

    #[test]
    fn test_rejected_registration_adds_no_slot() {
        let (mut host, keys) = host();
        keys.reserve(Scancode(4), Modifiers::NONE);

        assert!(host.hotkeys.register(key(4), |_| {}).is_err());
        assert!(host.hotkeys.is_empty());
        assert!(matches!(
            host.hotkeys.register(Hotkey::new(Scancode::UNKNOWN, 1, Modifiers::NONE), |_| {}),
            Err(HotkeyError::InvalidHotkey(_))
        ));
        assert!(matches!(
            host.hotkeys.register(Hotkey::new(Scancode(5), 0, Modifiers::NONE), |_| {}),
            Err(HotkeyError::InvalidHotkey(_))
        ));
    }

    #[test]
    fn test_register_strips_mods() {
        let (mut host, _keys) = host();
        let raw = Hotkey {
            scancode: Scancode(4),
            raw: 30,
            mods: Modifiers::LCTRL | Modifiers::LGUI,
        };
        let id = host.hotkeys.register(raw, |_| {}).unwrap();
        assert_eq!(host.hotkeys.get(id).unwrap().mods, Modifiers::LCTRL);
    }

    // ====== 绑定句柄测试 ======

    #[test]
    fn test_dropped_binding_is_reclaimed() {
        let (mut host, keys) = host();
        let binding = host.hotkeys.register_binding(key(4), |_| {}).unwrap();
        let id = binding.id();

        drop(binding);
        assert!(host.hotkeys.is_valid(id));
        host.hotkeys.reclaim();
        assert!(!host.hotkeys.is_valid(id));
        assert_eq!(keys.registered(), 0);
    }

    #[test]
    fn test_binding_outliving_registry() {
        let (host, _keys) = host();
        let binding = host.hotkeys.binding(HotkeyId(0));
        drop(host);
        drop(binding);
    }

    // ====== 分发测试 ======

    #[test]
    fn test_dispatch_invokes_callback() {
        let (mut host, keys) = host();
        host.hotkeys
            .register(key(4), |host: &mut Host| host.fired.push("a"))
            .unwrap();
        host.hotkeys
            .register(key(5), |host: &mut Host| host.fired.push("b"))
            .unwrap();

        keys.press(Scancode(5), Modifiers::NONE);
        keys.press(Scancode(4), Modifiers::NONE);
        assert_eq!(process_hotkey_presses(&mut host), 2);
        assert_eq!(host.fired, vec!["b", "a"]);

        keys.press(Scancode(4), Modifiers::NONE);
        process_hotkey_presses(&mut host);
        assert_eq!(host.fired, vec!["b", "a", "a"]);
    }

    #[test]
    fn test_callback_can_mutate_registry() {
        let (mut host, keys) = host();
        let victim = host.hotkeys.register(key(5), |host: &mut Host| host.fired.push("victim")).unwrap();
        host.hotkeys
            .register(key(4), move |host: &mut Host| {
                host.fired.push("mutator");
                host.hotkeys.unregister(victim).unwrap();
                host.extra = host.hotkeys.register(key(6), |_| {}).ok();
            })
            .unwrap();

        keys.press(Scancode(4), Modifiers::NONE);
        process_hotkey_presses(&mut host);

        assert_eq!(host.fired, vec!["mutator"]);
        assert!(!host.hotkeys.is_valid(victim));
        assert_eq!(host.extra, Some(HotkeyId(2)));
        assert!(!keys.press(Scancode(5), Modifiers::NONE));
    }

    #[test]
    fn test_callback_unregistering_itself() {
        let (mut host, keys) = host();
        host.hotkeys
            .register(key(4), |host: &mut Host| {
                host.fired.push("once");
                host.hotkeys.unregister(HotkeyId(0)).unwrap();
            })
            .unwrap();

        keys.press(Scancode(4), Modifiers::NONE);
        process_hotkey_presses(&mut host);

        assert_eq!(host.fired, vec!["once"]);
        assert_eq!(host.hotkeys.bound_count(), 0);
    }

    #[test]
    fn test_drop_unregisters_everything() {
        let (mut host, keys) = host();
        host.hotkeys.register(key(4), |_| {}).unwrap();
        host.hotkeys.register(key(5), |_| {}).unwrap();
        assert_eq!(keys.registered(), 2);

        drop(host);
        assert_eq!(keys.registered(), 0);
    }
}
