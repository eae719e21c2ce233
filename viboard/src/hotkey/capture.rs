//! 按键捕获规则
//!
//! 用户为声音或功能分配热键时，界面层把下一次按键转发到这里，由这里决定
//! 忽略、取消、清除还是绑定。

use super::types::{Hotkey, Modifiers, Scancode};

/// 一次按键捕获的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// 继续等待下一次按键
    Ignore,
    /// 放弃分配，保留原有绑定
    Cancel,
    /// 清除已有绑定
    Clear,
    /// 绑定到该组合
    Bind(Hotkey),
}

/// 判断热键分配时的一次按键
///
/// - 修饰键本身、单独的 F12、Ctrl+NumLock、Ctrl+ScrollLock 被忽略
/// - 单独的 Escape 取消，单独的 Delete 清除
/// - 其余组合在清除不支持的修饰键位后绑定
pub fn classify_hotkey_press(scancode: Scancode, raw: u16, mods: Modifiers) -> CaptureOutcome {
    let mods = mods.strip_unsupported();
    let plain = !mods.ctrl() && !mods.alt() && !mods.shift();

    if scancode.is_modifier() || !scancode.is_known() {
        return CaptureOutcome::Ignore;
    }
    if plain && scancode == Scancode::F12 {
        return CaptureOutcome::Ignore;
    }
    if mods.ctrl() && (scancode == Scancode::NUM_LOCK || scancode == Scancode::SCROLL_LOCK) {
        return CaptureOutcome::Ignore;
    }
    if plain && scancode == Scancode::ESCAPE {
        return CaptureOutcome::Cancel;
    }
    if plain && scancode == Scancode::DELETE {
        return CaptureOutcome::Clear;
    }

    CaptureOutcome::Bind(Hotkey::new(scancode, raw, mods))
}

/// 判断按键说话按键捕获时的一次按键
///
/// Delete 清除，Escape 取消，其余按键直接设为按键说话按键。
pub fn classify_push_to_talk_press(scancode: Scancode, raw: u16) -> CaptureOutcome {
    match scancode {
        Scancode::DELETE => CaptureOutcome::Clear,
        Scancode::ESCAPE => CaptureOutcome::Cancel,
        other if other.is_known() => {
            CaptureOutcome::Bind(Hotkey::new(other, raw, Modifiers::NONE))
        }
        _ => CaptureOutcome::Ignore,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_keys_are_ignored() {
        assert_eq!(
            classify_hotkey_press(Scancode::LCTRL, 0x1d, Modifiers::LCTRL),
            CaptureOutcome::Ignore
        );
        assert_eq!(
            classify_hotkey_press(Scancode(229), 0x36, Modifiers::RSHIFT),
            CaptureOutcome::Ignore
        );
    }

    #[test]
    fn test_reserved_combinations_are_ignored() {
        assert_eq!(
            classify_hotkey_press(Scancode::F12, 0x58, Modifiers::NONE),
            CaptureOutcome::Ignore
        );
        assert_eq!(
            classify_hotkey_press(Scancode::NUM_LOCK, 0x45, Modifiers::LCTRL),
            CaptureOutcome::Ignore
        );
        assert_eq!(
            classify_hotkey_press(Scancode::SCROLL_LOCK, 0x46, Modifiers::RCTRL),
            CaptureOutcome::Ignore
        );
    }

    #[test]
    fn test_modified_f12_binds() {
        let outcome = classify_hotkey_press(Scancode::F12, 0x58, Modifiers::LSHIFT);
        assert_eq!(
            outcome,
            CaptureOutcome::Bind(Hotkey::new(Scancode::F12, 0x58, Modifiers::LSHIFT))
        );
    }

    #[test]
    fn test_escape_and_delete() {
        assert_eq!(
            classify_hotkey_press(Scancode::ESCAPE, 0x01, Modifiers::NONE),
            CaptureOutcome::Cancel
        );
        assert_eq!(
            classify_hotkey_press(Scancode::DELETE, 0x53, Modifiers::NUM),
            CaptureOutcome::Clear
        );
        assert!(matches!(
            classify_hotkey_press(Scancode::DELETE, 0x53, Modifiers::LALT),
            CaptureOutcome::Bind(_)
        ));
    }

    #[test]
    fn test_bind_strips_unsupported_mods() {
        let outcome = classify_hotkey_press(Scancode(4), 0x1e, Modifiers::LGUI | Modifiers::LALT);
        match outcome {
            CaptureOutcome::Bind(hotkey) => assert_eq!(hotkey.mods, Modifiers::LALT),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_push_to_talk_capture() {
        assert_eq!(
            classify_push_to_talk_press(Scancode::DELETE, 0x53),
            CaptureOutcome::Clear
        );
        assert_eq!(
            classify_push_to_talk_press(Scancode::ESCAPE, 0x01),
            CaptureOutcome::Cancel
        );
        assert_eq!(
            classify_push_to_talk_press(Scancode(25), 0x2f),
            CaptureOutcome::Bind(Hotkey::new(Scancode(25), 0x2f, Modifiers::NONE))
        );
        assert_eq!(
            classify_push_to_talk_press(Scancode::UNKNOWN, 0),
            CaptureOutcome::Ignore
        );
    }
}
