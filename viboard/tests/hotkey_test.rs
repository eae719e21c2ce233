//! 热键模块集成测试

use viboard_lib::hotkey::{
    classify_hotkey_press, process_hotkey_presses, CaptureOutcome, ForwardedBackend,
    ForwardedKeys, Hotkey, HotkeyBinding, HotkeyError, HotkeyHost, HotkeyId, HotkeyRegistry,
    Modifiers, Scancode,
};

struct Board {
    hotkeys: HotkeyRegistry<Board>,
    log: Vec<String>,
    bindings: Vec<HotkeyBinding>,
}

impl HotkeyHost for Board {
    fn hotkeys(&mut self) -> &mut HotkeyRegistry<Board> {
        &mut self.hotkeys
    }

    fn may_block(&self) -> bool {
        false
    }
}

fn board() -> (Board, ForwardedKeys) {
    let (backend, keys) = ForwardedBackend::new();
    (
        Board {
            hotkeys: HotkeyRegistry::new(Box::new(backend)),
            log: Vec::new(),
            bindings: Vec::new(),
        },
        keys,
    )
}

fn hotkey(scancode: u16, mods: Modifiers) -> Hotkey {
    Hotkey::new(Scancode(scancode), 0x10 + scancode, mods)
}

fn logger(name: &'static str) -> impl FnMut(&mut Board) + 'static {
    move |board: &mut Board| board.log.push(name.to_string())
}

// ============================================================================
// 注册表测试
// ============================================================================

#[test]
fn test_ids_are_never_reused() {
    let (mut board, _keys) = board();
    let a = board
        .hotkeys
        .register(hotkey(4, Modifiers::LCTRL), logger("a"))
        .unwrap();
    let b = board
        .hotkeys
        .register(hotkey(5, Modifiers::LCTRL), logger("b"))
        .unwrap();
    assert_eq!((a, b), (HotkeyId(0), HotkeyId(1)));

    board.hotkeys.unregister(a).unwrap();
    assert!(!board.hotkeys.is_valid(a));
    assert_eq!(board.hotkeys.name(a), "None");

    let c = board
        .hotkeys
        .register(hotkey(4, Modifiers::LCTRL), logger("c"))
        .unwrap();
    assert_eq!(c, HotkeyId(2));
    assert_eq!(board.hotkeys.len(), 3);
    assert_eq!(board.hotkeys.bound_count(), 2);
}

#[test]
fn test_invalid_ids_are_safe() {
    let (mut board, _keys) = board();
    for id in [HotkeyId::NULL, HotkeyId(0), HotkeyId(99)] {
        assert!(!board.hotkeys.is_valid(id));
        assert_eq!(board.hotkeys.get(id), None);
        assert_eq!(board.hotkeys.name(id), "None");
        assert_eq!(
            board.hotkeys.unregister(id),
            Err(HotkeyError::NotRegistered(id.0))
        );
    }
}

#[test]
fn test_os_rejection_adds_no_slot() {
    let (mut board, keys) = board();
    keys.reserve(Scancode(4), Modifiers::LALT);

    let err = board
        .hotkeys
        .register(hotkey(4, Modifiers::RALT), logger("a"))
        .unwrap_err();
    assert!(matches!(err, HotkeyError::RegistrationFailed { .. }));
    assert!(board.hotkeys.is_empty());
}

// ============================================================================
// 分发测试
// ============================================================================

#[test]
fn test_callback_unregistering_a_later_press_in_the_same_cycle() {
    let (mut board, keys) = board();
    let victim = board
        .hotkeys
        .register(hotkey(5, Modifiers::LCTRL), logger("victim"))
        .unwrap();
    board
        .hotkeys
        .register(hotkey(4, Modifiers::LCTRL), move |board: &mut Board| {
            board.log.push("killer".to_string());
            board.hotkeys.unregister(victim).unwrap();
        })
        .unwrap();

    assert!(keys.press(Scancode(4), Modifiers::LCTRL));
    assert!(keys.press(Scancode(5), Modifiers::RCTRL));

    assert_eq!(process_hotkey_presses(&mut board), 1);
    assert_eq!(board.log, vec!["killer"]);
    assert!(!board.hotkeys.is_valid(victim));
}

#[test]
fn test_callback_registers_new_hotkey() {
    let (mut board, keys) = board();
    board
        .hotkeys
        .register(hotkey(4, Modifiers::LCTRL), |board: &mut Board| {
            let binding = board
                .hotkeys
                .register_binding(hotkey(6, Modifiers::LCTRL), logger("added"))
                .unwrap();
            board.bindings.push(binding);
        })
        .unwrap();

    keys.press(Scancode(4), Modifiers::LCTRL);
    process_hotkey_presses(&mut board);
    assert_eq!(board.bindings.len(), 1);

    keys.press(Scancode(6), Modifiers::LCTRL);
    process_hotkey_presses(&mut board);
    assert_eq!(board.log, vec!["added"]);
}

#[test]
fn test_dropped_binding_is_released_before_dispatch() {
    let (mut board, keys) = board();
    let binding = board
        .hotkeys
        .register_binding(hotkey(4, Modifiers::LCTRL), logger("a"))
        .unwrap();
    board.bindings.push(binding);
    assert_eq!(keys.registered(), 1);

    board.bindings.clear();
    assert_eq!(keys.registered(), 1);

    process_hotkey_presses(&mut board);
    assert_eq!(keys.registered(), 0);
    assert!(!keys.press(Scancode(4), Modifiers::LCTRL));
    assert!(board.log.is_empty());
}

// ============================================================================
// 捕获后注册
// ============================================================================

#[test]
fn test_captured_combination_registers_without_unsupported_bits() {
    let (mut board, _keys) = board();
    let press = classify_hotkey_press(
        Scancode(62),
        0x3f,
        Modifiers::LSHIFT | Modifiers::LCTRL | Modifiers::CAPS,
    );
    let CaptureOutcome::Bind(captured) = press else {
        panic!("expected a binding, got {:?}", press);
    };

    let id = board.hotkeys.register(captured, logger("f5")).unwrap();
    assert_eq!(board.hotkeys.name(id), "Ctrl+Shift+F5");
    assert_eq!(
        board.hotkeys.get(id).map(|hotkey| hotkey.mods),
        Some(Modifiers::LSHIFT | Modifiers::LCTRL)
    );
}

#[test]
fn test_capture_special_keys() {
    assert_eq!(
        classify_hotkey_press(Scancode::ESCAPE, 0x01, Modifiers::NONE),
        CaptureOutcome::Cancel
    );
    assert_eq!(
        classify_hotkey_press(Scancode::DELETE, 0x53, Modifiers::NUM),
        CaptureOutcome::Clear
    );
    assert_eq!(
        classify_hotkey_press(Scancode::F12, 0x58, Modifiers::NONE),
        CaptureOutcome::Ignore
    );
    assert!(matches!(
        classify_hotkey_press(Scancode::F12, 0x58, Modifiers::LALT),
        CaptureOutcome::Bind(_)
    ));
    assert_eq!(
        classify_hotkey_press(Scancode::NUM_LOCK, 0x45, Modifiers::RCTRL),
        CaptureOutcome::Ignore
    );
}
