//! 扫描码名称表

use super::types::Scancode;

const LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// 扫描码对应的显示名称
///
/// 未知扫描码返回空字符串，表外的扫描码返回 "Key N"。
pub fn scancode_name(scancode: Scancode) -> String {
    let code = scancode.0;
    let name = match code {
        0 => "",
        4..=29 => {
            let index = usize::from(code - 4);
            return LETTERS[index..=index].to_string();
        }
        30..=38 => return (code - 29).to_string(),
        39 => "0",
        40 => "Return",
        41 => "Escape",
        42 => "Backspace",
        43 => "Tab",
        44 => "Space",
        45 => "-",
        46 => "=",
        47 => "[",
        48 => "]",
        49 => "\\",
        50 => "#",
        51 => ";",
        52 => "'",
        53 => "`",
        54 => ",",
        55 => ".",
        56 => "/",
        57 => "CapsLock",
        58..=69 => return format!("F{}", code - 57),
        70 => "PrintScreen",
        71 => "ScrollLock",
        72 => "Pause",
        73 => "Insert",
        74 => "Home",
        75 => "PageUp",
        76 => "Delete",
        77 => "End",
        78 => "PageDown",
        79 => "Right",
        80 => "Left",
        81 => "Down",
        82 => "Up",
        83 => "Numlock",
        84 => "Keypad /",
        85 => "Keypad *",
        86 => "Keypad -",
        87 => "Keypad +",
        88 => "Keypad Enter",
        89..=97 => return format!("Keypad {}", code - 88),
        98 => "Keypad 0",
        99 => "Keypad .",
        101 => "Application",
        102 => "Power",
        103 => "Keypad =",
        104..=115 => return format!("F{}", code - 91),
        116 => "Execute",
        117 => "Help",
        118 => "Menu",
        119 => "Select",
        120 => "Stop",
        121 => "Again",
        122 => "Undo",
        123 => "Cut",
        124 => "Copy",
        125 => "Paste",
        126 => "Find",
        127 => "Mute",
        128 => "VolumeUp",
        129 => "VolumeDown",
        224 => "Left Ctrl",
        225 => "Left Shift",
        226 => "Left Alt",
        227 => "Left GUI",
        228 => "Right Ctrl",
        229 => "Right Shift",
        230 => "Right Alt",
        231 => "Right GUI",
        _ => return format!("Key {}", code),
    };
    name.to_string()
}
