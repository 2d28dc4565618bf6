//! Modifier bits, virtual-key names and the `HotkeyCombo` value type.
//!
//! Key codes are Windows-style virtual keys, which is what profile files have
//! always stored. Each entry also carries the layout-independent `Code` the
//! OS hotkey backend registers.

use global_hotkey::hotkey::{Code, Modifiers};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MOD_ALT: u32 = 0x0001;
pub const MOD_CONTROL: u32 = 0x0002;
pub const MOD_SHIFT: u32 = 0x0004;
const MOD_MASK: u32 = MOD_ALT | MOD_CONTROL | MOD_SHIFT;

pub const VK_OEM_PLUS: u32 = 0xBB;

pub struct KeySpec {
    pub vk: u32,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub code: Code,
}

macro_rules! key {
    ($vk:expr, $name:expr, $code:ident) => {
        KeySpec { vk: $vk, name: $name, aliases: &[], code: Code::$code }
    };
    ($vk:expr, $name:expr, $code:ident, [$($alias:expr),*]) => {
        KeySpec { vk: $vk, name: $name, aliases: &[$($alias),*], code: Code::$code }
    };
}

static KEYS: &[KeySpec] = &[
    key!(0x41, "A", KeyA),
    key!(0x42, "B", KeyB),
    key!(0x43, "C", KeyC),
    key!(0x44, "D", KeyD),
    key!(0x45, "E", KeyE),
    key!(0x46, "F", KeyF),
    key!(0x47, "G", KeyG),
    key!(0x48, "H", KeyH),
    key!(0x49, "I", KeyI),
    key!(0x4A, "J", KeyJ),
    key!(0x4B, "K", KeyK),
    key!(0x4C, "L", KeyL),
    key!(0x4D, "M", KeyM),
    key!(0x4E, "N", KeyN),
    key!(0x4F, "O", KeyO),
    key!(0x50, "P", KeyP),
    key!(0x51, "Q", KeyQ),
    key!(0x52, "R", KeyR),
    key!(0x53, "S", KeyS),
    key!(0x54, "T", KeyT),
    key!(0x55, "U", KeyU),
    key!(0x56, "V", KeyV),
    key!(0x57, "W", KeyW),
    key!(0x58, "X", KeyX),
    key!(0x59, "Y", KeyY),
    key!(0x5A, "Z", KeyZ),
    key!(0x30, "0", Digit0),
    key!(0x31, "1", Digit1),
    key!(0x32, "2", Digit2),
    key!(0x33, "3", Digit3),
    key!(0x34, "4", Digit4),
    key!(0x35, "5", Digit5),
    key!(0x36, "6", Digit6),
    key!(0x37, "7", Digit7),
    key!(0x38, "8", Digit8),
    key!(0x39, "9", Digit9),
    key!(0x70, "F1", F1),
    key!(0x71, "F2", F2),
    key!(0x72, "F3", F3),
    key!(0x73, "F4", F4),
    key!(0x74, "F5", F5),
    key!(0x75, "F6", F6),
    key!(0x76, "F7", F7),
    key!(0x77, "F8", F8),
    key!(0x78, "F9", F9),
    key!(0x79, "F10", F10),
    key!(0x7A, "F11", F11),
    key!(0x7B, "F12", F12),
    key!(0x7C, "F13", F13),
    key!(0x7D, "F14", F14),
    key!(0x7E, "F15", F15),
    key!(0x7F, "F16", F16),
    key!(0x80, "F17", F17),
    key!(0x81, "F18", F18),
    key!(0x82, "F19", F19),
    key!(0x83, "F20", F20),
    key!(0x84, "F21", F21),
    key!(0x85, "F22", F22),
    key!(0x86, "F23", F23),
    key!(0x87, "F24", F24),
    key!(0x08, "Backspace", Backspace, ["back"]),
    key!(0x09, "Tab", Tab),
    key!(0x0D, "Enter", Enter, ["return"]),
    key!(0x13, "Pause", Pause),
    key!(0x1B, "Esc", Escape, ["escape"]),
    key!(0x20, "Space", Space),
    key!(0x21, "PageUp", PageUp, ["pgup"]),
    key!(0x22, "PageDown", PageDown, ["pgdn"]),
    key!(0x23, "End", End),
    key!(0x24, "Home", Home),
    key!(0x25, "Left", ArrowLeft),
    key!(0x26, "Up", ArrowUp),
    key!(0x27, "Right", ArrowRight),
    key!(0x28, "Down", ArrowDown),
    key!(0x2C, "PrintScreen", PrintScreen, ["prtsc"]),
    key!(0x2D, "Insert", Insert, ["ins"]),
    key!(0x2E, "Delete", Delete, ["del"]),
    key!(0x60, "Num0", Numpad0),
    key!(0x61, "Num1", Numpad1),
    key!(0x62, "Num2", Numpad2),
    key!(0x63, "Num3", Numpad3),
    key!(0x64, "Num4", Numpad4),
    key!(0x65, "Num5", Numpad5),
    key!(0x66, "Num6", Numpad6),
    key!(0x67, "Num7", Numpad7),
    key!(0x68, "Num8", Numpad8),
    key!(0x69, "Num9", Numpad9),
    key!(0x6A, "NumMultiply", NumpadMultiply),
    key!(0x6B, "NumAdd", NumpadAdd),
    key!(0x6D, "NumSubtract", NumpadSubtract),
    key!(0x6E, "NumDecimal", NumpadDecimal),
    key!(0x6F, "NumDivide", NumpadDivide),
    key!(0xBA, "Semicolon", Semicolon, [";"]),
    key!(VK_OEM_PLUS, "Plus", Equal, ["=", "equal", "oemplus"]),
    key!(0xBC, "Comma", Comma, [","]),
    key!(0xBD, "Minus", Minus, ["-", "oemminus"]),
    key!(0xBE, "Period", Period, ["."]),
    key!(0xBF, "Slash", Slash, ["/"]),
    key!(0xC0, "Backquote", Backquote, ["`", "grave"]),
    key!(0xDB, "BracketLeft", BracketLeft, ["["]),
    key!(0xDC, "Backslash", Backslash, ["\\"]),
    key!(0xDD, "BracketRight", BracketRight, ["]"]),
    key!(0xDE, "Quote", Quote, ["'"]),
];

pub fn key_by_vk(vk: u32) -> Option<&'static KeySpec> {
    KEYS.iter().find(|k| k.vk == vk)
}

fn key_by_name(name: &str) -> Option<&'static KeySpec> {
    KEYS.iter().find(|k| {
        k.name.eq_ignore_ascii_case(name) || k.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    })
}

fn modifier_bit(token: &str) -> Option<u32> {
    match token.to_ascii_lowercase().as_str() {
        "ctrl" | "control" => Some(MOD_CONTROL),
        "alt" | "option" | "opt" => Some(MOD_ALT),
        "shift" => Some(MOD_SHIFT),
        _ => None,
    }
}

/// A modifier mask plus a virtual key. `(0, 0)` means "no hotkey".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HotkeyCombo {
    pub modifiers: u32,
    pub virtual_key: u32,
}

impl HotkeyCombo {
    pub const NONE: HotkeyCombo = HotkeyCombo { modifiers: 0, virtual_key: 0 };
    pub const DEFAULT: HotkeyCombo = HotkeyCombo { modifiers: MOD_CONTROL, virtual_key: VK_OEM_PLUS };

    pub const fn new(modifiers: u32, virtual_key: u32) -> Self {
        Self { modifiers, virtual_key }
    }

    pub fn is_configured(&self) -> bool {
        self.modifiers != 0 || self.virtual_key != 0
    }

    /// A configured combo still needs a key we can hand to the OS.
    /// Modifiers on their own are rejected here rather than by the backend.
    pub fn check_registrable(&self) -> Result<(), String> {
        if self.virtual_key == 0 {
            return Err(format!("{} has no key; add a key to the modifiers", self));
        }
        if self.code().is_none() {
            return Err(format!("{} is not a supported hotkey", self));
        }
        Ok(())
    }

    pub fn has(&self, bit: u32) -> bool {
        self.modifiers & bit != 0
    }

    /// Modifiers for the OS hotkey backend. Unknown bits are dropped.
    pub fn hotkey_modifiers(&self) -> Modifiers {
        let mut mods = Modifiers::empty();
        if self.has(MOD_CONTROL) {
            mods |= Modifiers::CONTROL;
        }
        if self.has(MOD_ALT) {
            mods |= Modifiers::ALT;
        }
        if self.has(MOD_SHIFT) {
            mods |= Modifiers::SHIFT;
        }
        mods
    }

    /// Layout-independent key code, or `None` if the virtual key is not one
    /// we know how to register.
    pub fn code(&self) -> Option<Code> {
        key_by_vk(self.virtual_key).map(|k| k.code)
    }
}

impl fmt::Display for HotkeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_configured() {
            return f.write_str("Not set");
        }

        let mut parts: Vec<String> = Vec::with_capacity(4);
        if self.has(MOD_CONTROL) {
            parts.push("Ctrl".to_string());
        }
        if self.has(MOD_ALT) {
            parts.push("Alt".to_string());
        }
        if self.has(MOD_SHIFT) {
            parts.push("Shift".to_string());
        }
        parts.push(match (self.virtual_key, key_by_vk(self.virtual_key)) {
            (0, _) => "None".to_string(),
            (_, Some(key)) => key.name.to_string(),
            (vk, None) => format!("0x{vk:02X}"),
        });

        f.write_str(&parts.join(" + "))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComboParseError {
    #[error("hotkey is empty")]
    Empty,
    #[error("unknown key '{0}'")]
    UnknownKey(String),
    #[error("hotkey '{0}' has no key, only modifiers")]
    MissingKey(String),
    #[error("hotkey has more than one key: '{0}' and '{1}'")]
    MultipleKeys(String, String),
}

/// Parses strings like `"ctrl+alt+r"` or `"Ctrl + Plus"`.
impl FromStr for HotkeyCombo {
    type Err = ComboParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ComboParseError::Empty);
        }

        let mut modifiers = 0;
        let mut key: Option<(&str, &KeySpec)> = None;

        for token in trimmed.split('+').map(str::trim) {
            if token.is_empty() {
                return Err(ComboParseError::UnknownKey("+".to_string()));
            }
            if let Some(bit) = modifier_bit(token) {
                modifiers |= bit;
                continue;
            }
            let spec = key_by_name(token).ok_or_else(|| ComboParseError::UnknownKey(token.to_string()))?;
            if let Some((previous, _)) = key {
                return Err(ComboParseError::MultipleKeys(previous.to_string(), token.to_string()));
            }
            key = Some((token, spec));
        }

        match key {
            Some((_, spec)) => Ok(HotkeyCombo::new(modifiers & MOD_MASK, spec.vk)),
            None => Err(ComboParseError::MissingKey(trimmed.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats() {
        assert_eq!(HotkeyCombo::DEFAULT.to_string(), "Ctrl + Plus");
        assert_eq!(
            HotkeyCombo::new(MOD_CONTROL | MOD_ALT | MOD_SHIFT, 0x52).to_string(),
            "Ctrl + Alt + Shift + R"
        );
        assert_eq!(HotkeyCombo::new(0, 0x7B).to_string(), "F12");
        assert_eq!(HotkeyCombo::NONE.to_string(), "Not set");
        assert_eq!(HotkeyCombo::new(MOD_ALT, 0).to_string(), "Alt + None");
        assert_eq!(HotkeyCombo::new(MOD_ALT, 0xFF).to_string(), "Alt + 0xFF");
    }

    #[test]
    fn test_parse_common_forms() {
        assert_eq!(
            "ctrl+alt+r".parse::<HotkeyCombo>(),
            Ok(HotkeyCombo::new(MOD_CONTROL | MOD_ALT, 0x52))
        );
        assert_eq!("Ctrl + Plus".parse::<HotkeyCombo>(), Ok(HotkeyCombo::DEFAULT));
        assert_eq!("control+=".parse::<HotkeyCombo>(), Ok(HotkeyCombo::DEFAULT));
        assert_eq!("shift+f5".parse::<HotkeyCombo>(), Ok(HotkeyCombo::new(MOD_SHIFT, 0x74)));
        assert_eq!("option+space".parse::<HotkeyCombo>(), Ok(HotkeyCombo::new(MOD_ALT, 0x20)));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let combo = HotkeyCombo::new(MOD_CONTROL | MOD_SHIFT, 0xDB);
        assert_eq!(combo.to_string().parse::<HotkeyCombo>(), Ok(combo));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<HotkeyCombo>(), Err(ComboParseError::Empty));
        assert_eq!(
            "ctrl+alt".parse::<HotkeyCombo>(),
            Err(ComboParseError::MissingKey("ctrl+alt".to_string()))
        );
        assert_eq!(
            "ctrl+hyper".parse::<HotkeyCombo>(),
            Err(ComboParseError::UnknownKey("hyper".to_string()))
        );
        assert_eq!(
            "ctrl+a+b".parse::<HotkeyCombo>(),
            Err(ComboParseError::MultipleKeys("a".to_string(), "b".to_string()))
        );
    }

    #[test]
    fn test_is_configured() {
        assert!(!HotkeyCombo::NONE.is_configured());
        assert!(HotkeyCombo::new(0, 0x70).is_configured());
        assert!(HotkeyCombo::new(MOD_CONTROL, 0).is_configured());
    }

    #[test]
    fn test_modifier_only_combo_is_not_registrable() {
        let err = HotkeyCombo::new(MOD_ALT, 0).check_registrable().unwrap_err();
        assert!(err.contains("Alt + None"));
        assert!(HotkeyCombo::new(MOD_CONTROL, 0xFF).check_registrable().is_err());
        assert!(HotkeyCombo::DEFAULT.check_registrable().is_ok());
    }

    #[test]
    fn test_backend_translation() {
        let combo = HotkeyCombo::new(MOD_CONTROL | MOD_ALT, 0x52);
        assert_eq!(combo.code(), Some(Code::KeyR));
        assert_eq!(combo.hotkey_modifiers(), Modifiers::CONTROL | Modifiers::ALT);
        assert_eq!(HotkeyCombo::DEFAULT.code(), Some(Code::Equal));
        assert_eq!(HotkeyCombo::new(MOD_CONTROL, 0xFF).code(), None);
    }

    #[test]
    fn test_vk_table_has_no_duplicates() {
        for (i, a) in KEYS.iter().enumerate() {
            for b in &KEYS[i + 1..] {
                assert_ne!(a.vk, b.vk, "{} and {} share a virtual key", a.name, b.name);
                assert!(!a.name.eq_ignore_ascii_case(b.name));
            }
        }
    }
}
