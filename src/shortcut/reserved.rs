use std::collections::HashMap;
use std::sync::OnceLock;

use super::keys::{HotkeyCombo, MOD_ALT, MOD_CONTROL, MOD_SHIFT};

/// Why a combination is off limits
pub struct ReservedShortcut {
    pub reason: &'static str,
}

/// Key: (modifier mask, virtual key)
static RESERVED_SHORTCUTS: OnceLock<HashMap<(u32, u32), ReservedShortcut>> = OnceLock::new();

const VK_TAB: u32 = 0x09;
const VK_SPACE: u32 = 0x20;
const VK_DELETE: u32 = 0x2E;
const VK_F4: u32 = 0x73;

fn vk(letter: char) -> u32 {
    letter.to_ascii_uppercase() as u32
}

fn get_reserved_shortcuts() -> &'static HashMap<(u32, u32), ReservedShortcut> {
    RESERVED_SHORTCUTS.get_or_init(|| {
        let mut m = HashMap::new();

        fn insert(m: &mut HashMap<(u32, u32), ReservedShortcut>, keys: &[(u32, u32)], reason: &'static str) {
            for key in keys {
                m.insert(*key, ReservedShortcut { reason });
            }
        }

        // --- macOS Specific Shortcuts ---
        // Editing lives on Command there, which cannot be bound here, so only
        // the Control-based system shortcuts collide.
        #[cfg(target_os = "macos")]
        {
            insert(&mut m, &[
                (MOD_CONTROL, VK_SPACE),
                (MOD_CONTROL | MOD_ALT, VK_SPACE),
            ], "Reserved for input source switching");

            insert(&mut m, &[
                (MOD_CONTROL, 0x25),
                (MOD_CONTROL, 0x26),
                (MOD_CONTROL, 0x27),
                (MOD_CONTROL, 0x28),
                (MOD_CONTROL, vk('1')),
                (MOD_CONTROL, vk('2')),
            ], "Reserved for Mission Control and desktop navigation");

            insert(&mut m, &[
                (MOD_CONTROL, 0x71),
                (MOD_CONTROL, 0x72),
                (MOD_CONTROL, VK_F4),
                (MOD_CONTROL, 0x74),
                (MOD_CONTROL, 0x77),
            ], "Reserved for keyboard focus navigation");
        }

        // --- Windows and Linux ---
        #[cfg(not(target_os = "macos"))]
        {
            insert(&mut m, &[
                (MOD_ALT, VK_TAB),
                (MOD_ALT | MOD_SHIFT, VK_TAB),
                (MOD_ALT, VK_F4),
                (MOD_CONTROL | MOD_ALT, VK_DELETE),
            ], "Reserved by the operating system");

            // Copy and paste are also what the rewrite itself sends
            insert(&mut m, &[
                (MOD_CONTROL, vk('c')),
                (MOD_CONTROL, vk('v')),
                (MOD_CONTROL, vk('x')),
                (MOD_CONTROL, vk('z')),
                (MOD_CONTROL, vk('y')),
                (MOD_CONTROL, vk('a')),
            ], "Reserved for common editing (copy, paste, cut, undo, redo, select all)");

            insert(&mut m, &[
                (MOD_CONTROL, vk('s')),
                (MOD_CONTROL, vk('n')),
                (MOD_CONTROL, vk('o')),
                (MOD_CONTROL, vk('p')),
            ], "Reserved for common file operations");
        }

        m
    })
}

fn is_character_key(virtual_key: u32) -> bool {
    matches!(virtual_key, 0x20 | 0x30..=0x39 | 0x41..=0x5A | 0xBA..=0xC0 | 0xDB..=0xDE)
}

/// Returns Ok(()) if the combination may be bound, or Err with the reason.
pub fn check_reserved_shortcut(combo: HotkeyCombo) -> Result<(), String> {
    if let Some(reserved) = get_reserved_shortcuts().get(&(combo.modifiers, combo.virtual_key)) {
        return Err(format!("{} is reserved: {}", combo, reserved.reason));
    }

    // A bare or shift-only character key would swallow ordinary typing
    if combo.modifiers & !MOD_SHIFT == 0 && is_character_key(combo.virtual_key) {
        return Err(format!(
            "{} would capture normal typing; add Ctrl or Alt",
            combo
        ));
    }

    Ok(())
}
