//! Profile data model shared by the store, the hotkey registry and the
//! rewrite pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shortcut::keys::HotkeyCombo;

/// Prompt used by the built-in profile when nothing has been saved yet.
pub const DEFAULT_PROMPT: &str = "Please make the following paragraph smoother and grammatically correct; return only the plain revised text without quotes:\n\n";

/// Identifier handed out by the hotkey registry. Only meaningful within the
/// running process and never written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HotkeyId(pub u32);

impl fmt::Display for HotkeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Process-lifetime identity of a profile. Positions shift when profiles are
/// deleted, so the registry maps hotkey ids to this instead of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProfileId(uuid::Uuid);

impl ProfileId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}

/// One hotkey binding plus the prompt it sends.
///
/// Files written by older Windows builds use PascalCase keys and carry a
/// `HotkeyId` field; both load fine, the id is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(skip)]
    pub(crate) id: ProfileId,
    #[serde(default, alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Modifiers")]
    pub modifiers: u32,
    #[serde(default, alias = "VirtualKey")]
    pub virtual_key: u32,
    #[serde(default, alias = "Prompt")]
    pub prompt: String,
    #[serde(skip)]
    pub(crate) hotkey_id: Option<HotkeyId>,
}

impl Profile {
    pub fn new(name: impl Into<String>, combo: HotkeyCombo, prompt: impl Into<String>) -> Self {
        Self {
            id: ProfileId::new(),
            name: name.into(),
            modifiers: combo.modifiers,
            virtual_key: combo.virtual_key,
            prompt: prompt.into(),
            hotkey_id: None,
        }
    }

    /// A fresh profile with no hotkey and an empty prompt.
    pub fn unconfigured(name: impl Into<String>) -> Self {
        Self::new(name, HotkeyCombo::NONE, String::new())
    }

    /// The profile used when nothing usable is on disk: Ctrl + Plus with a
    /// grammar-fix prompt.
    pub fn builtin_default() -> Self {
        Self::new("Hotkey 1", HotkeyCombo::DEFAULT, DEFAULT_PROMPT)
    }

    pub fn id(&self) -> ProfileId {
        self.id
    }

    pub fn combo(&self) -> HotkeyCombo {
        HotkeyCombo::new(self.modifiers, self.virtual_key)
    }

    pub fn hotkey_id(&self) -> Option<HotkeyId> {
        self.hotkey_id
    }

    pub fn is_bound(&self) -> bool {
        self.hotkey_id.is_some()
    }

    pub(crate) fn set_combo(&mut self, combo: HotkeyCombo) {
        self.modifiers = combo.modifiers;
        self.virtual_key = combo.virtual_key;
    }
}

/// Display name for the profile at `index` (0-based).
pub fn display_name(index: usize) -> String {
    format!("Hotkey {}", index + 1)
}
