//! OS hotkeys through the `global-hotkey` crate.
//!
//! The library derives its own id from the key combination, so this backend
//! keeps both directions of the mapping: registry id -> `HotKey` for
//! unregistering, and library id -> registry id for dispatching events.

use std::collections::HashMap;

use global_hotkey::{
    hotkey::HotKey, Error as HotkeyError, GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
};
use tracing::{debug, warn};

use super::keys::HotkeyCombo;
use super::HotkeyBackend;
use crate::profile::HotkeyId;

pub struct GlobalHotkeyBackend {
    manager: GlobalHotKeyManager,
    by_registry_id: HashMap<HotkeyId, HotKey>,
    by_os_id: HashMap<u32, HotkeyId>,
}

impl GlobalHotkeyBackend {
    /// Must be created on the thread that pumps the platform event loop.
    pub fn new() -> anyhow::Result<Self> {
        let manager = GlobalHotKeyManager::new()
            .map_err(|e| anyhow::anyhow!("Failed to create hotkey manager: {}", e))?;
        Ok(Self {
            manager,
            by_registry_id: HashMap::new(),
            by_os_id: HashMap::new(),
        })
    }

    /// Registry id for an event coming from the library
    pub fn translate(&self, os_id: u32) -> Option<HotkeyId> {
        self.by_os_id.get(&os_id).copied()
    }

    /// Drain pending key presses, translated to registry ids. Releases and
    /// events for ids we no longer own are dropped.
    pub fn pending_presses(&self) -> Vec<HotkeyId> {
        let receiver = GlobalHotKeyEvent::receiver();
        let mut presses = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            if event.state != HotKeyState::Pressed {
                continue;
            }
            match self.translate(event.id) {
                Some(id) => presses.push(id),
                None => debug!("Ignoring event for unknown hotkey {}", event.id),
            }
        }
        presses
    }
}

fn describe(err: &HotkeyError, combo: HotkeyCombo) -> String {
    match err {
        HotkeyError::AlreadyRegistered(_) => {
            format!("{} is already registered by another application", combo)
        }
        HotkeyError::FailedToRegister(msg) => {
            format!("System rejected {}: {}", combo, msg)
        }
        HotkeyError::OsError(os_err) => format!("OS error registering {}: {}", combo, os_err),
        other => format!("Failed to register {}: {}", combo, other),
    }
}

impl HotkeyBackend for GlobalHotkeyBackend {
    fn register(&mut self, id: HotkeyId, combo: HotkeyCombo) -> bool {
        let Some(code) = combo.code() else {
            warn!("No key code for virtual key 0x{:02X}", combo.virtual_key);
            return false;
        };
        let mods = combo.hotkey_modifiers();
        let hotkey = HotKey::new((!mods.is_empty()).then_some(mods), code);

        if let Err(e) = self.manager.register(hotkey) {
            warn!("{}", describe(&e, combo));
            return false;
        }

        debug!("Registered {} as {} (os id {})", combo, id, hotkey.id());
        self.by_os_id.insert(hotkey.id(), id);
        self.by_registry_id.insert(id, hotkey);
        true
    }

    fn unregister(&mut self, id: HotkeyId) {
        let Some(hotkey) = self.by_registry_id.remove(&id) else {
            return;
        };
        self.by_os_id.remove(&hotkey.id());
        if let Err(e) = self.manager.unregister(hotkey) {
            // internal maps are already updated
            warn!("Failed to unregister {}: {}", id, e);
        }
    }
}
