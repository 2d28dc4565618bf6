use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use std::sync::Mutex;

/// Simulated platform copy and paste shortcuts.
pub trait InputSimulator: Send + Sync {
    fn send_copy(&self) -> Result<(), String>;
    fn send_paste(&self) -> Result<(), String>;
}

/// Enigo wrapped in a Mutex since it requires mutable access.
/// The inner Option allows for lazy initialization - on macOS Enigo needs
/// accessibility permission, so creating it is deferred to the first use.
pub struct EnigoState(pub Mutex<Option<Enigo>>);

impl EnigoState {
    pub fn new() -> Self {
        Self(Mutex::new(None))
    }

    fn with_enigo(&self, f: impl FnOnce(&mut Enigo) -> Result<(), String>) -> Result<(), String> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| "Input simulator lock poisoned".to_string())?;
        if guard.is_none() {
            let enigo = Enigo::new(&Settings::default())
                .map_err(|e| format!("Failed to initialize Enigo: {}", e))?;
            tracing::debug!("Enigo initialized");
            *guard = Some(enigo);
        }
        match guard.as_mut() {
            Some(enigo) => f(enigo),
            None => Err("Enigo is not available".to_string()),
        }
    }
}

impl Default for EnigoState {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSimulator for EnigoState {
    fn send_copy(&self) -> Result<(), String> {
        self.with_enigo(send_copy_cmd_c)
    }

    fn send_paste(&self) -> Result<(), String> {
        self.with_enigo(send_paste_ctrl_v)
    }
}

/// Press the modifier, click the key, hold briefly, release.
fn send_chord(enigo: &mut Enigo, modifier_key: Key, key: Key, label: &str) -> Result<(), String> {
    enigo
        .key(modifier_key, Direction::Press)
        .map_err(|e| format!("Failed to press modifier key: {}", e))?;
    let clicked = enigo
        .key(key, Direction::Click)
        .map_err(|e| format!("Failed to click {} key: {}", label, e));

    std::thread::sleep(std::time::Duration::from_millis(100));

    // release even when the click failed so the modifier is not left stuck
    enigo
        .key(modifier_key, Direction::Release)
        .map_err(|e| format!("Failed to release modifier key: {}", e))?;

    clicked
}

/// Sends a Ctrl+V or Cmd+V paste command using platform-specific virtual key codes.
/// This ensures the paste works regardless of keyboard layout (e.g., Russian, AZERTY, DVORAK).
/// Note: On Wayland, this may not work.
pub fn send_paste_ctrl_v(enigo: &mut Enigo) -> Result<(), String> {
    #[cfg(target_os = "macos")]
    let (modifier_key, v_key_code) = (Key::Meta, Key::Other(9));
    #[cfg(target_os = "windows")]
    let (modifier_key, v_key_code) = (Key::Control, Key::Other(0x56)); // VK_V
    #[cfg(target_os = "linux")]
    let (modifier_key, v_key_code) = (Key::Control, Key::Unicode('v'));

    send_chord(enigo, modifier_key, v_key_code, "V")
}

/// Sends a Cmd+C (macOS) or Ctrl+C (Windows/Linux) copy command using raw keycodes.
/// Uses Key::Other to avoid TSMGetInputSourceProperty which crashes on non-main threads.
pub fn send_copy_cmd_c(enigo: &mut Enigo) -> Result<(), String> {
    #[cfg(target_os = "macos")]
    let (modifier_key, c_key_code) = (Key::Meta, Key::Other(8)); // macOS virtual keycode 8 = 'C'
    #[cfg(target_os = "windows")]
    let (modifier_key, c_key_code) = (Key::Control, Key::Other(0x43)); // VK_C
    #[cfg(target_os = "linux")]
    let (modifier_key, c_key_code) = (Key::Control, Key::Unicode('c'));

    send_chord(enigo, modifier_key, c_key_code, "C")
}
