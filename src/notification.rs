//! User-facing notices and the audible failure signal.
//!
//! Notices are logged and shown as desktop notifications. The signal is the
//! system beep on Windows and the terminal bell elsewhere.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

/// Notification type for differentiating urgency and display style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    Info,
    /// Something the user has to fix (e.g. missing API key)
    Warning,
    /// The rewrite failed
    Error,
}

pub trait Notifier: Send + Sync {
    fn show(&self, notification_type: NotificationType, title: &str, body: &str);
    /// Short audible signal for "nothing happened"
    fn beep(&self);
}

/// The same notice repeated inside this window is shown once
const NOTIFICATION_COOLDOWN: Duration = Duration::from_secs(3);

const APP_NAME: &str = "AIHotKey";

type Delivery = Box<dyn Fn(&str, &str) + Send + Sync>;

fn should_emit_with_cooldown(
    tracker: &mut HashMap<String, Instant>,
    notification_id: &str,
    now: Instant,
    cooldown: Duration,
) -> bool {
    match tracker.get(notification_id) {
        Some(last_shown_at) if now.duration_since(*last_shown_at) < cooldown => false,
        _ => {
            tracker.insert(notification_id.to_string(), now);
            true
        }
    }
}

fn format_title(notification_type: NotificationType, title: &str) -> String {
    match notification_type {
        NotificationType::Info => title.to_string(),
        NotificationType::Warning | NotificationType::Error => {
            if title.starts_with('⚠') || title.starts_with("Error") {
                title.to_string()
            } else {
                format!("⚠ {}", title)
            }
        }
    }
}

/// Hand the notice to the desktop notification service. Runs on its own
/// thread so a slow notification daemon never holds up a rewrite.
fn show_system_notification(title: &str, body: &str) {
    let title = title.to_string();
    let body = body.to_string();
    std::thread::spawn(move || {
        let result = notify_rust::Notification::new()
            .appname(APP_NAME)
            .summary(&title)
            .body(&body)
            .show();
        if let Err(e) = result {
            warn!("Failed to show desktop notification: {}", e);
        }
    });
}

pub struct DesktopNotifier {
    cooldown: Mutex<HashMap<String, Instant>>,
    deliver: Delivery,
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::with_delivery(Box::new(show_system_notification))
    }
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_delivery(deliver: Delivery) -> Self {
        Self {
            cooldown: Mutex::new(HashMap::new()),
            deliver,
        }
    }
}

impl Notifier for DesktopNotifier {
    fn show(&self, notification_type: NotificationType, title: &str, body: &str) {
        let key = format!("{}\n{}", title, body);
        let emit = {
            let mut tracker = match self.cooldown.lock() {
                Ok(guard) => guard,
                Err(poisoned) => {
                    warn!("Notification cooldown state was poisoned, recovering");
                    poisoned.into_inner()
                }
            };
            should_emit_with_cooldown(&mut tracker, &key, Instant::now(), NOTIFICATION_COOLDOWN)
        };
        if !emit {
            debug!("Skipping repeated notification '{}'", title);
            return;
        }

        match notification_type {
            NotificationType::Info => info!(title, "{}", body),
            NotificationType::Warning => warn!(title, "{}", body),
            NotificationType::Error => error!(title, "{}", body),
        }
        (self.deliver)(&format_title(notification_type, title), body);
    }

    fn beep(&self) {
        #[cfg(target_os = "windows")]
        {
            use windows::Win32::System::Diagnostics::Debug::MessageBeep;
            use windows::Win32::UI::WindowsAndMessaging::MB_OK;
            if let Err(e) = unsafe { MessageBeep(MB_OK) } {
                debug!("MessageBeep failed: {}", e);
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            use std::io::Write;
            let mut stderr = std::io::stderr();
            let _ = stderr.write_all(b"\x07");
            let _ = stderr.flush();
        }
    }
}
