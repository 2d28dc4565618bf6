use std::sync::Mutex;

use arboard::Clipboard;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("Failed to access clipboard: {0}")]
    Unavailable(String),
    #[error("Failed to read clipboard: {0}")]
    Read(String),
    #[error("Failed to write clipboard: {0}")]
    Write(String),
}

/// Text clipboard.
pub trait ClipboardAccess: Send + Sync {
    /// `Ok(None)` when the clipboard holds no text
    fn get_text(&self) -> Result<Option<String>, ClipboardError>;
    fn set_text(&self, text: &str) -> Result<(), ClipboardError>;
    fn clear(&self) -> Result<(), ClipboardError>;
}

/// System clipboard via arboard. The handle is opened lazily and kept, since
/// on X11 and Wayland the owning handle must stay alive for pasted content to
/// remain available.
#[derive(Default)]
pub struct SystemClipboard(Mutex<Option<Clipboard>>);

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(
        &self,
        f: impl FnOnce(&mut Clipboard) -> Result<T, ClipboardError>,
    ) -> Result<T, ClipboardError> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| ClipboardError::Unavailable("clipboard lock poisoned".into()))?;
        if guard.is_none() {
            let clipboard = Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
            debug!("Opened system clipboard");
            *guard = Some(clipboard);
        }
        match guard.as_mut() {
            Some(clipboard) => f(clipboard),
            None => Err(ClipboardError::Unavailable("clipboard not initialized".into())),
        }
    }
}

impl ClipboardAccess for SystemClipboard {
    fn get_text(&self) -> Result<Option<String>, ClipboardError> {
        self.with(|cb| match cb.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(ClipboardError::Read(e.to_string())),
        })
    }

    fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.with(|cb| cb.set_text(text).map_err(|e| ClipboardError::Write(e.to_string())))
    }

    fn clear(&self) -> Result<(), ClipboardError> {
        self.with(|cb| cb.clear().map_err(|e| ClipboardError::Write(e.to_string())))
    }
}
