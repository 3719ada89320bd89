//! OS clipboard through `arboard`.
//!
//! A handle is opened per operation.  Headless machines have no clipboard
//! at all; every failure is reported as a string and the bridge logs it.

use crate::application::clipboard::SystemClipboard;

/// The desktop clipboard of the machine running the client.
#[derive(Debug, Default)]
pub struct OsClipboard;

impl OsClipboard {
    pub fn new() -> Self {
        Self
    }
}

impl SystemClipboard for OsClipboard {
    fn read_text(&mut self) -> Result<String, String> {
        let mut clipboard = arboard::Clipboard::new().map_err(|e| e.to_string())?;
        match clipboard.get_text() {
            Ok(text) => Ok(text),
            // Non-text content reads as empty; nothing to push.
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(e.to_string()),
        }
    }

    fn write_text(&mut self, text: &str) -> Result<(), String> {
        let mut clipboard = arboard::Clipboard::new().map_err(|e| e.to_string())?;
        clipboard.set_text(text.to_owned()).map_err(|e| e.to_string())
    }
}
