//! Clipboard payloads, permission policy and the shared buffer.
//!
//! Remote clipboard content arrives as a stream of chunks terminated by an
//! explicit end signal.  The adapters assemble the chunks and hand a complete
//! [`ClipboardPayload`] to the bridge, which consults the [`ClipboardPolicy`]
//! before anything crosses the local/remote boundary.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::session::SessionDescriptor;

/// MIME type used for plain text.
pub const TEXT_PLAIN: &str = "text/plain";

/// Clipboard content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardData {
    Text(String),
    Binary(Vec<u8>),
}

impl ClipboardData {
    pub fn len(&self) -> usize {
        match self {
            ClipboardData::Text(s) => s.len(),
            ClipboardData::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A complete clipboard item with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardPayload {
    pub mime_type: String,
    pub data: ClipboardData,
}

impl ClipboardPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            mime_type: TEXT_PLAIN.to_string(),
            data: ClipboardData::Text(text.into()),
        }
    }

    pub fn binary(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: ClipboardData::Binary(bytes),
        }
    }

    /// `true` for any `text/*` MIME type.
    pub fn is_text_mime(mime_type: &str) -> bool {
        mime_type.starts_with("text/")
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            ClipboardData::Text(s) => Some(s),
            ClipboardData::Binary(_) => None,
        }
    }
}

/// Which clipboard directions the session allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClipboardPolicy {
    /// Remote → local.
    pub copy: bool,
    /// Local → remote.
    pub paste: bool,
}

impl ClipboardPolicy {
    pub fn from_session(session: &SessionDescriptor) -> Self {
        Self {
            copy: session.copy_allowed(),
            paste: session.paste_allowed(),
        }
    }
}

/// Last-write-wins clipboard shared by both directions of one session.
///
/// Cloning shares the same underlying slot.
#[derive(Debug, Clone, Default)]
pub struct ClipboardBuffer {
    inner: Arc<Mutex<Option<ClipboardPayload>>>,
}

impl ClipboardBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<ClipboardPayload>> {
        // A panic while holding the lock leaves a whole payload or none.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replaces the content.
    pub fn set(&self, payload: ClipboardPayload) {
        *self.slot() = Some(payload);
    }

    /// Snapshot of the current content.
    pub fn get(&self) -> Option<ClipboardPayload> {
        self.slot().clone()
    }

    pub fn clear(&self) {
        *self.slot() = None;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_follows_session_flags() {
        let session = SessionDescriptor {
            id: "s".into(),
            copy: "1".into(),
            paste: "0".into(),
            ..Default::default()
        };
        assert_eq!(
            ClipboardPolicy::from_session(&session),
            ClipboardPolicy {
                copy: true,
                paste: false
            }
        );
    }

    #[test]
    fn test_buffer_last_write_wins_across_clones() {
        // Arrange
        let buffer = ClipboardBuffer::new();
        let shared = buffer.clone();

        // Act
        buffer.set(ClipboardPayload::text("first"));
        shared.set(ClipboardPayload::binary("image/png", vec![1, 2, 3]));

        // Assert
        assert_eq!(
            buffer.get(),
            Some(ClipboardPayload::binary("image/png", vec![1, 2, 3]))
        );
        shared.clear();
        assert!(buffer.get().is_none());
    }

    #[test]
    fn test_text_mime_detection() {
        assert!(ClipboardPayload::is_text_mime("text/plain"));
        assert!(ClipboardPayload::is_text_mime("text/html"));
        assert!(!ClipboardPayload::is_text_mime("image/png"));
        assert!(!ClipboardPayload::is_text_mime("application/octet-stream"));
    }

    #[test]
    fn test_payload_text_accessor() {
        assert_eq!(ClipboardPayload::text("hi").as_text(), Some("hi"));
        assert_eq!(ClipboardPayload::binary("image/png", vec![]).as_text(), None);
        assert!(ClipboardData::Binary(vec![]).is_empty());
    }
}
