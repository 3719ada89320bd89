//! Clipboard bridge between the local machine and the remote session.
//!
//! Both directions go through the session's [`ClipboardPolicy`]:
//!
//! - **local → remote** (`paste`): opens a clipboard stream on the tunnel,
//!   writes the content in chunks and ends the stream.
//! - **remote → local** (`copy`): stores the payload in the shared
//!   [`ClipboardBuffer`] and mirrors text to the OS clipboard.
//!
//! OS clipboard access is best effort.  A failure is logged and never ends
//! the session.

use tracing::{debug, warn};

use quick_core::{ClipboardBuffer, ClipboardData, ClipboardPayload, ClipboardPolicy, Notice};

use crate::application::error::TunnelError;

/// Largest chunk written per blob.  Encodes to 8 KiB of base64.
pub const BLOB_CHUNK: usize = 6144;

/// Outbound clipboard streams of a display tunnel.
pub trait ClipboardStreams {
    /// Opens a clipboard stream and returns its index.
    fn create_clipboard_stream(&mut self, mime_type: &str) -> Result<u32, TunnelError>;
    fn send_blob(&mut self, stream: u32, data: &[u8]) -> Result<(), TunnelError>;
    fn end_stream(&mut self, stream: u32) -> Result<(), TunnelError>;
}

/// The operating system clipboard.
pub trait SystemClipboard: Send {
    fn read_text(&mut self) -> Result<String, String>;
    fn write_text(&mut self, text: &str) -> Result<(), String>;
}

/// Result of [`ClipboardBridge::push_to_remote`].
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    /// The payload was streamed to the remote side.
    Sent,
    /// Pasting is disabled for this session; nothing was sent.
    Rejected,
    /// Nothing to send (empty or unreadable local clipboard).
    Skipped,
    /// The tunnel refused the stream.
    Failed(TunnelError),
}

impl PushOutcome {
    /// The notice the user should see, if any.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            PushOutcome::Rejected => Some(Notice::warning("Paste disabled")),
            _ => None,
        }
    }
}

/// Result of [`ClipboardBridge::surface_locally`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceOutcome {
    Surfaced,
    /// Copying is disabled for this session; the payload was discarded.
    Suppressed,
}

/// Bidirectional clipboard sync for one session.
pub struct ClipboardBridge {
    policy: ClipboardPolicy,
    buffer: ClipboardBuffer,
    system: Option<Box<dyn SystemClipboard>>,
}

impl ClipboardBridge {
    pub fn new(
        policy: ClipboardPolicy,
        buffer: ClipboardBuffer,
        system: Option<Box<dyn SystemClipboard>>,
    ) -> Self {
        Self {
            policy,
            buffer,
            system,
        }
    }

    pub fn policy(&self) -> ClipboardPolicy {
        self.policy
    }

    pub fn buffer(&self) -> &ClipboardBuffer {
        &self.buffer
    }

    /// Streams `payload` to the remote side if pasting is allowed.
    pub fn push_to_remote(
        &mut self,
        streams: &mut dyn ClipboardStreams,
        payload: ClipboardPayload,
    ) -> PushOutcome {
        if !self.policy.paste {
            debug!("clipboard push rejected: paste disabled");
            return PushOutcome::Rejected;
        }

        let bytes: &[u8] = match &payload.data {
            ClipboardData::Text(text) => text.as_bytes(),
            ClipboardData::Binary(bytes) => bytes,
        };
        match write_stream(streams, &payload.mime_type, bytes) {
            Ok(()) => {
                debug!(
                    mime = %payload.mime_type,
                    len = bytes.len(),
                    "clipboard pushed to remote"
                );
                self.buffer.set(payload);
                PushOutcome::Sent
            }
            Err(e) => {
                warn!("clipboard push failed: {e}");
                PushOutcome::Failed(e)
            }
        }
    }

    /// Makes a complete remote payload available locally if copying is
    /// allowed.
    pub fn surface_locally(&mut self, payload: ClipboardPayload) -> SurfaceOutcome {
        if !self.policy.copy {
            debug!(mime = %payload.mime_type, "remote clipboard discarded: copy disabled");
            return SurfaceOutcome::Suppressed;
        }

        if let (Some(text), Some(system)) = (payload.as_text(), self.system.as_mut()) {
            if let Err(e) = system.write_text(text) {
                warn!("could not write OS clipboard: {e}");
            }
        }
        self.buffer.set(payload);
        SurfaceOutcome::Surfaced
    }

    /// Reads the OS clipboard text and pushes it as `text/plain`.
    pub fn sync_from_local(&mut self, streams: &mut dyn ClipboardStreams) -> PushOutcome {
        if !self.policy.paste {
            return PushOutcome::Rejected;
        }
        match self.read_local_text() {
            Some(text) => self.push_to_remote(streams, ClipboardPayload::text(text)),
            None => PushOutcome::Skipped,
        }
    }

    /// Text to paste into a terminal session.
    ///
    /// # Errors
    ///
    /// Returns the "Paste disabled" warning when pasting is not allowed.
    pub fn paste_text(&mut self, text: Option<String>) -> Result<Option<String>, Notice> {
        if !self.policy.paste {
            return Err(Notice::warning("Paste disabled"));
        }
        Ok(text.or_else(|| self.read_local_text()).filter(|t| !t.is_empty()))
    }

    /// Copies terminal text to the local clipboard.
    ///
    /// # Errors
    ///
    /// Returns the "Copy disabled" warning when copying is not allowed.
    pub fn copy_text(&mut self, text: &str) -> Result<(), Notice> {
        match self.surface_locally(ClipboardPayload::text(text)) {
            SurfaceOutcome::Surfaced => Ok(()),
            SurfaceOutcome::Suppressed => Err(Notice::warning("Copy disabled")),
        }
    }

    fn read_local_text(&mut self) -> Option<String> {
        let system = self.system.as_mut()?;
        match system.read_text() {
            Ok(text) if !text.is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                warn!("could not read OS clipboard: {e}");
                None
            }
        }
    }
}

fn write_stream(
    streams: &mut dyn ClipboardStreams,
    mime_type: &str,
    bytes: &[u8],
) -> Result<(), TunnelError> {
    let stream = streams.create_clipboard_stream(mime_type)?;
    for chunk in bytes.chunks(BLOB_CHUNK) {
        streams.send_blob(stream, chunk)?;
    }
    streams.end_stream(stream)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    // ── Test doubles ──────────────────────────────────────────────────────────

    #[derive(Default)]
    struct RecordingStreams {
        opened: Vec<String>,
        blobs: Vec<(u32, Vec<u8>)>,
        ended: Vec<u32>,
        fail: bool,
    }

    impl ClipboardStreams for RecordingStreams {
        fn create_clipboard_stream(&mut self, mime_type: &str) -> Result<u32, TunnelError> {
            if self.fail {
                return Err(TunnelError::Closed);
            }
            self.opened.push(mime_type.to_string());
            Ok(self.opened.len() as u32)
        }

        fn send_blob(&mut self, stream: u32, data: &[u8]) -> Result<(), TunnelError> {
            self.blobs.push((stream, data.to_vec()));
            Ok(())
        }

        fn end_stream(&mut self, stream: u32) -> Result<(), TunnelError> {
            self.ended.push(stream);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct FakeOsClipboard {
        text: Arc<Mutex<Option<String>>>,
        broken: bool,
    }

    impl SystemClipboard for FakeOsClipboard {
        fn read_text(&mut self) -> Result<String, String> {
            if self.broken {
                return Err("no display".into());
            }
            Ok(self.text.lock().unwrap().clone().unwrap_or_default())
        }

        fn write_text(&mut self, text: &str) -> Result<(), String> {
            if self.broken {
                return Err("no display".into());
            }
            *self.text.lock().unwrap() = Some(text.to_string());
            Ok(())
        }
    }

    fn bridge(copy: bool, paste: bool, os: &FakeOsClipboard) -> ClipboardBridge {
        ClipboardBridge::new(
            ClipboardPolicy { copy, paste },
            ClipboardBuffer::new(),
            Some(Box::new(os.clone())),
        )
    }

    // ── Push ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_paste_disabled_rejects_without_opening_stream() {
        // Arrange
        let os = FakeOsClipboard::default();
        let mut bridge = bridge(true, false, &os);
        let mut streams = RecordingStreams::default();

        // Act
        let outcome = bridge.push_to_remote(&mut streams, ClipboardPayload::text("secret"));

        // Assert
        assert_eq!(outcome, PushOutcome::Rejected);
        assert_eq!(outcome.notice(), Some(Notice::warning("Paste disabled")));
        assert!(streams.opened.is_empty(), "no stream may be opened");
        assert!(streams.blobs.is_empty());
    }

    #[test]
    fn test_push_opens_writes_and_ends_stream() {
        let os = FakeOsClipboard::default();
        let mut bridge = bridge(false, true, &os);
        let mut streams = RecordingStreams::default();

        let outcome = bridge.push_to_remote(&mut streams, ClipboardPayload::text("hello"));

        assert_eq!(outcome, PushOutcome::Sent);
        assert_eq!(streams.opened, vec!["text/plain".to_string()]);
        assert_eq!(streams.blobs, vec![(1, b"hello".to_vec())]);
        assert_eq!(streams.ended, vec![1]);
        assert_eq!(bridge.buffer().get(), Some(ClipboardPayload::text("hello")));
    }

    #[test]
    fn test_large_payload_is_chunked() {
        let os = FakeOsClipboard::default();
        let mut bridge = bridge(false, true, &os);
        let mut streams = RecordingStreams::default();
        let payload = ClipboardPayload::binary("image/png", vec![7; BLOB_CHUNK * 2 + 1]);

        bridge.push_to_remote(&mut streams, payload);

        let sizes: Vec<usize> = streams.blobs.iter().map(|(_, b)| b.len()).collect();
        assert_eq!(sizes, vec![BLOB_CHUNK, BLOB_CHUNK, 1]);
    }

    #[test]
    fn test_tunnel_failure_is_reported_not_panicking() {
        let os = FakeOsClipboard::default();
        let mut bridge = bridge(false, true, &os);
        let mut streams = RecordingStreams {
            fail: true,
            ..Default::default()
        };

        let outcome = bridge.push_to_remote(&mut streams, ClipboardPayload::text("x"));
        assert_eq!(outcome, PushOutcome::Failed(TunnelError::Closed));
        assert_eq!(outcome.clone(), outcome, "outcomes are handed around by value");
        assert_eq!(outcome.notice(), None);
    }

    // ── Surface ───────────────────────────────────────────────────────────────

    #[test]
    fn test_copy_disabled_suppresses_payload() {
        let os = FakeOsClipboard::default();
        let mut bridge = bridge(false, true, &os);

        let outcome = bridge.surface_locally(ClipboardPayload::text("remote secret"));

        assert_eq!(outcome, SurfaceOutcome::Suppressed);
        assert!(bridge.buffer().get().is_none());
        assert!(os.text.lock().unwrap().is_none(), "OS clipboard must stay untouched");
    }

    #[test]
    fn test_text_is_mirrored_to_os_clipboard() {
        let os = FakeOsClipboard::default();
        let mut bridge = bridge(true, false, &os);

        assert_eq!(
            bridge.surface_locally(ClipboardPayload::text("from remote")),
            SurfaceOutcome::Surfaced
        );
        assert_eq!(os.text.lock().unwrap().as_deref(), Some("from remote"));
    }

    #[test]
    fn test_binary_is_buffered_but_not_mirrored() {
        let os = FakeOsClipboard::default();
        let mut bridge = bridge(true, false, &os);
        let payload = ClipboardPayload::binary("image/png", vec![1, 2]);

        bridge.surface_locally(payload.clone());

        assert_eq!(bridge.buffer().get(), Some(payload));
        assert!(os.text.lock().unwrap().is_none());
    }

    #[test]
    fn test_os_clipboard_failure_is_not_fatal() {
        let os = FakeOsClipboard {
            broken: true,
            ..Default::default()
        };
        let mut bridge = bridge(true, true, &os);

        assert_eq!(
            bridge.surface_locally(ClipboardPayload::text("x")),
            SurfaceOutcome::Surfaced
        );
        let mut streams = RecordingStreams::default();
        assert_eq!(bridge.sync_from_local(&mut streams), PushOutcome::Skipped);
    }

    // ── Sync / terminal helpers ───────────────────────────────────────────────

    #[test]
    fn test_sync_from_local_pushes_os_text() {
        let os = FakeOsClipboard::default();
        *os.text.lock().unwrap() = Some("local text".into());
        let mut bridge = bridge(false, true, &os);
        let mut streams = RecordingStreams::default();

        assert_eq!(bridge.sync_from_local(&mut streams), PushOutcome::Sent);
        assert_eq!(streams.blobs[0].1, b"local text".to_vec());
    }

    #[test]
    fn test_terminal_paste_and_copy_gating() {
        let os = FakeOsClipboard::default();
        let mut locked = bridge(false, false, &os);
        assert_eq!(
            locked.paste_text(Some("x".into())),
            Err(Notice::warning("Paste disabled"))
        );
        assert_eq!(locked.copy_text("x"), Err(Notice::warning("Copy disabled")));

        let mut open = bridge(true, true, &os);
        assert_eq!(open.paste_text(Some("ls\r".into())), Ok(Some("ls\r".into())));
        assert_eq!(open.copy_text("y"), Ok(()));
        assert_eq!(open.paste_text(None), Ok(Some("y".into())), "falls back to OS clipboard");
    }
}
