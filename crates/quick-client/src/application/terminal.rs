//! Terminal message adapter.
//!
//! Speaks the single-digit-tag text protocol (see `quick_core::message`)
//! over one WebSocket.  The adapter does not own the socket: inbound traffic
//! arrives as [`TransportEvent`]s and outbound frames leave through an
//! unbounded channel drained by the transport's writer task.
//!
//! ```text
//! TransportEvent ──→ handle_event ──→ TerminalSurface (clear / write)
//!                                  └─→ ConnectionLifecycle
//! local input ─────→ on_input ─────→ Outbound::Frame("2…")
//! keep-alive task ─────────────────→ Outbound::Frame("4")   every 10 s
//! ```

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use quick_core::{ConnectionState, MessageKind, Notice, ProtocolMessage, TerminalSize};

use crate::application::clipboard::ClipboardBridge;
use crate::application::context::SessionContext;

/// Where terminal output is drawn.
pub trait TerminalSurface: Send {
    fn clear(&mut self);
    fn write(&mut self, text: &str);

    fn write_line(&mut self, text: &str) {
        self.write(text);
        self.write("\r\n");
    }

    /// Current size in character cells.
    fn size(&self) -> TerminalSize;
}

/// What the adapter asks the transport's writer to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// One text frame.
    Frame(String),
    /// Close the socket from the client side.
    Close,
}

/// Inbound events of the terminal transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Frame(String),
    Error(String),
    Closed,
}

/// Wraps `text` in bold italic red.
pub fn error_line(text: &str) -> String {
    format!("\x1B[1;3;31m{text}\x1B[0m ")
}

/// Writes the bootstrap failure line.  No adapter exists at that point.
pub fn write_bootstrap_failure(surface: &mut dyn TerminalSurface, message: &str) {
    surface.write_line(&error_line(&format!("Failed to create session, {message}.")));
}

/// Shortest keep-alive period; `interval` rejects zero.
const MIN_KEEPALIVE: Duration = Duration::from_secs(1);

fn spawn_keepalive(tx: UnboundedSender<Outbound>, period: Duration) -> JoinHandle<()> {
    let period = period.max(MIN_KEEPALIVE);
    tokio::spawn(async move {
        let mut ticker = interval(period);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if tx.send(Outbound::Frame(ProtocolMessage::ping().encode())).is_err() {
                break;
            }
        }
    })
}

/// A terminal session bound to one transport.
pub struct TerminalMessageAdapter<S: TerminalSurface> {
    surface: S,
    outbound: UnboundedSender<Outbound>,
    ctx: SessionContext,
    clipboard: ClipboardBridge,
    keepalive_interval: Duration,
    keepalive: Option<JoinHandle<()>>,
    open: bool,
    lines: LineTracker,
}

impl<S: TerminalSurface> TerminalMessageAdapter<S> {
    pub fn new(
        surface: S,
        outbound: UnboundedSender<Outbound>,
        ctx: SessionContext,
        clipboard: ClipboardBridge,
        keepalive_interval: Duration,
    ) -> Self {
        Self {
            surface,
            outbound,
            ctx,
            clipboard,
            keepalive_interval,
            keepalive: None,
            open: false,
            lines: LineTracker::default(),
        }
    }

    /// Size used for the `cols`/`rows` query parameters of the transport URL.
    pub fn initial_size(&self) -> TerminalSize {
        self.ctx.viewport.current().into()
    }

    /// Shows the pre-connect banner and leaves `Idle`.
    pub fn on_session_created(&mut self) -> Vec<Notice> {
        self.surface.write_line("Connecting...");
        self.apply_state(ConnectionState::Connecting)
    }

    // ── Transport events ──────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: TransportEvent) -> Vec<Notice> {
        match event {
            TransportEvent::Opened => {
                self.open = true;
                if self.keepalive.is_none() {
                    self.keepalive = Some(spawn_keepalive(
                        self.outbound.clone(),
                        self.keepalive_interval,
                    ));
                }
                info!(session = %self.ctx.session_id(), "terminal transport open");
                self.apply_state(ConnectionState::Waiting)
            }
            TransportEvent::Frame(frame) => self.handle_frame(&frame),
            TransportEvent::Error(detail) => {
                warn!("terminal transport error: {detail}");
                self.surface
                    .write_line(&error_line(&format!("websocket error {detail}")));
                Vec::new()
            }
            TransportEvent::Closed => {
                self.open = false;
                self.stop_keepalive();
                self.surface.write_line("Connection closed");
                self.apply_state(ConnectionState::Disconnected)
            }
        }
    }

    fn handle_frame(&mut self, frame: &str) -> Vec<Notice> {
        let message = match ProtocolMessage::parse(frame) {
            Ok(m) => m,
            Err(e) => {
                warn!("skipping terminal frame: {e}");
                return Vec::new();
            }
        };
        match message.kind {
            MessageKind::Connected => {
                self.surface.clear();
                self.apply_state(ConnectionState::Connected)
            }
            MessageKind::Data => {
                self.lines.feed(&message.content);
                self.surface.write(&message.content);
                Vec::new()
            }
            MessageKind::Closed => {
                self.surface.write_line(&error_line(&message.content));
                self.send(Outbound::Close);
                self.apply_state(ConnectionState::Disconnecting)
            }
            MessageKind::Ping | MessageKind::Resize => {
                debug!(kind = ?message.kind, "ignoring server frame");
                Vec::new()
            }
        }
    }

    fn apply_state(&mut self, state: ConnectionState) -> Vec<Notice> {
        match self.ctx.lifecycle.transition(state) {
            Ok(notices) => notices,
            Err(e) => {
                warn!("ignoring terminal state change: {e}");
                Vec::new()
            }
        }
    }

    // ── Local input ───────────────────────────────────────────────────────────

    /// Sends one chunk of local input as a `Data` frame.
    pub fn on_input(&mut self, data: &str) {
        if data.is_empty() {
            return;
        }
        if !self.open {
            debug!("input dropped: transport not open");
            return;
        }
        self.send(Outbound::Frame(ProtocolMessage::data(data).encode()));
    }

    /// Applies a settled console size.
    ///
    /// The session viewport decides: a fixed viewport or an unchanged size
    /// sends nothing.
    pub fn on_window_resize(&mut self, size: TerminalSize) {
        let Some(viewport) = self.ctx.viewport.on_window_resize(size.into()) else {
            return;
        };
        if self.open {
            let size = TerminalSize::from(viewport);
            debug!(cols = size.cols, rows = size.rows, "terminal resized");
            self.send(Outbound::Frame(ProtocolMessage::resize(size).encode()));
        }
    }

    /// Pastes `text`, or the OS clipboard when `None`.
    pub fn on_paste(&mut self, text: Option<String>) -> Vec<Notice> {
        match self.clipboard.paste_text(text) {
            Ok(Some(text)) => {
                self.on_input(&text);
                Vec::new()
            }
            Ok(None) => Vec::new(),
            Err(notice) => vec![notice],
        }
    }

    /// Copies the most recent non-empty output line.
    pub fn on_copy_last_line(&mut self) -> Vec<Notice> {
        let Some(line) = self.lines.last_line().map(str::to_owned) else {
            return Vec::new();
        };
        match self.clipboard.copy_text(&line) {
            Ok(()) => Vec::new(),
            Err(notice) => vec![notice],
        }
    }

    // ── Teardown / accessors ──────────────────────────────────────────────────

    /// Stops the keep-alive and closes the transport.
    pub fn teardown(&mut self) {
        self.stop_keepalive();
        if self.open {
            self.send(Outbound::Close);
            self.open = false;
        }
    }

    fn stop_keepalive(&mut self) {
        if let Some(handle) = self.keepalive.take() {
            handle.abort();
        }
    }

    fn send(&self, outbound: Outbound) {
        if self.outbound.send(outbound).is_err() {
            debug!("terminal writer gone");
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn state(&self) -> ConnectionState {
        self.ctx.lifecycle.state()
    }

    pub fn is_finished(&self) -> bool {
        self.ctx.lifecycle.is_finished()
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

impl<S: TerminalSurface> Drop for TerminalMessageAdapter<S> {
    fn drop(&mut self) {
        self.stop_keepalive();
    }
}

// ── Output line tracking ──────────────────────────────────────────────────────

/// Longest partial line kept, in bytes.  Older text is dropped.
const MAX_LINE: usize = 4096;

/// Remembers the last visible output line, without escape sequences.
///
/// Cursor positioning (`CSI … H`, `CSI … f`) ends the current line, so
/// full-screen redraws do not pile up into one line.
#[derive(Debug, Default)]
struct LineTracker {
    current: String,
    last: Option<String>,
}

impl LineTracker {
    fn feed(&mut self, data: &str) {
        let mut chars = data.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\x1B' => match chars.next() {
                    // CSI: parameters up to a final byte in '@'..='~'
                    Some('[') => {
                        let last = chars.by_ref().find(|c| ('@'..='~').contains(c));
                        if matches!(last, Some('H' | 'f')) {
                            self.commit();
                        }
                    }
                    // OSC: up to BEL or ST
                    Some(']') => {
                        while let Some(c) = chars.next() {
                            if c == '\x07' {
                                break;
                            }
                            if c == '\x1B' && chars.peek() == Some(&'\\') {
                                chars.next();
                                break;
                            }
                        }
                    }
                    _ => {}
                },
                '\n' => self.commit(),
                '\r' => {}
                c if c.is_control() => {}
                c => self.current.push(c),
            }
        }
        self.truncate_front();
    }

    fn truncate_front(&mut self) {
        if self.current.len() <= MAX_LINE {
            return;
        }
        let mut cut = self.current.len() - MAX_LINE;
        while !self.current.is_char_boundary(cut) {
            cut += 1;
        }
        self.current.drain(..cut);
    }

    fn commit(&mut self) {
        let line = std::mem::take(&mut self.current);
        let line = line.trim_end();
        if !line.is_empty() {
            self.last = Some(line.to_string());
        }
    }

    fn last_line(&self) -> Option<&str> {
        let current = self.current.trim_end();
        if current.is_empty() {
            self.last.as_deref()
        } else {
            Some(current)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use quick_core::{decode_payload, SessionDescriptor, ViewportBox, ViewportManager};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    // ── Test double ───────────────────────────────────────────────────────────

    #[derive(Debug, Default)]
    struct RecordingSurface {
        output: String,
        clears: usize,
        size: Option<TerminalSize>,
    }

    impl TerminalSurface for RecordingSurface {
        fn clear(&mut self) {
            self.clears += 1;
            self.output.clear();
        }

        fn write(&mut self, text: &str) {
            self.output.push_str(text);
        }

        fn size(&self) -> TerminalSize {
            self.size.unwrap_or(TerminalSize::new(80, 24))
        }
    }

    // {"host":"10.0.0.5","port":22}
    const SSH_PAYLOAD: &str = "eyJob3N0IjoiMTAuMC4wLjUiLCJwb3J0IjoyMn0=";

    fn build(
        copy: &str,
        paste: &str,
        viewport: ViewportManager,
        keepalive: Duration,
    ) -> (
        TerminalMessageAdapter<RecordingSurface>,
        UnboundedReceiver<Outbound>,
    ) {
        let session = SessionDescriptor {
            id: "ssh_10.0.0.5_22".into(),
            copy: copy.into(),
            paste: paste.into(),
            ..Default::default()
        };
        let ctx = SessionContext::new(decode_payload(SSH_PAYLOAD).unwrap(), session, viewport);
        let clipboard = ctx.clipboard_bridge(None);
        let (tx, rx) = unbounded_channel();
        let adapter =
            TerminalMessageAdapter::new(RecordingSurface::default(), tx, ctx, clipboard, keepalive);
        (adapter, rx)
    }

    fn adapter_with(
        copy: &str,
        paste: &str,
    ) -> (
        TerminalMessageAdapter<RecordingSurface>,
        UnboundedReceiver<Outbound>,
    ) {
        build(
            copy,
            paste,
            ViewportManager::tracking(ViewportBox::new(80, 24)),
            Duration::from_secs(10),
        )
    }

    fn adapter() -> (
        TerminalMessageAdapter<RecordingSurface>,
        UnboundedReceiver<Outbound>,
    ) {
        adapter_with("1", "1")
    }

    fn drain(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            out.push(item);
        }
        out
    }

    fn frame(text: &str) -> Outbound {
        Outbound::Frame(text.to_string())
    }

    // ── Keep-alive ────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_open_for_25s_sends_exactly_two_pings() {
        // Arrange
        let (mut a, mut rx) = adapter();
        a.on_session_created();

        // Act
        a.handle_event(TransportEvent::Opened);
        tokio::time::sleep(Duration::from_secs(25)).await;

        // Assert
        assert_eq!(drain(&mut rx), vec![frame("4"), frame("4")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_keepalive_period_falls_back_to_one_second() {
        // Arrange
        let (mut a, mut rx) = build(
            "1",
            "1",
            ViewportManager::tracking(ViewportBox::new(80, 24)),
            Duration::ZERO,
        );

        // Act
        a.handle_event(TransportEvent::Opened);
        tokio::time::sleep(Duration::from_millis(2500)).await;

        // Assert
        assert_eq!(drain(&mut rx), vec![frame("4"), frame("4")]);
        a.teardown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_keepalive() {
        let (mut a, mut rx) = adapter();
        a.on_session_created();
        a.handle_event(TransportEvent::Opened);
        tokio::time::sleep(Duration::from_secs(11)).await;
        a.handle_event(TransportEvent::Closed);
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(drain(&mut rx), vec![frame("4")]);
        assert!(a.surface().output.ends_with("Connection closed\r\n"));
        assert!(a.is_finished());
    }

    // ── Inbound frames ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_connected_clears_and_data_is_written_verbatim() {
        let (mut a, _rx) = adapter();
        a.on_session_created();
        a.handle_event(TransportEvent::Opened);

        let notices = a.handle_event(TransportEvent::Frame("1".into()));
        a.handle_event(TransportEvent::Frame("2\x1B[32mhello\x1B[0m\r\n".into()));

        assert_eq!(a.surface().clears, 1);
        assert_eq!(a.surface().output, "\x1B[32mhello\x1B[0m\r\n");
        assert_eq!(a.state(), ConnectionState::Connected);
        assert!(notices.contains(&Notice::DismissModals));
        a.teardown();
    }

    #[tokio::test]
    async fn test_closed_frame_writes_error_line_and_closes() {
        let (mut a, mut rx) = adapter();
        a.handle_event(TransportEvent::Opened);

        a.handle_event(TransportEvent::Frame("0session expired".into()));

        assert!(a
            .surface()
            .output
            .contains("\x1B[1;3;31msession expired\x1B[0m "));
        assert_eq!(drain(&mut rx), vec![Outbound::Close]);
        a.teardown();
    }

    #[tokio::test]
    async fn test_malformed_and_server_ping_frames_are_skipped() {
        let (mut a, _rx) = adapter();
        a.handle_event(TransportEvent::Opened);
        let before = a.surface().output.clone();

        assert!(a.handle_event(TransportEvent::Frame(String::new())).is_empty());
        assert!(a.handle_event(TransportEvent::Frame("9junk".into())).is_empty());
        assert!(a.handle_event(TransportEvent::Frame("4".into())).is_empty());

        assert_eq!(a.surface().output, before);
        a.teardown();
    }

    #[test]
    fn test_banner_and_error_lines() {
        let (mut a, _rx) = adapter();
        let notices = a.on_session_created();
        assert_eq!(a.surface().output, "Connecting...\r\n");
        assert_eq!(notices, vec![Notice::loading("Connecting...")]);

        a.handle_event(TransportEvent::Error("reset by peer".into()));
        assert!(a.surface().output.contains("websocket error reset by peer"));

        let mut surface = RecordingSurface::default();
        write_bootstrap_failure(&mut surface, "asset offline");
        assert_eq!(
            surface.output,
            "\x1B[1;3;31mFailed to create session, asset offline.\x1B[0m \r\n"
        );
    }

    // ── Outbound ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_input_becomes_data_frames_only_while_open() {
        let (mut a, mut rx) = adapter();
        a.on_input("early");
        a.handle_event(TransportEvent::Opened);
        a.on_input("ls\r");

        assert_eq!(drain(&mut rx), vec![frame("2ls\r")]);
        a.teardown();
    }

    #[tokio::test]
    async fn test_resize_sent_only_on_change() {
        let (mut a, mut rx) = adapter();
        a.handle_event(TransportEvent::Opened);

        a.on_window_resize(TerminalSize::new(80, 24));
        a.on_window_resize(TerminalSize::new(120, 40));
        a.on_window_resize(TerminalSize::new(120, 40));

        let expected = ProtocolMessage::resize(TerminalSize::new(120, 40)).encode();
        assert_eq!(drain(&mut rx), vec![Outbound::Frame(expected)]);
        a.teardown();
    }

    #[test]
    fn test_resize_before_open_is_not_sent() {
        let (mut a, mut rx) = adapter();
        a.on_window_resize(TerminalSize::new(100, 30));
        assert!(drain(&mut rx).is_empty());
        assert_eq!(a.initial_size(), TerminalSize::new(100, 30));
    }

    #[tokio::test]
    async fn test_fixed_viewport_ignores_console_resize() {
        // Arrange: a 100x30 fixed viewport
        let (mut a, mut rx) = build(
            "1",
            "1",
            ViewportManager::from_params(Some("100"), Some("30"), ViewportBox::new(80, 24)),
            Duration::from_secs(10),
        );
        a.handle_event(TransportEvent::Opened);

        // Act
        a.on_window_resize(TerminalSize::new(200, 60));

        // Assert
        assert!(drain(&mut rx).is_empty());
        assert_eq!(a.initial_size(), TerminalSize::new(100, 30));
        a.teardown();
    }

    // ── Clipboard ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_paste_gated_by_permission() {
        let (mut a, mut rx) = adapter_with("1", "0");
        a.handle_event(TransportEvent::Opened);

        let notices = a.on_paste(Some("rm -rf /".into()));

        assert_eq!(notices, vec![Notice::warning("Paste disabled")]);
        assert!(drain(&mut rx).is_empty());
        a.teardown();
    }

    #[tokio::test]
    async fn test_paste_allowed_sends_data() {
        let (mut a, mut rx) = adapter();
        a.handle_event(TransportEvent::Opened);
        assert!(a.on_paste(Some("whoami\r".into())).is_empty());
        assert_eq!(drain(&mut rx), vec![frame("2whoami\r")]);
        a.teardown();
    }

    #[test]
    fn test_copy_last_line_strips_escapes() {
        let (mut a, _rx) = adapter();
        a.handle_event(TransportEvent::Frame("2\x1B[1mroot\x1B[0m@host\r\n$ ".into()));
        a.handle_event(TransportEvent::Frame("2\r\n".into()));

        assert!(a.on_copy_last_line().is_empty());
        assert_eq!(
            a.context().clipboard.get().and_then(|p| p.as_text().map(str::to_owned)),
            Some("$".to_string())
        );
    }

    #[test]
    fn test_copy_disabled_warns() {
        let (mut a, _rx) = adapter_with("0", "1");
        a.handle_event(TransportEvent::Frame("2uid=0(root)\r\n".into()));
        assert_eq!(a.on_copy_last_line(), vec![Notice::warning("Copy disabled")]);
        assert!(a.context().clipboard.get().is_none());
    }

    #[test]
    fn test_line_tracker_splits_cursor_positioned_redraws() {
        // Arrange: a full-screen program repainting without newlines
        let mut lines = LineTracker::default();

        // Act
        for _ in 0..10_000 {
            lines.feed("\x1B[1;1HCPU[|||||     ] 12.3%\x1B[2;1HMem[||   ] 1.2G");
        }

        // Assert
        assert_eq!(lines.last_line(), Some("Mem[||   ] 1.2G"));
        assert!(lines.current.len() <= MAX_LINE);
    }

    #[test]
    fn test_line_tracker_caps_an_endless_line() {
        let mut lines = LineTracker::default();
        for _ in 0..2_000 {
            lines.feed("é=0123456789");
        }
        assert!(lines.current.len() <= MAX_LINE);
        assert!(lines.last_line().unwrap().ends_with("é=0123456789"));
    }

    #[test]
    fn test_line_tracker_prefers_partial_line() {
        let mut lines = LineTracker::default();
        lines.feed("first\r\n\x1B]0;title\x07second");
        assert_eq!(lines.last_line(), Some("second"));
        lines.feed("\r\n\r\n");
        assert_eq!(lines.last_line(), Some("second"));
    }
}
