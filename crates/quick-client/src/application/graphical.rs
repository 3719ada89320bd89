//! Graphical tunnel adapter.
//!
//! Hosts a remote desktop session over a [`DisplayTunnel`].  The adapter is
//! pure session logic: it never touches a socket itself.  Local input comes
//! in through the `on_*` methods, tunnel events through
//! [`GraphicalTunnelAdapter::handle_event`], and every method returns the
//! notices the front end must show.
//!
//! # Input pipeline
//!
//! ```text
//! key down/up  ──→ send_key(pressed, keysym)
//! mouse down/up ─→ send_mouse(state)                 (unscaled)
//! mouse move  ───→ hide cursor, send_mouse(state / scale)
//! touch ─────────→ send_mouse(state)                 (unscaled)
//! window resize ─→ viewport ─→ rescale + send_size   (tracking mode only)
//! focus gained ──→ OS clipboard ─→ clipboard stream  (paste permission)
//! ```

use std::collections::HashMap;

use tracing::{debug, warn};
use url::form_urlencoded;

use quick_core::{
    display_scale, translate_status, ClipboardPayload, ConnectionState, Notice, ViewportBox,
};

use crate::application::clipboard::{ClipboardBridge, ClipboardStreams, SurfaceOutcome};
use crate::application::context::SessionContext;
use crate::application::error::TunnelError;
use crate::domain::config::ClientConfig;
use crate::domain::hotkeys::hotkeys_supported;

/// Pointer position and button state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MouseState {
    pub x: f64,
    pub y: f64,
    pub left: bool,
    pub middle: bool,
    pub right: bool,
    pub scroll_up: bool,
    pub scroll_down: bool,
}

impl MouseState {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }

    /// Button bit mask as used by the `mouse` instruction.
    pub fn button_mask(&self) -> u8 {
        u8::from(self.left)
            | u8::from(self.middle) << 1
            | u8::from(self.right) << 2
            | u8::from(self.scroll_up) << 3
            | u8::from(self.scroll_down) << 4
    }
}

/// Outbound half of a display tunnel.
pub trait DisplayTunnel: ClipboardStreams + Send {
    /// Opens the tunnel with the given url-encoded connect parameters.
    fn connect(&mut self, params: &str) -> Result<(), TunnelError>;
    fn send_key(&mut self, pressed: bool, keysym: u32) -> Result<(), TunnelError>;
    fn send_mouse(&mut self, state: MouseState) -> Result<(), TunnelError>;
    fn send_size(&mut self, width: u32, height: u32) -> Result<(), TunnelError>;
    fn disconnect(&mut self);
}

/// Inbound events of a display tunnel.
#[derive(Debug, Clone, PartialEq)]
pub enum TunnelEvent {
    /// Numeric connection state reported by the tunnel.
    StateChanged(i32),
    /// Status code with an optional message.
    Error { code: u32, message: Option<String> },
    /// The remote side opened a clipboard stream.
    ClipboardStart { stream: u32, mime_type: String },
    /// A chunk of an inbound stream.
    Blob { stream: u32, data: Vec<u8> },
    /// An inbound stream is complete.
    StreamEnd { stream: u32 },
    /// The remote display changed size.
    DisplayResized { width: u32, height: u32 },
    /// The tunnel is gone.
    Closed,
}

/// Builds the url-encoded parameters passed to [`DisplayTunnel::connect`].
///
/// `dpi` is `base_dpi`, doubled for telnet.
pub fn connect_params(viewport: ViewportBox, base_dpi: u32, protocol: &str, payload: &str) -> String {
    let dpi = if protocol == "telnet" {
        base_dpi * 2
    } else {
        base_dpi
    };
    form_urlencoded::Serializer::new(String::new())
        .append_pair("width", &viewport.width.to_string())
        .append_pair("height", &viewport.height.to_string())
        .append_pair("dpi", &dpi.to_string())
        .append_pair("payload", payload)
        .finish()
}

#[derive(Debug)]
struct InboundClipboard {
    mime_type: String,
    data: Vec<u8>,
}

/// A graphical session bound to one tunnel.
pub struct GraphicalTunnelAdapter<T: DisplayTunnel> {
    tunnel: T,
    ctx: SessionContext,
    clipboard: ClipboardBridge,
    base_dpi: u32,
    suppressed_keysym: u32,
    display: ViewportBox,
    scale: f64,
    cursor_visible: bool,
    inbound: HashMap<u32, InboundClipboard>,
}

impl<T: DisplayTunnel> GraphicalTunnelAdapter<T> {
    pub fn new(tunnel: T, ctx: SessionContext, clipboard: ClipboardBridge, config: &ClientConfig) -> Self {
        Self {
            tunnel,
            ctx,
            clipboard,
            base_dpi: config.base_dpi,
            suppressed_keysym: config.suppressed_keysym,
            display: ViewportBox::default(),
            scale: 1.0,
            cursor_visible: true,
            inbound: HashMap::new(),
        }
    }

    /// Connects the tunnel.  Returns the notices of the initial state.
    ///
    /// # Errors
    ///
    /// Whatever the tunnel reports for `connect`.  The adapter never retries.
    pub fn start(&mut self) -> Result<Vec<Notice>, TunnelError> {
        let params = connect_params(
            self.ctx.viewport.current(),
            self.base_dpi,
            self.ctx.protocol(),
            &self.ctx.payload.raw,
        );
        debug!(session = %self.ctx.session_id(), "connecting display tunnel");
        self.tunnel.connect(&params)?;
        Ok(self.ctx.lifecycle.initial_notices())
    }

    // ── Tunnel events ─────────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: TunnelEvent) -> Vec<Notice> {
        match event {
            TunnelEvent::StateChanged(code) => self.apply_state_code(code),
            TunnelEvent::Error { code, message } => {
                warn!(code, "display tunnel reported an error");
                vec![Notice::Prompt(translate_status(code, message.as_deref()))]
            }
            TunnelEvent::ClipboardStart { stream, mime_type } => {
                self.inbound.insert(
                    stream,
                    InboundClipboard {
                        mime_type,
                        data: Vec::new(),
                    },
                );
                Vec::new()
            }
            TunnelEvent::Blob { stream, data } => {
                if let Some(clip) = self.inbound.get_mut(&stream) {
                    clip.data.extend_from_slice(&data);
                }
                Vec::new()
            }
            TunnelEvent::StreamEnd { stream } => {
                if let Some(clip) = self.inbound.remove(&stream) {
                    self.finish_inbound_clipboard(clip);
                }
                Vec::new()
            }
            TunnelEvent::DisplayResized { width, height } => {
                self.display = ViewportBox::new(width, height);
                self.rescale();
                Vec::new()
            }
            TunnelEvent::Closed => {
                self.inbound.clear();
                self.apply_state(ConnectionState::Disconnected)
            }
        }
    }

    fn apply_state_code(&mut self, code: i32) -> Vec<Notice> {
        match self.ctx.lifecycle.apply_code(code) {
            Ok(notices) => notices,
            Err(e) => {
                warn!("ignoring tunnel state change: {e}");
                Vec::new()
            }
        }
    }

    fn apply_state(&mut self, state: ConnectionState) -> Vec<Notice> {
        match self.ctx.lifecycle.transition(state) {
            Ok(notices) => notices,
            Err(e) => {
                warn!("ignoring tunnel state change: {e}");
                Vec::new()
            }
        }
    }

    fn finish_inbound_clipboard(&mut self, clip: InboundClipboard) {
        let payload = if ClipboardPayload::is_text_mime(&clip.mime_type) {
            let text = String::from_utf8_lossy(&clip.data).into_owned();
            ClipboardPayload {
                mime_type: clip.mime_type,
                data: quick_core::ClipboardData::Text(text),
            }
        } else {
            ClipboardPayload::binary(clip.mime_type, clip.data)
        };
        if self.clipboard.surface_locally(payload) == SurfaceOutcome::Surfaced {
            debug!("remote clipboard received");
        }
    }

    // ── Keyboard ──────────────────────────────────────────────────────────────

    /// Forwards a key press.  Returns `true` when the local default action
    /// must be suppressed.
    pub fn on_key_down(&mut self, keysym: u32) -> bool {
        self.send_key(true, keysym);
        keysym == self.suppressed_keysym
    }

    pub fn on_key_up(&mut self, keysym: u32) {
        self.send_key(false, keysym);
    }

    fn send_key(&mut self, pressed: bool, keysym: u32) {
        if let Err(e) = self.tunnel.send_key(pressed, keysym) {
            debug!("key event dropped: {e}");
        }
    }

    /// `true` when the hotkey menu applies to this session's protocol.
    pub fn hotkeys_available(&self) -> bool {
        hotkeys_supported(self.ctx.protocol())
    }

    /// Presses every key in order, then releases every key in order.
    pub fn send_combination(&mut self, keysyms: &[u32]) -> Vec<Notice> {
        for &keysym in keysyms {
            self.send_key(true, keysym);
        }
        for &keysym in keysyms {
            self.send_key(false, keysym);
        }
        vec![Notice::success("Key(s) sent")]
    }

    // ── Pointer ───────────────────────────────────────────────────────────────

    pub fn on_mouse_down(&mut self, state: MouseState) {
        self.send_mouse(state);
    }

    pub fn on_mouse_up(&mut self, state: MouseState) {
        self.send_mouse(state);
    }

    /// Hides the local cursor and forwards the position in display
    /// coordinates.
    pub fn on_mouse_move(&mut self, mut state: MouseState) {
        self.cursor_visible = false;
        if self.scale.is_finite() && self.scale > 0.0 {
            state.x /= self.scale;
            state.y /= self.scale;
        }
        self.send_mouse(state);
    }

    pub fn on_touch(&mut self, state: MouseState) {
        self.send_mouse(state);
    }

    fn send_mouse(&mut self, state: MouseState) {
        if let Err(e) = self.tunnel.send_mouse(state) {
            debug!("mouse event dropped: {e}");
        }
    }

    // ── Viewport ──────────────────────────────────────────────────────────────

    /// Applies a (debounced) window resize.  Fixed viewports ignore it.
    pub fn on_window_resize(&mut self, window: ViewportBox) {
        if let Some(viewport) = self.ctx.viewport.on_window_resize(window) {
            self.rescale();
            if let Err(e) = self.tunnel.send_size(viewport.width, viewport.height) {
                debug!("size update dropped: {e}");
            }
        }
    }

    fn rescale(&mut self) {
        self.scale = display_scale(
            self.ctx.viewport.window(),
            self.display.width,
            self.display.height,
        );
        debug!(scale = self.scale, "display rescaled");
    }

    // ── Clipboard ─────────────────────────────────────────────────────────────

    /// Pushes the OS clipboard to the remote side after focus returns.
    pub fn on_focus_gained(&mut self) -> Vec<Notice> {
        let outcome = self.clipboard.sync_from_local(&mut self.tunnel);
        outcome.notice().into_iter().collect()
    }

    /// Pushes an explicit payload to the remote side.
    pub fn send_clipboard(&mut self, payload: ClipboardPayload) -> Vec<Notice> {
        let outcome = self.clipboard.push_to_remote(&mut self.tunnel, payload);
        outcome.notice().into_iter().collect()
    }

    // ── Teardown / accessors ──────────────────────────────────────────────────

    pub fn disconnect(&mut self) {
        self.tunnel.disconnect();
    }

    pub fn state(&self) -> ConnectionState {
        self.ctx.lifecycle.state()
    }

    pub fn is_finished(&self) -> bool {
        self.ctx.lifecycle.is_finished()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn tunnel(&self) -> &T {
        &self.tunnel
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
