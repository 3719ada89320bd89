//! # quick-core
//!
//! Shared, I/O-free foundation of the Quick Access session client.
//!
//! A Quick Access session starts from an opaque `payload` URL parameter and
//! ends as a live remote desktop or remote terminal.  Everything in this crate
//! is pure data and pure logic, so it can be tested without sockets, timers,
//! or a console:
//!
//! - **`descriptor`** – Decodes the base64-JSON connection descriptor carried
//!   in the URL and derives the asset identity (`ssh_10.0.0.5_22`).
//! - **`session`** – The ephemeral session descriptor minted by the backend,
//!   including its `"0"`/`"1"` permission flags.
//! - **`lifecycle`** – The six-state connection state machine shared by the
//!   graphical and terminal adapters.
//! - **`status`** – The table that maps numeric transport status codes to a
//!   user-facing message and the recovery actions the user may pick.
//! - **`viewport`** – Fixed vs. window-tracking viewport and display scaling.
//! - **`message`** – The single-digit-tag text framing of the terminal protocol.
//! - **`clipboard`** – Clipboard payloads, the permission policy and the shared
//!   last-write-wins buffer.
//! - **`notice`** – The user-visible notices every component emits instead of
//!   talking to a UI directly.

pub mod clipboard;
pub mod descriptor;
pub mod lifecycle;
pub mod message;
pub mod notice;
pub mod session;
pub mod status;
pub mod viewport;

// Re-export the most-used types at the crate root so callers can write
// `quick_core::ConnectionDescriptor` instead of the full module path.
pub use clipboard::{ClipboardBuffer, ClipboardData, ClipboardPayload, ClipboardPolicy};
pub use descriptor::{
    decode_payload, encode_payload, ConnectionDescriptor, DecodedPayload, DescriptorError, Port,
};
pub use lifecycle::{ConnectionLifecycle, ConnectionState, LifecycleError};
pub use message::{FrameError, MessageKind, ProtocolMessage, TerminalSize};
pub use notice::Notice;
pub use session::{SessionDescriptor, SessionEnvelope, SessionMode};
pub use status::{translate_status, ErrorPrompt, RecoveryAction};
pub use viewport::{display_scale, ViewportBox, ViewportManager};
