//! Application layer for quick-client.
//!
//! Use cases that sit between the pure `quick-core` domain and the I/O in
//! `infrastructure`:
//!
//! | Module      | Responsibility                                              |
//! |-------------|-------------------------------------------------------------|
//! | `bootstrap` | Exchange an asset identity for an ephemeral session          |
//! | `context`   | Per-session state shared by the adapters                     |
//! | `graphical` | Remote desktop adapter over a display tunnel                 |
//! | `terminal`  | Terminal adapter over the text message protocol              |
//! | `clipboard` | Permission-gated clipboard sync in both directions           |
//! | `presenter` | Seam through which notices reach the user                    |
//!
//! Every transport and device is reached through a trait, so each use case
//! is tested with in-memory doubles.

pub mod bootstrap;
pub mod clipboard;
pub mod context;
pub mod error;
pub mod graphical;
pub mod presenter;
pub mod terminal;

pub use bootstrap::{BootstrapError, SessionApi, SessionBootstrap};
pub use clipboard::{ClipboardBridge, ClipboardStreams, PushOutcome, SurfaceOutcome, SystemClipboard};
pub use context::SessionContext;
pub use error::{ClientError, TunnelError};
pub use graphical::{connect_params, DisplayTunnel, GraphicalTunnelAdapter, MouseState, TunnelEvent};
pub use presenter::Presenter;
pub use terminal::{
    error_line, write_bootstrap_failure, Outbound, TerminalMessageAdapter, TerminalSurface,
    TransportEvent,
};
