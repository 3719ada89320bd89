//! # quick-client
//!
//! Console client for Quick Access sessions.  Given an access link it
//! decodes the connection descriptor, asks the gateway for an ephemeral
//! session and hosts it as either a remote terminal or a remote desktop
//! tunnel.
//!
//! The crate follows a three-layer layout:
//!
//! - **`domain`** – configuration, launch parameters, the hotkey table.
//! - **`application`** – bootstrap, the two session adapters, clipboard sync
//!   and the notice presenter seam.  No sockets or consoles.
//! - **`infrastructure`** – HTTP, WebSocket transports, the console and the
//!   OS clipboard, plus the loop that drives one session.

pub mod application;
pub mod domain;
pub mod infrastructure;
