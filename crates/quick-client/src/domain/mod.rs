//! Domain layer for quick-client.
//!
//! Plain data with no I/O: runtime configuration, launch parameters and the
//! hotkey table.  Everything here is constructed once at startup and then
//! only read.

pub mod config;
pub mod hotkeys;
pub mod launch;

pub use config::{ClientConfig, ConfigError};
pub use hotkeys::{hotkeys_supported, HotKey, HOTKEYS};
pub use launch::{LaunchError, LaunchParams, Route};
