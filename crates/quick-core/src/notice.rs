//! User-visible notices.
//!
//! Core components never draw anything.  They return `Notice` values and the
//! front end decides how to show them (a status line, a toast, a blocking
//! prompt).  This keeps the lifecycle, the status table and the clipboard
//! policy testable without a UI.

use std::time::Duration;

use crate::status::ErrorPrompt;

/// How long success and info toasts stay visible.
pub const TOAST_TTL: Duration = Duration::from_secs(3);

/// Something the user should see.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Persistent progress message.  Replaces the previous status message.
    Loading(String),
    /// Auto-expiring success message.
    Success { text: String, ttl: Duration },
    /// Auto-expiring informational message.
    Info { text: String, ttl: Duration },
    /// Non-blocking warning, e.g. a rejected clipboard operation.
    Warning(String),
    /// Close every open modal prompt.
    DismissModals,
    /// Blocking confirmation built from a transport status code.
    Prompt(ErrorPrompt),
    /// The launch parameters did not describe a target.
    NotFound,
}

impl Notice {
    pub fn loading(text: impl Into<String>) -> Self {
        Notice::Loading(text.into())
    }

    pub fn success(text: impl Into<String>) -> Self {
        Notice::Success {
            text: text.into(),
            ttl: TOAST_TTL,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Notice::Info {
            text: text.into(),
            ttl: TOAST_TTL,
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Notice::Warning(text.into())
    }
}
