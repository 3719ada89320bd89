//! Transport status code table.
//!
//! Every numeric status the display tunnel or the backend can report maps to
//! one user-facing message and the recovery actions offered in the blocking
//! prompt.  The table is plain data so new codes need no new control flow.
//!
//! Codes are grouped by origin:
//!
//! | Range     | Origin                                   |
//! |-----------|------------------------------------------|
//! | `256`     | protocol negotiation                     |
//! | `512–523` | server / upstream (remote service) side  |
//! | `768–783` | client side                              |
//! | `800–806` | access gateway and session management    |

use base64::Engine;

use crate::descriptor::LENIENT;

/// What the user may do after a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Reload the page / restart the session from the same launch parameters.
    Reload,
    /// Give up and leave the session.
    Close,
}

impl RecoveryAction {
    pub fn label(self) -> &'static str {
        match self {
            RecoveryAction::Reload => "Reload",
            RecoveryAction::Close => "Close",
        }
    }
}

const RELOAD_OR_CLOSE: &[RecoveryAction] = &[RecoveryAction::Reload, RecoveryAction::Close];
const CLOSE_ONLY: &[RecoveryAction] = &[RecoveryAction::Close];

/// Message shown for an unmapped code that carries no message.
pub const UNKNOWN_ERROR: &str = "Unknown error.";

/// `(code, message, actions)`
static STATUS_TABLE: &[(u32, &str, &[RecoveryAction])] = &[
    (256, "Unsupported access.", RELOAD_OR_CLOSE),
    (512, "Remote service error. Check the target device.", RELOAD_OR_CLOSE),
    (513, "Server busy.", RELOAD_OR_CLOSE),
    (514, "Server connection timeout.", RELOAD_OR_CLOSE),
    (515, "Remote service unexpected error.", RELOAD_OR_CLOSE),
    (516, "Resource not found.", RELOAD_OR_CLOSE),
    (517, "Resource conflict.", RELOAD_OR_CLOSE),
    (518, "Resource closed.", RELOAD_OR_CLOSE),
    (519, "Remote service not found.", RELOAD_OR_CLOSE),
    (520, "Remote service unavailable.", RELOAD_OR_CLOSE),
    (521, "Session conflict.", RELOAD_OR_CLOSE),
    (522, "Server connection timeout.", RELOAD_OR_CLOSE),
    (523, "Session closed.", RELOAD_OR_CLOSE),
    (768, "Network unreachable.", RELOAD_OR_CLOSE),
    (769, "Server password verification failed.", RELOAD_OR_CLOSE),
    (771, "Client banned.", CLOSE_ONLY),
    (776, "Client connection timeout.", RELOAD_OR_CLOSE),
    (781, "Client unexpected error.", RELOAD_OR_CLOSE),
    (783, "Invalid type.", RELOAD_OR_CLOSE),
    (800, "Session not found.", RELOAD_OR_CLOSE),
    (801, "Tunnel creation failed. Check the Guacd Service.", RELOAD_OR_CLOSE),
    (802, "Force closed by Administrator.", CLOSE_ONLY),
    (803, "Access gateway unavailable.", RELOAD_OR_CLOSE),
    (804, "Access gateway creation failed.", RELOAD_OR_CLOSE),
    (805, "Asset not active.", RELOAD_OR_CLOSE),
    (806, "Failed to create SSH client.", RELOAD_OR_CLOSE),
];

/// A blocking confirmation built from a status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPrompt {
    pub code: u32,
    pub message: String,
    /// Offered actions, in display order.  Never empty; always ends in `Close`.
    pub actions: Vec<RecoveryAction>,
}

impl ErrorPrompt {
    /// The action bound to "accept": the first offered one.
    pub fn accept_action(&self) -> RecoveryAction {
        self.actions.first().copied().unwrap_or(RecoveryAction::Close)
    }

    /// The action bound to "dismiss".
    pub fn dismiss_action(&self) -> RecoveryAction {
        RecoveryAction::Close
    }

    /// `true` when the user may retry.
    pub fn can_reload(&self) -> bool {
        self.actions.contains(&RecoveryAction::Reload)
    }
}

/// Looks up the table entry for `code`, if any.
pub fn lookup(code: u32) -> Option<(&'static str, &'static [RecoveryAction])> {
    STATUS_TABLE
        .binary_search_by_key(&code, |(c, _, _)| *c)
        .ok()
        .map(|i| (STATUS_TABLE[i].1, STATUS_TABLE[i].2))
}

/// Translates a status code (and the optional message that came with it).
///
/// Mapped codes always use the table message.  For an unmapped code the
/// message is treated as base64 text and decoded; when it does not decode to
/// UTF-8 the raw message is shown instead.  No message at all gives
/// [`UNKNOWN_ERROR`].
pub fn translate_status(code: u32, message: Option<&str>) -> ErrorPrompt {
    if let Some((text, actions)) = lookup(code) {
        return ErrorPrompt {
            code,
            message: text.to_string(),
            actions: actions.to_vec(),
        };
    }

    let message = match message.map(str::trim).filter(|m| !m.is_empty()) {
        Some(raw) => decode_message(raw).unwrap_or_else(|| raw.to_string()),
        None => UNKNOWN_ERROR.to_string(),
    };
    tracing::debug!("unmapped status code {code}");
    ErrorPrompt {
        code,
        message,
        actions: RELOAD_OR_CLOSE.to_vec(),
    }
}

fn decode_message(raw: &str) -> Option<String> {
    let bytes = LENIENT.decode(raw).ok()?;
    String::from_utf8(bytes).ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
