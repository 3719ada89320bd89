//! Ephemeral session descriptor and the backend response envelope.
//!
//! Before any transport is opened, the client exchanges the asset identity
//! for a short-lived session:
//!
//! ```text
//! POST /quick?assetId=ssh_10.0.0.5_22&mode=native
//! ← {"code":1,"data":{"id":"ssh_10.0.0.5_22","copy":"1","paste":"0",...}}
//! ```
//!
//! Permission flags are strings (`"0"` / `"1"`), exactly as the backend sends
//! them.  A flag that is absent from the response reads as `"0"`.

use serde::{Deserialize, Serialize};

/// Envelope code that signals success.
pub const SUCCESS_CODE: i64 = 1;

/// Which kind of transport the session will be used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Graphical session through the display tunnel.
    Guacd,
    /// Terminal session through the text message protocol.
    Native,
}

impl SessionMode {
    /// The value sent in the `mode` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Guacd => "guacd",
            SessionMode::Native => "native",
        }
    }
}

fn flag_off() -> String {
    "0".to_string()
}

/// The session minted by the backend.
///
/// Read-only once received.  A changed identity means a new
/// `SessionDescriptor`, never a mutation of this one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    /// Backend session identifier; also the path segment of every transport URL.
    #[serde(default)]
    pub id: String,
    /// Remote → local clipboard allowed.
    #[serde(default = "flag_off")]
    pub copy: String,
    /// Local → remote clipboard allowed.
    #[serde(default = "flag_off")]
    pub paste: String,
    #[serde(default = "flag_off")]
    pub upload: String,
    #[serde(default = "flag_off")]
    pub download: String,
    #[serde(default = "flag_off")]
    pub delete: String,
    #[serde(default = "flag_off")]
    pub rename: String,
    #[serde(default = "flag_off")]
    pub edit: String,
    #[serde(default = "flag_off")]
    pub file_system: String,
    #[serde(default)]
    pub storage_id: String,
}

impl SessionDescriptor {
    /// `true` when the backend returned a usable session id.
    pub fn is_established(&self) -> bool {
        !self.id.trim().is_empty()
    }

    /// Remote clipboard content may be surfaced locally.
    pub fn copy_allowed(&self) -> bool {
        self.copy == "1"
    }

    /// Local clipboard content may be pushed to the remote side.
    pub fn paste_allowed(&self) -> bool {
        self.paste == "1"
    }

    /// `true` when either clipboard direction is open.
    pub fn clipboard_enabled(&self) -> bool {
        self.copy_allowed() || self.paste_allowed()
    }
}

/// The `{code, message?, data?}` envelope wrapped around every backend reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionEnvelope {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<SessionDescriptor>,
}

impl SessionEnvelope {
    /// Unwraps the envelope.
    ///
    /// Returns `None` for a non-success code, a missing `data` object, or a
    /// descriptor whose `id` is empty.  All three mean "no session".
    pub fn into_session(self) -> Option<SessionDescriptor> {
        if self.code != SUCCESS_CODE {
            return None;
        }
        self.data.filter(SessionDescriptor::is_established)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_yields_session() {
        // Arrange
        let json = r#"{"code":1,"data":{"id":"ssh_h_22","copy":"1","paste":"0","fileSystem":"1"}}"#;

        // Act
        let env: SessionEnvelope = serde_json::from_str(json).unwrap();
        let session = env.into_session().unwrap();

        // Assert
        assert_eq!(session.id, "ssh_h_22");
        assert!(session.copy_allowed());
        assert!(!session.paste_allowed());
        assert_eq!(session.file_system, "1");
    }

    #[test]
    fn test_failure_code_yields_no_session() {
        let json = r#"{"code":-1,"message":"asset offline","data":{"id":"x"}}"#;
        let env: SessionEnvelope = serde_json::from_str(json).unwrap();
        assert!(env.into_session().is_none());
    }

    #[test]
    fn test_empty_id_is_not_established() {
        let json = r#"{"code":1,"data":{"id":""}}"#;
        let env: SessionEnvelope = serde_json::from_str(json).unwrap();
        assert!(env.into_session().is_none());
    }

    #[test]
    fn test_missing_data_yields_no_session() {
        let env: SessionEnvelope = serde_json::from_str(r#"{"code":1}"#).unwrap();
        assert!(env.into_session().is_none());
    }

    #[test]
    fn test_absent_flags_read_as_disabled() {
        let session: SessionDescriptor = serde_json::from_str(r#"{"id":"abc"}"#).unwrap();
        assert_eq!(session.copy, "0");
        assert_eq!(session.paste, "0");
        assert!(!session.clipboard_enabled());
    }

    #[test]
    fn test_mode_query_values() {
        assert_eq!(SessionMode::Guacd.as_str(), "guacd");
        assert_eq!(SessionMode::Native.as_str(), "native");
    }
}
