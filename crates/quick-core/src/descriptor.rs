//! Connection descriptor codec.
//!
//! A Quick Access link carries its target in a single `payload` URL
//! parameter: a JSON object, base64-encoded so that it survives being pasted
//! into a URL.
//!
//! ```text
//! payload=eyJwcm90b2NvbCI6InNzaCIsImhvc3QiOiIxMC4wLjAuNSIsInBvcnQiOjIyfQ==
//!         └── base64 ──→ {"protocol":"ssh","host":"10.0.0.5","port":22}
//! ```
//!
//! # Decoding steps
//!
//! 1. base64 → bytes ([`DescriptorError::Decode`] on failure)
//! 2. bytes → UTF-8 text ([`DescriptorError::Decode`] on failure)
//! 3. text → JSON object ([`DescriptorError::Format`] on failure)
//! 4. object → [`ConnectionDescriptor`] ([`DescriptorError::MissingField`] /
//!    [`DescriptorError::InvalidField`] when `host` or `port` is unusable)
//!
//! Every failure is an ordinary `Err` value.  The caller turns any of them
//! into a "not found" page; none of them is ever a live-session error.
//!
//! # Alphabet tolerance
//!
//! The parameter travels through URL query strings, where `+` is often
//! rewritten to a space and where some producers use the URL-safe alphabet.
//! Decoding therefore accepts both alphabets, treats spaces as `+`, and does
//! not insist on `=` padding.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use std::fmt;

use base64::Engine;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Protocol assumed when the descriptor does not name one.
pub const DEFAULT_PROTOCOL: &str = "ssh";

/// Lenient standard-alphabet engine used for decoding.
pub(crate) const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors produced while decoding a connection descriptor.
#[derive(Debug, Error, PartialEq)]
pub enum DescriptorError {
    /// The `payload` parameter was absent or empty.
    #[error("payload parameter is missing")]
    MissingParameter,

    /// The parameter is not valid base64, or the bytes are not UTF-8.
    #[error("payload is not valid base64 text: {0}")]
    Decode(String),

    /// The decoded text is not a JSON object.
    #[error("payload is not a JSON object: {0}")]
    Format(String),

    /// A required field is absent.
    #[error("payload is missing required field `{0}`")]
    MissingField(&'static str),

    /// A required field is present but has an unusable value.
    #[error("payload field `{field}` is invalid: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
}

/// The decoded, immutable target of a session.
///
/// Fields other than `protocol`, `host` and `port` (credentials, terminal
/// options, …) are kept verbatim in `extra` so that the descriptor can be
/// re-encoded without losing anything.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionDescriptor {
    /// Remote protocol: `ssh`, `rdp`, `vnc`, `telnet`, `kubernetes`, …
    pub protocol: String,
    /// Remote host name or IP address.
    pub host: String,
    /// Remote port.
    pub port: Port,
    /// Every other key of the JSON object.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConnectionDescriptor {
    /// Returns the stable identity used when asking the backend for a session.
    ///
    /// ```rust
    /// use quick_core::descriptor::ConnectionDescriptor;
    ///
    /// let d = ConnectionDescriptor {
    ///     protocol: "rdp".into(),
    ///     host: "10.0.0.7".into(),
    ///     port: 3389.into(),
    ///     extra: Default::default(),
    /// };
    /// assert_eq!(d.asset_identity(), "rdp_10.0.0.7_3389");
    /// ```
    pub fn asset_identity(&self) -> String {
        format!("{}_{}_{}", self.protocol, self.host, self.port)
    }

    /// Returns the human-readable `host:port` label (used as window title).
    pub fn display_name(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds a descriptor from an already-parsed JSON object.
    fn from_object(mut object: Map<String, Value>) -> Result<Self, DescriptorError> {
        let protocol = match object.remove("protocol") {
            Some(Value::String(p)) if !p.is_empty() => p,
            // Absent, empty, null, or a non-string value: fall back to ssh.
            _ => DEFAULT_PROTOCOL.to_string(),
        };

        let host = match object.remove("host") {
            Some(Value::String(h)) if !h.is_empty() => h,
            Some(Value::String(_)) | None | Some(Value::Null) => {
                return Err(DescriptorError::MissingField("host"))
            }
            Some(other) => {
                return Err(DescriptorError::InvalidField {
                    field: "host",
                    reason: format!("expected a string, got {other}"),
                })
            }
        };

        let port = match object.remove("port") {
            None | Some(Value::Null) => return Err(DescriptorError::MissingField("port")),
            Some(value) => parse_port(&value)?,
        };

        Ok(Self {
            protocol,
            host,
            port,
            extra: object,
        })
    }
}

/// A validated port number.
///
/// A port written as a string (`"022"`) keeps that text: identities and
/// labels use it verbatim and re-encoding writes it back as a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    number: u16,
    text: Option<String>,
}

impl Port {
    pub fn number(&self) -> u16 {
        self.number
    }

    /// The string form from the descriptor, if the port was a string.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

impl From<u16> for Port {
    fn from(number: u16) -> Self {
        Self { number, text: None }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(text) => f.write_str(text),
            None => write!(f, "{}", self.number),
        }
    }
}

impl Serialize for Port {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.text {
            Some(text) => serializer.serialize_str(text),
            None => serializer.serialize_u16(self.number),
        }
    }
}

/// Accepts a port written either as a JSON number or as a numeric string.
fn parse_port(value: &Value) -> Result<Port, DescriptorError> {
    let invalid = |reason: String| DescriptorError::InvalidField {
        field: "port",
        reason,
    };
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .map(Port::from)
            .ok_or_else(|| invalid(format!("{n} is not a valid port"))),
        Value::String(s) => s
            .trim()
            .parse::<u16>()
            .map(|number| Port {
                number,
                text: Some(s.clone()),
            })
            .map_err(|e| invalid(format!("{s:?}: {e}"))),
        other => Err(invalid(format!("expected a number, got {other}"))),
    }
}

/// A successfully decoded `payload` parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPayload {
    /// The decoded descriptor (protocol already defaulted).
    pub descriptor: ConnectionDescriptor,
    /// The parameter exactly as received.  Transports forward this string to
    /// the backend unchanged.
    pub raw: String,
}

impl DecodedPayload {
    /// Shorthand for [`ConnectionDescriptor::asset_identity`].
    pub fn asset_identity(&self) -> String {
        self.descriptor.asset_identity()
    }

    /// Shorthand for [`ConnectionDescriptor::display_name`].
    pub fn display_name(&self) -> String {
        self.descriptor.display_name()
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Decodes the `payload` URL parameter.
///
/// # Errors
///
/// See the module documentation for the mapping of each decoding step to a
/// [`DescriptorError`] variant.
///
/// # Examples
///
/// ```rust
/// use quick_core::descriptor::decode_payload;
///
/// // {"host":"10.0.0.5","port":22}
/// let decoded = decode_payload("eyJob3N0IjoiMTAuMC4wLjUiLCJwb3J0IjoyMn0=").unwrap();
/// assert_eq!(decoded.descriptor.protocol, "ssh");
/// assert_eq!(decoded.asset_identity(), "ssh_10.0.0.5_22");
/// ```
pub fn decode_payload(param: &str) -> Result<DecodedPayload, DescriptorError> {
    let trimmed = param.trim();
    if trimmed.is_empty() {
        return Err(DescriptorError::MissingParameter);
    }

    let normalized = normalize_alphabet(trimmed);
    let bytes = LENIENT
        .decode(normalized.as_bytes())
        .map_err(|e| DescriptorError::Decode(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|e| DescriptorError::Decode(e.to_string()))?;

    let value: Value =
        serde_json::from_str(&text).map_err(|e| DescriptorError::Format(e.to_string()))?;
    let object = match value {
        Value::Object(map) => map,
        other => {
            return Err(DescriptorError::Format(format!(
                "expected an object, got {}",
                json_kind(&other)
            )))
        }
    };

    let descriptor = ConnectionDescriptor::from_object(object)?;
    tracing::debug!(
        asset = %descriptor.asset_identity(),
        "decoded connection descriptor"
    );

    Ok(DecodedPayload {
        descriptor,
        raw: param.to_string(),
    })
}

/// Encodes a descriptor as a `payload` parameter (standard alphabet, padded).
///
/// This is the exact inverse of [`decode_payload`] for the descriptor part.
pub fn encode_payload(descriptor: &ConnectionDescriptor) -> String {
    // Serializing strings, a port and a JSON map cannot fail.
    let json = serde_json::to_string(descriptor).unwrap_or_default();
    base64::engine::general_purpose::STANDARD.encode(json.as_bytes())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Maps the URL-safe alphabet and query-string artefacts onto the standard
/// alphabet.
fn normalize_alphabet(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            ' ' | '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
