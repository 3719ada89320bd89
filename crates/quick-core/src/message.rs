//! Text framing for the terminal message protocol.
//!
//! Wire format, one WebSocket text frame per message:
//! ```text
//! [type:1 ASCII digit][content:N UTF-8]
//! ```
//!
//! | Digit | Kind        | Direction        | Content                          |
//! |-------|-------------|------------------|----------------------------------|
//! | `0`   | `Closed`    | server → client  | reason text                      |
//! | `1`   | `Connected` | server → client  | empty                            |
//! | `2`   | `Data`      | both             | raw terminal bytes as text       |
//! | `3`   | `Resize`    | client → server  | base64 of `{"cols":n,"rows":n}`  |
//! | `4`   | `Ping`      | client → server  | empty                            |

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::viewport::ViewportBox;

/// Errors that can occur while parsing a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The frame had no type digit at all.
    #[error("empty frame")]
    Empty,

    /// The first character is not a known type digit.
    #[error("unknown message type tag: {0:?}")]
    UnknownType(char),
}

/// Discriminant of a [`ProtocolMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Closed = 0,
    Connected = 1,
    Data = 2,
    Resize = 3,
    Ping = 4,
}

impl MessageKind {
    /// Maps a type tag character to a kind.
    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            '0' => Some(Self::Closed),
            '1' => Some(Self::Connected),
            '2' => Some(Self::Data),
            '3' => Some(Self::Resize),
            '4' => Some(Self::Ping),
            _ => None,
        }
    }

    /// The single-digit tag written on the wire.
    pub fn tag(self) -> char {
        match self {
            Self::Closed => '0',
            Self::Connected => '1',
            Self::Data => '2',
            Self::Resize => '3',
            Self::Ping => '4',
        }
    }
}

/// One terminal protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolMessage {
    pub kind: MessageKind,
    pub content: String,
}

impl ProtocolMessage {
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    /// Keep-alive frame with empty content.
    pub fn ping() -> Self {
        Self::new(MessageKind::Ping, "")
    }

    /// Local input to forward to the remote shell.
    pub fn data(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Data, content)
    }

    /// Resize notification for a new terminal size.
    pub fn resize(size: TerminalSize) -> Self {
        Self::new(MessageKind::Resize, size.to_content())
    }

    /// Encodes the message as frame text.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use quick_core::message::ProtocolMessage;
    ///
    /// assert_eq!(ProtocolMessage::data("ls\r").encode(), "2ls\r");
    /// assert_eq!(ProtocolMessage::ping().encode(), "4");
    /// ```
    pub fn encode(&self) -> String {
        let mut frame = String::with_capacity(1 + self.content.len());
        frame.push(self.kind.tag());
        frame.push_str(&self.content);
        frame
    }

    /// Parses frame text.
    ///
    /// # Errors
    ///
    /// - [`FrameError::Empty`] for an empty frame.
    /// - [`FrameError::UnknownType`] when the first character is not `0`–`4`.
    pub fn parse(frame: &str) -> Result<Self, FrameError> {
        let mut chars = frame.chars();
        let tag = chars.next().ok_or(FrameError::Empty)?;
        let kind = MessageKind::from_tag(tag).ok_or(FrameError::UnknownType(tag))?;
        Ok(Self {
            kind,
            content: chars.as_str().to_string(),
        })
    }
}

/// Terminal size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl TerminalSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Resize content: base64 of the compact JSON object.
    pub fn to_content(self) -> String {
        serde_json::to_vec(&self)
            .map(|json| STANDARD.encode(json))
            .unwrap_or_default()
    }

    /// Inverse of [`TerminalSize::to_content`].  `None` if the content is
    /// not base64 JSON of the expected shape.
    pub fn from_content(content: &str) -> Option<Self> {
        let bytes = STANDARD.decode(content).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// Cells map onto a [`ViewportBox`] as width = columns, height = rows.
impl From<TerminalSize> for ViewportBox {
    fn from(size: TerminalSize) -> Self {
        ViewportBox::new(u32::from(size.cols), u32::from(size.rows))
    }
}

impl From<ViewportBox> for TerminalSize {
    fn from(viewport: ViewportBox) -> Self {
        let clamp = |v: u32| u16::try_from(v).unwrap_or(u16::MAX);
        TerminalSize::new(clamp(viewport.width), clamp(viewport.height))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_frame_keeps_content_verbatim() {
        let msg = ProtocolMessage::parse("2\x1b[0m$ ").unwrap();
        assert_eq!(msg.kind, MessageKind::Data);
        assert_eq!(msg.content, "\x1b[0m$ ");
    }

    #[test]
    fn test_parse_connected_with_empty_content() {
        let msg = ProtocolMessage::parse("1").unwrap();
        assert_eq!(msg, ProtocolMessage::new(MessageKind::Connected, ""));
    }

    #[test]
    fn test_parse_closed_reason() {
        let msg = ProtocolMessage::parse("0session expired").unwrap();
        assert_eq!(msg.kind, MessageKind::Closed);
        assert_eq!(msg.content, "session expired");
    }

    #[test]
    fn test_empty_frame_is_error() {
        assert_eq!(ProtocolMessage::parse(""), Err(FrameError::Empty));
    }

    #[test]
    fn test_unknown_tag_is_error() {
        assert_eq!(ProtocolMessage::parse("9x"), Err(FrameError::UnknownType('9')));
        assert_eq!(ProtocolMessage::parse("hello"), Err(FrameError::UnknownType('h')));
    }

    #[test]
    fn test_multibyte_content_after_tag() {
        let msg = ProtocolMessage::parse("2héllo ✓").unwrap();
        assert_eq!(msg.content, "héllo ✓");
    }

    #[test]
    fn test_resize_content_is_base64_json() {
        // Arrange
        let size = TerminalSize::new(120, 40);

        // Act
        let frame = ProtocolMessage::resize(size).encode();

        // Assert
        assert!(frame.starts_with('3'));
        let decoded = STANDARD.decode(&frame[1..]).unwrap();
        assert_eq!(decoded, br#"{"cols":120,"rows":40}"#);
        assert_eq!(TerminalSize::from_content(&frame[1..]), Some(size));
    }

    #[test]
    fn test_cell_box_conversion_saturates() {
        let size = TerminalSize::new(132, 43);
        assert_eq!(ViewportBox::from(size), ViewportBox::new(132, 43));
        assert_eq!(TerminalSize::from(ViewportBox::new(132, 43)), size);
        assert_eq!(
            TerminalSize::from(ViewportBox::new(70_000, 50)),
            TerminalSize::new(u16::MAX, 50)
        );
    }

    #[test]
    fn test_ping_frame_is_single_digit() {
        assert_eq!(ProtocolMessage::ping().encode(), "4");
    }
}
