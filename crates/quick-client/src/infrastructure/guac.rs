//! WebSocket display tunnel speaking Guacamole instructions.
//!
//! # Instruction format
//!
//! ```text
//! <len>.<value>,<len>.<value>,...;
//! ```
//!
//! The first element is the opcode.  `len` counts Unicode scalar values,
//! not bytes.  One WebSocket text frame may carry several instructions.
//!
//! # Task layout
//!
//! ```text
//! GuacTunnel (sync, owned by the adapter)
//!     │  TunnelCommand over mpsc
//!     ▼
//! driver task ── ws sink ──→ server
//!     ▲
//!     └──────── ws stream ←── server ──→ InstructionHandler ──→ TunnelEvent
//! ```
//!
//! The driver waits for `Connect`, opens
//! `<ws base>/quick/<session>/tunnel?<params>` with the `guacamole`
//! subprotocol and then multiplexes both directions with `tokio::select!`.

use std::time::Duration;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::interval;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use crate::application::clipboard::ClipboardStreams;
use crate::application::error::TunnelError;
use crate::application::graphical::{DisplayTunnel, MouseState, TunnelEvent};

/// WebSocket subprotocol of the display tunnel.
pub const SUBPROTOCOL: &str = "guacamole";

/// Interval between `nop` keep-alive instructions.
const NOP_INTERVAL: Duration = Duration::from_secs(5);

/// "Remote service not found": the socket could not be opened.
const UPSTREAM_NOT_FOUND: u32 = 519;
/// "Remote service unavailable": the socket failed mid-session.
const UPSTREAM_UNAVAILABLE: u32 = 520;

/// Why the socket loop gave up.
#[derive(Debug)]
enum SocketFailure {
    /// The socket never opened.
    Open(anyhow::Error),
    /// An open socket failed.
    Lost(anyhow::Error),
}

impl SocketFailure {
    fn code(&self) -> u32 {
        match self {
            SocketFailure::Open(_) => UPSTREAM_NOT_FOUND,
            SocketFailure::Lost(_) => UPSTREAM_UNAVAILABLE,
        }
    }

    fn lost(e: tokio_tungstenite::tungstenite::Error) -> Self {
        SocketFailure::Lost(anyhow::Error::new(e).context("display tunnel write failed"))
    }
}

impl std::fmt::Display for SocketFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocketFailure::Open(e) | SocketFailure::Lost(e) => write!(f, "{e:#}"),
        }
    }
}

// ── Instruction codec ─────────────────────────────────────────────────────────

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: String,
    pub args: Vec<String>,
}

impl Instruction {
    fn arg(&self, index: usize) -> &str {
        self.args.get(index).map(String::as_str).unwrap_or("")
    }
}

/// Encodes one instruction.
pub fn encode_instruction(opcode: &str, args: &[&str]) -> String {
    let mut out = String::new();
    for (i, element) in std::iter::once(opcode).chain(args.iter().copied()).enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&element.chars().count().to_string());
        out.push('.');
        out.push_str(element);
    }
    out.push(';');
    out
}

fn malformed(reason: impl Into<String>) -> TunnelError {
    TunnelError::Protocol(reason.into())
}

/// Decodes every instruction in `frame`.
///
/// # Errors
///
/// [`TunnelError::Protocol`] for a bad length prefix, a truncated element or
/// an unexpected terminator.
pub fn parse_instructions(frame: &str) -> Result<Vec<Instruction>, TunnelError> {
    let mut instructions = Vec::new();
    let mut elements: Vec<String> = Vec::new();
    let mut rest = frame;

    while !rest.is_empty() {
        let dot = rest
            .find('.')
            .ok_or_else(|| malformed("missing length separator"))?;
        let len: usize = rest[..dot]
            .parse()
            .map_err(|_| malformed(format!("bad element length {:?}", &rest[..dot])))?;

        let tail = &rest[dot + 1..];
        let (end, terminator) = tail
            .char_indices()
            .nth(len)
            .ok_or_else(|| malformed("truncated element"))?;
        elements.push(tail[..end].to_string());

        match terminator {
            ',' => {}
            ';' => {
                let mut parts = std::mem::take(&mut elements).into_iter();
                let opcode = parts.next().unwrap_or_default();
                instructions.push(Instruction {
                    opcode,
                    args: parts.collect(),
                });
            }
            other => return Err(malformed(format!("unexpected terminator {other:?}"))),
        }
        rest = &tail[end + 1..];
    }

    if !elements.is_empty() {
        return Err(malformed("unterminated instruction"));
    }
    Ok(instructions)
}

// ── Inbound interpretation ────────────────────────────────────────────────────

/// What one inbound instruction asks the driver to do.
#[derive(Debug, Default, PartialEq)]
pub struct Handled {
    pub events: Vec<TunnelEvent>,
    /// Instructions to send back immediately.
    pub replies: Vec<String>,
    /// The server ended the session.
    pub disconnect: bool,
}

/// Turns inbound instructions into [`TunnelEvent`]s and protocol replies.
#[derive(Debug, Default)]
pub struct InstructionHandler {
    synced: bool,
}

impl InstructionHandler {
    pub fn handle(&mut self, instruction: &Instruction) -> Handled {
        let mut handled = Handled::default();
        match instruction.opcode.as_str() {
            "sync" => {
                handled
                    .replies
                    .push(encode_instruction("sync", &[instruction.arg(0)]));
                if !self.synced {
                    self.synced = true;
                    handled.events.push(TunnelEvent::StateChanged(3));
                }
            }
            "error" => {
                let code = instruction.arg(1).parse().unwrap_or(0);
                let message = Some(instruction.arg(0).to_string()).filter(|m| !m.is_empty());
                handled.events.push(TunnelEvent::Error { code, message });
            }
            "clipboard" => match instruction.arg(0).parse() {
                Ok(stream) => handled.events.push(TunnelEvent::ClipboardStart {
                    stream,
                    mime_type: instruction.arg(1).to_string(),
                }),
                Err(_) => warn!("clipboard instruction without a stream index"),
            },
            "blob" => {
                let stream = instruction.arg(0);
                match (stream.parse(), STANDARD.decode(instruction.arg(1))) {
                    (Ok(index), Ok(data)) => {
                        handled.events.push(TunnelEvent::Blob {
                            stream: index,
                            data,
                        });
                        handled
                            .replies
                            .push(encode_instruction("ack", &[stream, "OK", "0"]));
                    }
                    _ => warn!(stream, "undecodable blob dropped"),
                }
            }
            "end" => {
                if let Ok(stream) = instruction.arg(0).parse() {
                    handled.events.push(TunnelEvent::StreamEnd { stream });
                }
            }
            "size" if instruction.arg(0) == "0" => {
                let width = instruction.arg(1).parse().unwrap_or(0);
                let height = instruction.arg(2).parse().unwrap_or(0);
                handled
                    .events
                    .push(TunnelEvent::DisplayResized { width, height });
            }
            "disconnect" => handled.disconnect = true,
            other => debug!(opcode = other, "instruction ignored"),
        }
        handled
    }
}

// ── Outbound half ─────────────────────────────────────────────────────────────

/// Requests from [`GuacTunnel`] to its driver task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelCommand {
    /// Open the socket with these url-encoded parameters.
    Connect(String),
    /// Send one encoded instruction.
    Send(String),
    /// Send `disconnect` and close the socket.
    Disconnect,
}

/// [`DisplayTunnel`] backed by a driver task.
pub struct GuacTunnel {
    commands: UnboundedSender<TunnelCommand>,
    connected: bool,
    next_stream: u32,
    free_streams: Vec<u32>,
}

impl GuacTunnel {
    /// Spawns the driver for `endpoint` and returns the tunnel plus its
    /// event stream.  Nothing is opened until [`DisplayTunnel::connect`].
    pub fn spawn(endpoint: Url) -> (Self, UnboundedReceiver<TunnelEvent>) {
        let (command_tx, command_rx) = unbounded_channel();
        let (event_tx, event_rx) = unbounded_channel();
        tokio::spawn(drive(endpoint, command_rx, event_tx));
        (Self::with_sender(command_tx), event_rx)
    }

    fn with_sender(commands: UnboundedSender<TunnelCommand>) -> Self {
        Self {
            commands,
            connected: false,
            next_stream: 0,
            free_streams: Vec::new(),
        }
    }

    fn command(&self, command: TunnelCommand) -> Result<(), TunnelError> {
        self.commands.send(command).map_err(|_| TunnelError::Closed)
    }

    fn send(&self, opcode: &str, args: &[&str]) -> Result<(), TunnelError> {
        if !self.connected {
            return Err(TunnelError::Closed);
        }
        self.command(TunnelCommand::Send(encode_instruction(opcode, args)))
    }
}

impl ClipboardStreams for GuacTunnel {
    fn create_clipboard_stream(&mut self, mime_type: &str) -> Result<u32, TunnelError> {
        let stream = self.free_streams.pop().unwrap_or_else(|| {
            let index = self.next_stream;
            self.next_stream += 1;
            index
        });
        self.send("clipboard", &[&stream.to_string(), mime_type])?;
        Ok(stream)
    }

    fn send_blob(&mut self, stream: u32, data: &[u8]) -> Result<(), TunnelError> {
        self.send("blob", &[&stream.to_string(), &STANDARD.encode(data)])
    }

    fn end_stream(&mut self, stream: u32) -> Result<(), TunnelError> {
        self.free_streams.push(stream);
        self.send("end", &[&stream.to_string()])
    }
}

impl DisplayTunnel for GuacTunnel {
    fn connect(&mut self, params: &str) -> Result<(), TunnelError> {
        if self.connected {
            return Err(TunnelError::AlreadyConnected);
        }
        self.command(TunnelCommand::Connect(params.to_string()))?;
        self.connected = true;
        Ok(())
    }

    fn send_key(&mut self, pressed: bool, keysym: u32) -> Result<(), TunnelError> {
        let pressed = if pressed { "1" } else { "0" };
        self.send("key", &[&keysym.to_string(), pressed])
    }

    fn send_mouse(&mut self, state: MouseState) -> Result<(), TunnelError> {
        let x = state.x.floor() as i64;
        let y = state.y.floor() as i64;
        self.send(
            "mouse",
            &[
                &x.to_string(),
                &y.to_string(),
                &state.button_mask().to_string(),
            ],
        )
    }

    fn send_size(&mut self, width: u32, height: u32) -> Result<(), TunnelError> {
        self.send("size", &[&width.to_string(), &height.to_string()])
    }

    fn disconnect(&mut self) {
        if self.connected {
            let _ = self.command(TunnelCommand::Disconnect);
            self.connected = false;
        }
    }
}

// ── Driver task ───────────────────────────────────────────────────────────────

async fn drive(
    endpoint: Url,
    mut commands: UnboundedReceiver<TunnelCommand>,
    events: UnboundedSender<TunnelEvent>,
) {
    let params = loop {
        match commands.recv().await {
            Some(TunnelCommand::Connect(params)) => break params,
            Some(other) => debug!(?other, "command before connect dropped"),
            None => return,
        }
    };

    let _ = events.send(TunnelEvent::StateChanged(1));
    if let Err(e) = run_socket(endpoint, &params, &mut commands, &events).await {
        warn!("display tunnel failed: {e}");
        let _ = events.send(TunnelEvent::Error {
            code: e.code(),
            message: None,
        });
    }
    let _ = events.send(TunnelEvent::Closed);
}

async fn run_socket(
    mut url: Url,
    params: &str,
    commands: &mut UnboundedReceiver<TunnelCommand>,
    events: &UnboundedSender<TunnelEvent>,
) -> Result<(), SocketFailure> {
    url.set_query(Some(params));
    let mut request = url
        .as_str()
        .into_client_request()
        .context("invalid tunnel URL")
        .map_err(SocketFailure::Open)?;
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(SUBPROTOCOL));

    let (ws, _response) = connect_async(request)
        .await
        .context("failed to open display tunnel")
        .map_err(SocketFailure::Open)?;
    info!("display tunnel open");
    let _ = events.send(TunnelEvent::StateChanged(2));

    let (mut sink, mut stream) = ws.split();
    let mut handler = InstructionHandler::default();
    let mut nop = interval(NOP_INTERVAL);
    nop.tick().await;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(TunnelCommand::Send(text)) => {
                    sink.send(WsMessage::Text(text))
                        .await
                        .map_err(SocketFailure::lost)?;
                }
                Some(TunnelCommand::Connect(_)) => debug!("tunnel already connected"),
                Some(TunnelCommand::Disconnect) | None => {
                    let _ = sink
                        .send(WsMessage::Text(encode_instruction("disconnect", &[])))
                        .await;
                    let _ = sink.close().await;
                    return Ok(());
                }
            },
            _ = nop.tick() => {
                sink.send(WsMessage::Text(encode_instruction("nop", &[])))
                    .await
                    .map_err(SocketFailure::lost)?;
            }
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    let instructions = match parse_instructions(&text) {
                        Ok(instructions) => instructions,
                        Err(e) => {
                            warn!("dropping tunnel frame: {e}");
                            continue;
                        }
                    };
                    for instruction in &instructions {
                        let handled = handler.handle(instruction);
                        for reply in handled.replies {
                            sink.send(WsMessage::Text(reply))
                                .await
                                .map_err(SocketFailure::lost)?;
                        }
                        for event in handled.events {
                            let _ = events.send(event);
                        }
                        if handled.disconnect {
                            debug!("server ended the session");
                            let _ = sink.close().await;
                            return Ok(());
                        }
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    if let Some(frame) = frame {
                        if let Ok(code) = frame.reason.parse::<u32>() {
                            let _ = events.send(TunnelEvent::Error { code, message: None });
                        }
                    }
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Err(SocketFailure::Lost(
                        anyhow::Error::new(e).context("display tunnel read failed"),
                    ));
                }
                None => return Ok(()),
            },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Codec ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_encode_counts_characters_not_bytes() {
        assert_eq!(encode_instruction("key", &["65307", "1"]), "3.key,5.65307,1.1;");
        assert_eq!(encode_instruction("blob", &["0", "é"]), "4.blob,1.0,1.é;");
        assert_eq!(encode_instruction("nop", &[]), "3.nop;");
    }

    #[test]
    fn test_parse_several_instructions_in_one_frame() {
        let frame = "4.size,1.0,4.1024,3.768;4.sync,8.12345678;";
        let parsed = parse_instructions(frame).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].opcode, "size");
        assert_eq!(parsed[0].args, vec!["0", "1024", "768"]);
        assert_eq!(parsed[1].opcode, "sync");
    }

    #[test]
    fn test_parse_values_may_contain_separators() {
        let parsed = parse_instructions("5.error,7.a,b;c.d,3.519;").unwrap();
        assert_eq!(parsed[0].args, vec!["a,b;c.d", "519"]);
    }

    #[test]
    fn test_parse_internal_opcode() {
        let parsed = parse_instructions("0.,4.ping,3.123;").unwrap();
        assert_eq!(parsed[0].opcode, "");
        assert_eq!(parsed[0].args, vec!["ping", "123"]);
    }

    #[test]
    fn test_parse_rejects_malformed_frames() {
        assert!(parse_instructions("x.abc;").is_err());
        assert!(parse_instructions("10.short;").is_err());
        assert!(parse_instructions("3.abc").is_err());
        assert!(parse_instructions("3.abc,").is_err());
        assert!(parse_instructions("3.abcX").is_err());
    }

    // ── Handler ───────────────────────────────────────────────────────────────

    fn ins(text: &str) -> Instruction {
        parse_instructions(text).unwrap().remove(0)
    }

    #[test]
    fn test_first_sync_connects_every_sync_is_acknowledged() {
        let mut handler = InstructionHandler::default();

        let first = handler.handle(&ins("4.sync,3.100;"));
        let second = handler.handle(&ins("4.sync,3.200;"));

        assert_eq!(first.events, vec![TunnelEvent::StateChanged(3)]);
        assert_eq!(first.replies, vec!["4.sync,3.100;".to_string()]);
        assert!(second.events.is_empty());
        assert_eq!(second.replies, vec!["4.sync,3.200;".to_string()]);
    }

    #[test]
    fn test_error_carries_message_and_code() {
        let mut handler = InstructionHandler::default();
        let handled = handler.handle(&ins("5.error,14.Aborted. See..,3.769;"));
        assert_eq!(
            handled.events,
            vec![TunnelEvent::Error {
                code: 769,
                message: Some("Aborted. See..".into())
            }]
        );
    }

    #[test]
    fn test_clipboard_stream_is_decoded_and_acknowledged() {
        // Arrange
        let mut handler = InstructionHandler::default();

        // Act
        let start = handler.handle(&ins("9.clipboard,1.2,10.text/plain;"));
        let blob = handler.handle(&ins("4.blob,1.2,8.aGVsbG8=;"));
        let end = handler.handle(&ins("3.end,1.2;"));

        // Assert
        assert_eq!(
            start.events,
            vec![TunnelEvent::ClipboardStart {
                stream: 2,
                mime_type: "text/plain".into()
            }]
        );
        assert_eq!(
            blob.events,
            vec![TunnelEvent::Blob {
                stream: 2,
                data: b"hello".to_vec()
            }]
        );
        assert_eq!(blob.replies, vec!["3.ack,1.2,2.OK,1.0;".to_string()]);
        assert_eq!(end.events, vec![TunnelEvent::StreamEnd { stream: 2 }]);
    }

    #[test]
    fn test_only_default_layer_size_resizes_display() {
        let mut handler = InstructionHandler::default();
        assert_eq!(
            handler.handle(&ins("4.size,1.0,4.1920,4.1080;")).events,
            vec![TunnelEvent::DisplayResized {
                width: 1920,
                height: 1080
            }]
        );
        assert!(handler.handle(&ins("4.size,1.3,2.64,2.64;")).events.is_empty());
    }

    #[test]
    fn test_disconnect_and_unknown_opcodes() {
        let mut handler = InstructionHandler::default();
        assert!(handler.handle(&ins("10.disconnect;")).disconnect);
        assert_eq!(handler.handle(&ins("3.img,1.1;")), Handled::default());
        assert_eq!(handler.handle(&ins("0.,4.ping,1.1;")), Handled::default());
    }

    // ── Outbound ──────────────────────────────────────────────────────────────

    fn tunnel() -> (GuacTunnel, UnboundedReceiver<TunnelCommand>) {
        let (tx, rx) = unbounded_channel();
        (GuacTunnel::with_sender(tx), rx)
    }

    fn sent(rx: &mut UnboundedReceiver<TunnelCommand>) -> Vec<TunnelCommand> {
        let mut out = Vec::new();
        while let Ok(command) = rx.try_recv() {
            out.push(command);
        }
        out
    }

    #[test]
    fn test_nothing_is_sent_before_connect() {
        let (mut tunnel, mut rx) = tunnel();
        assert_eq!(tunnel.send_key(true, 97), Err(TunnelError::Closed));
        assert!(sent(&mut rx).is_empty());
    }

    #[test]
    fn test_connect_once_then_events_are_encoded() {
        // Arrange
        let (mut tunnel, mut rx) = tunnel();

        // Act
        tunnel.connect("width=800&height=600&dpi=96&payload=x").unwrap();
        assert_eq!(tunnel.connect("again"), Err(TunnelError::AlreadyConnected));
        tunnel.send_key(true, 65307).unwrap();
        tunnel
            .send_mouse(MouseState {
                left: true,
                ..MouseState::at(10.7, 20.2)
            })
            .unwrap();
        tunnel.send_size(1024, 768).unwrap();

        // Assert
        assert_eq!(
            sent(&mut rx),
            vec![
                TunnelCommand::Connect("width=800&height=600&dpi=96&payload=x".into()),
                TunnelCommand::Send("3.key,5.65307,1.1;".into()),
                TunnelCommand::Send("5.mouse,2.10,2.20,1.1;".into()),
                TunnelCommand::Send("4.size,4.1024,3.768;".into()),
            ]
        );
    }

    #[test]
    fn test_clipboard_stream_indices_are_reused() {
        let (mut tunnel, mut rx) = tunnel();
        tunnel.connect("p").unwrap();

        let first = tunnel.create_clipboard_stream("text/plain").unwrap();
        tunnel.send_blob(first, b"hi").unwrap();
        tunnel.end_stream(first).unwrap();
        let second = tunnel.create_clipboard_stream("text/plain").unwrap();

        assert_eq!(first, second);
        let commands = sent(&mut rx);
        assert_eq!(commands[1], TunnelCommand::Send("9.clipboard,1.0,10.text/plain;".into()));
        assert_eq!(commands[2], TunnelCommand::Send("4.blob,1.0,4.aGk=;".into()));
        assert_eq!(commands[3], TunnelCommand::Send("3.end,1.0;".into()));
    }

    #[test]
    fn test_disconnect_is_sent_once() {
        let (mut tunnel, mut rx) = tunnel();
        tunnel.connect("p").unwrap();
        tunnel.disconnect();
        tunnel.disconnect();
        assert_eq!(
            sent(&mut rx),
            vec![TunnelCommand::Connect("p".into()), TunnelCommand::Disconnect]
        );
    }

    #[tokio::test]
    async fn test_driver_reports_unreachable_server() {
        let (mut tunnel, mut events) = GuacTunnel::spawn(
            Url::parse("ws://127.0.0.1:9/quick/s/tunnel").unwrap(),
        );
        tunnel.connect("width=1&height=1").unwrap();

        assert_eq!(events.recv().await, Some(TunnelEvent::StateChanged(1)));
        assert_eq!(
            events.recv().await,
            Some(TunnelEvent::Error {
                code: UPSTREAM_NOT_FOUND,
                message: None
            })
        );
        assert_eq!(events.recv().await, Some(TunnelEvent::Closed));
    }

    #[tokio::test]
    async fn test_driver_reports_socket_lost_after_open_as_unavailable() {
        use tokio::net::TcpListener;
        use tokio_tungstenite::accept_hdr_async;
        use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

        // Arrange: a server that completes the handshake, then drops the socket
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_hdr_async(
                stream,
                |_: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
                    response
                        .headers_mut()
                        .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(SUBPROTOCOL));
                    Ok(response)
                },
            )
            .await
            .unwrap();
            drop(ws);
        });
        let endpoint = Url::parse(&format!("ws://{addr}/quick/s/tunnel")).unwrap();
        let (mut tunnel, mut events) = GuacTunnel::spawn(endpoint);

        // Act
        tunnel.connect("width=1&height=1").unwrap();

        // Assert
        assert_eq!(events.recv().await, Some(TunnelEvent::StateChanged(1)));
        assert_eq!(events.recv().await, Some(TunnelEvent::StateChanged(2)));
        assert_eq!(
            events.recv().await,
            Some(TunnelEvent::Error {
                code: UPSTREAM_UNAVAILABLE,
                message: None
            })
        );
        assert_eq!(events.recv().await, Some(TunnelEvent::Closed));
        server.await.unwrap();
    }
}
