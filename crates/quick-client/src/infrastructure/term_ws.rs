//! WebSocket transport for terminal sessions.
//!
//! A single driver task owns the socket.  It forwards inbound text frames as
//! [`TransportEvent::Frame`] and writes whatever the adapter queues on the
//! [`Outbound`] channel.  The adapter never sees the socket itself.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use quick_core::TerminalSize;

use crate::application::terminal::{Outbound, TransportEvent};
use crate::domain::config::ClientConfig;

/// `<ws base>/quick/<session>/ssh?cols=<n>&rows=<n>&payload=<p>`
pub fn terminal_url(config: &ClientConfig, session_id: &str, size: TerminalSize, payload: &str) -> Url {
    let mut url = config.session_endpoint(session_id, "ssh");
    url.query_pairs_mut()
        .append_pair("cols", &size.cols.to_string())
        .append_pair("rows", &size.rows.to_string())
        .append_pair("payload", payload);
    url
}

/// Spawns the driver for `url`.
///
/// Returns the sender the adapter writes to and the receiver the session
/// loop reads events from.  The last event is always
/// [`TransportEvent::Closed`].
pub fn spawn_terminal_transport(url: Url) -> (UnboundedSender<Outbound>, UnboundedReceiver<TransportEvent>) {
    let (outbound_tx, outbound_rx) = unbounded_channel();
    let (event_tx, event_rx) = unbounded_channel();
    tokio::spawn(drive(url, outbound_rx, event_tx));
    (outbound_tx, event_rx)
}

async fn drive(
    url: Url,
    mut outbound: UnboundedReceiver<Outbound>,
    events: UnboundedSender<TransportEvent>,
) {
    let ws = match connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            warn!("terminal transport failed to open: {e}");
            let _ = events.send(TransportEvent::Error(e.to_string()));
            let _ = events.send(TransportEvent::Closed);
            return;
        }
    };
    info!("terminal transport open");
    let _ = events.send(TransportEvent::Opened);

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            item = outbound.recv() => match item {
                Some(Outbound::Frame(text)) => {
                    if let Err(e) = sink.send(WsMessage::Text(text)).await {
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    debug!("closing terminal transport");
                    let _ = sink.close().await;
                    break;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    let _ = events.send(TransportEvent::Frame(text));
                }
                Some(Ok(WsMessage::Binary(bytes))) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    let _ = events.send(TransportEvent::Frame(text));
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    debug!("terminal transport closed by server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    break;
                }
            },
        }
    }
    let _ = events.send(TransportEvent::Closed);
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_url_carries_size_and_payload() {
        let config = ClientConfig::default();
        let url = terminal_url(&config, "ssh_10.0.0.5_22", TerminalSize::new(120, 40), "eyJ+Lw==");
        assert_eq!(
            url.as_str(),
            "ws://127.0.0.1:8088/quick/ssh_10.0.0.5_22/ssh?cols=120&rows=40&payload=eyJ%2BLw%3D%3D"
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_error_then_closed() {
        let (_outbound, mut events) =
            spawn_terminal_transport(Url::parse("ws://127.0.0.1:9/quick/s/ssh").unwrap());

        assert!(matches!(events.recv().await, Some(TransportEvent::Error(_))));
        assert_eq!(events.recv().await, Some(TransportEvent::Closed));
        assert_eq!(events.recv().await, None);
    }
}
