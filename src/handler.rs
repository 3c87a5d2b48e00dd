//! WebSocket connection handler
//!
//! Runs one session: WebSocket handshake, a read task that feeds inbound
//! frames through the `Session` state machine to the ChatServer, and a
//! write task that drains the session's outbound queue onto the socket.

use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::Inbox;
use crate::error::AppError;
use crate::message::{ChatMessage, MessageType};
use crate::server::ServerCommand;
use crate::session::Session;
use crate::types::SessionId;

/// How long queued messages (e.g. a logout confirmation) may take to flush
const WRITE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle an accepted TCP connection for an already-assigned session
///
/// `msg_rx` is the receiving end of the outbound queues the ChatServer
/// holds for this session. Returns once both directions are closed and
/// the session has been removed from the registry.
pub async fn handle_connection(
    stream: TcpStream,
    session_id: SessionId,
    mut msg_rx: Inbox,
    cmd_tx: mpsc::Sender<ServerCommand>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let mut session = Session::new(session_id);

    // WebSocket handshake
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            let _ = cmd_tx.send(ServerCommand::Disconnect { session_id }).await;
            return Err(e.into());
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    session.open();
    info!("Session {} connected from {}", session_id, peer_addr);

    // Spawn write task (outbound queues -> WebSocket)
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if let Err(e) = ws_sender.send(Message::Text(json.into())).await {
                        debug!("WebSocket send failed for session {}: {}", session_id, e);
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    // Continue - don't break on serialization errors
                }
            }
            // The removal notice is the last thing a session is sent
            if is_removal_notice(&msg) {
                break;
            }
        }
        debug!("Write task ended for session {}", session_id);

        // Outbound side released first
        let _ = ws_sender.close().await;
    });

    // Spawn read task (WebSocket -> Session -> ServerCommand)
    let cmd_tx_read = cmd_tx.clone();
    let read_shutdown = shutdown.clone();
    let mut read_task = tokio::spawn(async move {
        read_loop(&mut session, &mut ws_receiver, &cmd_tx_read, &read_shutdown).await;
        session.close();
        session
    });

    // Wait for either direction to end, then release the other
    let session = tokio::select! {
        result = &mut read_task => {
            // Peer gone, logout, or shutdown. Removal drops the outbound
            // queue, which lets the writer flush and close.
            let _ = cmd_tx.send(ServerCommand::Disconnect { session_id }).await;
            if tokio::time::timeout(WRITE_DRAIN_TIMEOUT, &mut write_task).await.is_err() {
                warn!("Session {} did not flush in time", session_id);
                write_task.abort();
            }
            result.ok()
        }
        _ = &mut write_task => {
            // Removed by the server or the socket stopped accepting writes
            read_task.abort();
            let _ = cmd_tx.send(ServerCommand::Disconnect { session_id }).await;
            None
        }
    };

    match session {
        Some(mut session) => {
            let last = session.state();
            session.finish();
            info!("Session {} disconnected (was {:?})", session_id, last);
        }
        None => info!("Session {} disconnected by the server", session_id),
    }

    Ok(())
}

/// Whether `msg` is the LOGOUT notice the registry sends on removal
fn is_removal_notice(msg: &ChatMessage) -> bool {
    msg.kind() == MessageType::Logout && msg.sender_id().is_server()
}

/// Read frames until the peer leaves, the session stops or the server shuts down
async fn read_loop(
    session: &mut Session,
    ws_receiver: &mut SplitStream<WebSocketStream<TcpStream>>,
    cmd_tx: &mpsc::Sender<ServerCommand>,
    shutdown: &CancellationToken,
) {
    let session_id = session.id();

    while session.is_active() {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = ws_receiver.next() => frame,
        };
        if shutdown.is_cancelled() {
            break;
        }

        match frame {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ChatMessage>(&text) {
                Ok(msg) => {
                    let Some(cmd) = session.handle(msg) else {
                        continue;
                    };
                    if cmd_tx.send(cmd).await.is_err() {
                        debug!("Server closed, ending read task for {}", session_id);
                        break;
                    }
                }
                Err(e) => {
                    warn!("Undecodable message from session {}: {}", session_id, e);
                    break;
                }
            },
            Some(Ok(Message::Close(_))) => {
                debug!("Session {} sent close frame", session_id);
                break;
            }
            Some(Ok(_)) => {
                // Binary, ping and pong frames carry no chat messages
            }
            Some(Err(e)) => {
                warn!("WebSocket error for session {}: {}", session_id, e);
                break;
            }
            None => break,
        }
    }

    debug!("Read task ended for session {}", session_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removal_notice_detection() {
        assert!(is_removal_notice(&ChatMessage::disconnected()));
        assert!(!is_removal_notice(&ChatMessage::shutdown_notice()));

        let client_logout = ChatMessage::new(SessionId(2), MessageType::Logout, "alice: logout");
        assert!(!is_removal_notice(&client_logout));
    }
}
