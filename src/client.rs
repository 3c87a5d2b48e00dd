//! Client struct definition
//!
//! The registry's record of one connected session: its id, display name
//! and the two queues feeding that session's writer task.
//!
//! Chat broadcasts go through a bounded lane and are dropped when it is
//! full. Server notices (welcome, private replies, SHUTDOWN, LOGOUT) go
//! through an unbounded control lane that the writer drains first, so a
//! backlog of chat can never push them out.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

use crate::error::SendError;
use crate::message::ChatMessage;
use crate::types::SessionId;

/// Create the outbound queues for one session
///
/// `capacity` bounds the chat lane only.
pub fn outbound_channel(capacity: usize) -> (Outbox, Inbox) {
    let (chat_tx, chat_rx) = mpsc::channel(capacity);
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    (
        Outbox {
            chat: chat_tx,
            control: control_tx,
        },
        Inbox {
            chat: chat_rx,
            control: control_rx,
        },
    )
}

/// Sending half, held by the registry
#[derive(Debug)]
pub struct Outbox {
    chat: mpsc::Sender<ChatMessage>,
    control: mpsc::UnboundedSender<ChatMessage>,
}

/// Receiving half, drained by the session's writer task
#[derive(Debug)]
pub struct Inbox {
    chat: mpsc::Receiver<ChatMessage>,
    control: mpsc::UnboundedReceiver<ChatMessage>,
}

impl Inbox {
    /// Next message, control lane first
    ///
    /// Returns `None` once both lanes are closed and empty.
    pub async fn recv(&mut self) -> Option<ChatMessage> {
        tokio::select! {
            biased;
            Some(msg) = self.control.recv() => Some(msg),
            Some(msg) = self.chat.recv() => Some(msg),
            else => None,
        }
    }

    /// Non-blocking `recv`
    pub fn try_recv(&mut self) -> Result<ChatMessage, TryRecvError> {
        match self.control.try_recv() {
            Ok(msg) => Ok(msg),
            Err(control_err) => match self.chat.try_recv() {
                Ok(msg) => Ok(msg),
                Err(TryRecvError::Disconnected) if control_err == TryRecvError::Disconnected => {
                    Err(TryRecvError::Disconnected)
                }
                Err(_) => Err(TryRecvError::Empty),
            },
        }
    }
}

/// Connected client information
///
/// Holds all state related to a connected client including their
/// session id, display name and outbound queues.
#[derive(Debug)]
pub struct Client {
    /// Session identifier, assigned at accept time
    pub id: SessionId,
    /// Display name (None until the registration handshake)
    pub username: Option<String>,
    /// Server -> Client queues
    outbox: Outbox,
}

impl Client {
    /// Create a new, unregistered client
    pub fn new(id: SessionId, outbox: Outbox) -> Self {
        Self {
            id,
            username: None,
            outbox,
        }
    }

    /// Queue a chat message for this client without waiting
    ///
    /// The writer task does the actual network write, so a slow peer
    /// never holds up the caller. A full queue drops the message.
    pub fn send(&self, msg: ChatMessage) -> Result<(), SendError> {
        self.outbox.chat.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::QueueFull,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Queue a server notice; only fails if the writer is gone
    pub fn send_control(&self, msg: ChatMessage) -> Result<(), SendError> {
        self.outbox
            .control
            .send(msg)
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Get the display name for this client
    ///
    /// Returns the username if set, otherwise "Unknown".
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("Unknown")
    }

    /// Check if this client has completed the registration handshake
    pub fn is_registered(&self) -> bool {
        self.username.is_some()
    }

    /// Set the client's display name
    pub fn register(&mut self, username: String) {
        self.username = Some(username);
    }
}
