//! Per-connection session state machine
//!
//! `Connecting -> Registering -> Active -> Closing -> Closed`
//!
//! A `Session` turns each inbound message into at most one
//! `ServerCommand` for the actor. It does no I/O itself; the connection
//! handler feeds it frames and forwards what it returns.

use tracing::debug;

use crate::message::{ChatMessage, MessageType};
use crate::server::ServerCommand;
use crate::types::SessionId;

/// Lifecycle state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket accepted, WebSocket handshake not finished
    Connecting,
    /// Waiting for the first message, which carries the display name
    Registering,
    /// Dispatching messages
    Active,
    /// Tearing down; nothing more is dispatched
    Closing,
    /// Terminal
    Closed,
}

/// Server-side state of one connected client
///
/// The display name lives in the registry; the session only needs to know
/// whether the handshake has happened, which `Registering` vs `Active` says.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    state: SessionState,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: SessionState::Connecting,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether inbound messages should still be read and dispatched
    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Registering | SessionState::Active)
    }

    /// The transport handshake finished; wait for registration
    pub fn open(&mut self) {
        if self.state == SessionState::Connecting {
            self.transition(SessionState::Registering);
        }
    }

    /// Stop dispatching; the handler is releasing the connection
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.transition(SessionState::Closing);
        }
    }

    /// Connection fully released
    pub fn finish(&mut self) {
        self.transition(SessionState::Closed);
    }

    /// Translate one inbound message into a command for the actor
    ///
    /// The first message is the registration handshake whatever its type:
    /// its text becomes the display name and it is never broadcast.
    /// Afterwards every message is attributed to this session's id before
    /// it is dispatched by type. Malformed command bodies become a private
    /// error notice and leave the session active.
    pub fn handle(&mut self, msg: ChatMessage) -> Option<ServerCommand> {
        let session_id = self.id;

        match self.state {
            SessionState::Registering => {
                self.transition(SessionState::Active);
                Some(ServerCommand::Register {
                    session_id,
                    username: msg.text().to_string(),
                })
            }
            SessionState::Active => {
                let msg = msg.with_sender(session_id);
                let cmd = match msg.kind() {
                    MessageType::Message => match msg.drop_target() {
                        Some(Ok(target)) => ServerCommand::Drop {
                            session_id,
                            target: target.to_string(),
                        },
                        Some(Err(e)) => ServerCommand::Notice {
                            session_id,
                            message: e.into(),
                        },
                        None => ServerCommand::Broadcast { message: msg },
                    },
                    MessageType::Ban => match msg.ban_target() {
                        Ok(target) => ServerCommand::Ban {
                            session_id,
                            target: target.to_string(),
                        },
                        Err(e) => ServerCommand::Notice {
                            session_id,
                            message: e.into(),
                        },
                    },
                    MessageType::Unban => match msg.ban_target() {
                        Ok(target) => ServerCommand::Unban {
                            session_id,
                            target: target.to_string(),
                        },
                        Err(e) => ServerCommand::Notice {
                            session_id,
                            message: e.into(),
                        },
                    },
                    MessageType::Logout => {
                        self.close();
                        ServerCommand::Logout { session_id }
                    }
                    MessageType::Shutdown => {
                        self.close();
                        ServerCommand::Shutdown
                    }
                };
                Some(cmd)
            }
            _ => None,
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }
}
