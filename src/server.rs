//! ChatServer Actor implementation
//!
//! The central actor that owns the connection registry and ban lists.
//! Session workers never touch that state directly; they send
//! `ServerCommand`s over an mpsc channel and the actor applies them one
//! at a time, so broadcast iteration can never race with a removal.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::Outbox;
use crate::message::ChatMessage;
use crate::registry::Registry;
use crate::types::SessionId;

/// Commands sent from the control loop and session workers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New connection accepted; replies with its session id, or None once shut down
    Connect {
        outbox: Outbox,
        respond_to: oneshot::Sender<Option<SessionId>>,
    },
    /// Registration handshake completed
    Register {
        session_id: SessionId,
        username: String,
    },
    /// Ordinary chat message to fan out
    Broadcast {
        message: ChatMessage,
    },
    /// Administrative drop of a user by name
    Drop {
        session_id: SessionId,
        target: String,
    },
    /// Requester blocks `target`
    Ban {
        session_id: SessionId,
        target: String,
    },
    /// Requester lifts a block on `target`
    Unban {
        session_id: SessionId,
        target: String,
    },
    /// Private message to one session
    Notice {
        session_id: SessionId,
        message: ChatMessage,
    },
    /// Session asked to leave
    Logout {
        session_id: SessionId,
    },
    /// Session worker ended (peer gone, error, or already removed)
    Disconnect {
        session_id: SessionId,
    },
    /// Stop the whole server
    Shutdown,
}

/// The main ChatServer actor
///
/// Processes commands from the control loop and session workers until
/// every command sender has been dropped.
pub struct ChatServer {
    /// Connected sessions and ban lists
    registry: Registry,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
    /// Server-wide alive signal, cancelled on shutdown
    shutdown: CancellationToken,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>, shutdown: CancellationToken) -> Self {
        Self {
            registry: Registry::new(),
            receiver,
            shutdown,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatServer stopped");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { outbox, respond_to } => {
                self.handle_connect(outbox, respond_to);
            }
            ServerCommand::Register { session_id, username } => {
                self.registry.register(session_id, username);
            }
            ServerCommand::Broadcast { message } => {
                self.registry.broadcast(&message);
            }
            ServerCommand::Drop { session_id, target } => {
                self.handle_drop(session_id, target);
            }
            ServerCommand::Ban { session_id, target } => {
                self.handle_ban(session_id, target);
            }
            ServerCommand::Unban { session_id, target } => {
                self.handle_unban(session_id, target);
            }
            ServerCommand::Notice { session_id, message } => {
                self.notify(session_id, message);
            }
            ServerCommand::Logout { session_id } => {
                info!("Session {} logged out", session_id);
                self.registry.remove(session_id);
            }
            ServerCommand::Disconnect { session_id } => {
                if self.registry.remove(session_id) {
                    debug!("Session {} removed after its worker ended", session_id);
                }
            }
            ServerCommand::Shutdown => {
                self.handle_shutdown();
            }
        }
    }

    /// Handle new connection: assign an id and send the welcome notice
    fn handle_connect(
        &mut self,
        outbox: Outbox,
        respond_to: oneshot::Sender<Option<SessionId>>,
    ) {
        let Some(session_id) = self.registry.accept(outbox) else {
            debug!("Connection refused, server is shut down");
            let _ = respond_to.send(None);
            return;
        };

        self.notify(session_id, ChatMessage::welcome(session_id));

        if respond_to.send(Some(session_id)).is_err() {
            // Control loop gave up on this connection
            self.registry.remove(session_id);
        }
    }

    /// Handle `drop <name>`: answer the requester privately
    fn handle_drop(&mut self, session_id: SessionId, target: String) {
        let found = self.registry.drop_by_name(&target);
        if found {
            info!("Session {} dropped '{}'", session_id, target);
        } else {
            debug!("Session {} tried to drop unknown user '{}'", session_id, target);
        }
        self.notify(session_id, ChatMessage::drop_result(session_id, &target, found));
    }

    /// Handle BAN, keyed by the requester's display name
    fn handle_ban(&mut self, session_id: SessionId, target: String) {
        let Some(name) = self.registry.display_name(session_id).map(str::to_string) else {
            return;
        };

        self.registry.ban(&name, &target);
        info!("'{}' banned '{}'", name, target);

        self.registry
            .broadcast(&ChatMessage::ban_notice(session_id, &name, &target));
    }

    /// Handle UNBAN; the notice goes out whether or not a ban existed
    fn handle_unban(&mut self, session_id: SessionId, target: String) {
        let Some(name) = self.registry.display_name(session_id).map(str::to_string) else {
            return;
        };

        if self.registry.unban(&name, &target) {
            info!("'{}' unbanned '{}'", name, target);
        } else {
            debug!("'{}' had no ban on '{}'", name, target);
        }

        self.registry
            .broadcast(&ChatMessage::unban_notice(session_id, &name, &target));
    }

    /// Handle shutdown: notify and remove everyone, then cancel the alive signal
    fn handle_shutdown(&mut self) {
        if self.registry.is_closed() {
            return;
        }
        info!("Shutting down, disconnecting {} sessions", self.registry.len());
        self.registry.shutdown_all();
        self.shutdown.cancel();
    }

    /// Helper: queue a private message, logging a failed delivery
    fn notify(&self, session_id: SessionId, message: ChatMessage) {
        if let Err(e) = self.registry.send_to(session_id, message) {
            warn!("Failed to notify session {}: {}", session_id, e);
        }
    }
}
