//! Error types for the chat relay
//!
//! Defines application-level errors, per-recipient send errors and
//! protocol errors raised by malformed command bodies.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Transport errors end only the affected session. `Bind` is the one
/// startup error and is fatal to the process.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal for the session)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Listening socket could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,
}

/// Message send errors
///
/// Occurs when a message cannot be queued for one recipient.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The recipient's outbound queue is full
    #[error("Outbound queue full")]
    QueueFull,
}

/// Malformed command bodies
///
/// The offending message is dropped and the sender is told privately;
/// the session stays active.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// BAN/UNBAN body without a `requester:target` separator or target
    #[error("{0} requires a user name")]
    MissingBanTarget(&'static str),

    /// `drop` command without a target name
    #[error("drop requires a user name")]
    MissingDropTarget,
}
