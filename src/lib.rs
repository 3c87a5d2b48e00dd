//! Broadcast Chat Relay Library
//!
//! A WebSocket chat relay built with tokio-tungstenite. Clients connect,
//! register a display name and exchange messages that the server fans
//! out to everyone else, honouring per-user ban lists.
//!
//! # Features
//! - Registration handshake (first message sets the display name)
//! - Broadcast with self-echo suppression
//! - Per-recipient ban/unban by display name
//! - Administrative `drop <name>` command
//! - Logout and server-wide shutdown
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning the session registry and bans
//! - Each connection has a `handler` task driving a `Session` state machine
//! - A `CancellationToken` is the server-wide alive signal
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use chat_relay::{listener, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chat_relay::AppError> {
//!     let config = ServerConfig::default();
//!     let tcp = listener::bind(&config).await?;
//!     listener::serve(tcp, config, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```

pub mod ban;
pub mod client;
pub mod config;
pub mod console;
pub mod error;
pub mod handler;
pub mod listener;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use ban::BanRegistry;
pub use client::{outbound_channel, Client, Inbox, Outbox};
pub use config::ServerConfig;
pub use error::{AppError, ProtocolError, SendError};
pub use handler::handle_connection;
pub use message::{ChatMessage, MessageType};
pub use registry::Registry;
pub use server::{ChatServer, ServerCommand};
pub use session::{Session, SessionState};
pub use types::SessionId;
