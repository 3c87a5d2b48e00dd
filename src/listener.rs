//! Server control loop
//!
//! Binds the listening socket, starts the ChatServer actor and accepts
//! connections until the server shuts down. Each accepted socket gets its
//! session id from the actor before its worker is spawned, so ids follow
//! acceptance order.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::outbound_channel;
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::server::{ChatServer, ServerCommand};

/// Bind the listening socket described by `config`
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, AppError> {
    let addr = config.addr();
    TcpListener::bind(&addr)
        .await
        .map_err(|source| AppError::Bind { addr, source })
}

/// Run the relay on an already-bound listener
///
/// Returns after the server has shut down, either because a session sent
/// SHUTDOWN or because `stop` resolved, and the sessions have been given
/// `drain_timeout` to close.
pub async fn serve<F>(listener: TcpListener, config: ServerConfig, stop: F) -> Result<(), AppError>
where
    F: Future<Output = ()>,
{
    let alive = CancellationToken::new();

    // Create ChatServer actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
    let server = tokio::spawn(ChatServer::new(cmd_rx, alive.clone()).run());
    info!("ChatServer actor started");

    tokio::pin!(stop);
    let mut stop_requested = false;

    // Connection accept loop
    loop {
        tokio::select! {
            _ = alive.cancelled() => {
                break;
            }
            _ = &mut stop, if !stop_requested => {
                info!("Shutdown requested by operator");
                stop_requested = true;
                if cmd_tx.send(ServerCommand::Shutdown).await.is_err() {
                    break;
                }
            }
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        accept_connection(stream, addr, &cmd_tx, &config, &alive).await?;
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
        }
    }

    info!("No longer accepting connections");
    drop(listener);
    drop(cmd_tx);

    // The actor stops once every session worker has released its sender
    if tokio::time::timeout(config.drain_timeout, server).await.is_err() {
        warn!("Sessions still open after {:?}", config.drain_timeout);
    }

    Ok(())
}

/// Register one accepted socket with the actor and spawn its worker
async fn accept_connection(
    stream: TcpStream,
    addr: SocketAddr,
    cmd_tx: &mpsc::Sender<ServerCommand>,
    config: &ServerConfig,
    alive: &CancellationToken,
) -> Result<(), AppError> {
    debug!("New TCP connection from {}", addr);

    let (outbox, msg_rx) = outbound_channel(config.outbound_buffer);
    let (respond_to, reply) = oneshot::channel();

    cmd_tx
        .send(ServerCommand::Connect {
            outbox,
            respond_to,
        })
        .await
        .map_err(|_| AppError::ChannelSend)?;

    let Some(session_id) = reply.await.map_err(|_| AppError::ChannelSend)? else {
        debug!("Refusing {}: server is shutting down", addr);
        return Ok(());
    };
    info!("New session {} from {}", session_id, addr);

    let cmd_tx = cmd_tx.clone();
    let alive = alive.clone();

    // Spawn handler task for each connection
    tokio::spawn(async move {
        if let Err(e) = handle_connection(stream, session_id, msg_rx, cmd_tx, alive).await {
            error!("Session {} handler error: {}", session_id, e);
        }
    });

    Ok(())
}
