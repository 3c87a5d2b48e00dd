//! Chat Relay Client - Console Entry Point
//!
//! Connects to a relay, registers the given username and turns every
//! typed line into one message. Received messages are printed as they
//! arrive. The client exits on `logout`, `shutdown`, or when the server
//! disconnects it.

use std::io::Write;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

use chat_relay::config::DEFAULT_PORT;
use chat_relay::console::{ends_session, parse_line};
use chat_relay::{ChatMessage, MessageType, SessionId};

/// Console client for the chat relay
#[derive(Parser, Debug)]
#[command(name = "chat_client", version, about)]
struct Args {
    /// `[host] <username>`; host defaults to localhost
    #[arg(num_args = 1..=2, required = true, value_names = ["HOST", "USERNAME"])]
    target: Vec<String>,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

impl Args {
    fn host_and_username(&self) -> (&str, &str) {
        match self.target.as_slice() {
            [host, username] => (host.as_str(), username.as_str()),
            [username] => ("localhost", username.as_str()),
            _ => ("localhost", ""),
        }
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_client=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let (host, username) = args.host_and_username();
    let username = username.to_string();
    let url = format!("ws://{}:{}", host, args.port);

    let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .inspect_err(|e| error!("Failed to connect to {}: {}", url, e))?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Learned from the server's welcome message
    let session_id = Arc::new(AtomicI64::new(SessionId::SERVER.0));
    let done = CancellationToken::new();

    // Registration handshake: the first message carries only the username
    let handshake = ChatMessage::new(SessionId::SERVER, MessageType::Message, username.clone());
    ws_sender
        .send(Message::Text(serde_json::to_string(&handshake)?.into()))
        .await?;

    // Spawn read task (WebSocket -> console)
    let read_id = Arc::clone(&session_id);
    let read_done = done.clone();
    let read_task = tokio::spawn(async move {
        let mut first = true;
        while let Some(frame) = ws_receiver.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Connection error: {}", e);
                    break;
                }
            };
            let msg = match serde_json::from_str::<ChatMessage>(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("Undecodable message from server: {}", e);
                    continue;
                }
            };

            println!("\n{}", msg.text());
            prompt();

            if first {
                read_id.store(msg.sender_id().0, Ordering::Relaxed);
                first = false;
            }
            if ends_session(msg.kind()) {
                break;
            }
        }
        debug!("Read task ended");
        read_done.cancel();
    });

    // Console loop (stdin -> WebSocket)
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    loop {
        let line = tokio::select! {
            _ = done.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read console input: {}", e);
                break;
            }
        };

        let id = SessionId(session_id.load(Ordering::Relaxed));
        let msg = parse_line(id, &username, &line);
        let json = serde_json::to_string(&msg)?;
        if let Err(e) = ws_sender.send(Message::Text(json.into())).await {
            error!("Failed to send message: {}", e);
            break;
        }
        if ends_session(msg.kind()) {
            break;
        }
        prompt();
    }

    // Give the server's confirmation a moment to arrive before closing
    let _ = tokio::time::timeout(std::time::Duration::from_secs(1), done.cancelled()).await;
    let _ = ws_sender.close().await;
    read_task.abort();

    // A pending stdin read would otherwise keep the runtime from shutting down
    std::process::exit(0)
}
