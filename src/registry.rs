//! Connection registry and broadcast engine
//!
//! The authoritative set of connected sessions plus the ban lists that
//! filter what each of them receives. Everything here is synchronous:
//! messages are only queued onto each client's outbound channel, never
//! written to a socket, so the owner can call these methods from inside
//! its serialized section without blocking on the network.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::ban::BanRegistry;
use crate::client::{Client, Outbox};
use crate::error::SendError;
use crate::message::ChatMessage;
use crate::types::{IdAllocator, SessionId};

/// Connected sessions keyed by id, iterated in id (= acceptance) order
#[derive(Debug, Default)]
pub struct Registry {
    clients: BTreeMap<SessionId, Client>,
    bans: BanRegistry,
    ids: IdAllocator,
    closed: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new, unregistered session and return its id
    ///
    /// Called right after the TCP accept, before the WebSocket upgrade, so
    /// the id is reserved in acceptance order. Until it registers, the
    /// session only receives private notices, never broadcasts.
    /// Returns `None` once the registry has been shut down.
    pub fn accept(&mut self, outbox: Outbox) -> Option<SessionId> {
        if self.closed {
            return None;
        }
        let id = self.ids.next_id();
        self.clients.insert(id, Client::new(id, outbox));
        debug!("Session {} added, {} connected", id, self.clients.len());
        Some(id)
    }

    /// Complete the registration handshake for `id`
    ///
    /// Returns false if the session is gone or already registered.
    pub fn register(&mut self, id: SessionId, name: String) -> bool {
        match self.clients.get_mut(&id) {
            Some(client) if !client.is_registered() => {
                info!("Session {} registered as '{}'", id, name);
                client.register(name);
                true
            }
            _ => false,
        }
    }

    /// Display name of a registered session
    pub fn display_name(&self, id: SessionId) -> Option<&str> {
        self.clients.get(&id).and_then(|c| c.username.as_deref())
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Queue a private server notice for one session
    pub fn send_to(&self, id: SessionId, msg: ChatMessage) -> Result<(), SendError> {
        match self.clients.get(&id) {
            Some(client) => client.send_control(msg),
            None => Err(SendError::ChannelClosed),
        }
    }

    /// Fan a message out to every eligible session
    ///
    /// Skips unregistered sessions, the sender itself, and recipients
    /// that have banned the name in front of the message's first `:`.
    /// A failed delivery, including a full queue, is logged and does not
    /// stop the rest.
    /// Returns the number of sessions the message was queued for.
    pub fn broadcast(&self, msg: &ChatMessage) -> usize {
        info!("[broadcast] {}", msg.text());

        let sender_name = msg.sender_name();
        let mut delivered = 0;

        for client in self.clients.values() {
            if client.id == msg.sender_id() {
                continue;
            }
            let Some(recipient) = client.username.as_deref() else {
                continue;
            };
            if let Some(sender) = sender_name {
                if self.bans.is_blocked(recipient, sender) {
                    debug!("Not delivering to '{}': '{}' is banned", recipient, sender);
                    continue;
                }
            }
            match client.send(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Failed to deliver to session {}: {}", client.id, e),
            }
        }

        delivered
    }

    /// Disconnect and forget a session
    ///
    /// The session gets a private LOGOUT notice, then its outbound channel
    /// is dropped, which ends its writer task. Removing an absent id is a
    /// no-op; returns whether anything was removed.
    pub fn remove(&mut self, id: SessionId) -> bool {
        let Some(client) = self.clients.remove(&id) else {
            return false;
        };

        if let Err(e) = client.send_control(ChatMessage::disconnected()) {
            debug!("Disconnect notice to session {} not queued: {}", id, e);
        }
        info!(
            "Session {} ('{}') removed, {} connected",
            id,
            client.display_name(),
            self.clients.len()
        );
        true
    }

    /// Remove the first session whose name matches, ignoring case
    pub fn drop_by_name(&mut self, name: &str) -> bool {
        let wanted = name.to_lowercase();
        let found = self
            .clients
            .values()
            .find(|c| c.username.as_deref().is_some_and(|n| n.to_lowercase() == wanted))
            .map(|c| c.id);

        match found {
            Some(id) => self.remove(id),
            None => false,
        }
    }

    /// Block `target` for everyone named `recipient`
    pub fn ban(&mut self, recipient: &str, target: &str) {
        self.bans.ban(recipient, target);
    }

    /// Lift a block; returns whether one existed
    pub fn unban(&mut self, recipient: &str, target: &str) -> bool {
        self.bans.unban(recipient, target)
    }

    /// Notify every session of shutdown, remove them all and close
    ///
    /// The notice goes to all connected sessions, registered or not, and
    /// bypasses ban filtering. Calling this again is a no-op.
    pub fn shutdown_all(&mut self) {
        if self.closed {
            return;
        }

        let notice = ChatMessage::shutdown_notice();
        info!("[broadcast] {}", notice.text());
        for client in self.clients.values() {
            if let Err(e) = client.send_control(notice.clone()) {
                warn!("Failed to deliver shutdown to session {}: {}", client.id, e);
            }
        }

        let ids: Vec<SessionId> = self.clients.keys().copied().collect();
        for id in ids {
            self.remove(id);
        }

        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{outbound_channel, Inbox};
    use crate::config::OUTBOUND_BUFFER_SIZE;
    use crate::message::MessageType;
    use tokio::sync::mpsc::error::TryRecvError;

    fn connect(registry: &mut Registry) -> (SessionId, Inbox) {
        let (outbox, inbox) = outbound_channel(OUTBOUND_BUFFER_SIZE);
        let id = registry.accept(outbox).unwrap();
        (id, inbox)
    }

    fn join(registry: &mut Registry, name: &str) -> (SessionId, Inbox) {
        let (id, rx) = connect(registry);
        assert!(registry.register(id, name.to_string()));
        (id, rx)
    }

    fn drain(rx: &mut Inbox) -> Vec<ChatMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn texts(rx: &mut Inbox) -> Vec<String> {
        drain(rx).into_iter().map(|m| m.text().to_string()).collect()
    }

    fn chat(from: SessionId, text: &str) -> ChatMessage {
        ChatMessage::new(from, MessageType::Message, text)
    }

    #[test]
    fn test_ids_sequential_and_never_reused() {
        let mut registry = Registry::new();
        let (a, _ra) = connect(&mut registry);
        let (b, _rb) = connect(&mut registry);
        assert!(registry.remove(b));
        let (c, _rc) = connect(&mut registry);

        assert_eq!((a, b, c), (SessionId(0), SessionId(1), SessionId(2)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_only_once() {
        let mut registry = Registry::new();
        let (id, _rx) = connect(&mut registry);

        assert_eq!(registry.display_name(id), None);
        assert!(registry.register(id, "alice".to_string()));
        assert!(!registry.register(id, "mallory".to_string()));
        assert_eq!(registry.display_name(id), Some("alice"));
        assert!(!registry.register(SessionId(99), "ghost".to_string()));
    }

    #[test]
    fn test_broadcast_skips_sender_and_unregistered() {
        let mut registry = Registry::new();
        let (alice, mut ra) = join(&mut registry, "alice");
        let (_bob, mut rb) = join(&mut registry, "bob");
        let (_anon, mut rn) = connect(&mut registry);

        let delivered = registry.broadcast(&chat(alice, "alice: hello"));

        assert_eq!(delivered, 1);
        assert!(drain(&mut ra).is_empty());
        assert_eq!(texts(&mut rb), vec!["alice: hello"]);
        assert!(drain(&mut rn).is_empty());
    }

    #[test]
    fn test_ban_filters_only_the_banning_recipient() {
        let mut registry = Registry::new();
        let (_alice, mut ra) = join(&mut registry, "alice");
        let (bob, _rb) = join(&mut registry, "bob");
        let (_carol, mut rc) = join(&mut registry, "carol");

        registry.ban("alice", "bob");
        registry.broadcast(&chat(bob, "bob: hi"));
        assert!(drain(&mut ra).is_empty());
        assert_eq!(texts(&mut rc), vec!["bob: hi"]);

        assert!(registry.unban("alice", "bob"));
        registry.broadcast(&chat(bob, "bob: hi again"));
        assert_eq!(texts(&mut ra), vec!["bob: hi again"]);
    }

    #[test]
    fn test_ban_uses_text_prefix_not_sender_id() {
        let mut registry = Registry::new();
        let (_alice, mut ra) = join(&mut registry, "alice");
        let (carol, _rc) = join(&mut registry, "carol");

        registry.ban("alice", "bob");
        registry.broadcast(&chat(carol, "bob: pretending"));
        registry.broadcast(&chat(carol, "bob has no colon"));

        assert_eq!(texts(&mut ra), vec!["bob has no colon"]);
    }

    #[test]
    fn test_broadcast_survives_closed_recipient() {
        let mut registry = Registry::new();
        let (alice, _ra) = join(&mut registry, "alice");
        let (_bob, rb) = join(&mut registry, "bob");
        let (_carol, mut rc) = join(&mut registry, "carol");
        drop(rb);

        let delivered = registry.broadcast(&chat(alice, "alice: anyone?"));

        assert_eq!(delivered, 1);
        assert_eq!(texts(&mut rc), vec!["alice: anyone?"]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = Registry::new();
        let (alice, mut ra) = join(&mut registry, "alice");

        assert!(registry.remove(alice));
        assert!(!registry.remove(alice));

        let received = drain(&mut ra);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind(), MessageType::Logout);
        assert_eq!(received[0].sender_id(), SessionId::SERVER);
        // Channel closed once the registry dropped its sender
        assert!(matches!(ra.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[test]
    fn test_drop_by_name_first_case_insensitive_match() {
        let mut registry = Registry::new();
        let (_alice, mut ra) = join(&mut registry, "alice");
        let (bob1, _rb1) = join(&mut registry, "Bob");
        let (bob2, _rb2) = join(&mut registry, "bob");

        assert!(registry.drop_by_name("BOB"));
        assert!(!registry.contains(bob1));
        assert!(registry.contains(bob2));

        assert!(!registry.drop_by_name("dave"));
        assert!(drain(&mut ra).is_empty());
    }

    #[test]
    fn test_shutdown_all() {
        let mut registry = Registry::new();
        let (_alice, mut ra) = join(&mut registry, "alice");
        let (_anon, mut rn) = connect(&mut registry);

        registry.shutdown_all();

        for rx in [&mut ra, &mut rn] {
            let kinds: Vec<MessageType> = drain(rx).iter().map(|m| m.kind()).collect();
            assert_eq!(kinds, vec![MessageType::Shutdown, MessageType::Logout]);
        }
        assert!(registry.is_empty());
        assert!(registry.is_closed());

        let (outbox, _inbox) = outbound_channel(1);
        assert_eq!(registry.accept(outbox), None);

        registry.shutdown_all();
        assert!(registry.is_closed());
    }

    /// Fill `rx`'s chat lane by broadcasting from `from`
    fn flood(registry: &Registry, from: SessionId) {
        for i in 0..OUTBOUND_BUFFER_SIZE {
            let delivered = registry.broadcast(&chat(from, &format!("bob: spam {}", i)));
            assert_eq!(delivered, 1);
        }
    }

    #[test]
    fn test_full_queue_drops_chat() {
        let mut registry = Registry::new();
        let (_alice, mut ra) = join(&mut registry, "alice");
        let (bob, _rb) = join(&mut registry, "bob");

        flood(&registry, bob);
        let delivered = registry.broadcast(&chat(bob, "bob: one too many"));

        assert_eq!(delivered, 0);
        let received = texts(&mut ra);
        assert_eq!(received.len(), OUTBOUND_BUFFER_SIZE);
        assert!(!received.iter().any(|t| t == "bob: one too many"));
    }

    #[test]
    fn test_shutdown_reaches_session_with_full_queue() {
        let mut registry = Registry::new();
        let (_alice, mut ra) = join(&mut registry, "alice");
        let (bob, _rb) = join(&mut registry, "bob");

        flood(&registry, bob);
        registry.shutdown_all();

        let received = drain(&mut ra);
        let count = |kind| received.iter().filter(|m| m.kind() == kind).count();
        assert_eq!(count(MessageType::Shutdown), 1);
        assert_eq!(count(MessageType::Logout), 1);
        assert_eq!(received[0].kind(), MessageType::Shutdown);
        assert_eq!(received[1].kind(), MessageType::Logout);
    }

    #[test]
    fn test_remove_reaches_session_with_full_queue() {
        let mut registry = Registry::new();
        let (alice, mut ra) = join(&mut registry, "alice");
        let (bob, _rb) = join(&mut registry, "bob");

        flood(&registry, bob);
        assert!(registry.remove(alice));

        let received = drain(&mut ra);
        assert_eq!(received[0].kind(), MessageType::Logout);
        assert_eq!(received.len(), OUTBOUND_BUFFER_SIZE + 1);
    }

    #[test]
    fn test_send_to_missing_session() {
        let registry = Registry::new();
        let result = registry.send_to(SessionId(4), chat(SessionId::SERVER, "x"));
        assert_eq!(result, Err(SendError::ChannelClosed));
    }
}
