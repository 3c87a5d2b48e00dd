//! Message protocol definitions
//!
//! Every frame on the wire, in both directions, is one JSON-encoded
//! `ChatMessage`. The `type` tag selects how the server dispatches it.
//!
//! User messages follow the `"<displayName>: <body>"` convention; the
//! helpers here parse that prefix for ban filtering and pull the
//! arguments out of `drop`, BAN and UNBAN bodies.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::SessionId;

/// Message type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Chat text, or an administrative `drop` command
    Message,
    /// Leave the server
    Logout,
    /// Block a sender by name
    Ban,
    /// Lift a block
    Unban,
    /// Stop the server
    Shutdown,
}

/// A single protocol message
///
/// Immutable once built; fields are only readable through accessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    sender_id: SessionId,
    #[serde(rename = "type")]
    kind: MessageType,
    text: String,
}

impl ChatMessage {
    pub fn new(sender_id: SessionId, kind: MessageType, text: impl Into<String>) -> Self {
        Self {
            sender_id,
            kind,
            text: text.into(),
        }
    }

    pub fn sender_id(&self) -> SessionId {
        self.sender_id
    }

    pub fn kind(&self) -> MessageType {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Copy of this message attributed to `sender_id`
    pub fn with_sender(self, sender_id: SessionId) -> Self {
        Self { sender_id, ..self }
    }

    /// Display name in front of the first `:`, if any
    ///
    /// Text without a colon has no sender name and is never ban-filtered.
    pub fn sender_name(&self) -> Option<&str> {
        self.text.split_once(':').map(|(name, _)| name.trim())
    }

    /// Target of an administrative `drop` command
    ///
    /// Returns `None` when this is ordinary chat. A command is recognised
    /// when the second whitespace-separated token is `drop` (any case);
    /// the third token is the target.
    pub fn drop_target(&self) -> Option<Result<&str, ProtocolError>> {
        if self.kind != MessageType::Message {
            return None;
        }
        let mut tokens = self.text.split_whitespace().skip(1);
        match tokens.next() {
            Some(word) if word.eq_ignore_ascii_case("drop") => {
                Some(tokens.next().ok_or(ProtocolError::MissingDropTarget))
            }
            _ => None,
        }
    }

    /// Target name of a BAN/UNBAN body `"<requester>:<target>"`
    pub fn ban_target(&self) -> Result<&str, ProtocolError> {
        let command = match self.kind {
            MessageType::Unban => "unban",
            _ => "ban",
        };
        self.text
            .split_once(':')
            .map(|(_, target)| target.trim())
            .filter(|target| !target.is_empty())
            .ok_or(ProtocolError::MissingBanTarget(command))
    }

    /// Private notice sent right after accept; carries the new session's id
    pub fn welcome(id: SessionId) -> Self {
        Self::new(id, MessageType::Message, "Server: connection established")
    }

    /// Private notice sent to a session as it is removed
    pub fn disconnected() -> Self {
        Self::new(
            SessionId::SERVER,
            MessageType::Logout,
            "Disconnected from server",
        )
    }

    /// Notice fanned out to every session on shutdown
    pub fn shutdown_notice() -> Self {
        Self::new(
            SessionId::SERVER,
            MessageType::Shutdown,
            "The server is shutting down",
        )
    }

    /// Private answer to a `drop` command
    pub fn drop_result(requester: SessionId, name: &str, found: bool) -> Self {
        let text = if found {
            format!("User {} has been disconnected.", name)
        } else {
            format!("User {} does not exist.", name)
        };
        Self::new(requester, MessageType::Message, text)
    }

    /// Broadcast announcing a ban
    pub fn ban_notice(requester: SessionId, requester_name: &str, target: &str) -> Self {
        Self::new(
            requester,
            MessageType::Message,
            format!("{} has banned {}", requester_name, target),
        )
    }

    /// Broadcast announcing an unban
    pub fn unban_notice(requester: SessionId, requester_name: &str, target: &str) -> Self {
        Self::new(
            requester,
            MessageType::Message,
            format!("{} has unbanned {}", requester_name, target),
        )
    }
}

/// Convert a ProtocolError to a private notice for the offending session
impl From<ProtocolError> for ChatMessage {
    fn from(err: ProtocolError) -> Self {
        ChatMessage::new(
            SessionId::SERVER,
            MessageType::Message,
            format!("Server: {}", err),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(text: &str) -> ChatMessage {
        ChatMessage::new(SessionId(3), MessageType::Message, text)
    }

    #[test]
    fn test_message_deserialize() {
        let json = r#"{"sender_id": 2, "type": "BAN", "text": "alice: bob"}"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.sender_id(), SessionId(2));
        assert_eq!(msg.kind(), MessageType::Ban);
        assert_eq!(msg.text(), "alice: bob");
    }

    #[test]
    fn test_message_serialize() {
        let json = serde_json::to_string(&ChatMessage::shutdown_notice()).unwrap();
        assert!(json.contains("\"sender_id\":-1"));
        assert!(json.contains("\"type\":\"SHUTDOWN\""));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let json = r#"{"sender_id": 0, "type": "JOIN", "text": "x"}"#;
        assert!(serde_json::from_str::<ChatMessage>(json).is_err());
    }

    #[test]
    fn test_sender_name() {
        assert_eq!(chat("bob: hi").sender_name(), Some("bob"));
        assert_eq!(chat("bob:hi: there").sender_name(), Some("bob"));
        assert_eq!(chat("no colon here").sender_name(), None);
    }

    #[test]
    fn test_drop_target() {
        assert_eq!(chat("alice: drop bob").drop_target(), Some(Ok("bob")));
        assert_eq!(chat("x DROP carol extra").drop_target(), Some(Ok("carol")));
        assert_eq!(
            chat("alice: drop").drop_target(),
            Some(Err(ProtocolError::MissingDropTarget))
        );
        assert_eq!(chat("alice: please drop bob").drop_target(), None);
        assert_eq!(chat("drop").drop_target(), None);

        let logout = ChatMessage::new(SessionId(1), MessageType::Logout, "a: drop b");
        assert_eq!(logout.drop_target(), None);
    }

    #[test]
    fn test_ban_target() {
        let ban = ChatMessage::new(SessionId(0), MessageType::Ban, "alice: bob ");
        assert_eq!(ban.ban_target(), Ok("bob"));

        let no_colon = ChatMessage::new(SessionId(0), MessageType::Ban, "alice bob");
        assert_eq!(
            no_colon.ban_target(),
            Err(ProtocolError::MissingBanTarget("ban"))
        );

        let empty = ChatMessage::new(SessionId(0), MessageType::Unban, "alice:  ");
        assert_eq!(
            empty.ban_target(),
            Err(ProtocolError::MissingBanTarget("unban"))
        );
    }

    #[test]
    fn test_protocol_error_notice() {
        let msg: ChatMessage = ProtocolError::MissingDropTarget.into();
        assert_eq!(msg.sender_id(), SessionId::SERVER);
        assert_eq!(msg.text(), "Server: drop requires a user name");
    }
}
