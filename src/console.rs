//! Console command surface for the chat client
//!
//! Each typed line becomes exactly one outbound message:
//!
//! | Input | Type | Text |
//! |---|---|---|
//! | `logout` | LOGOUT | `<user>: logout` |
//! | `shutdown` | SHUTDOWN | `<user>: shutdown` |
//! | `ban <name>` | BAN | `<user>: <name>` |
//! | `unban <name>` | UNBAN | `<user>: <name>` |
//! | anything else | MESSAGE | `<user>: <line>` |

use crate::message::{ChatMessage, MessageType};
use crate::types::SessionId;

/// Translate one console line into a protocol message
pub fn parse_line(id: SessionId, username: &str, line: &str) -> ChatMessage {
    let (kind, body) = if line.eq_ignore_ascii_case("logout") {
        (MessageType::Logout, line)
    } else if line.eq_ignore_ascii_case("shutdown") {
        (MessageType::Shutdown, line)
    } else if let Some(name) = line.strip_prefix("ban ") {
        (MessageType::Ban, name.trim())
    } else if let Some(name) = line.strip_prefix("unban ") {
        (MessageType::Unban, name.trim())
    } else {
        (MessageType::Message, line)
    };

    ChatMessage::new(id, kind, format!("{}: {}", username, body))
}

/// Whether sending a message of this type ends the client
pub fn ends_session(kind: MessageType) -> bool {
    matches!(kind, MessageType::Logout | MessageType::Shutdown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> ChatMessage {
        parse_line(SessionId(1), "alice", line)
    }

    #[test]
    fn test_plain_text() {
        let msg = parse("hello there");
        assert_eq!(msg.kind(), MessageType::Message);
        assert_eq!(msg.text(), "alice: hello there");
        assert_eq!(msg.sender_id(), SessionId(1));
    }

    #[test]
    fn test_logout_and_shutdown_ignore_case() {
        assert_eq!(parse("LogOut").kind(), MessageType::Logout);
        assert_eq!(parse("SHUTDOWN").kind(), MessageType::Shutdown);
        assert!(ends_session(parse("logout").kind()));
        assert!(!ends_session(parse("logout now").kind()));
    }

    #[test]
    fn test_ban_and_unban() {
        let ban = parse("ban  bob ");
        assert_eq!(ban.kind(), MessageType::Ban);
        assert_eq!(ban.text(), "alice: bob");
        assert_eq!(ban.ban_target(), Ok("bob"));

        let unban = parse("unban bob");
        assert_eq!(unban.kind(), MessageType::Unban);
        assert_eq!(unban.text(), "alice: bob");
    }

    #[test]
    fn test_drop_is_plain_message() {
        let msg = parse("drop bob");
        assert_eq!(msg.kind(), MessageType::Message);
        assert_eq!(msg.drop_target(), Some(Ok("bob")));
    }
}
