use crate::domain::{ChatId, MessageId, MessageRef, UserId};

/// Platform-neutral view of an inbound message.
///
/// Telegram-specific fields stay in the Telegram adapter.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    /// Text, or the caption for media messages.
    pub text: String,
}

impl InboundMessage {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }

    pub fn sender_label(&self) -> String {
        match (&self.username, self.user_id) {
            (Some(name), _) => format!("@{name}"),
            (None, Some(id)) => format!("user {}", id.0),
            (None, None) => "unknown".to_string(),
        }
    }

    pub fn is_command(&self) -> bool {
        self.text.starts_with('/')
    }
}

/// Outgoing "chat action" (typing indicator).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(username: Option<&str>, user_id: Option<i64>, text: &str) -> InboundMessage {
        InboundMessage {
            chat_id: ChatId(-1),
            message_id: MessageId(10),
            user_id: user_id.map(UserId),
            username: username.map(str::to_string),
            text: text.to_string(),
        }
    }

    #[test]
    fn sender_label_prefers_username() {
        assert_eq!(msg(Some("alice"), Some(1), "").sender_label(), "@alice");
        assert_eq!(msg(None, Some(7), "").sender_label(), "user 7");
        assert_eq!(msg(None, None, "").sender_label(), "unknown");
    }

    #[test]
    fn message_ref_points_at_the_inbound_message() {
        let m = msg(None, None, "/help");
        assert!(m.is_command());
        assert_eq!(
            m.message_ref(),
            MessageRef {
                chat_id: ChatId(-1),
                message_id: MessageId(10)
            }
        );
    }
}
