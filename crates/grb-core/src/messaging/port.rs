use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::ChatAction,
    Result,
};

/// Outbound side of the chat platform.
///
/// Formatting is decided by the caller; the adapter only delivers HTML.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;

    /// Send `html` as a reply to `to`.
    async fn reply_html(&self, to: MessageRef, html: &str) -> Result<MessageRef>;

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()>;
}
