use std::sync::Arc;

use teloxide::prelude::*;

use grb_core::{formatting::escape_html, messaging::types::InboundMessage};

use crate::router::AppState;

pub async fn handle_mention(
    state: Arc<AppState>,
    msg: InboundMessage,
    query: String,
) -> ResponseResult<()> {
    if query.is_empty() {
        let hint = mention_hint(state.bot_username());
        if let Err(e) = state.messenger.reply_html(msg.message_ref(), &hint).await {
            tracing::warn!("failed to send mention hint: {e}");
        }
        return Ok(());
    }

    if let Err(e) = state.relay.handle_query(&msg, &query).await {
        tracing::error!("relay failed for {}: {e}", msg.sender_label());
        let _ = state
            .messenger
            .send_html(
                msg.chat_id,
                "Sorry, something went wrong while sending the answer. Please try again later or contact the administrator.",
            )
            .await;
    }

    Ok(())
}

pub(crate) fn mention_hint(username: &str) -> String {
    let username = escape_html(username);
    format!(
        "Hi! I'm an AI-powered bot. Ask your question right after the mention.\n\
Example: <code>@{username} tell me about Rust</code>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_shows_a_usage_example() {
        let hint = mention_hint("relay_bot");
        assert!(hint.contains("<code>@relay_bot tell me about Rust</code>"));
    }
}
