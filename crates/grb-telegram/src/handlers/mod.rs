//! Telegram update handlers.
//!
//! In the target group: mentions are relayed to the model, commands are
//! handled, everything else is ignored. Elsewhere only commands are served.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use grb_core::formatting::truncate_text;

use crate::router::AppState;
use crate::to_inbound;

mod commands;
mod group;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(inbound) = to_inbound(&msg) else {
        return Ok(());
    };

    if inbound.chat_id == state.cfg.group_id {
        tracing::info!(
            "message from {}: {}",
            inbound.sender_label(),
            truncate_text(&inbound.text, 100)
        );

        if let Some(query) = state.mentions.extract_query(&inbound.text) {
            return group::handle_mention(state, inbound, query).await;
        }
    }

    if inbound.is_command() {
        return commands::handle_command(state, inbound).await;
    }

    Ok(())
}
