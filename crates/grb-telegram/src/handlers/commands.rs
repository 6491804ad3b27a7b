use std::sync::Arc;

use teloxide::prelude::*;

use grb_core::{
    completion::ModelInfo, config::Config, formatting::escape_html,
    messaging::types::InboundMessage,
};

use crate::router::AppState;

const MODELS_SHOWN: usize = 10;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub async fn handle_command(state: Arc<AppState>, msg: InboundMessage) -> ResponseResult<()> {
    let (cmd, _args) = parse_command(&msg.text);
    let in_group = msg.chat_id == state.cfg.group_id;

    let html = match cmd.as_str() {
        "start" => {
            let history = in_group.then(|| state.store().history_len(msg.chat_id));
            start_text(&state.cfg, state.bot_username(), history)
        }
        "help" => help_text(&state.cfg, state.bot_username()),
        "ping" => "🏓 Pong! The bot is up and running.".to_string(),
        "models" => models_text(&state.llm().list_models().await, &state.cfg.openrouter_model),
        "clear" => {
            if in_group {
                state.store().clear_history(msg.chat_id);
                tracing::info!("history cleared by {}", msg.sender_label());
                "🗑️ Conversation history cleared!".to_string()
            } else {
                "This command only works in the group.".to_string()
            }
        }
        "test" => send_test_message(&state).await,
        _ => return Ok(()),
    };

    if let Err(e) = state.messenger.reply_html(msg.message_ref(), &html).await {
        tracing::warn!("failed to answer /{cmd}: {e}");
    }
    Ok(())
}

async fn send_test_message(state: &AppState) -> String {
    let username = escape_html(state.bot_username());
    let text = format!(
        "🧪 <b>Test message</b>\n\nBot @{username} is working!\nTry: <code>@{username} hello</code>"
    );
    match state.messenger.send_html(state.cfg.group_id, &text).await {
        Ok(sent) => format!("✅ Test sent! ID: {}", sent.message_id.0),
        Err(e) => format!("❌ Error: {}", escape_html(&e.to_string())),
    }
}

fn start_text(cfg: &Config, username: &str, history_len: Option<usize>) -> String {
    let username = escape_html(username);
    let mut out = format!(
        "🤖 <b>AI-powered bot</b>\n\n\
• Username: @{username}\n\
• Model: <code>{}</code>\n\
• Group: <code>{}</code>\n",
        escape_html(&cfg.openrouter_model),
        cfg.group_id.0
    );
    if let Some(n) = history_len {
        out.push_str(&format!(
            "• Remembered exchanges: {n}/{}\n",
            cfg.max_history
        ));
    }
    out.push_str(&format!(
        "\nUse it in the group: <code>@{username} [question]</code>"
    ));
    out
}

fn help_text(cfg: &Config, username: &str) -> String {
    let username = escape_html(username);
    format!(
        "🆘 <b>Help for @{username}</b>\n\n\
<b>Basic usage:</b>\n\
• Mention + question: <code>@{username} [your question]</code>\n\
• Example: <code>@{username} tell me about machine learning</code>\n\n\
<b>Commands:</b>\n\
• /help - this help\n\
• /ping - liveness check\n\
• /models - list available models\n\
• /clear - clear the conversation history\n\
• /test - send a test message to the group\n\n\
<b>Current model:</b> <code>{}</code>",
        escape_html(&cfg.openrouter_model)
    )
}

fn models_text(models: &[ModelInfo], current: &str) -> String {
    if models.is_empty() {
        return "Could not fetch the list of models.".to_string();
    }

    let list = models
        .iter()
        .take(MODELS_SHOWN)
        .map(|m| format!("• {}", escape_html(&m.id)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "🧠 <b>Available models (first {MODELS_SHOWN}):</b>\n\n{list}\n\nCurrent: <code>{}</code>",
        escape_html(current)
    )
}
