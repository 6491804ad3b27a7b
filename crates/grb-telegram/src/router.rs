use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use grb_core::{
    completion::CompletionClient, config::Config, history::ConversationStore,
    mention::MentionMatcher, messaging::port::MessagingPort, relay::Relay,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub relay: Arc<Relay>,
    pub messenger: Arc<dyn MessagingPort>,
    pub mentions: MentionMatcher,
}

impl AppState {
    pub fn bot_username(&self) -> &str {
        self.mentions.username()
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        self.relay.store()
    }

    pub fn llm(&self) -> &Arc<dyn CompletionClient> {
        self.relay.llm()
    }
}

/// Run long polling until Ctrl-C.
///
/// Starts `llm` but does not close it; the caller owns shutdown so the client
/// is released on every exit path.
pub async fn run_polling(cfg: Arc<Config>, llm: Arc<dyn CompletionClient>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    // Updates that piled up while the bot was down are dropped.
    bot.delete_webhook().drop_pending_updates(true).await?;

    let me = bot.get_me().await?;
    let mentions = MentionMatcher::new(me.username())?;

    llm.start().await?;

    tracing::info!("bot @{} initialized", mentions.username());
    tracing::info!("target group id: {}", cfg.group_id.0);
    tracing::info!("LLM model: {}", cfg.openrouter_model);

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let store = Arc::new(ConversationStore::new(cfg.max_history));
    let relay = Arc::new(Relay::new(store, llm, messenger.clone()));

    let state = Arc::new(AppState {
        cfg,
        relay,
        messenger,
        mentions,
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    tracing::info!("bot started, polling for updates");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("dispatcher stopped");
    Ok(())
}
