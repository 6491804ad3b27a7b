//! The relay flow: context lookup, completion, reply, history update.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::{oneshot, Mutex, OwnedMutexGuard};

use crate::{
    completion::{CompletionClient, CompletionOutcome},
    domain::ChatId,
    formatting::format_answer,
    history::ConversationStore,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, InboundMessage},
    },
    Result,
};

/// Telegram shows "typing..." for about five seconds per action.
const TYPING_REFRESH: Duration = Duration::from_secs(4);

/// One async mutex per chat.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<ChatId, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: ChatId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Relays addressed queries to the completion client and answers in the chat.
pub struct Relay {
    store: Arc<ConversationStore>,
    llm: Arc<dyn CompletionClient>,
    messenger: Arc<dyn MessagingPort>,
    locks: ChatLocks,
}

impl Relay {
    pub fn new(
        store: Arc<ConversationStore>,
        llm: Arc<dyn CompletionClient>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            store,
            llm,
            messenger,
            locks: ChatLocks::default(),
        }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn llm(&self) -> &Arc<dyn CompletionClient> {
        &self.llm
    }

    /// Answer `query` (already stripped of the mention) as a reply to `msg`.
    ///
    /// The chat stays locked from the context read until the history write, so
    /// concurrent queries in one chat see each other's exchanges in order.
    /// Only successful completions that were delivered get recorded.
    pub async fn handle_query(
        &self,
        msg: &InboundMessage,
        query: &str,
    ) -> Result<CompletionOutcome> {
        let chat_id = msg.chat_id;
        let _guard = self.locks.lock_chat(chat_id).await;

        let stop_typing = self.start_typing(chat_id);
        let context = self.store.get_context(chat_id);
        let outcome = self.llm.complete(query, &context).await;
        let _ = stop_typing.send(());

        match &outcome {
            CompletionOutcome::Reply(_) => {}
            other => tracing::warn!(chat_id = chat_id.0, "completion failed: {other}"),
        }

        let text = outcome.user_message();
        if let Err(e) = self
            .messenger
            .reply_html(msg.message_ref(), &format_answer(&text))
            .await
        {
            tracing::error!(chat_id = chat_id.0, "failed to deliver reply: {e}");
            return Err(e);
        }

        if outcome.is_reply() {
            self.store.add_message(chat_id, query, &text);
            tracing::info!(
                chat_id = chat_id.0,
                "reply sent ({} chars)",
                text.chars().count()
            );
        }

        Ok(outcome)
    }

    fn start_typing(&self, chat_id: ChatId) -> oneshot::Sender<()> {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let messenger = self.messenger.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(TYPING_REFRESH);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        if let Err(e) = messenger.send_chat_action(chat_id, ChatAction::Typing).await {
                            tracing::debug!(chat_id = chat_id.0, "typing indicator failed: {e}");
                        }
                    }
                    _ = &mut stop_rx => break,
                }
            }
        });
        stop_tx
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        completion::ModelInfo,
        domain::{MessageId, MessageRef, UserId},
        errors::Error,
    };

    #[derive(Default)]
    struct FakeMessenger {
        replies: StdMutex<Vec<(MessageRef, String)>>,
        fail_replies: bool,
    }

    impl FakeMessenger {
        fn replies(&self) -> Vec<(MessageRef, String)> {
            self.replies.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        async fn send_html(&self, chat_id: ChatId, _html: &str) -> Result<MessageRef> {
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }

        async fn reply_html(&self, to: MessageRef, html: &str) -> Result<MessageRef> {
            if self.fail_replies {
                return Err(Error::External("telegram error: blocked".to_string()));
            }
            self.replies.lock().unwrap().push((to, html.to_string()));
            Ok(MessageRef {
                chat_id: to.chat_id,
                message_id: MessageId(to.message_id.0 + 1),
            })
        }

        async fn send_chat_action(&self, _chat_id: ChatId, _action: ChatAction) -> Result<()> {
            Ok(())
        }
    }

    /// Replies `echo:<query>` after a short delay and records the contexts it saw.
    struct FakeLlm {
        outcome: Option<CompletionOutcome>,
        delay: Duration,
        contexts: StdMutex<Vec<String>>,
    }

    impl FakeLlm {
        fn echo(delay: Duration) -> Self {
            Self {
                outcome: None,
                delay,
                contexts: StdMutex::new(Vec::new()),
            }
        }

        fn failing(outcome: CompletionOutcome) -> Self {
            Self {
                outcome: Some(outcome),
                delay: Duration::ZERO,
                contexts: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for FakeLlm {
        async fn start(&self) -> Result<()> {
            Ok(())
        }

        async fn close(&self) {}

        async fn complete(&self, query: &str, context: &str) -> CompletionOutcome {
            self.contexts.lock().unwrap().push(context.to_string());
            tokio::time::sleep(self.delay).await;
            self.outcome
                .clone()
                .unwrap_or_else(|| CompletionOutcome::Reply(format!("echo:{query}")))
        }

        async fn list_models(&self) -> Vec<ModelInfo> {
            Vec::new()
        }
    }

    fn inbound(message_id: i32, text: &str) -> InboundMessage {
        InboundMessage {
            chat_id: ChatId(-100),
            message_id: MessageId(message_id),
            user_id: Some(UserId(5)),
            username: Some("alice".to_string()),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn successful_reply_is_sent_and_recorded() {
        let store = Arc::new(ConversationStore::default());
        let llm = Arc::new(FakeLlm::echo(Duration::ZERO));
        let messenger = Arc::new(FakeMessenger::default());
        let relay = Relay::new(store.clone(), llm, messenger.clone());

        let outcome = relay.handle_query(&inbound(3, "@bot hi"), "hi").await.unwrap();
        assert_eq!(outcome, CompletionOutcome::Reply("echo:hi".to_string()));

        let replies = messenger.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0.message_id, MessageId(3));
        assert!(replies[0].1.contains("echo:hi"));
        assert_eq!(store.get_context(ChatId(-100)), "User: hi\nAssistant: echo:hi");
    }

    #[tokio::test]
    async fn failures_are_shown_but_not_remembered() {
        let store = Arc::new(ConversationStore::default());
        let llm = Arc::new(FakeLlm::failing(CompletionOutcome::RateLimited));
        let messenger = Arc::new(FakeMessenger::default());
        let relay = Relay::new(store.clone(), llm, messenger.clone());

        let outcome = relay.handle_query(&inbound(1, "q"), "q").await.unwrap();
        assert_eq!(outcome, CompletionOutcome::RateLimited);
        assert!(messenger.replies()[0]
            .1
            .contains(&CompletionOutcome::RateLimited.user_message()));
        assert_eq!(store.history_len(ChatId(-100)), 0);
    }

    #[tokio::test]
    async fn undelivered_reply_is_not_recorded() {
        let store = Arc::new(ConversationStore::default());
        let llm = Arc::new(FakeLlm::echo(Duration::ZERO));
        let messenger = Arc::new(FakeMessenger {
            fail_replies: true,
            ..Default::default()
        });
        let relay = Relay::new(store.clone(), llm, messenger);

        assert!(relay.handle_query(&inbound(1, "q"), "q").await.is_err());
        assert_eq!(store.history_len(ChatId(-100)), 0);
    }

    #[tokio::test]
    async fn concurrent_queries_in_one_chat_are_serialized() {
        let store = Arc::new(ConversationStore::default());
        let llm = Arc::new(FakeLlm::echo(Duration::from_millis(50)));
        let messenger = Arc::new(FakeMessenger::default());
        let relay = Relay::new(store.clone(), llm.clone(), messenger);

        let a = inbound(1, "first");
        let b = inbound(2, "second");
        let (ra, rb) = tokio::join!(
            relay.handle_query(&a, "first"),
            relay.handle_query(&b, "second")
        );
        ra.unwrap();
        rb.unwrap();

        let contexts = llm.contexts.lock().unwrap().clone();
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0], "");
        assert!(
            contexts[1].contains("Assistant: echo:"),
            "second query must see the first exchange, got {:?}",
            contexts[1]
        );
        assert_eq!(store.history_len(ChatId(-100)), 2);
    }
}
