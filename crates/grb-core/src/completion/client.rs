use async_trait::async_trait;

use crate::Result;

use super::{
    outcome::CompletionOutcome,
    types::{ChatMessage, CompletionConfig, CompletionRequest, ModelInfo},
};

pub const SYSTEM_PROMPT: &str = "You are a helpful and friendly assistant in a Telegram group chat. \
Answer briefly, clearly and to the point. \
Be polite and help the users. \
If you do not know the answer, say so honestly.";

/// System prompt, then the prior context as one user turn (if any), then the query.
pub fn build_messages(query: &str, context: &str) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
    if !context.is_empty() {
        messages.push(ChatMessage::user(context));
    }
    messages.push(ChatMessage::user(query));
    messages
}

pub fn build_request(cfg: &CompletionConfig, query: &str, context: &str) -> CompletionRequest {
    CompletionRequest {
        model: cfg.model.clone(),
        messages: build_messages(query, context),
        max_tokens: cfg.max_tokens,
        temperature: cfg.temperature,
        stream: false,
    }
}

/// Port for the single remote chat-completion endpoint.
///
/// Lifecycle: `Uninitialized -> Started -> Closed`. `complete` and
/// `list_models` start the transport on demand; nothing reopens a closed
/// client. Callers must `close()` on every shutdown path.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Acquire the HTTP transport. No-op when already started.
    async fn start(&self) -> Result<()>;

    /// Release the transport. No-op when already closed.
    async fn close(&self);

    /// Run one completion and classify the result. Never fails.
    async fn complete(&self, query: &str, context: &str) -> CompletionOutcome;

    /// Models offered by the provider; empty on any failure.
    async fn list_models(&self) -> Vec<ModelInfo>;

    /// Ready-to-display reply text for `query`.
    async fn generate_response(&self, query: &str, context: &str) -> String {
        self.complete(query, context).await.into_user_message()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::completion::types::Role;

    fn cfg() -> CompletionConfig {
        CompletionConfig {
            api_key: "k".to_string(),
            base_url: "https://example.test/api/v1/".to_string(),
            model: "m".to_string(),
            max_tokens: 123,
            temperature: 0.5,
            request_timeout: Duration::from_secs(30),
            referer: "r".to_string(),
            title: "t".to_string(),
        }
    }

    #[test]
    fn empty_context_sends_only_system_and_query() {
        let msgs = build_messages("what is rust?", "");
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[1], ChatMessage::user("what is rust?"));
    }

    #[test]
    fn context_is_a_single_verbatim_user_turn_before_the_query() {
        let ctx = "User: hi\nAssistant: hello";
        let msgs = build_messages("and now?", ctx);
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1], ChatMessage::user(ctx));
        assert_eq!(msgs[2], ChatMessage::user("and now?"));
    }

    #[test]
    fn request_serializes_to_the_wire_shape() {
        let req = build_request(&cfg(), "q", "");
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["model"], "m");
        assert_eq!(v["max_tokens"], 123);
        assert_eq!(v["stream"], false);
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["role"], "user");
        assert_eq!(v["messages"][1]["content"], "q");
        assert!((v["temperature"].as_f64().unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn urls_tolerate_trailing_slash() {
        let c = cfg();
        assert_eq!(
            c.chat_completions_url(),
            "https://example.test/api/v1/chat/completions"
        );
        assert_eq!(c.models_url(), "https://example.test/api/v1/models");
    }
}
