//! Short-term conversation memory: a bounded ring of exchanges per chat.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
};

use crate::domain::ChatId;

pub const DEFAULT_MAX_HISTORY: usize = 10;

/// How many of the most recent exchanges are rendered into the model context.
pub const CONTEXT_EXCHANGES: usize = 5;

/// One user query and the bot's reply to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exchange {
    pub user_message: String,
    pub bot_response: String,
}

/// Per-chat history store.
///
/// Owned by the running service and shared by `Arc`; never a process global.
/// Each call takes the internal lock briefly and never across an `.await`.
/// Serializing a whole read-complete-write cycle per chat is the caller's job
/// (see `relay::ChatLocks`).
#[derive(Debug)]
pub struct ConversationStore {
    max_history: usize,
    chats: Mutex<HashMap<ChatId, VecDeque<Exchange>>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl ConversationStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            chats: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Append an exchange, evicting the oldest ones beyond `max_history`.
    pub fn add_message(&self, chat_id: ChatId, user_message: &str, bot_response: &str) {
        let mut chats = self.lock();
        let history = chats.entry(chat_id).or_default();
        history.push_back(Exchange {
            user_message: user_message.to_string(),
            bot_response: bot_response.to_string(),
        });
        while history.len() > self.max_history {
            history.pop_front();
        }
    }

    /// Render the most recent exchanges as alternating `User:` / `Assistant:` lines.
    ///
    /// Returns an empty string when the chat has no history.
    pub fn get_context(&self, chat_id: ChatId) -> String {
        let chats = self.lock();
        let Some(history) = chats.get(&chat_id) else {
            return String::new();
        };

        let skip = history.len().saturating_sub(CONTEXT_EXCHANGES);
        history
            .iter()
            .skip(skip)
            .flat_map(|ex| {
                [
                    format!("User: {}", ex.user_message),
                    format!("Assistant: {}", ex.bot_response),
                ]
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Drop the chat's history entirely. No-op if absent.
    pub fn clear_history(&self, chat_id: ChatId) {
        self.lock().remove(&chat_id);
    }

    pub fn history_len(&self, chat_id: ChatId) -> usize {
        self.lock().get(&chat_id).map(VecDeque::len).unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChatId, VecDeque<Exchange>>> {
        // A panic mid-update cannot leave a deque half-written; keep serving.
        self.chats.lock().unwrap_or_else(|e| e.into_inner())
    }
}
