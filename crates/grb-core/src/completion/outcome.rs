use std::fmt;

use super::types::CompletionResponse;

/// Classified result of one completion call.
///
/// Every transport and provider result lands in exactly one variant, and
/// `user_message` is the only place that turns a variant into chat text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Trimmed content of the first choice.
    Reply(String),
    /// 200, but no usable choice in the body.
    Malformed,
    /// 429.
    RateLimited,
    /// 401.
    Unauthorized,
    /// Any other non-200 status.
    HttpStatus(u16),
    /// The request hit the timeout ceiling.
    Timeout,
    /// Connection or other transport-level failure.
    Network,
    /// Anything else (closed client, transport could not be built).
    Unexpected,
}

impl CompletionOutcome {
    /// Classify an HTTP status and body.
    pub fn from_http(status: u16, body: &str) -> Self {
        match status {
            200 => Self::from_success_body(body),
            429 => Self::RateLimited,
            401 => Self::Unauthorized,
            other => Self::HttpStatus(other),
        }
    }

    fn from_success_body(body: &str) -> Self {
        let Ok(parsed) = serde_json::from_str::<CompletionResponse>(body) else {
            return Self::Malformed;
        };

        let content = parsed
            .choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.message)
            .and_then(|message| message.content);

        match content.map(|c| c.trim().to_string()) {
            Some(text) if !text.is_empty() => Self::Reply(text),
            _ => Self::Malformed,
        }
    }

    pub fn is_reply(&self) -> bool {
        matches!(self, Self::Reply(_))
    }

    /// User-safe text for this outcome.
    pub fn user_message(&self) -> String {
        match self {
            Self::Reply(text) => text.clone(),
            Self::Malformed => {
                "Sorry, something went wrong while processing your request.".to_string()
            }
            Self::RateLimited => {
                "Sorry, there are too many requests right now. Please try again later.".to_string()
            }
            Self::Unauthorized => {
                "Sorry, there is a problem with the bot configuration. Please contact the administrator."
                    .to_string()
            }
            Self::HttpStatus(code) => format!(
                "Sorry, we are having temporary technical problems. (Error code: {code})"
            ),
            Self::Timeout => {
                "Sorry, the response took too long. Please try again later.".to_string()
            }
            Self::Network => "Sorry, a network error occurred. Please try again later.".to_string(),
            Self::Unexpected => "Sorry, an unexpected error occurred.".to_string(),
        }
    }

    pub fn into_user_message(self) -> String {
        match self {
            Self::Reply(text) => text,
            other => other.user_message(),
        }
    }
}

impl fmt::Display for CompletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reply(text) => write!(f, "reply ({} chars)", text.chars().count()),
            Self::Malformed => f.write_str("malformed response"),
            Self::RateLimited => f.write_str("rate limited (429)"),
            Self::Unauthorized => f.write_str("unauthorized (401)"),
            Self::HttpStatus(code) => write!(f, "http status {code}"),
            Self::Timeout => f.write_str("timeout"),
            Self::Network => f.write_str("network error"),
            Self::Unexpected => f.write_str("unexpected error"),
        }
    }
}
