//! Detecting `@botname` mentions and extracting the query around them.

use regex::{Regex, RegexBuilder};

use crate::{errors::Error, Result};

/// Matches `@<username>` followed by whitespace or end of text, case-insensitively.
#[derive(Clone, Debug)]
pub struct MentionMatcher {
    username: String,
    re: Regex,
}

impl MentionMatcher {
    pub fn new(username: &str) -> Result<Self> {
        let username = username.trim().trim_start_matches('@').to_lowercase();
        if username.is_empty() {
            return Err(Error::Config("bot username is empty".to_string()));
        }

        let re = RegexBuilder::new(&format!(r"@{}(?:\s+|$)", regex::escape(&username)))
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Config(format!("invalid mention pattern: {e}")))?;

        Ok(Self { username, re })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_mentioned(&self, text: &str) -> bool {
        self.re.is_match(text)
    }

    /// `None` if the bot is not addressed; otherwise the text with every mention
    /// removed and trimmed (possibly empty).
    pub fn extract_query(&self, text: &str) -> Option<String> {
        if !self.is_mentioned(text) {
            return None;
        }
        Some(self.re.replace_all(text, "").trim().to_string())
    }
}
