use std::{env, fs, path::Path, str::FromStr, time::Duration};

use crate::{completion::CompletionConfig, domain::ChatId, errors::Error, Result};

pub const DEFAULT_MODEL: &str = "tngtech/deepseek-r1t-chimera:free";
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_REFERER: &str = "https://github.com/grb-bot/grb";
pub const DEFAULT_TITLE: &str = "Telegram Bot";

/// Typed configuration, loaded once at startup and never mutated.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub group_id: ChatId,

    // Completion provider
    pub openrouter_api_key: String,
    pub openrouter_model: String,
    pub openrouter_base_url: String,
    pub openrouter_referer: String,
    pub openrouter_title: String,

    // LLM settings
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
    pub llm_timeout: Duration,

    // Conversation memory
    pub max_history: usize,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Load from `.env` (if present) and the process environment.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        // Required
        let bot_token = get("BOT_TOKEN").ok_or_else(|| missing("BOT_TOKEN"))?;
        let openrouter_api_key =
            get("OPENROUTER_API_KEY").ok_or_else(|| missing("OPENROUTER_API_KEY"))?;
        let group_id = parse_var::<i64>("GROUP_ID", get("GROUP_ID"))?
            .map(ChatId)
            .ok_or_else(|| missing("GROUP_ID"))?;

        // Provider
        let openrouter_model = get("OPENROUTER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let openrouter_base_url = get("OPENROUTER_BASE_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let openrouter_referer =
            get("OPENROUTER_REFERER").unwrap_or_else(|| DEFAULT_REFERER.to_string());
        let openrouter_title = get("OPENROUTER_TITLE").unwrap_or_else(|| DEFAULT_TITLE.to_string());

        // LLM settings
        let llm_max_tokens = parse_var::<u32>("LLM_MAX_TOKENS", get("LLM_MAX_TOKENS"))?.unwrap_or(500);
        let llm_temperature =
            parse_var::<f32>("LLM_TEMPERATURE", get("LLM_TEMPERATURE"))?.unwrap_or(0.7);
        if !(0.0..=2.0).contains(&llm_temperature) {
            return Err(Error::Config(format!(
                "LLM_TEMPERATURE must be between 0.0 and 2.0, got {llm_temperature}"
            )));
        }
        let llm_timeout = Duration::from_secs(
            parse_var::<u64>("LLM_TIMEOUT_SECS", get("LLM_TIMEOUT_SECS"))?
                .unwrap_or(30)
                .max(1),
        );

        let max_history = parse_var::<usize>("MAX_HISTORY", get("MAX_HISTORY"))?.unwrap_or(10);
        let log_level = get("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            bot_token,
            group_id,
            openrouter_api_key,
            openrouter_model,
            openrouter_base_url,
            openrouter_referer,
            openrouter_title,
            llm_max_tokens,
            llm_temperature,
            llm_timeout,
            max_history,
            log_level,
        })
    }

    /// Settings handed to the completion client.
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            api_key: self.openrouter_api_key.clone(),
            base_url: self.openrouter_base_url.clone(),
            model: self.openrouter_model.clone(),
            max_tokens: self.llm_max_tokens,
            temperature: self.llm_temperature,
            request_timeout: self.llm_timeout,
            referer: self.openrouter_referer.clone(),
            title: self.openrouter_title.clone(),
        }
    }
}

fn missing(key: &str) -> Error {
    Error::Config(format!("{key} environment variable is required"))
}

fn parse_var<T: FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} has an invalid value: {raw:?}")))
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("BOT_TOKEN", "123:abc"),
        ("OPENROUTER_API_KEY", "sk-or-test"),
        ("GROUP_ID", "-1001234"),
    ];

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let cfg = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(cfg.group_id, ChatId(-1001234));
        assert_eq!(cfg.openrouter_model, DEFAULT_MODEL);
        assert_eq!(cfg.openrouter_base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.llm_max_tokens, 500);
        assert!((cfg.llm_temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.llm_timeout, Duration::from_secs(30));
        assert_eq!(cfg.max_history, 10);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn missing_credentials_are_fatal() {
        let err = Config::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
        assert!(err.to_string().contains("BOT_TOKEN"));

        let err = Config::from_lookup(lookup(&[REQUIRED[0], REQUIRED[2]])).unwrap_err();
        assert!(err.to_string().contains("OPENROUTER_API_KEY"));

        let err = Config::from_lookup(lookup(&[REQUIRED[0], REQUIRED[1], ("BOT_TOKEN", "  ")]))
            .unwrap_err();
        assert!(err.to_string().contains("BOT_TOKEN"));
    }

    #[test]
    fn malformed_numbers_name_the_variable() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("LLM_MAX_TOKENS", "lots"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("LLM_MAX_TOKENS"));
    }

    #[test]
    fn temperature_out_of_range_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("LLM_TEMPERATURE", "3.5"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn completion_config_carries_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("OPENROUTER_MODEL", "openai/gpt-4o-mini"),
            ("OPENROUTER_BASE_URL", "http://localhost:8080/v1/"),
            ("LLM_MAX_TOKENS", "3000"),
            ("LLM_TIMEOUT_SECS", "5"),
        ]);
        let cc = Config::from_lookup(lookup(&pairs)).unwrap().completion_config();
        assert_eq!(cc.model, "openai/gpt-4o-mini");
        assert_eq!(cc.base_url, "http://localhost:8080/v1");
        assert_eq!(cc.max_tokens, 3000);
        assert_eq!(cc.request_timeout, Duration::from_secs(5));
        assert_eq!(cc.api_key, "sk-or-test");
    }

    #[test]
    fn dotenv_parsing_strips_quotes_and_comments() {
        let parsed = parse_dotenv("# comment\nBOT_TOKEN=\"abc\"\n\nexport GROUP_ID='-42'\nbroken line\n");
        assert_eq!(
            parsed,
            vec![
                ("BOT_TOKEN".to_string(), "abc".to_string()),
                ("GROUP_ID".to_string(), "-42".to_string()),
            ]
        );
    }
}
