//! OpenRouter adapter (chat completions + model listing).
//!
//! Implements `grb-core`'s `CompletionClient` over the OpenAI-compatible
//! `chat/completions` and `models` endpoints.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tokio::sync::Mutex;

use grb_core::{
    completion::{
        build_request, CompletionClient, CompletionConfig, CompletionOutcome, ModelInfo, ModelList,
    },
    errors::Error,
    formatting::truncate_text,
    Result,
};

const LOG_BODY_MAX: usize = 300;

#[derive(Debug)]
enum Transport {
    Uninitialized,
    Started(reqwest::Client),
    Closed,
}

#[derive(Debug)]
pub struct OpenRouterClient {
    cfg: CompletionConfig,
    transport: Mutex<Transport>,
    transports_built: AtomicUsize,
}

impl OpenRouterClient {
    pub fn new(cfg: CompletionConfig) -> Self {
        Self {
            cfg,
            transport: Mutex::new(Transport::Uninitialized),
            transports_built: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.cfg
    }

    fn build_http(&self) -> Result<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", self.cfg.api_key))?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("http-referer"),
            header_value(&self.cfg.referer)?,
        );
        headers.insert(HeaderName::from_static("x-title"), header_value(&self.cfg.title)?);

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.cfg.request_timeout)
            .build()
            .map_err(|e| Error::External(format!("openrouter client build error: {e}")))
    }

    /// The live HTTP client, starting the transport on first use.
    async fn http(&self) -> Result<reqwest::Client> {
        self.start().await?;
        match &*self.transport.lock().await {
            Transport::Started(http) => Ok(http.clone()),
            _ => Err(Error::External("openrouter client is closed".to_string())),
        }
    }

    async fn post_completion(
        &self,
        http: reqwest::Client,
        query: &str,
        context: &str,
    ) -> CompletionOutcome {
        let req = build_request(&self.cfg, query, context);
        tracing::debug!(
            model = %req.model,
            messages = req.messages.len(),
            "sending completion request: {}",
            truncate_text(query, LOG_BODY_MAX)
        );

        let url = self.cfg.chat_completions_url();
        let exchange = async {
            let resp = http.post(&url).json(&req).send().await?;
            let status = resp.status().as_u16();
            let body = resp.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = match tokio::time::timeout(self.cfg.request_timeout, exchange).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                let outcome = classify_transport_error(&e);
                tracing::error!("completion request failed ({outcome}): {e}");
                return outcome;
            }
            Err(_) => {
                tracing::error!(
                    "completion request timed out after {:?}",
                    self.cfg.request_timeout
                );
                return CompletionOutcome::Timeout;
            }
        };

        let outcome = CompletionOutcome::from_http(status, &body);
        match &outcome {
            CompletionOutcome::Reply(text) => {
                tracing::debug!("completion reply: {}", truncate_text(text, LOG_BODY_MAX))
            }
            CompletionOutcome::RateLimited => tracing::warn!("rate limit exceeded"),
            CompletionOutcome::Unauthorized => tracing::error!("invalid API key"),
            CompletionOutcome::Malformed => tracing::error!(
                "unexpected response format: {}",
                truncate_text(&body, LOG_BODY_MAX)
            ),
            other => tracing::error!(
                "completion API error ({other}): {}",
                truncate_text(&body, LOG_BODY_MAX)
            ),
        }
        outcome
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn start(&self) -> Result<()> {
        let mut transport = self.transport.lock().await;
        match &*transport {
            Transport::Started(_) => Ok(()),
            Transport::Closed => Err(Error::External(
                "openrouter client is closed and cannot be restarted".to_string(),
            )),
            Transport::Uninitialized => {
                let http = self.build_http()?;
                *transport = Transport::Started(http);
                let n = self.transports_built.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::info!(model = %self.cfg.model, transport = n, "completion client started");
                Ok(())
            }
        }
    }

    async fn close(&self) {
        let mut transport = self.transport.lock().await;
        if matches!(&*transport, Transport::Started(_)) {
            tracing::info!("completion client closed");
        }
        // Dropping the reqwest client releases its pooled connections.
        *transport = Transport::Closed;
    }

    async fn complete(&self, query: &str, context: &str) -> CompletionOutcome {
        match self.http().await {
            Ok(http) => self.post_completion(http, query, context).await,
            Err(e) => {
                tracing::error!("completion transport unavailable: {e}");
                CompletionOutcome::Unexpected
            }
        }
    }

    async fn list_models(&self) -> Vec<ModelInfo> {
        let http = match self.http().await {
            Ok(http) => http,
            Err(e) => {
                tracing::error!("error getting models: {e}");
                return Vec::new();
            }
        };

        let exchange = async {
            let resp = http.get(self.cfg.models_url()).send().await?;
            let status = resp.status().as_u16();
            let body = resp.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        match tokio::time::timeout(self.cfg.request_timeout, exchange).await {
            Ok(Ok((200, body))) => match serde_json::from_str::<ModelList>(&body) {
                Ok(list) => list.data,
                Err(e) => {
                    tracing::error!("error parsing models list: {e}");
                    Vec::new()
                }
            },
            Ok(Ok((status, body))) => {
                tracing::warn!(
                    "models listing returned {status}: {}",
                    truncate_text(&body, LOG_BODY_MAX)
                );
                Vec::new()
            }
            Ok(Err(e)) => {
                tracing::error!("error getting models: {e}");
                Vec::new()
            }
            Err(_) => {
                tracing::error!("models listing timed out");
                Vec::new()
            }
        }
    }
}

fn header_value(v: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(v).map_err(|e| Error::Config(format!("invalid header value: {e}")))
}

fn classify_transport_error(e: &reqwest::Error) -> CompletionOutcome {
    if e.is_timeout() {
        CompletionOutcome::Timeout
    } else if e.is_builder() {
        CompletionOutcome::Unexpected
    } else {
        CompletionOutcome::Network
    }
}
