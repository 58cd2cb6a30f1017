use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::warn;

use outbound_core::config::{LlmConfig, LlmProvider};
use outbound_core::errors::{ApplicationError, GenerationError};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Builds the client selected by `llm.provider`, wrapped with retries.
/// Missing credentials are a configuration error, not a transport one.
pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, ApplicationError> {
    config.ensure_credentials().map_err(ApplicationError::Configuration)?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|error| ApplicationError::Configuration(format!("http client: {error}")))?;
    let base_url = config.effective_base_url().to_string();

    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::Anthropic => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ApplicationError::Configuration("llm.api_key is not set".to_string())
            })?;
            Arc::new(AnthropicClient {
                http,
                base_url,
                api_key,
                model: config.model.clone(),
                max_tokens: config.max_tokens,
            })
        }
        LlmProvider::Ollama => {
            Arc::new(OllamaClient { http, base_url, model: config.model.clone() })
        }
    };

    Ok(Arc::new(RetryingClient::new(client, config.max_retries)))
}

pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self { http, base_url: base_url.into(), api_key, model: model.into(), max_tokens }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let payload = read_json(response).await?;
        anthropic_text(&payload)
    }
}

pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into(), model: model.into() }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = json!({ "model": self.model, "prompt": prompt, "stream": false });

        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let payload = read_json(response).await?;
        ollama_text(&payload)
    }
}

/// Retries transport failures and timeouts with a linear backoff. Parse and
/// empty-response failures are returned immediately.
pub struct RetryingClient {
    inner: Arc<dyn LlmClient>,
    max_retries: u32,
    backoff: Duration,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn LlmClient>, max_retries: u32) -> Self {
        Self { inner, max_retries, backoff: Duration::from_millis(500) }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

#[async_trait]
impl LlmClient for RetryingClient {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(prompt).await {
                Err(error @ (GenerationError::Transport(_) | GenerationError::Timeout { .. }))
                    if attempt < self.max_retries =>
                {
                    attempt += 1;
                    warn!(
                        event_name = "generation.llm.retry",
                        attempt,
                        max_retries = self.max_retries,
                        error = %error,
                        "llm call failed, retrying"
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                result => return result,
            }
        }
    }
}

fn transport_error(error: reqwest::Error) -> GenerationError {
    GenerationError::Transport(error.to_string())
}

async fn read_json(response: reqwest::Response) -> Result<Value, GenerationError> {
    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(GenerationError::Transport(format!("provider returned HTTP {status}: {detail}")));
    }
    response
        .json::<Value>()
        .await
        .map_err(|error| GenerationError::Parse(format!("response body: {error}")))
}

fn anthropic_text(payload: &Value) -> Result<String, GenerationError> {
    let text = payload
        .get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| blocks.iter().find_map(|block| block.get("text").and_then(Value::as_str)))
        .ok_or(GenerationError::EmptyResponse)?;
    non_empty(text)
}

fn ollama_text(payload: &Value) -> Result<String, GenerationError> {
    let text = payload.get("response").and_then(Value::as_str).ok_or(GenerationError::EmptyResponse)?;
    non_empty(text)
}

fn non_empty(text: &str) -> Result<String, GenerationError> {
    if text.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use outbound_core::config::{AppConfig, LlmProvider};
    use outbound_core::errors::{ApplicationError, GenerationError};

    use super::{anthropic_text, client_from_config, ollama_text, LlmClient, RetryingClient};

    struct Flaky {
        failures: u32,
        error: GenerationError,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmClient for Flaky {
        async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(self.error.clone());
            }
            Ok("ok".to_string())
        }
    }

    #[test]
    fn anthropic_payload_yields_first_text_block() {
        let payload = json!({
            "content": [{ "type": "text", "text": "{\"summary\":\"x\"}" }],
            "usage": { "input_tokens": 10, "output_tokens": 4 }
        });
        assert_eq!(anthropic_text(&payload), Ok("{\"summary\":\"x\"}".to_string()));
        assert_eq!(anthropic_text(&json!({ "content": [] })), Err(GenerationError::EmptyResponse));
    }

    #[test]
    fn ollama_payload_yields_response_field() {
        assert_eq!(ollama_text(&json!({ "response": "hi", "done": true })), Ok("hi".to_string()));
        assert_eq!(ollama_text(&json!({ "response": "  " })), Err(GenerationError::EmptyResponse));
    }

    #[tokio::test]
    async fn transport_failures_are_retried_up_to_the_limit() {
        let flaky = Arc::new(Flaky {
            failures: 2,
            error: GenerationError::Transport("connection reset".to_string()),
            calls: AtomicU32::new(0),
        });
        let client = RetryingClient::new(flaky.clone(), 2).with_backoff(Duration::from_millis(1));
        assert_eq!(client.complete("prompt").await, Ok("ok".to_string()));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);

        let exhausted = Arc::new(Flaky {
            failures: 5,
            error: GenerationError::Transport("connection reset".to_string()),
            calls: AtomicU32::new(0),
        });
        let client = RetryingClient::new(exhausted.clone(), 1).with_backoff(Duration::from_millis(1));
        assert!(matches!(client.complete("prompt").await, Err(GenerationError::Transport(_))));
        assert_eq!(exhausted.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn parse_failures_are_not_retried() {
        let flaky = Arc::new(Flaky {
            failures: 1,
            error: GenerationError::Parse("bad json".to_string()),
            calls: AtomicU32::new(0),
        });
        let client = RetryingClient::new(flaky.clone(), 3).with_backoff(Duration::from_millis(1));
        assert!(matches!(client.complete("prompt").await, Err(GenerationError::Parse(_))));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_anthropic_key_is_a_configuration_error() {
        let mut config = AppConfig::default().llm;
        config.api_key = None;
        assert!(matches!(client_from_config(&config), Err(ApplicationError::Configuration(_))));

        config.provider = LlmProvider::Ollama;
        assert!(client_from_config(&config).is_ok());
    }
}
