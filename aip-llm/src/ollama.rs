use crate::traits::{http_to_aip, GenerationOptions, LlmClient, LlmResponse};
use aip_common::{AipError, Provider, Result};
use aip_http::{HttpClient, RequestOpts, RetryPolicy};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

const OLLAMA_CONNECTION_ERROR: &str = "No running Ollama server detected. Start it with: `ollama serve` (after installing). Install instructions: https://github.com/ollama/ollama";

/// Ollama client for local model inference.
///
/// Construction does not contact the server; call [`OllamaClient::ensure_model`]
/// to verify the server and pull a missing model.
pub struct OllamaClient {
    client: HttpClient,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: String) -> Result<Self> {
        let client = HttpClient::new(base_url.trim_end_matches('/'))
            .map_err(|e| AipError::Config(format!("Ollama endpoint: {e}")))?
            .with_timeout(Duration::from_secs(120))
            .with_retry_policy(RetryPolicy::exponential(1));

        Ok(Self {
            client,
            model,
            temperature: None,
            max_tokens: None,
        })
    }

    pub fn with_defaults(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = self.client.with_timeout(timeout);
        self
    }

    /// Verify the server is reachable and pull the model if it is missing.
    pub async fn ensure_model(&self) -> Result<()> {
        let models = self.fetch_available_models().await?;
        if !models.iter().any(|m| m == &self.model) {
            tracing::info!("Model {} not found locally, pulling...", self.model);
            self.pull_model().await?;
        }
        Ok(())
    }

    async fn fetch_available_models(&self) -> Result<Vec<String>> {
        let opts = RequestOpts {
            timeout: Some(Duration::from_secs(10)),
            retry: Some(RetryPolicy::none()),
            ..Default::default()
        };
        let val: JsonValue = self
            .client
            .get_json("api/tags", opts)
            .await
            .map_err(|_| AipError::Provider(OLLAMA_CONNECTION_ERROR.to_string()))?;

        let models = val
            .get("models")
            .and_then(|m| m.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.get("name").and_then(|n| n.as_str()))
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }

    async fn pull_model(&self) -> Result<()> {
        let payload = json!({
            "model": self.model,
            "stream": false
        });
        let opts = RequestOpts {
            timeout: Some(Duration::from_secs(30 * 60)),
            retry: Some(RetryPolicy::none()),
            ..Default::default()
        };
        let _: JsonValue = self
            .client
            .post_json_opts("api/pull", &payload, opts)
            .await
            .map_err(http_to_aip)?;
        tracing::info!("Successfully pulled model: {}", self.model);
        Ok(())
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, prompt: &str, opts: &GenerationOptions) -> Result<LlmResponse> {
        let mut options = serde_json::Map::new();
        if let Some(temp) = opts.temperature.or(self.temperature) {
            options.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tok) = opts.max_tokens.or(self.max_tokens) {
            options.insert("num_predict".to_string(), json!(max_tok));
        }

        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": options
        });

        let val: JsonValue = self
            .client
            .post_json("api/generate", None, &payload)
            .await
            .map_err(http_to_aip)?;

        let text = val
            .get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string);
        let tokens_used = val
            .get("eval_count")
            .and_then(|c| c.as_u64())
            .map(|c| c as u32);

        Ok(LlmResponse::from_text(
            text,
            Some(self.model.clone()),
            tokens_used,
        ))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.fetch_available_models().await.is_ok())
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> Provider {
        Provider::Ollama
    }
}
