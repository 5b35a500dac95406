use crate::traits::{http_to_aip, require_token, GenerationOptions, LlmClient, LlmResponse};
use aip_common::{AipError, Provider, Result};
use aip_http::{Auth, HttpClient, RequestOpts, RetryPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Groq's OpenAI-compatible chat completions endpoint.
pub struct GroqClient {
    client: HttpClient,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: Option<u32>,
}

impl GroqClient {
    pub fn new(endpoint: &str, api_key: &str, model: String) -> Result<Self> {
        let api_key = require_token(Provider::Groq, api_key)?;
        let client = HttpClient::new(endpoint)
            .map_err(|e| AipError::Config(format!("Groq endpoint: {e}")))?
            .with_timeout(Duration::from_secs(60))
            .with_retry_policy(RetryPolicy::exponential(2));

        Ok(Self {
            client,
            api_key,
            model,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    pub fn with_defaults(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature.unwrap_or(self.temperature);
        self.max_tokens = max_tokens.unwrap_or(self.max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = self.client.with_timeout(timeout);
        self
    }
}

#[async_trait]
impl LlmClient for GroqClient {
    async fn generate(&self, prompt: &str, opts: &GenerationOptions) -> Result<LlmResponse> {
        let req = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: opts.temperature.unwrap_or(self.temperature),
            max_tokens: opts.max_tokens.unwrap_or(self.max_tokens),
        };

        let resp: ChatCompletionResponse = self
            .client
            .post_json("chat/completions", Some(&self.api_key), &req)
            .await
            .map_err(http_to_aip)?;

        let text = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);

        Ok(LlmResponse::from_text(
            text,
            resp.model.or_else(|| Some(self.model.clone())),
            resp.usage.and_then(|u| u.total_tokens),
        ))
    }

    async fn health_check(&self) -> Result<bool> {
        let opts = RequestOpts {
            timeout: Some(Duration::from_secs(5)),
            retry: Some(RetryPolicy::none()),
            auth: Some(Auth::Bearer(&self.api_key)),
            ..Default::default()
        };
        match self.client.get_json::<serde_json::Value>("models", opts).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Groq health check failed: {}", e);
                Ok(false)
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> Provider {
        Provider::Groq
    }
}
