use aip_common::{AipError, Provider, Result};
use aip_http::HttpError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Reply used when a provider answers successfully but without text.
pub const NO_RESPONSE: &str = "No response generated";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
}

impl LlmResponse {
    /// Build a response, substituting [`NO_RESPONSE`] for blank text.
    pub fn from_text(text: Option<String>, model: Option<String>, tokens_used: Option<u32>) -> Self {
        let text = text
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| NO_RESPONSE.to_string());
        Self {
            text,
            model,
            tokens_used,
        }
    }
}

/// Per-call overrides; `None` falls back to the client's configured defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one prompt and return the provider's reply.
    async fn generate(&self, prompt: &str, opts: &GenerationOptions) -> Result<LlmResponse>;

    /// Check if the provider is reachable.
    async fn health_check(&self) -> Result<bool>;

    fn model_name(&self) -> &str;

    fn provider(&self) -> Provider;

    /// Generate with the configured defaults and return only the text.
    async fn reply(&self, prompt: &str) -> Result<String> {
        let response = self.generate(prompt, &GenerationOptions::default()).await?;
        tracing::debug!(
            provider = %self.provider(),
            model = %self.model_name(),
            tokens = ?response.tokens_used,
            "llm.reply"
        );
        Ok(response.text)
    }
}

/// Map transport failures into the shared error type. Non-success statuses keep
/// the provider's body so callers can surface it.
pub(crate) fn http_to_aip(e: HttpError) -> AipError {
    match e {
        HttpError::Api { status, body, .. } => AipError::Upstream {
            status: status.as_u16(),
            body,
        },
        other => AipError::Provider(other.to_string()),
    }
}

/// Hosted providers need a real key; an unexpanded `${VAR}` counts as missing.
pub(crate) fn require_token(provider: Provider, token: &str) -> Result<String> {
    let trimmed = token.trim();
    if trimmed.is_empty() || trimmed.starts_with("${") {
        return Err(AipError::Config(format!("{provider} API key is not set")));
    }
    Ok(trimmed.to_string())
}
