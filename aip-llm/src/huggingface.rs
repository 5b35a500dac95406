//! Hugging Face Inference API (text generation).
//!
//! Hosted models answer `503` with `{"error": "... is currently loading"}` while
//! they warm up, so requests retry on 503 with a fixed delay.
use crate::traits::{http_to_aip, require_token, GenerationOptions, LlmClient, LlmResponse};
use aip_common::{AipError, Provider, Result};
use aip_http::{Auth, HttpClient, RequestOpts, RetryPolicy};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_LENGTH: u32 = 150;

pub struct HuggingFaceClient {
    client: HttpClient,
    api_key: String,
    model: String,
    temperature: f32,
    max_length: u32,
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_length: u32,
    temperature: f32,
}

impl HuggingFaceClient {
    pub fn new(endpoint: &str, api_key: &str, model: String) -> Result<Self> {
        let api_key = require_token(Provider::HuggingFace, api_key)?;
        let client = HttpClient::new(endpoint)
            .map_err(|e| AipError::Config(format!("Hugging Face endpoint: {e}")))?
            .with_timeout(Duration::from_secs(60))
            .with_retry_policy(RetryPolicy::fixed_on_503(3, Duration::from_secs(5)));

        Ok(Self {
            client,
            api_key,
            model,
            temperature: DEFAULT_TEMPERATURE,
            max_length: DEFAULT_MAX_LENGTH,
        })
    }

    /// Retry budget and delay used while the model is loading.
    pub fn with_loading_backoff(mut self, retries: usize, delay: Duration) -> Self {
        self.client = self
            .client
            .with_retry_policy(RetryPolicy::fixed_on_503(retries, delay));
        self
    }

    pub fn with_defaults(mut self, temperature: Option<f32>, max_length: Option<u32>) -> Self {
        self.temperature = temperature.unwrap_or(self.temperature);
        self.max_length = max_length.unwrap_or(self.max_length);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = self.client.with_timeout(timeout);
        self
    }

    fn model_path(&self) -> String {
        format!("models/{}", self.model)
    }
}

/// `[{"generated_text": ..}]` or `{"generated_text": ..}`.
fn generated_text(val: &JsonValue) -> Option<String> {
    let item = match val {
        JsonValue::Array(items) => items.first()?,
        other => other,
    };
    item.get("generated_text")
        .and_then(|t| t.as_str())
        .map(str::to_string)
}

#[async_trait]
impl LlmClient for HuggingFaceClient {
    async fn generate(&self, prompt: &str, opts: &GenerationOptions) -> Result<LlmResponse> {
        let req = InferenceRequest {
            inputs: prompt,
            parameters: InferenceParameters {
                max_length: opts.max_tokens.unwrap_or(self.max_length),
                temperature: opts.temperature.unwrap_or(self.temperature),
            },
        };

        let val: JsonValue = self
            .client
            .post_json(&self.model_path(), Some(&self.api_key), &req)
            .await
            .map_err(http_to_aip)?;

        Ok(LlmResponse::from_text(
            generated_text(&val),
            Some(self.model.clone()),
            None,
        ))
    }

    async fn health_check(&self) -> Result<bool> {
        let opts = RequestOpts {
            timeout: Some(Duration::from_secs(5)),
            retry: Some(RetryPolicy::none()),
            auth: Some(Auth::Bearer(&self.api_key)),
            ..Default::default()
        };
        let path = format!("status/{}", self.model);
        match self.client.get_json::<JsonValue>(&path, opts).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Hugging Face health check failed: {}", e);
                Ok(false)
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> Provider {
        Provider::HuggingFace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_array_and_object_shapes() {
        assert_eq!(
            generated_text(&json!([{ "generated_text": "a" }])).as_deref(),
            Some("a")
        );
        assert_eq!(
            generated_text(&json!({ "generated_text": "b" })).as_deref(),
            Some("b")
        );
        assert_eq!(generated_text(&json!([])), None);
        assert_eq!(generated_text(&json!({ "other": 1 })), None);
    }
}
