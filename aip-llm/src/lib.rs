//! Upstream LLM providers behind one [`traits::LlmClient`] interface.
//!
//! Groq (OpenAI-compatible chat completions), the Hugging Face Inference API and
//! a local Ollama server. [`build_client`] picks one from an [`LlmConfig`].
//!
//! ```no_run
//! use aip_config::LlmConfig;
//! use aip_llm::build_client;
//!
//! # #[tokio::main]
//! # async fn main() -> aip_common::Result<()> {
//! let client = build_client(&LlmConfig::default()).await?;
//! let reply = client.reply("Say hello").await?;
//! println!("{}: {reply}", client.model_name());
//! # Ok(())
//! # }
//! ```
pub mod groq;
pub mod huggingface;
pub mod ollama;
pub mod traits;

use aip_common::Result;
use aip_config::LlmConfig;
use groq::GroqClient;
use huggingface::HuggingFaceClient;
use ollama::OllamaClient;
use std::sync::Arc;
use std::time::Duration;
use traits::LlmClient;

pub use traits::{GenerationOptions, LlmResponse, NO_RESPONSE};

/// Build the configured client. For Ollama with `pull_missing_model`, the model
/// is pulled before returning.
pub async fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config {
        LlmConfig::Groq {
            model,
            auth_token,
            endpoint,
            temperature,
            max_tokens,
            timeout_secs,
        } => {
            let mut client = GroqClient::new(endpoint, auth_token, model.clone())?
                .with_defaults(*temperature, *max_tokens);
            if let Some(secs) = timeout_secs {
                client = client.with_timeout(Duration::from_secs(*secs));
            }
            Ok(Arc::new(client))
        }
        LlmConfig::HuggingFace {
            model,
            auth_token,
            endpoint,
            temperature,
            max_tokens,
            timeout_secs,
            loading_retries,
            loading_backoff_ms,
        } => {
            let mut client = HuggingFaceClient::new(endpoint, auth_token, model.clone())?
                .with_defaults(*temperature, *max_tokens)
                .with_loading_backoff(*loading_retries, Duration::from_millis(*loading_backoff_ms));
            if let Some(secs) = timeout_secs {
                client = client.with_timeout(Duration::from_secs(*secs));
            }
            Ok(Arc::new(client))
        }
        LlmConfig::Ollama {
            model,
            endpoint,
            temperature,
            max_tokens,
            timeout_secs,
            pull_missing_model,
        } => {
            let mut client =
                OllamaClient::new(endpoint, model.clone())?.with_defaults(*temperature, *max_tokens);
            if let Some(secs) = timeout_secs {
                client = client.with_timeout(Duration::from_secs(*secs));
            }
            if *pull_missing_model {
                client.ensure_model().await?;
            }
            Ok(Arc::new(client))
        }
    }
}
