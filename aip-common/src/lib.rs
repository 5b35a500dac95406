//! Types shared by every AI Platform crate.
//!
//! - [`AipError`] and [`Result`]: the error vocabulary handlers map to HTTP responses
//! - [`Provider`]: which upstream inference service a client talks to
//! - [`observability`]: tracing/logging initialisation for binaries and tests
//!
//! ```rust
//! use aip_common::{AipError, Provider};
//!
//! let err = AipError::Upstream { status: 503, body: "loading".into() };
//! assert_eq!(err.to_string(), "Upstream returned 503: loading");
//! assert_eq!(Provider::HuggingFace.as_str(), "huggingface");
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod observability;

/// Upstream LLM inference services the relay can forward to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Groq,
    HuggingFace,
    Ollama,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Groq => "groq",
            Provider::HuggingFace => "huggingface",
            Provider::Ollama => "ollama",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error types used across the relay.
#[derive(thiserror::Error, Debug)]
pub enum AipError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The provider answered with a non-success status. `body` is the provider's
    /// error text, passed on to API callers.
    #[error("Upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The provider could not be reached or its answer could not be read.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Reading or writing a local JSON file failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The caller sent something we cannot act on.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AipError {
    /// Text shown to API callers when the provider failed.
    pub fn upstream_text(&self) -> Option<&str> {
        match self {
            AipError::Upstream { body, .. } => Some(body),
            AipError::Provider(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Convenient alias for results that use [`AipError`].
pub type Result<T> = std::result::Result<T, AipError>;
