//! Configuration for the relay: YAML file + `AIP__` environment overlays.
//!
//! Every section has defaults, so an empty document is a valid configuration
//! (Ollama on localhost, files in the working directory). Example `aip.yaml`:
//!
//! ```yaml
//! server:
//!   bind: "0.0.0.0:3000"
//!   allowed_origin: "http://localhost:5173"
//! storage:
//!   data_dir: "./data"
//!   max_chats: 10
//! prompt:
//!   style: persona
//! llm:
//!   provider: groq
//!   auth_token: "${GROQ_API_KEY}"
//! logging:
//!   format: json
//! ```
//!
//! Precedence, lowest first: built-in defaults, YAML sources in the order they
//! were added, then `AIP__SECTION__KEY` environment variables. String values
//! may reference `${VAR}`; references are expanded recursively.
use aip_common::observability::LogFormat;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "AIP";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AipConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub prompt: PromptConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Origin allowed by CORS (the SvelteKit dev server by default).
    pub allowed_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".into(),
            allowed_origin: "http://localhost:5173".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub history_file: String,
    pub user_info_file: String,
    pub model_info_file: String,
    /// Chats kept in the history file; older ones are dropped on save.
    pub max_chats: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            history_file: "user_history.json".into(),
            user_info_file: "user_information.json".into(),
            model_info_file: "model_information.json".into(),
            max_chats: 10,
        }
    }
}

impl StorageConfig {
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(&self.history_file)
    }

    pub fn user_info_path(&self) -> PathBuf {
        self.data_dir.join(&self.user_info_file)
    }

    pub fn model_info_path(&self) -> PathBuf {
        self.data_dir.join(&self.model_info_file)
    }
}

/// How the conversation context is rendered into the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStyle {
    /// Previous user inputs only.
    Raw,
    /// Model persona and user profile, then previous user inputs.
    #[default]
    Persona,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub style: PromptStyle,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub emit_stderr: bool,
    pub dir: Option<PathBuf>,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            emit_stderr: true,
            dir: None,
            filter: "info,tower_http=debug".into(),
        }
    }
}

/// Upstream provider selection, tagged by `provider`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum LlmConfig {
    Groq {
        #[serde(default = "default_groq_model")]
        model: String,
        auth_token: String,
        #[serde(default = "default_groq_endpoint")]
        endpoint: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
    HuggingFace {
        #[serde(default = "default_hf_model")]
        model: String,
        auth_token: String,
        #[serde(default = "default_hf_endpoint")]
        endpoint: String,
        #[serde(default)]
        temperature: Option<f32>,
        /// Sent as `parameters.max_length`.
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default)]
        timeout_secs: Option<u64>,
        /// Retries while the hosted model answers 503 (loading).
        #[serde(default = "default_loading_retries")]
        loading_retries: usize,
        #[serde(default = "default_loading_backoff_ms")]
        loading_backoff_ms: u64,
    },
    Ollama {
        #[serde(default = "default_ollama_model")]
        model: String,
        #[serde(default = "default_ollama_endpoint")]
        endpoint: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default)]
        timeout_secs: Option<u64>,
        /// Pull the model at startup when the server does not have it.
        #[serde(default)]
        pull_missing_model: bool,
    },
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig::Ollama {
            model: default_ollama_model(),
            endpoint: default_ollama_endpoint(),
            temperature: None,
            max_tokens: None,
            timeout_secs: None,
            pull_missing_model: false,
        }
    }
}

pub fn default_groq_model() -> String {
    "meta-llama/llama-4-scout-17b-16e-instruct".into()
}
pub fn default_groq_endpoint() -> String {
    "https://api.groq.com/openai/v1".into()
}
pub fn default_hf_model() -> String {
    "Qwen/Qwen2-7B-Instruct".into()
}
pub fn default_hf_endpoint() -> String {
    "https://api-inference.huggingface.co".into()
}
pub fn default_ollama_model() -> String {
    "llama3.2:3b".into()
}
pub fn default_ollama_endpoint() -> String {
    "http://localhost:11434".into()
}
fn default_loading_retries() -> usize {
    3
}
fn default_loading_backoff_ms() -> u64 {
    5000
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => break,
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Collects YAML sources; environment overrides are layered last in [`load`].
///
/// [`load`]: AipConfigLoader::load
pub struct AipConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_prefix: Option<&'static str>,
}

impl Default for AipConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl AipConfigLoader {
    /// YAML sources plus `AIP__` environment overrides.
    ///
    /// ```
    /// use aip_config::{AipConfigLoader, PromptStyle};
    ///
    /// let cfg = AipConfigLoader::new()
    ///     .without_env()
    ///     .with_yaml_str("prompt:\n  style: raw")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(cfg.prompt.style, PromptStyle::Raw);
    /// assert_eq!(cfg.storage.max_chats, 10);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env_prefix: Some(ENV_PREFIX),
        }
    }

    /// Skip environment overrides.
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Attach a config file that must exist; the format is inferred from the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a config file that may be absent, for deployments driven purely by
    /// environment variables.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use aip_config::{AipConfigLoader, LlmConfig};
    ///
    /// let cfg = AipConfigLoader::new()
    ///     .without_env()
    ///     .with_yaml_str(
    ///         r#"
    /// llm:
    ///   provider: huggingface
    ///   auth_token: "hf_example"
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// match cfg.llm {
    ///     LlmConfig::HuggingFace { model, loading_retries, .. } => {
    ///         assert_eq!(model, "Qwen/Qwen2-7B-Instruct");
    ///         assert_eq!(loading_retries, 3);
    ///     }
    ///     other => panic!("unexpected provider: {other:?}"),
    /// }
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` references, and deserialize.
    pub fn load(self) -> Result<AipConfig, ConfigError> {
        let mut builder = self.builder;
        if let Some(prefix) = self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            );
        }
        let cfg = builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
