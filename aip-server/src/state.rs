use aip_common::{AipError, Result};
use aip_config::{AipConfig, PromptStyle};
use aip_llm::traits::LlmClient;
use aip_store::{ChatStore, PersonaStore};
use std::sync::Arc;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<dyn LlmClient>,
    pub history: Arc<ChatStore>,
    pub personas: Arc<PersonaStore>,
    /// Style used by `POST /server`; the legacy endpoint always uses raw.
    pub prompt_style: PromptStyle,
}

impl AppState {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        history: ChatStore,
        personas: PersonaStore,
        prompt_style: PromptStyle,
    ) -> Self {
        Self {
            llm,
            history: Arc::new(history),
            personas: Arc::new(personas),
            prompt_style,
        }
    }

    /// Build the provider client and stores described by `cfg`, creating the data
    /// directory if needed.
    pub async fn from_config(cfg: &AipConfig) -> Result<Self> {
        let storage = &cfg.storage;
        tokio::fs::create_dir_all(&storage.data_dir)
            .await
            .map_err(|e| {
                AipError::Storage(format!(
                    "create data dir {}: {e}",
                    storage.data_dir.display()
                ))
            })?;

        let llm = aip_llm::build_client(&cfg.llm).await?;
        tracing::info!(
            provider = %llm.provider(),
            model = %llm.model_name(),
            history = %storage.history_path().display(),
            style = ?cfg.prompt.style,
            "state.ready"
        );

        Ok(Self::new(
            llm,
            ChatStore::new(storage.history_path(), storage.max_chats),
            PersonaStore::new(storage.user_info_path(), storage.model_info_path()),
            cfg.prompt.style,
        ))
    }
}
