//! Chat history kept in one JSON object: chat id -> list of messages.
//!
//! Chats keep insertion order; saving drops the oldest chats beyond
//! `max_chats`. Read-modify-write cycles are serialized inside the process by a
//! single-permit semaphore. There is no cross-process locking; the file is
//! replaced wholesale (last write wins).
use aip_common::{AipError, Result};
use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
}

impl Message {
    /// A message stamped with the current UTC time (RFC 3339).
    pub fn now(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

pub type ChatHistory = IndexMap<String, Vec<Message>>;

pub struct ChatStore {
    path: PathBuf,
    max_chats: usize,
    write_limit: Semaphore,
}

impl ChatStore {
    pub fn new(path: impl Into<PathBuf>, max_chats: usize) -> Self {
        Self {
            path: path.into(),
            max_chats: max_chats.max(1),
            write_limit: Semaphore::new(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole history. Anything unreadable reads as empty; chats whose
    /// messages do not parse are skipped.
    pub async fn load(&self) -> ChatHistory {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "history.load.missing");
                return ChatHistory::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "history.load.read_failed");
                return ChatHistory::new();
            }
        };

        // An ordered map, not `Value`: `Value::Object` sorts its keys.
        let obj = match serde_json::from_str::<IndexMap<String, Value>>(&raw) {
            Ok(obj) => obj,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "history.load.invalid_json");
                return ChatHistory::new();
            }
        };

        let mut history = ChatHistory::with_capacity(obj.len());
        for (chat_id, messages) in obj {
            match serde_json::from_value::<Vec<Message>>(messages) {
                Ok(messages) => {
                    history.insert(chat_id, messages);
                }
                Err(e) => warn!(%chat_id, error = %e, "history.load.skip_chat"),
            }
        }
        history
    }

    async fn write(&self, mut history: ChatHistory) -> Result<()> {
        if history.len() > self.max_chats {
            let excess = history.len() - self.max_chats;
            history.drain(..excess);
        }
        let body = serde_json::to_string_pretty(&history)
            .map_err(|e| AipError::Storage(format!("serialize history: {e}")))?;
        // Readers outside the permit must never observe a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| AipError::Storage(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            AipError::Storage(format!("replace {}: {e}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), chats = history.len(), "history.saved");
        Ok(())
    }

    /// Apply `f` to the current history and save the result.
    async fn modify<T>(&self, f: impl FnOnce(&mut ChatHistory) -> T) -> Result<T> {
        let _permit = self
            .write_limit
            .acquire()
            .await
            .map_err(|e| AipError::Storage(format!("history lock closed: {e}")))?;
        let mut history = self.load().await;
        let out = f(&mut history);
        self.write(history).await?;
        Ok(out)
    }

    /// Save `history` as-is (trimmed to `max_chats`).
    pub async fn save(&self, history: ChatHistory) -> Result<()> {
        let _permit = self
            .write_limit
            .acquire()
            .await
            .map_err(|e| AipError::Storage(format!("history lock closed: {e}")))?;
        self.write(history).await
    }

    /// Start an empty chat and return its id.
    pub async fn create_chat(&self) -> Result<String> {
        let chat_id = Uuid::new_v4().to_string();
        let id = chat_id.clone();
        self.modify(move |h| {
            h.insert(id, Vec::new());
        })
        .await?;
        info!(%chat_id, "history.chat_created");
        Ok(chat_id)
    }

    pub async fn list_ids(&self) -> Vec<String> {
        self.load().await.into_keys().collect()
    }

    pub async fn messages(&self, chat_id: &str) -> Option<Vec<Message>> {
        self.load().await.shift_remove(chat_id)
    }

    /// Overwrite (or create) a chat's messages.
    pub async fn replace(&self, chat_id: &str, messages: Vec<Message>) -> Result<()> {
        self.modify(|h| {
            h.insert(chat_id.to_string(), messages);
        })
        .await
    }

    /// Returns `false` when the chat does not exist.
    pub async fn delete(&self, chat_id: &str) -> Result<bool> {
        let _permit = self
            .write_limit
            .acquire()
            .await
            .map_err(|e| AipError::Storage(format!("history lock closed: {e}")))?;
        let mut history = self.load().await;
        if history.shift_remove(chat_id).is_none() {
            return Ok(false);
        }
        self.write(history).await?;
        info!(%chat_id, "history.chat_deleted");
        Ok(true)
    }

    /// Append to an existing chat. Returns `false` (and writes nothing) when the
    /// chat does not exist.
    pub async fn append(&self, chat_id: &str, messages: Vec<Message>) -> Result<bool> {
        let _permit = self
            .write_limit
            .acquire()
            .await
            .map_err(|e| AipError::Storage(format!("history lock closed: {e}")))?;
        let mut history = self.load().await;
        match history.get_mut(chat_id) {
            Some(existing) => existing.extend(messages),
            None => return Ok(false),
        }
        self.write(history).await?;
        Ok(true)
    }

    /// Every user message across all chats, in file order.
    pub async fn user_inputs(&self) -> Vec<String> {
        self.load()
            .await
            .into_values()
            .flatten()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content)
            .collect()
    }
}
