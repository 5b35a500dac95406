use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Profile of the person chatting, from the `user_information` key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub personality: Vec<String>,
    pub interests: Vec<String>,
    pub location: String,
    pub tone_preference: String,
}

/// Persona the model speaks as, from the `model_information` key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelInfo {
    pub name: String,
    pub alias: String,
    pub description: String,
    pub tone: String,
}

pub struct PersonaStore {
    user_path: PathBuf,
    model_path: PathBuf,
}

impl PersonaStore {
    pub fn new(user_path: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            user_path: user_path.into(),
            model_path: model_path.into(),
        }
    }

    pub async fn user_info(&self) -> Option<UserInfo> {
        read_section(&self.user_path, "user_information").await
    }

    pub async fn model_info(&self) -> Option<ModelInfo> {
        read_section(&self.model_path, "model_information").await
    }
}

/// Read `path` and deserialize the object under `key`. Files are re-read on every
/// call so edits apply without a restart.
async fn read_section<T: DeserializeOwned>(path: &Path, key: &str) -> Option<T> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "persona.read_failed");
            return None;
        }
    };
    let section = match serde_json::from_str::<Value>(&raw) {
        Ok(mut v) => v.get_mut(key).map(Value::take),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "persona.invalid_json");
            return None;
        }
    };
    match section {
        Some(v @ Value::Object(_)) => serde_json::from_value(v)
            .map_err(|e| warn!(path = %path.display(), %key, error = %e, "persona.invalid_section"))
            .ok(),
        _ => {
            warn!(path = %path.display(), %key, "persona.missing_section");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_nested_sections() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user.json");
        let model = dir.path().join("model.json");
        tokio::fs::write(
            &user,
            r#"{"user_information":{"name":"Ada","age":36,"gender":"f",
                "personality":["curious"],"interests":["math"],
                "location":"London","tone_preference":"warm"}}"#,
        )
        .await
        .unwrap();
        tokio::fs::write(
            &model,
            r#"{"model_information":{"name":"Nova","alias":"N","description":"a helper","tone":"calm"}}"#,
        )
        .await
        .unwrap();

        let store = PersonaStore::new(&user, &model);
        let u = store.user_info().await.unwrap();
        assert_eq!(u.name, "Ada");
        assert_eq!(u.age, 36);
        assert_eq!(u.personality, vec!["curious".to_string()]);
        let m = store.model_info().await.unwrap();
        assert_eq!(m.alias, "N");
    }

    #[tokio::test]
    async fn missing_or_malformed_files_read_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        tokio::fs::write(&bad, "{not json").await.unwrap();
        let wrong_key = dir.path().join("wrong.json");
        tokio::fs::write(&wrong_key, r#"{"something_else":{}}"#)
            .await
            .unwrap();

        assert!(PersonaStore::new(dir.path().join("absent.json"), &bad)
            .user_info()
            .await
            .is_none());
        assert!(PersonaStore::new(&bad, &bad).model_info().await.is_none());
        assert!(PersonaStore::new(&wrong_key, &wrong_key)
            .user_info()
            .await
            .is_none());
    }
}
