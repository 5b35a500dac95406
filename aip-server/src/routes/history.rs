//! Chat history CRUD over the JSON file.
use crate::error::ApiError;
use crate::state::AppState;
use aip_store::Message;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};

const INVALID_SAVE: &str = "Invalid chatId or messages format";

#[derive(Debug, Deserialize)]
pub struct ChatIdQuery {
    #[serde(rename = "chatId")]
    pub chat_id: Option<String>,
}

impl ChatIdQuery {
    fn id(&self) -> Option<&str> {
        self.chat_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// `chatId` distinguishes absent (`None`) from an explicit `null` (`Some(None)`).
#[derive(Debug, Deserialize)]
pub struct SaveHistoryRequest {
    #[serde(default, rename = "chatId", deserialize_with = "present")]
    pub chat_id: Option<Option<String>>,
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
}

fn present<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(d).map(Some)
}

#[derive(Debug, Serialize)]
pub struct Success {
    pub success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedChat {
    pub chat_id: String,
}

/// `GET /server/history`: one chat's messages, or all chat ids.
pub async fn get_history(State(state): State<AppState>, Query(q): Query<ChatIdQuery>) -> Response {
    if let Some(id) = q.id() {
        if let Some(messages) = state.history.messages(id).await {
            return Json(messages).into_response();
        }
    }
    Json(state.history.list_ids().await).into_response()
}

/// `POST /server/history`: `{"chatId": null}` creates a chat, otherwise the
/// given messages replace the chat's contents.
pub async fn save_history(
    State(state): State<AppState>,
    payload: Result<Json<SaveHistoryRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload.map_err(|_| ApiError::BadRequest(INVALID_SAVE.into()))?;

    match req.chat_id {
        Some(None) => {
            let chat_id = state.history.create_chat().await?;
            Ok(Json(CreatedChat { chat_id }).into_response())
        }
        Some(Some(chat_id)) if !chat_id.is_empty() => {
            let messages = req
                .messages
                .ok_or_else(|| ApiError::BadRequest(INVALID_SAVE.into()))?;
            tracing::info!(%chat_id, count = messages.len(), "history.replace");
            state.history.replace(&chat_id, messages).await?;
            Ok(Json(Success { success: true }).into_response())
        }
        _ => Err(ApiError::BadRequest(INVALID_SAVE.into())),
    }
}

/// `DELETE /server/history?chatId=..`
pub async fn delete_history(
    State(state): State<AppState>,
    Query(q): Query<ChatIdQuery>,
) -> Result<Json<Success>, ApiError> {
    let id = q
        .id()
        .ok_or_else(|| ApiError::BadRequest("Chat ID is required".into()))?;
    if state.history.delete(id).await? {
        Ok(Json(Success { success: true }))
    } else {
        Err(ApiError::NotFound("Chat not found".into()))
    }
}
