//! Prompt relay: text in, provider reply out.
use crate::error::ApiError;
use crate::prompt::{build_prompt, PromptParts};
use crate::state::AppState;
use aip_config::PromptStyle;
use aip_store::{Message, Role};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub text: Option<String>,
    /// When it names an existing chat, the exchange is appended to it.
    #[serde(default)]
    pub chat_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub reply: String,
}

/// `POST /server`: prompt in the configured style.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let style = state.prompt_style;
    relay(state, payload, style).await
}

/// `POST /api/process`: legacy endpoint, raw history context only.
pub async fn process(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    relay(state, payload, PromptStyle::Raw).await
}

async fn relay(
    state: AppState,
    payload: Result<Json<ChatRequest>, JsonRejection>,
    style: PromptStyle,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let text = match req.text {
        Some(text) if !text.is_empty() => text,
        _ => return Err(ApiError::BadRequest("Text input is required".into())),
    };
    info!(chars = text.chars().count(), ?style, "chat.received");

    let previous_inputs = state.history.user_inputs().await;
    let (user, model) = match style {
        PromptStyle::Persona => (
            state.personas.user_info().await,
            state.personas.model_info().await,
        ),
        PromptStyle::Raw => (None, None),
    };
    let prompt = build_prompt(
        style,
        &PromptParts {
            text: &text,
            previous_inputs: &previous_inputs,
            user: user.as_ref(),
            model: model.as_ref(),
        },
    );
    tracing::debug!(%prompt, "chat.prompt");

    let reply = state.llm.reply(&prompt).await?;
    info!(
        provider = %state.llm.provider(),
        chars = reply.chars().count(),
        "chat.replied"
    );

    if let Some(chat_id) = req.chat_id.filter(|id| !id.is_empty()) {
        let exchange = vec![Message::now(Role::User, text), Message::now(Role::Ai, &reply)];
        match state.history.append(&chat_id, exchange).await {
            Ok(true) => {}
            Ok(false) => warn!(%chat_id, "chat.unknown_chat_not_recorded"),
            // The reply is still useful to the caller.
            Err(e) => warn!(%chat_id, error = %e, "chat.record_failed"),
        }
    }

    Ok(Json(ChatReply { reply }))
}
