//! Assessment history endpoints.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, NoContent};
use crate::app::AppState;
use crate::domain::assessment::{
    ChatSessionResponse, HistoryClearedResponse, HistoryEntry, HistoryEntryResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::parser::{parse_report, project};

fn find_entry(state: &AppState, entry_id: Uuid) -> ApiResult<HistoryEntry> {
    state
        .history
        .find(entry_id)
        .ok_or_else(|| ApiError::NotFound("History entry not found".to_string()))
}

/// GET /history
pub async fn list_history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    DataResponse::new(state.history.entries())
}

/// Load a past assessment with its report re-parsed.
///
/// GET /history/:entry_id
pub async fn get_history_entry(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let entry = find_entry(&state, entry_id)?;
    let report = project(&entry.result.text, &parse_report(&entry.result.text));

    Ok(DataResponse::new(HistoryEntryResponse { entry, report }))
}

/// Open a new chat session about a past assessment.
///
/// POST /history/:entry_id/chat
pub async fn open_chat(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.model()?;
    let entry = find_entry(&state, entry_id)?;
    let chat_session_id = state.chats.open(Some(entry.id), &entry.result.text);

    Ok(Created(DataResponse::new(ChatSessionResponse {
        entry_id,
        chat_session_id,
    })))
}

/// DELETE /history/:entry_id
pub async fn delete_history_entry(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
) -> ApiResult<NoContent> {
    if state.history.remove(entry_id).await {
        tracing::info!(entry_id = %entry_id, "History entry deleted");
        Ok(NoContent)
    } else {
        Err(ApiError::NotFound("History entry not found".to_string()))
    }
}

/// DELETE /history
pub async fn clear_history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let deleted = state.history.clear().await;
    tracing::info!(deleted = deleted, "History cleared");

    DataResponse::new(HistoryClearedResponse { deleted })
}
