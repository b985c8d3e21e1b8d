//! Follow-up chat endpoints.

use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures::stream::{self, Stream};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::domain::chat::{ChatMessagesResponse, ChatStreamEvent, SendMessageRequest};
use crate::error::{ApiError, ApiResult};
use crate::services::chat::{self, SharedSession};

fn find_session(state: &AppState, session_id: Uuid) -> ApiResult<SharedSession> {
    state
        .chats
        .get(session_id)
        .ok_or_else(|| ApiError::NotFound("Chat session not found".to_string()))
}

/// GET /chat/:session_id/messages
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let session = find_session(&state, session_id)?;
    let (entry_id, messages) = {
        let session = session.lock();
        (session.entry_id, session.messages().to_vec())
    };

    Ok(DataResponse::new(ChatMessagesResponse {
        session_id,
        entry_id,
        messages,
    }))
}

/// POST /chat/:session_id/messages
///
/// SSE endpoint streaming the reply: `delta` events carry text fragments,
/// followed by one `done` or `error` event.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let client = state.model()?.clone();
    let session = find_session(&state, session_id)?;
    let turn = session.lock().begin_turn(&req.message)?;

    tracing::info!(session_id = %session_id, "Chat message received");

    // The turn runs to completion even if the client disconnects
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(chat::run_turn(client, session, turn, tx));

    let events = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Ok(to_sse(&event)), rx))
    });

    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

fn to_sse(event: &ChatStreamEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event)
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to encode chat event");
            Event::default().event("error")
        })
}
