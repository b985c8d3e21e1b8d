//! Assessment endpoint: photographs in, structured survey report out.

use axum::{
    extract::{Multipart, State},
    http::HeaderMap,
    response::IntoResponse,
};
use std::sync::Arc;

use crate::api::{Created, DataResponse};
use crate::app::AppState;
use crate::domain::assessment::{AssessmentResponse, HistoryEntry, UploadedImage};
use crate::error::{ApiError, ApiResult};
use crate::middleware::request_id::request_id;
use crate::parser::{parse_report, project};
use crate::services::uploads;

/// Run a demolition survey on uploaded photographs.
///
/// POST /assessments (multipart, repeated `images` file field)
///
/// On success the result is recorded in history and a chat session is
/// opened for follow-up questions. On failure nothing is recorded and the
/// client may resubmit the same images.
pub async fn create_assessment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let client = state.model()?;
    let images =
        uploads::read_images(multipart, state.settings.max_images_per_assessment).await?;

    let blobs = images
        .iter()
        .map(UploadedImage::inline_data)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("Uploaded image is not a data URL")))?;

    tracing::info!(
        request_id = request_id(&headers),
        images = images.len(),
        model = client.model(),
        "Requesting assessment"
    );

    let prompt = state.settings.assessment_prompt.clone();
    let text = client
        .generate_content(&prompt, &blobs)
        .await
        .map_err(|e| ApiError::Upstream(format!("現調中にエラーが発生しました: {}", e.user_message())))?;

    let sections = parse_report(&text);
    let report = project(&text, &sections);

    let entry = HistoryEntry::new(images, text, prompt);
    let chat_session_id = state.chats.open(Some(entry.id), &entry.result.text);
    state.history.record(entry.clone()).await;

    tracing::info!(
        entry_id = %entry.id,
        sections = sections.len(),
        chat_session_id = %chat_session_id,
        "Assessment completed"
    );

    Ok(Created(DataResponse::new(AssessmentResponse {
        entry,
        report,
        chat_session_id,
    })))
}
