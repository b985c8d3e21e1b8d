//! Assessment and history domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::parser::ReportView;

/// An uploaded photograph, kept as a data URL so it can be stored and re-sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadedImage {
    pub id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    /// `data:<mime>;base64,<payload>`
    pub preview: String,
}

/// Raw model output for one assessment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EstimationResult {
    pub text: String,
}

/// One past assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub images: Vec<UploadedImage>,
    pub result: EstimationResult,
    pub prompt_text: String,
}

impl HistoryEntry {
    pub fn new(images: Vec<UploadedImage>, text: String, prompt_text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            images,
            result: EstimationResult { text },
            prompt_text,
        }
    }
}

// =============================================================================
// Request/Response DTOs for API endpoints
// =============================================================================

/// Response for a completed assessment.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentResponse {
    pub entry: HistoryEntry,
    pub report: ReportView,
    pub chat_session_id: Uuid,
}

/// Request to parse arbitrary response text.
#[derive(Debug, Clone, Deserialize)]
pub struct ParseReportRequest {
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportFormatQuery {
    #[serde(default)]
    pub format: Option<String>,
}

/// Loaded history entry with its display view.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntryResponse {
    pub entry: HistoryEntry,
    pub report: ReportView,
}

/// Chat session opened for a history entry.
#[derive(Debug, Clone, Serialize)]
pub struct ChatSessionResponse {
    pub entry_id: Uuid,
    pub chat_session_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryClearedResponse {
    pub deleted: usize,
}
