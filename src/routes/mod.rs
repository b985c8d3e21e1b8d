pub mod assessments;
pub mod chat;
pub mod health;
pub mod history;
pub mod reports;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        // Assessments
        .route("/assessments", post(assessments::create_assessment))
        .route("/reports/parse", post(reports::parse))
        // History
        .route(
            "/history",
            get(history::list_history).delete(history::clear_history),
        )
        .route(
            "/history/:entry_id",
            get(history::get_history_entry).delete(history::delete_history_entry),
        )
        .route("/history/:entry_id/chat", post(history::open_chat))
        // Chat
        .route(
            "/chat/:session_id/messages",
            get(chat::list_messages).post(chat::send_message),
        )
}
