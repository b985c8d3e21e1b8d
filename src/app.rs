use axum::{extract::DefaultBodyLimit, http::HeaderValue, Router};
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::Settings;
use crate::error::{ApiError, ApiResult};
use crate::middleware::request_id_layer;
use crate::routes;
use crate::services::{ChatSessions, GeminiClient, HistoryService};

/// Message shown when the model client could not be initialized.
pub const MODEL_UNAVAILABLE_MESSAGE: &str =
    "初期化エラー: APIキーが設定されていません。現調とチャット機能は利用できません。";

/// Shared application state
pub struct AppState {
    pub settings: Settings,
    /// `None` when no API key is configured
    pub gemini: Option<GeminiClient>,
    pub history: HistoryService,
    pub chats: ChatSessions,
}

impl AppState {
    pub fn new(
        settings: Settings,
        gemini: Option<GeminiClient>,
        history: HistoryService,
        chats: ChatSessions,
    ) -> Arc<Self> {
        Arc::new(Self {
            settings,
            gemini,
            history,
            chats,
        })
    }

    /// The model client, or a 503 when it was never initialized.
    pub fn model(&self) -> ApiResult<&GeminiClient> {
        self.gemini
            .as_ref()
            .ok_or_else(|| ApiError::Unavailable(MODEL_UNAVAILABLE_MESSAGE.to_string()))
    }
}

/// Build the complete application with all middleware
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.settings);

    // Spans at DEBUG keep INFO output to one line per event
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    let (set_request_id, propagate_request_id) = request_id_layer();

    // Photographs are uploaded in one multipart body
    let body_limit = DefaultBodyLimit::max(state.settings.max_upload_bytes);

    Router::new()
        .merge(routes::api_router())
        // Middleware stack (applied bottom-up)
        .layer(body_limit)
        .layer(propagate_request_id)
        .layer(trace_layer)
        .layer(set_request_id)
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_allow_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let max_age = if settings.env.is_dev() {
        std::time::Duration::from_secs(86400)
    } else {
        std::time::Duration::from_secs(3600)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::list([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::HeaderName::from_static("x-request-id"),
            axum::http::header::CACHE_CONTROL,
        ]))
        .max_age(max_age)
}
