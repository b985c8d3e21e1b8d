mod api;
mod app;
mod config;
mod domain;
mod error;
mod logging;
mod middleware;
mod parser;
mod routes;
mod services;

use anyhow::Result;

use services::{ChatSessions, GeminiClient, HistoryService, HistoryStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let settings = config::Settings::from_env()?;

    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting demolition survey backend"
    );

    // Without a key the service still parses reports and serves history
    let gemini = match &settings.gemini_api_key {
        Some(key) => Some(GeminiClient::new(
            &settings.gemini_api_base_url,
            key,
            &settings.gemini_model,
            settings.gemini_timeout_seconds,
        )?),
        None => {
            tracing::error!("GEMINI_API_KEY is not set; assessments and chat are disabled");
            None
        }
    };

    if let Some(client) = gemini.clone() {
        tokio::spawn(async move {
            match client.health_check().await {
                Ok(()) => tracing::info!("Gemini API is reachable"),
                Err(e) => tracing::warn!(error = %e, "Gemini health check failed - will retry on first request"),
            }
        });
    }

    let store = match HistoryStore::connect(&settings.redis_url, &settings.history_storage_key).await {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::warn!(error = ?e, "History store unavailable - history will not survive restarts");
            None
        }
    };
    let history = HistoryService::open(store, settings.history_max_entries).await;

    let chats = ChatSessions::new(settings.chat_max_sessions, settings.chat_context_chars);

    let state = app::AppState::new(settings.clone(), gemini, history, chats);
    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
