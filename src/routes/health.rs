use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: ServiceHealth,
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub model: String,
    pub history_store: String,
}

/// Health check endpoint
///
/// Parsing and history always work, so the service never reports itself
/// down; a missing or failing collaborator makes it `degraded`.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let model = async {
        match &state.gemini {
            None => "not_configured",
            Some(client) => match client.health_check().await {
                Ok(()) => "ok",
                Err(_) => "error",
            },
        }
    };
    let store = async {
        match state.history.store() {
            None => "disabled",
            Some(store) => match store.health_check().await {
                Ok(()) => "ok",
                Err(_) => "error",
            },
        }
    };

    let (model_status, store_status) = tokio::join!(model, store);

    let status = if model_status == "ok" && store_status != "error" {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services: ServiceHealth {
            model: model_status.to_string(),
            history_store: store_status.to_string(),
        },
    })
}
