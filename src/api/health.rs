use crate::api::AppState;
use axum::extract::State;
use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once the deposit store is loaded, which happens before serving.
pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    let deposits = state.store.deposit_count().await;
    Json(serde_json::json!({"status": "ready", "deposits": deposits}))
}
