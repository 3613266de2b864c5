use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::bridge::InboundMessage;
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub status: &'static str,
}

/// Inbound event from the primary network. Routed before responding, so
/// the webhook sender sees delivery failures as latency, not loss.
pub async fn primary_event(
    State(state): State<AppState>,
    Json(msg): Json<InboundMessage>,
) -> Result<Json<EventResponse>, AppError> {
    validate(&msg)?;
    state.router.handle_primary(msg).await;
    Ok(Json(EventResponse {
        status: "processed",
    }))
}

pub async fn secondary_event(
    State(state): State<AppState>,
    Json(msg): Json<InboundMessage>,
) -> Result<Json<EventResponse>, AppError> {
    validate(&msg)?;
    state.router.handle_secondary(msg).await;
    Ok(Json(EventResponse {
        status: "processed",
    }))
}

fn validate(msg: &InboundMessage) -> Result<(), AppError> {
    if msg.sender.id.trim().is_empty() {
        return Err(AppError::BadRequest("sender id must not be empty".into()));
    }
    if msg.channel.name.trim().is_empty() {
        return Err(AppError::BadRequest("channel name must not be empty".into()));
    }
    Ok(())
}
