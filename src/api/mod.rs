pub mod events;
pub mod health;

use crate::bridge::MessageRouter;
use crate::store::DepositStore;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<MessageRouter>,
    pub store: Arc<DepositStore>,
}

impl AppState {
    pub fn new(router: Arc<MessageRouter>, store: Arc<DepositStore>) -> Self {
        Self { router, store }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/primary/events", post(events::primary_event))
        .route("/v1/secondary/events", post(events::secondary_event))
        .layer(cors)
        .with_state(state)
}
