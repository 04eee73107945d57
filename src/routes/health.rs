//! Liveness probe for the receiver

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

const SERVICE_NAME: &str = "chunk-relay";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverHealth {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    /// Registered uploads not yet reaped
    pub tracked_uploads: usize,
}

async fn receiver_health(State(state): State<AppState>) -> Json<ReceiverHealth> {
    Json(ReceiverHealth {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        tracked_uploads: state.registry().live_ids().await.len(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(receiver_health))
}
