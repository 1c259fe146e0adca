//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_type: String,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now() - state.started_at;

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_type: state.engine.model_type().to_string(),
        started_at: state.started_at,
        uptime_secs: uptime.num_seconds().max(0),
    })
}
