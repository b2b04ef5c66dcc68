use std::sync::Arc;

use axum::{extract::State, Json};

use crate::ml::features::FEATURE_NAMES;
use crate::server::state::AppState;

pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "NetPulse API is running",
        "endpoints": [
            "/api/status",
            "/api/anomalies",
            "/api/anomalies/export",
            "/api/model/info",
            "/ws/telemetry"
        ]
    }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let scorer = &state.scorer;
    Json(serde_json::json!({
        "status": "online",
        "model_loaded": scorer.model_loaded(),
        "threshold": scorer.threshold(),
        "connected_clients": scorer.connected_sessions(),
        "stats": scorer.stats(),
        "features": FEATURE_NAMES,
        "seq_len": scorer.seq_len(),
        "window_scope": scorer.window_scope(),
    }))
}
