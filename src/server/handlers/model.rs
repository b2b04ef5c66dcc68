use std::sync::Arc;

use axum::{extract::State, Json};

use crate::ml::features::FEATURE_NAMES;
use crate::server::state::AppState;

pub async fn get_model_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    // Loaded detector wins over configured dimensions
    let shape = state
        .scorer
        .shape()
        .unwrap_or_else(|| state.model_config.shape());

    Json(serde_json::json!({
        "architecture": "LSTM Autoencoder (Seq2Seq)",
        "input_features": FEATURE_NAMES,
        "input_size": shape.input_size,
        "hidden_size": shape.hidden_size,
        "num_layers": 1,
        "dropout": state.model_config.dropout,
        "seq_len": shape.seq_len,
        "threshold": state.scorer.threshold(),
        "detection_method": format!(
            "Reconstruction Error > mean + {} * std",
            state.threshold_sigma
        ),
    }))
}
