use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::warn;

use crate::server::state::AppState;

const DEFAULT_PAGE_LIMIT: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct AnomalyQuery {
    pub limit: Option<usize>,
}

pub async fn list_anomalies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnomalyQuery>,
) -> Json<serde_json::Value> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let (anomalies, total) = state.scorer.recent_anomalies(limit);
    Json(serde_json::json!({
        "anomalies": anomalies,
        "total": total,
    }))
}

pub async fn export_anomalies(State(state): State<Arc<AppState>>) -> Response {
    match state.scorer.export_csv() {
        Ok(Some(csv)) => {
            let filename = format!(
                "netpulse_anomalies_{}.csv",
                chrono::Local::now().format("%Y%m%d_%H%M%S")
            );
            (
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename={}", filename),
                    ),
                ],
                csv,
            )
                .into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "message": "No anomalies recorded yet" })),
        )
            .into_response(),
        Err(e) => {
            warn!("Anomaly export failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "message": e.to_string() })),
            )
                .into_response()
        }
    }
}
