//! HTTP / WebSocket transport
//!
//! axum router over the stream scorer: a per-client WebSocket telemetry
//! stream plus read-only status, history and model endpoints.

pub mod handlers;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};
use serde::{Deserialize, Serialize};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

pub use state::AppState;

/// Environment variable overriding the listen port
pub const PORT_ENV: &str = "NETPULSE_PORT";

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    /// Configured port unless overridden from the environment
    pub fn effective_port(&self) -> u16 {
        std::env::var(PORT_ENV)
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(self.port)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::status::root))
        .route("/api/status", get(handlers::status::get_status))
        // Anomaly history
        .route("/api/anomalies", get(handlers::anomalies::list_anomalies))
        .route(
            "/api/anomalies/export",
            get(handlers::anomalies::export_anomalies),
        )
        .route("/api/model/info", get(handlers::model::get_model_info))
        // WebSocket telemetry stream
        .route("/ws/telemetry", get(handlers::websocket::ws_handler))
        .layer(cors)
        .layer(CompressionLayer::new())
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(state: Arc<AppState>, config: &ServerConfig) -> anyhow::Result<()> {
    let ip = config
        .host
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("Invalid listen host: {}", config.host))?;
    let addr = SocketAddr::new(ip, config.effective_port());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("NetPulse API listening on {}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::handlers::anomalies::{export_anomalies, list_anomalies, AnomalyQuery};
    use super::handlers::model::get_model_info;
    use super::handlers::status::get_status;
    use super::*;
    use crate::ml::autoencoder::AutoencoderConfig;
    use crate::ml::detector::Detector;
    use crate::ml::features::{FeatureVector, NUM_FEATURES};
    use crate::ml::scaler::FeatureScaler;
    use crate::stream::{SourceFactory, StreamConfig, StreamScorer};
    use crate::telemetry::{LiveSample, SyntheticTelemetry, TelemetrySource};
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::Json;

    fn model_config() -> AutoencoderConfig {
        AutoencoderConfig {
            hidden_size: 4,
            seq_len: 3,
            ..Default::default()
        }
    }

    fn state(threshold: Option<f64>) -> Arc<AppState> {
        let device = Default::default();
        let detector = threshold.map(|t| {
            let rows: Vec<FeatureVector> = (0..5)
                .map(|i| FeatureVector::new([i as f64; NUM_FEATURES]))
                .collect();
            Detector::new(
                model_config().init(&device),
                FeatureScaler::fitted(&rows).unwrap(),
                t,
                device,
            )
        });
        let factory: SourceFactory =
            Arc::new(|| Box::new(SyntheticTelemetry::seeded(1)) as Box<dyn TelemetrySource>);
        let scorer = StreamScorer::new(detector, 3, StreamConfig::default(), factory);
        Arc::new(AppState::new(Arc::new(scorer), model_config(), 2.5))
    }

    fn feed(state: &AppState, n: usize) {
        for i in 0..n {
            let sample =
                LiveSample::normal(FeatureVector::new([i as f64; NUM_FEATURES]), "NODE-03");
            state.scorer.ingest(sample).unwrap();
        }
    }

    #[tokio::test]
    async fn test_status() {
        let state = state(Some(0.4));
        let Json(body) = get_status(State(state)).await;
        assert_eq!(body["status"], "online");
        assert_eq!(body["model_loaded"], true);
        assert_eq!(body["threshold"], 0.4);
        assert_eq!(body["seq_len"], 3);
        assert_eq!(body["window_scope"], "shared");
        assert_eq!(body["features"].as_array().unwrap().len(), 6);
        assert_eq!(body["stats"]["total_points"], 0);
    }

    #[tokio::test]
    async fn test_status_without_model() {
        let Json(body) = get_status(State(state(None))).await;
        assert_eq!(body["model_loaded"], false);
        assert!(body["threshold"].is_null());
    }

    #[tokio::test]
    async fn test_anomaly_page() {
        let state = state(Some(0.0));
        feed(&state, 6);

        let Json(body) = list_anomalies(
            State(state.clone()),
            Query(AnomalyQuery { limit: Some(2) }),
        )
        .await;
        let page = body["anomalies"].as_array().unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0]["id"], 4);
        assert_eq!(page[1]["id"], 3);
        assert_eq!(body["total"], 4);

        let Json(body) = list_anomalies(State(state), Query(AnomalyQuery::default())).await;
        assert_eq!(body["anomalies"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_export() {
        let state = state(Some(0.0));
        let response = export_anomalies(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        feed(&state, 4);
        let response = export_anomalies(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/csv");
        assert!(response.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=netpulse_anomalies_"));
    }

    #[tokio::test]
    async fn test_model_info() {
        let Json(body) = get_model_info(State(state(Some(0.4)))).await;
        assert_eq!(body["architecture"], "LSTM Autoencoder (Seq2Seq)");
        assert_eq!(body["input_size"], 6);
        assert_eq!(body["hidden_size"], 4);
        assert_eq!(body["dropout"], 0.3);
        assert_eq!(
            body["detection_method"],
            "Reconstruction Error > mean + 2.5 * std"
        );
    }

    #[test]
    fn test_router_builds() {
        let _ = router(state(None));
        assert_eq!(ServerConfig::default().port, 8000);
    }
}
