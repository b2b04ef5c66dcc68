use std::sync::Arc;

use crate::ml::autoencoder::AutoencoderConfig;
use crate::stream::StreamScorer;
use crate::InferenceBackend;

/// Shared state behind every handler
pub struct AppState {
    pub scorer: Arc<StreamScorer<InferenceBackend>>,
    /// Architecture the detector was built from
    pub model_config: AutoencoderConfig,
    /// `k` in the `mean + k * std` threshold rule
    pub threshold_sigma: f64,
}

impl AppState {
    pub fn new(
        scorer: Arc<StreamScorer<InferenceBackend>>,
        model_config: AutoencoderConfig,
        threshold_sigma: f64,
    ) -> Self {
        Self {
            scorer,
            model_config,
            threshold_sigma,
        }
    }
}
