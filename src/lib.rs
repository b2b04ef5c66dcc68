//! NetPulse: anomaly detection for network telemetry
//!
//! An LSTM autoencoder learns the normal temporal pattern of six correlated
//! node metrics. Live samples are scored in sliding windows; windows that
//! reconstruct poorly are flagged, journaled and streamed to clients.

pub mod config;
pub mod error;
pub mod ml;
pub mod server;
pub mod stream;
pub mod telemetry;

pub use error::{NetPulseError, Result};

/// CPU backend used for inference and serving
pub type InferenceBackend = burn::backend::NdArray<f32>;

/// Autodiff backend used for training
pub type TrainingBackend = burn::backend::Autodiff<InferenceBackend>;
