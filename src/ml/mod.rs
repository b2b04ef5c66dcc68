//! Machine Learning / Anomaly Detection Engine
//!
//! Learns the normal temporal pattern of six correlated telemetry metrics
//! and flags windows that an LSTM autoencoder cannot reconstruct.
//!
//! # Features
//! - Z-score feature scaling fitted on normal rows only
//! - Sliding sequence windows over live telemetry
//! - LSTM autoencoder training with shuffled validation and threshold calibration
//! - Checkpoint and scaler persistence
//!
//! # Example
//! ```ignore
//! use netpulse::ml::{ModelStore, SequenceWindow};
//!
//! let detector = ModelStore::with_path("data").load_detector(&config, &device)?;
//! let mut window = SequenceWindow::new(detector.seq_len());
//!
//! window.push(sample);
//! if let Some(sequence) = window.ready_sequence() {
//!     let prediction = detector.predict(&sequence)?;
//!     if prediction.is_anomaly {
//!         println!("Anomaly score {:.1}", prediction.anomaly_score);
//!     }
//! }
//! ```

pub mod autoencoder;
pub mod dataset;
pub mod detector;
pub mod features;
pub mod scaler;
pub mod storage;
pub mod window;

pub use autoencoder::{
    AutoencoderConfig, AutoencoderTrainer, LstmAutoencoder, ModelShape, TrainedAutoencoder,
    TrainingConfig, TrainingReport,
};
pub use dataset::{TelemetryRow, TrainingTable};
pub use detector::{anomaly_score, Detector, Prediction, SCORE_CAP};
pub use features::{Feature, FeatureVector, Sequence, FEATURE_NAMES, NUM_FEATURES};
pub use scaler::{FeatureScaler, ScalerState};
pub use storage::{Checkpoint, ModelMetadata, ModelStore, DEFAULT_DATA_DIR};
pub use window::SequenceWindow;
