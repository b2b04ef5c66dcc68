//! LSTM Autoencoder
//!
//! Learns to reconstruct windows of normal telemetry. Sequences that
//! reconstruct poorly (high mean squared error) are anomalous.
//!
//! # Architecture
//! ```text
//! [B, L, 6] -> Encoder LSTM (128) -> (h, c) -> Decoder LSTM (128) -> Linear -> [B, L, 6]
//! ```
//!
//! # Usage
//! ```ignore
//! use netpulse::ml::autoencoder::{AutoencoderConfig, AutoencoderTrainer, TrainingConfig};
//!
//! let trainer = AutoencoderTrainer::<TrainingBackend>::new(
//!     AutoencoderConfig::default(),
//!     TrainingConfig::default(),
//!     Default::default(),
//! );
//! let trained = trainer.train(&table)?;
//! let detector = trained.into_detector(&Default::default());
//! let prediction = detector.predict(&window.snapshot())?;
//! ```

pub mod network;
pub mod trainer;

pub use network::{
    sequences_to_tensor, tensor_to_vec, AutoencoderConfig, LstmAutoencoder, ModelShape,
};
pub use trainer::{
    build_sequences, calibrate_threshold, cosine_annealing_lr, partition_summary, shuffle_split,
    AutoencoderTrainer, EpochSummary, PartitionSummary, ThresholdCalibration, TrainedAutoencoder,
    TrainingConfig, TrainingReport,
};
