//! Anomaly Detector
//!
//! Binds a trained autoencoder, its fitted scaler and the calibrated
//! threshold. Turns a raw sequence into a reconstruction error, a binary
//! verdict and a bounded 0-100 score.

use std::path::Path;

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::autoencoder::{sequences_to_tensor, tensor_to_vec, LstmAutoencoder, ModelShape};
use super::features::{FeatureVector, Sequence};
use super::scaler::FeatureScaler;
use super::storage::Checkpoint;
use crate::error::{NetPulseError, Result};

/// Error-to-threshold ratio at which the score saturates
pub const SCORE_CAP: f64 = 3.0;

/// Result of scoring one sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub reconstruction_error: f64,
    pub threshold: f64,
    pub is_anomaly: bool,
    /// 0-100, unrounded
    pub anomaly_score: f64,
}

impl Prediction {
    /// Build a verdict from a raw reconstruction error
    pub fn from_error(reconstruction_error: f64, threshold: f64) -> Self {
        Self {
            reconstruction_error,
            threshold,
            is_anomaly: reconstruction_error > threshold,
            anomaly_score: anomaly_score(reconstruction_error, threshold),
        }
    }
}

/// Map a reconstruction error onto [0, 100]
///
/// Linear in `error / threshold` up to [`SCORE_CAP`], then flat at 100.
pub fn anomaly_score(error: f64, threshold: f64) -> f64 {
    if error.is_nan() {
        return 0.0;
    }
    if threshold <= 0.0 {
        return if error > 0.0 { 100.0 } else { 0.0 };
    }
    (error / threshold).clamp(0.0, SCORE_CAP) / SCORE_CAP * 100.0
}

/// Trained model plus everything needed to score raw telemetry
#[derive(Debug)]
pub struct Detector<B: Backend> {
    model: LstmAutoencoder<B>,
    scaler: FeatureScaler,
    threshold: f64,
    device: B::Device,
}

impl<B: Backend> Detector<B> {
    pub fn new(
        model: LstmAutoencoder<B>,
        scaler: FeatureScaler,
        threshold: f64,
        device: B::Device,
    ) -> Self {
        Self {
            model,
            scaler,
            threshold,
            device,
        }
    }

    /// Restore a detector from a checkpoint into a freshly built shell
    ///
    /// The shell fixes the expected shape; a checkpoint trained with
    /// different dimensions is rejected before any weights are read.
    pub fn load(
        checkpoint_path: &Path,
        shell: LstmAutoencoder<B>,
        scaler: FeatureScaler,
        device: &B::Device,
    ) -> Result<Self> {
        if !scaler.is_fitted() {
            return Err(NetPulseError::ScalerNotFitted);
        }

        let checkpoint = Checkpoint::read(checkpoint_path)?;
        let threshold = checkpoint.threshold;
        let model = checkpoint.restore(shell, device)?;

        info!(
            "Loaded detector {} from {:?} (threshold {:.6})",
            model.shape(),
            checkpoint_path,
            threshold
        );
        Ok(Self::new(model, scaler, threshold, device.clone()))
    }

    /// Score one sequence of exactly `seq_len` raw vectors
    pub fn predict(&self, sequence: &[FeatureVector]) -> Result<Prediction> {
        let error = self.errors(std::slice::from_ref(&self.scale(sequence)?))?;
        let error = error.first().copied().unwrap_or(f64::NAN);
        Ok(Prediction::from_error(error, self.threshold))
    }

    /// Score many sequences in one forward pass
    pub fn predict_batch(&self, sequences: &[Sequence]) -> Result<Vec<Prediction>> {
        if sequences.is_empty() {
            return Ok(Vec::new());
        }
        let scaled = sequences
            .iter()
            .map(|s| self.scale(s))
            .collect::<Result<Vec<_>>>()?;
        Ok(self
            .errors(&scaled)?
            .into_iter()
            .map(|error| Prediction::from_error(error, self.threshold))
            .collect())
    }

    fn scale(&self, sequence: &[FeatureVector]) -> Result<Sequence> {
        let seq_len = self.model.seq_len();
        if sequence.len() != seq_len {
            return Err(NetPulseError::SequenceLength {
                expected: seq_len,
                got: sequence.len(),
            });
        }
        self.scaler.transform_sequence(sequence)
    }

    fn errors(&self, scaled: &[Sequence]) -> Result<Vec<f64>> {
        let input = sequences_to_tensor::<B>(scaled, self.model.seq_len(), &self.device);
        let errors = tensor_to_vec(self.model.reconstruction_errors(input));
        if errors.len() != scaled.len() {
            return Err(NetPulseError::Checkpoint(format!(
                "model returned {} errors for {} sequences",
                errors.len(),
                scaled.len()
            )));
        }
        Ok(errors)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn seq_len(&self) -> usize {
        self.model.seq_len()
    }

    pub fn shape(&self) -> ModelShape {
        self.model.shape()
    }

    pub fn scaler(&self) -> &FeatureScaler {
        &self.scaler
    }

    pub fn model(&self) -> &LstmAutoencoder<B> {
        &self.model
    }
}
