//! Feature standardization
//!
//! Z-score scaler fitted once on normal training rows. The same fitted state
//! must be applied at training and inference time, so it round-trips through
//! bincode byte for byte.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::features::{FeatureVector, NUM_FEATURES};
use crate::error::{NetPulseError, Result};

/// Fitted per-feature statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub mean: [f64; NUM_FEATURES],
    pub std: [f64; NUM_FEATURES],
    /// Rows the statistics were computed from
    pub samples: u64,
}

/// Standard scaler over telemetry feature vectors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    state: Option<ScalerState>,
}

impl FeatureScaler {
    /// Create an unfitted scaler
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Fit a new scaler in one step
    pub fn fitted(rows: &[FeatureVector]) -> Result<Self> {
        let mut scaler = Self::new();
        scaler.fit(rows)?;
        Ok(scaler)
    }

    /// Compute mean and population standard deviation per feature
    pub fn fit(&mut self, rows: &[FeatureVector]) -> Result<()> {
        if self.state.is_some() {
            return Err(NetPulseError::ScalerAlreadyFitted);
        }
        if rows.is_empty() {
            return Err(NetPulseError::EmptyFitInput);
        }

        let n = rows.len() as f64;
        let mut mean = [0.0f64; NUM_FEATURES];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row.iter()) {
                *m += v;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut std = [0.0f64; NUM_FEATURES];
        for row in rows {
            for ((s, v), m) in std.iter_mut().zip(row.iter()).zip(mean.iter()) {
                *s += (v - m).powi(2);
            }
        }
        for s in std.iter_mut() {
            *s = (*s / n).sqrt();
            // Constant columns pass through centred
            if *s < f64::EPSILON {
                *s = 1.0;
            }
        }

        self.state = Some(ScalerState {
            mean,
            std,
            samples: rows.len() as u64,
        });
        Ok(())
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&ScalerState> {
        self.state.as_ref()
    }

    /// Standardize one vector
    pub fn transform(&self, vector: &FeatureVector) -> Result<FeatureVector> {
        let state = self.state.as_ref().ok_or(NetPulseError::ScalerNotFitted)?;
        let mut out = *vector;
        for i in 0..NUM_FEATURES {
            out.values[i] = (vector.values[i] - state.mean[i]) / state.std[i];
        }
        Ok(out)
    }

    /// Standardize every vector of a sequence, preserving order and length
    pub fn transform_sequence(&self, sequence: &[FeatureVector]) -> Result<Vec<FeatureVector>> {
        sequence.iter().map(|v| self.transform(v)).collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let state = self.state.as_ref().ok_or(NetPulseError::ScalerNotFitted)?;
        Ok(bincode::serde::encode_to_vec(state, bincode::config::standard())?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (state, _): (ScalerState, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(Self { state: Some(state) })
    }

    /// Save the fitted state to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        let state = self.state.as_ref().ok_or(NetPulseError::ScalerNotFitted)?;
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(state, &mut writer, bincode::config::standard())?;
        Ok(())
    }

    /// Load a fitted scaler from disk
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let state: ScalerState =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?;
        Ok(Self { state: Some(state) })
    }
}
