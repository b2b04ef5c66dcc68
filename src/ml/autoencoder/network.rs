//! LSTM Autoencoder Network Architecture
//!
//! Sequence-to-sequence reconstruction model:
//! ```text
//! [B, L, 6] -> encoder LSTM -> (h, c)
//! zeros[B, 1, 6] + (h, c) -> decoder LSTM -> dropout -> linear -> step 1
//! step 1 + state          -> decoder LSTM -> dropout -> linear -> step 2
//! ...                                                          -> step L
//! ```
//! The decoder never sees the true sequence; each projected step is fed back
//! as the next input.

use std::fmt;

use burn::{
    module::Module,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig, Lstm, LstmConfig},
    tensor::{backend::Backend, Tensor, TensorData},
};
use serde::{Deserialize, Serialize};

use crate::ml::features::{FeatureVector, NUM_FEATURES};

/// Autoencoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoencoderConfig {
    /// Features per timestep
    pub input_size: usize,
    /// LSTM hidden state dimension
    pub hidden_size: usize,
    /// Timesteps per sequence (L)
    pub seq_len: usize,
    /// Dropout rate on decoder outputs (training only)
    pub dropout: f64,
}

impl Default for AutoencoderConfig {
    fn default() -> Self {
        Self {
            input_size: NUM_FEATURES,
            hidden_size: 128,
            seq_len: 30,
            dropout: 0.3,
        }
    }
}

impl AutoencoderConfig {
    /// Build a freshly initialized model on `device`
    pub fn init<B: Backend>(&self, device: &B::Device) -> LstmAutoencoder<B> {
        LstmAutoencoder {
            encoder: LstmConfig::new(self.input_size, self.hidden_size, true).init(device),
            decoder: LstmConfig::new(self.input_size, self.hidden_size, true).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(self.hidden_size, self.input_size).init(device),
            input_size: self.input_size,
            hidden_size: self.hidden_size,
            seq_len: self.seq_len,
        }
    }

    pub fn shape(&self) -> ModelShape {
        ModelShape {
            input_size: self.input_size,
            hidden_size: self.hidden_size,
            seq_len: self.seq_len,
        }
    }
}

/// Parameter-defining dimensions of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelShape {
    pub input_size: usize,
    pub hidden_size: usize,
    pub seq_len: usize,
}

impl fmt::Display for ModelShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(input={}, hidden={}, seq_len={})",
            self.input_size, self.hidden_size, self.seq_len
        )
    }
}

/// Encoder/decoder LSTM with a feature-space output projection
#[derive(Module, Debug)]
pub struct LstmAutoencoder<B: Backend> {
    encoder: Lstm<B>,
    decoder: Lstm<B>,
    dropout: Dropout,
    output: Linear<B>,
    input_size: usize,
    hidden_size: usize,
    seq_len: usize,
}

impl<B: Backend> LstmAutoencoder<B> {
    /// Reconstruct a batch of sequences `[batch, seq_len, features]`
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch_size, _, _] = input.dims();
        let device = input.device();

        // Encode entire sequence into hidden + cell state
        let (_, mut state) = self.encoder.forward(input, None);

        let mut step_input = Tensor::<B, 3>::zeros([batch_size, 1, self.input_size], &device);
        let mut steps = Vec::with_capacity(self.seq_len);

        for _ in 0..self.seq_len {
            let (hidden, next_state) = self.decoder.forward(step_input, Some(state));
            state = next_state;
            let step_output = self.output.forward(self.dropout.forward(hidden));
            steps.push(step_output.clone());
            step_input = step_output;
        }

        Tensor::cat(steps, 1)
    }

    /// Per-sequence mean squared error over every timestep and feature
    pub fn reconstruction_errors(&self, input: Tensor<B, 3>) -> Tensor<B, 1> {
        let [batch_size, seq_len, features] = input.dims();
        let reconstructed = self.forward(input.clone());
        let diff = input - reconstructed;
        let squared = diff.clone() * diff;
        squared
            .reshape([batch_size, seq_len * features])
            .mean_dim(1)
            .reshape([batch_size])
    }

    pub fn shape(&self) -> ModelShape {
        ModelShape {
            input_size: self.input_size,
            hidden_size: self.hidden_size,
            seq_len: self.seq_len,
        }
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }
}

/// Pack sequences into a `[batch, seq_len, features]` tensor
pub fn sequences_to_tensor<B: Backend>(
    sequences: &[impl AsRef<[FeatureVector]>],
    seq_len: usize,
    device: &B::Device,
) -> Tensor<B, 3> {
    let mut values = Vec::with_capacity(sequences.len() * seq_len * NUM_FEATURES);
    for sequence in sequences {
        for vector in sequence.as_ref() {
            values.extend(vector.iter().map(|v| *v as f32));
        }
    }
    let data = TensorData::new(values, [sequences.len(), seq_len, NUM_FEATURES]);
    Tensor::from_data(data, device)
}

/// Flatten a 1-D tensor into `f64` values
pub fn tensor_to_vec<B: Backend>(tensor: Tensor<B, 1>) -> Vec<f64> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map(|values| values.into_iter().map(f64::from).collect())
        .unwrap_or_default()
}
