use thiserror::Error;

use crate::ml::autoencoder::ModelShape;

#[derive(Debug, Error)]
pub enum NetPulseError {
    #[error("scaler has not been fitted")]
    ScalerNotFitted,

    #[error("scaler is already fitted")]
    ScalerAlreadyFitted,

    #[error("cannot fit scaler on an empty set of rows")]
    EmptyFitInput,

    #[error("no training data: {0}")]
    MissingTrainingData(String),

    #[error("malformed training table: {0}")]
    MalformedTable(String),

    #[error("invalid training configuration: {0}")]
    InvalidTrainingConfig(String),

    #[error("sequence length mismatch: expected {expected}, got {got}")]
    SequenceLength { expected: usize, got: usize },

    #[error("input dimension mismatch: expected {expected}, got {got}")]
    InputDimension { expected: usize, got: usize },

    #[error("checkpoint shape {found} does not match model shell {expected}")]
    CheckpointShape { expected: ModelShape, found: ModelShape },

    #[error("unsupported checkpoint format version {0}")]
    CheckpointVersion(u32),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::error::EncodeError> for NetPulseError {
    fn from(e: bincode::error::EncodeError) -> Self {
        NetPulseError::Serialization(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for NetPulseError {
    fn from(e: bincode::error::DecodeError) -> Self {
        NetPulseError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NetPulseError>;
