//! Model Storage and Persistence
//!
//! Handles saving and loading the trained autoencoder, its scaler and run
//! metadata under a data directory (default `/var/lib/netpulse`):
//!
//! ```text
//! <data_dir>/lstm_autoencoder.bin   checkpoint: version, shape, threshold, weights
//! <data_dir>/scaler.bin             fitted scaler state
//! <data_dir>/metadata.json          human readable training summary
//! ```

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::backend::Backend,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::autoencoder::{AutoencoderConfig, LstmAutoencoder, ModelShape, TrainedAutoencoder};
use super::detector::Detector;
use super::scaler::FeatureScaler;
use crate::error::{NetPulseError, Result};

/// Default data storage directory
pub const DEFAULT_DATA_DIR: &str = "/var/lib/netpulse";

/// Current checkpoint container version
pub const CHECKPOINT_VERSION: u32 = 1;

const CHECKPOINT_FILE: &str = "lstm_autoencoder.bin";
const SCALER_FILE: &str = "scaler.bin";
const METADATA_FILE: &str = "metadata.json";

type WeightRecorder = BinBytesRecorder<FullPrecisionSettings>;

/// Model weights plus the threshold they were calibrated with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub shape: ModelShape,
    pub threshold: f64,
    weights: Vec<u8>,
}

impl Checkpoint {
    /// Record a model's weights
    pub fn from_model<B: Backend>(model: &LstmAutoencoder<B>, threshold: f64) -> Result<Self> {
        let recorder = WeightRecorder::default();
        let weights =
            <WeightRecorder as Recorder<B>>::record(&recorder, model.clone().into_record(), ())
                .map_err(|e| NetPulseError::Checkpoint(format!("{:?}", e)))?;
        Ok(Self {
            version: CHECKPOINT_VERSION,
            shape: model.shape(),
            threshold,
            weights,
        })
    }

    /// Load the recorded weights into `shell`
    pub fn restore<B: Backend>(
        self,
        shell: LstmAutoencoder<B>,
        device: &B::Device,
    ) -> Result<LstmAutoencoder<B>> {
        let expected = shell.shape();
        if self.shape != expected {
            return Err(NetPulseError::CheckpointShape {
                expected,
                found: self.shape,
            });
        }

        let recorder = WeightRecorder::default();
        let record = <WeightRecorder as Recorder<B>>::load(&recorder, self.weights, device)
            .map_err(|e| NetPulseError::Checkpoint(format!("{:?}", e)))?;
        Ok(shell.load_record(record))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(NetPulseError::Checkpoint(format!(
                "no checkpoint at {}",
                path.display()
            )));
        }
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let checkpoint: Checkpoint =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(NetPulseError::CheckpointVersion(checkpoint.version));
        }
        Ok(checkpoint)
    }
}

/// Summary written next to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Version of the checkpoint format
    pub version: u32,
    /// When the model was saved
    pub saved_at: DateTime<Utc>,
    pub shape: ModelShape,
    pub dropout: f64,
    pub threshold: f64,
    pub best_epoch: usize,
    pub best_val_loss: f64,
    pub epochs: usize,
    pub error_mean: f64,
    pub error_std: f64,
    pub normal_rows: usize,
    pub train_sequences: usize,
    pub validation_sequences: usize,
}

/// Model storage manager
#[derive(Debug, Clone)]
pub struct ModelStore {
    data_dir: PathBuf,
}

impl ModelStore {
    /// Create a store rooted at the default directory
    pub fn new() -> Self {
        Self::with_path(DEFAULT_DATA_DIR)
    }

    /// Create with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            data_dir: path.as_ref().to_path_buf(),
        }
    }

    /// Get the base directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Initialize the storage directory
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        debug!("Initialized model storage at {:?}", self.data_dir);
        Ok(())
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir.join(CHECKPOINT_FILE)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.data_dir.join(SCALER_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(METADATA_FILE)
    }

    /// Check if both model artifacts exist
    pub fn has_model(&self) -> bool {
        self.checkpoint_path().exists() && self.scaler_path().exists()
    }

    /// Persist checkpoint, scaler and metadata of a training run
    pub fn save_trained<B: Backend>(&self, trained: &TrainedAutoencoder<B>) -> Result<ModelMetadata> {
        self.init()?;

        Checkpoint::from_model(&trained.model, trained.threshold)?.write(&self.checkpoint_path())?;
        trained.scaler.save(&self.scaler_path())?;

        let report = &trained.report;
        let metadata = ModelMetadata {
            version: CHECKPOINT_VERSION,
            saved_at: Utc::now(),
            shape: trained.model.shape(),
            dropout: trained.config.dropout,
            threshold: trained.threshold,
            best_epoch: report.best_epoch,
            best_val_loss: report.best_val_loss,
            epochs: report.epochs.len(),
            error_mean: report.calibration.error_mean,
            error_std: report.calibration.error_std,
            normal_rows: report.normal_rows,
            train_sequences: report.train.sequences,
            validation_sequences: report.validation.sequences,
        };
        self.save_metadata(&metadata)?;

        info!(
            "Saved model {} with threshold {:.6} to {:?}",
            metadata.shape, metadata.threshold, self.data_dir
        );
        Ok(metadata)
    }

    /// Rebuild a detector from the stored checkpoint and scaler
    pub fn load_detector<B: Backend>(
        &self,
        config: &AutoencoderConfig,
        device: &B::Device,
    ) -> Result<Detector<B>> {
        let scaler = FeatureScaler::load(&self.scaler_path())?;
        Detector::load(&self.checkpoint_path(), config.init(device), scaler, device)
    }

    fn save_metadata(&self, metadata: &ModelMetadata) -> Result<()> {
        let content = serde_json::to_string_pretty(metadata)?;
        fs::write(self.metadata_path(), content)?;
        Ok(())
    }

    /// Load metadata, `None` when no model has been saved
    pub fn load_metadata(&self) -> Result<Option<ModelMetadata>> {
        let path = self.metadata_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::autoencoder::{AutoencoderTrainer, TrainingConfig};
    use crate::ml::dataset::{TelemetryRow, TrainingTable};
    use crate::ml::features::FeatureVector;
    use burn::backend::{Autodiff, NdArray};
    use chrono::{Duration, NaiveDate};
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    fn small_config() -> AutoencoderConfig {
        AutoencoderConfig {
            hidden_size: 4,
            seq_len: 4,
            ..Default::default()
        }
    }

    fn table() -> TrainingTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        TrainingTable::new(
            (0..40)
                .map(|i| {
                    let x = (i as f64 / 5.0).sin();
                    TelemetryRow::new(
                        FeatureVector::new([45.0 + x, 60.0 - x, 20.0, 0.4 + 0.1 * x, 500.0, 0.02]),
                        start + Duration::minutes(5 * i),
                        false,
                        "normal",
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn test_storage_init() {
        let temp = TempDir::new().unwrap();
        let store = ModelStore::with_path(temp.path().join("data"));
        store.init().unwrap();
        assert!(store.data_dir().exists());
        assert!(!store.has_model());
        assert!(store.load_metadata().unwrap().is_none());
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ckpt.bin");
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device);

        Checkpoint::from_model(&model, 0.25).unwrap().write(&path).unwrap();
        let checkpoint = Checkpoint::read(&path).unwrap();
        assert_eq!(checkpoint.version, CHECKPOINT_VERSION);
        assert_eq!(checkpoint.shape, small_config().shape());
        assert_eq!(checkpoint.threshold, 0.25);

        let restored = checkpoint
            .restore(small_config().init::<TestBackend>(&device), &device)
            .unwrap();
        assert_eq!(restored.shape(), model.shape());
    }

    #[test]
    fn test_missing_checkpoint() {
        let temp = TempDir::new().unwrap();
        let err = Checkpoint::read(&temp.path().join("none.bin")).unwrap_err();
        assert!(matches!(err, NetPulseError::Checkpoint(_)));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ckpt.bin");
        let device = Default::default();
        let mut checkpoint =
            Checkpoint::from_model(&small_config().init::<TestBackend>(&device), 0.1).unwrap();
        checkpoint.version = 99;
        checkpoint.write(&path).unwrap();

        let err = Checkpoint::read(&path).unwrap_err();
        assert!(matches!(err, NetPulseError::CheckpointVersion(99)));
    }

    #[test]
    fn test_save_trained_and_reload() {
        let temp = TempDir::new().unwrap();
        let store = ModelStore::with_path(temp.path());
        let trainer = AutoencoderTrainer::<Autodiff<TestBackend>>::new(
            small_config(),
            TrainingConfig {
                epochs: 2,
                batch_size: 8,
                ..Default::default()
            },
            Default::default(),
        );
        let trained = trainer.train(&table()).unwrap();
        let metadata = store.save_trained(&trained).unwrap();

        assert!(store.has_model());
        assert_eq!(metadata.threshold, trained.threshold);
        assert_eq!(metadata.epochs, 2);

        let loaded = store.load_metadata().unwrap().unwrap();
        assert_eq!(loaded.shape, small_config().shape());
        assert_eq!(loaded.best_epoch, trained.report.best_epoch);

        let device = Default::default();
        let detector = store
            .load_detector::<TestBackend>(&small_config(), &device)
            .unwrap();
        assert_eq!(detector.threshold(), trained.threshold);
        assert_eq!(detector.scaler(), &trained.scaler);

        let window: Vec<FeatureVector> = table().rows()[..4].iter().map(|r| r.features()).collect();
        let expected = trained.into_detector(&device).predict(&window).unwrap();
        assert_eq!(detector.predict(&window).unwrap(), expected);
    }
}
