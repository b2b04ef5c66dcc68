//! Autoencoder Training
//!
//! Windowing, shuffled train/validation split, the mini-batch training loop
//! and threshold calibration.
//!
//! The normal series is autocorrelated and drifts slowly, so windows are
//! shuffled as whole sequences *before* the split. A chronological split
//! leaves the validation partition with different statistics from the
//! training partition, which shows up as a train/validation gap that is a
//! sampling artifact rather than overfitting.

use std::f64::consts::PI;

use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    nn::loss::{MseLoss, Reduction},
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Tensor,
    },
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::network::{sequences_to_tensor, tensor_to_vec, AutoencoderConfig, LstmAutoencoder};
use crate::error::{NetPulseError, Result};
use crate::ml::dataset::TrainingTable;
use crate::ml::detector::Detector;
use crate::ml::features::{FeatureVector, Sequence, NUM_FEATURES};
use crate::ml::scaler::FeatureScaler;

/// Training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,
    /// Mini-batch size
    pub batch_size: usize,
    /// Initial learning rate
    pub learning_rate: f64,
    /// Floor of the cosine annealing schedule
    pub min_learning_rate: f64,
    /// Cap on the joint L2 norm of all parameter gradients
    pub grad_clip_norm: f32,
    /// Share of sequences held out for validation
    pub validation_fraction: f64,
    /// Threshold = mean + k * std of validation errors
    pub threshold_sigma: f64,
    /// Seed for the split and batch shuffles
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 80,
            batch_size: 64,
            learning_rate: 1e-3,
            min_learning_rate: 1e-5,
            grad_clip_norm: 1.0,
            validation_fraction: 0.15,
            threshold_sigma: 2.5,
            seed: 42,
        }
    }
}

/// Loss summary for one epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub learning_rate: f64,
}

/// Mean and population std over every element of a set of sequences
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartitionSummary {
    pub sequences: usize,
    pub mean: f64,
    pub std: f64,
}

/// Threshold derived from validation reconstruction errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCalibration {
    pub error_mean: f64,
    pub error_std: f64,
    pub sigma: f64,
    pub threshold: f64,
    pub samples: usize,
}

/// Outcome of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub normal_rows: usize,
    pub train: PartitionSummary,
    pub validation: PartitionSummary,
    pub epochs: Vec<EpochSummary>,
    /// 1-based epoch whose weights were kept
    pub best_epoch: usize,
    pub best_val_loss: f64,
    pub calibration: ThresholdCalibration,
    /// Per-sequence validation errors of the kept model
    #[serde(skip)]
    pub validation_errors: Vec<f64>,
}

/// Trained model bundle, ready for persistence or inference
#[derive(Debug)]
pub struct TrainedAutoencoder<B: Backend> {
    pub config: AutoencoderConfig,
    pub model: LstmAutoencoder<B>,
    pub scaler: FeatureScaler,
    pub threshold: f64,
    pub report: TrainingReport,
}

impl<B: Backend> TrainedAutoencoder<B> {
    /// Wrap the trained model into an inference detector
    pub fn into_detector(self, device: &B::Device) -> Detector<B> {
        Detector::new(self.model, self.scaler, self.threshold, device.clone())
    }
}

/// Autoencoder trainer
pub struct AutoencoderTrainer<B: AutodiffBackend> {
    model_config: AutoencoderConfig,
    config: TrainingConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> AutoencoderTrainer<B> {
    /// Create a new trainer
    pub fn new(model_config: AutoencoderConfig, config: TrainingConfig, device: B::Device) -> Self {
        Self {
            model_config,
            config,
            device,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.model_config.input_size != NUM_FEATURES {
            return Err(NetPulseError::InputDimension {
                expected: NUM_FEATURES,
                got: self.model_config.input_size,
            });
        }
        if self.model_config.seq_len == 0 {
            return Err(NetPulseError::InvalidTrainingConfig(
                "seq_len must be positive".into(),
            ));
        }
        if self.config.epochs == 0 || self.config.batch_size == 0 {
            return Err(NetPulseError::InvalidTrainingConfig(
                "epochs and batch_size must be positive".into(),
            ));
        }
        if !(self.config.validation_fraction > 0.0 && self.config.validation_fraction < 1.0) {
            return Err(NetPulseError::InvalidTrainingConfig(format!(
                "validation_fraction {} must be in (0, 1)",
                self.config.validation_fraction
            )));
        }
        Ok(())
    }

    /// Fit scaler, train, select the best epoch and calibrate the threshold
    pub fn train(&self, table: &TrainingTable) -> Result<TrainedAutoencoder<B::InnerBackend>> {
        self.validate()?;

        let seq_len = self.model_config.seq_len;
        let normal = table.normal_vectors();
        if normal.is_empty() {
            return Err(NetPulseError::MissingTrainingData(
                "table has no normal rows".into(),
            ));
        }
        if normal.len() < seq_len + 1 {
            return Err(NetPulseError::MissingTrainingData(format!(
                "{} normal rows cannot form two windows of length {}",
                normal.len(),
                seq_len
            )));
        }

        let scaler = FeatureScaler::fitted(&normal)?;
        let scaled = scaler.transform_sequence(&normal)?;
        let sequences = build_sequences(&scaled, seq_len);

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let (train_seqs, val_seqs) =
            shuffle_split(sequences, self.config.validation_fraction, &mut rng)?;

        let train_summary = partition_summary(&train_seqs);
        let val_summary = partition_summary(&val_seqs);
        info!(
            "Normal rows: {} | Train: {} | Val: {}",
            normal.len(),
            train_summary.sequences,
            val_summary.sequences
        );
        info!(
            "Train mean: {:.4} | Val mean: {:.4}",
            train_summary.mean, val_summary.mean
        );

        let mut model: LstmAutoencoder<B> = self.model_config.init(&self.device);
        let mut optim = optimizer_config().init();
        let loss_fn = MseLoss::new();

        let epochs = self.config.epochs;
        let mut history = Vec::with_capacity(epochs);
        let mut best: Option<(usize, f64, LstmAutoencoder<B::InnerBackend>)> = None;
        let mut order: Vec<usize> = (0..train_seqs.len()).collect();

        for epoch in 0..epochs {
            let lr = cosine_annealing_lr(
                self.config.learning_rate,
                self.config.min_learning_rate,
                epoch,
                epochs,
            );

            order.shuffle(&mut rng);
            let mut batch_losses = Vec::new();
            for batch in training_batches(&order, self.config.batch_size) {
                let seqs: Vec<&Sequence> = batch.iter().map(|&i| &train_seqs[i]).collect();
                let input = sequences_to_tensor::<B>(&seqs, seq_len, &self.device);
                let output = model.forward(input.clone());
                let loss = loss_fn.forward(output, input, Reduction::Mean);
                batch_losses.push(loss.clone().into_scalar().elem::<f64>());

                let mut grads = GradientsParams::from_grads(loss.backward(), &model);
                clip_grad_norm(&model, &mut grads, self.config.grad_clip_norm);
                model = optim.step(lr, model, grads);
            }

            let valid_model = model.valid();
            let train_loss = mean(&batch_losses);
            let val_loss = self.validation_loss(&valid_model, &val_seqs);
            history.push(EpochSummary {
                epoch: epoch + 1,
                train_loss,
                val_loss,
                learning_rate: lr,
            });

            if epoch == 0 || (epoch + 1) % 10 == 0 {
                info!(
                    "Epoch [{:3}/{}] | Train: {:.5} | Val: {:.5} | Gap: {:.4}",
                    epoch + 1,
                    epochs,
                    train_loss,
                    val_loss,
                    (train_loss - val_loss).abs()
                );
            } else {
                debug!(
                    "Epoch {} train={:.5} val={:.5} lr={:.6}",
                    epoch + 1,
                    train_loss,
                    val_loss,
                    lr
                );
            }

            let improved = best
                .as_ref()
                .map(|(_, best_loss, _)| val_loss < *best_loss)
                .unwrap_or(true);
            if improved {
                best = Some((epoch + 1, val_loss, valid_model));
            }
        }

        let (best_epoch, best_val_loss, best_model) = best.ok_or_else(|| {
            NetPulseError::InvalidTrainingConfig("training produced no epochs".into())
        })?;

        let validation_errors = self.reconstruction_errors(&best_model, &val_seqs);
        let calibration = calibrate_threshold(&validation_errors, self.config.threshold_sigma);
        info!(
            "Best epoch {} (val {:.6}) | Error mean {:.6} | std {:.6} | Threshold {:.6}",
            best_epoch,
            best_val_loss,
            calibration.error_mean,
            calibration.error_std,
            calibration.threshold
        );

        Ok(TrainedAutoencoder {
            config: self.model_config.clone(),
            model: best_model,
            scaler,
            threshold: calibration.threshold,
            report: TrainingReport {
                normal_rows: normal.len(),
                train: train_summary,
                validation: val_summary,
                epochs: history,
                best_epoch,
                best_val_loss,
                calibration,
                validation_errors,
            },
        })
    }

    /// Mean of per-batch MSE over the validation partition, in order
    fn validation_loss(
        &self,
        model: &LstmAutoencoder<B::InnerBackend>,
        sequences: &[Sequence],
    ) -> f64 {
        let loss_fn = MseLoss::new();
        let losses: Vec<f64> = sequences
            .chunks(self.config.batch_size)
            .map(|batch| {
                let input = sequences_to_tensor::<B::InnerBackend>(
                    batch,
                    self.model_config.seq_len,
                    &self.device,
                );
                let output = model.forward(input.clone());
                loss_fn
                    .forward(output, input, Reduction::Mean)
                    .into_scalar()
                    .elem::<f64>()
            })
            .collect();
        mean(&losses)
    }

    fn reconstruction_errors(
        &self,
        model: &LstmAutoencoder<B::InnerBackend>,
        sequences: &[Sequence],
    ) -> Vec<f64> {
        sequences
            .chunks(self.config.batch_size)
            .flat_map(|batch| {
                let input = sequences_to_tensor::<B::InnerBackend>(
                    batch,
                    self.model_config.seq_len,
                    &self.device,
                );
                tensor_to_vec(model.reconstruction_errors(input))
            })
            .collect()
    }
}

/// Adam with eps 1e-8; clipping is applied jointly by [`clip_grad_norm`]
fn optimizer_config() -> AdamConfig {
    AdamConfig::new().with_epsilon(1e-8)
}

/// Rescale all gradients together so their joint L2 norm is at most `max_norm`
///
/// Returns the joint norm before clipping.
pub fn clip_grad_norm<B: AutodiffBackend, M: AutodiffModule<B>>(
    model: &M,
    grads: &mut GradientsParams,
    max_norm: f32,
) -> f64 {
    let mut norm = GradNorm {
        grads: &*grads,
        sum_squares: 0.0,
    };
    model.visit(&mut norm);
    let total = norm.sum_squares.sqrt();

    let max_norm = f64::from(max_norm);
    if total > max_norm {
        let mut scale = GradScale {
            grads,
            factor: (max_norm / (total + 1e-6)) as f32,
        };
        model.visit(&mut scale);
    }
    total
}

struct GradNorm<'a> {
    grads: &'a GradientsParams,
    sum_squares: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradNorm<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            self.sum_squares += grad.powf_scalar(2.0).sum().into_scalar().elem::<f64>();
        }
    }
}

struct GradScale<'a> {
    grads: &'a mut GradientsParams,
    factor: f32,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradScale<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads
                .register::<B::InnerBackend, D>(id, grad.mul_scalar(self.factor));
        }
    }
}

/// Every contiguous window of `seq_len` rows, stride 1
pub fn build_sequences(rows: &[FeatureVector], seq_len: usize) -> Vec<Sequence> {
    if seq_len == 0 || rows.len() < seq_len {
        return Vec::new();
    }
    rows.windows(seq_len).map(|w| w.to_vec()).collect()
}

/// Shuffle whole items, then cut into (train, validation)
///
/// Both partitions are guaranteed non-empty.
pub fn shuffle_split<T, R: Rng + ?Sized>(
    mut items: Vec<T>,
    validation_fraction: f64,
    rng: &mut R,
) -> Result<(Vec<T>, Vec<T>)> {
    if items.len() < 2 {
        return Err(NetPulseError::MissingTrainingData(format!(
            "{} sequences cannot be split into train and validation",
            items.len()
        )));
    }

    items.shuffle(rng);
    let n = items.len();
    let cut = ((n as f64) * (1.0 - validation_fraction)).floor() as usize;
    let cut = cut.clamp(1, n - 1);
    let validation = items.split_off(cut);
    Ok((items, validation))
}

/// Summary statistics used to compare partitions
pub fn partition_summary(sequences: &[Sequence]) -> PartitionSummary {
    let values: Vec<f64> = sequences
        .iter()
        .flat_map(|s| s.iter().flat_map(|v| v.values))
        .collect();
    let (mean, std) = mean_std(&values);
    PartitionSummary {
        sequences: sequences.len(),
        mean,
        std,
    }
}

/// `threshold = mean + sigma * std` (population std)
pub fn calibrate_threshold(errors: &[f64], sigma: f64) -> ThresholdCalibration {
    let (error_mean, error_std) = mean_std(errors);
    ThresholdCalibration {
        error_mean,
        error_std,
        sigma,
        threshold: error_mean + sigma * error_std,
        samples: errors.len(),
    }
}

/// Cosine annealing from `initial` at epoch 0 towards `min` at `total_epochs`
pub fn cosine_annealing_lr(initial: f64, min: f64, epoch: usize, total_epochs: usize) -> f64 {
    if total_epochs == 0 {
        return initial;
    }
    let progress = epoch as f64 / total_epochs as f64;
    min + (initial - min) * (1.0 + (PI * progress).cos()) / 2.0
}

/// Full batches only, unless the partition is smaller than one batch
fn training_batches(order: &[usize], batch_size: usize) -> Vec<&[usize]> {
    if order.len() < batch_size {
        return vec![order];
    }
    order.chunks_exact(batch_size).collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mu = mean(values);
    let var = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    (mu, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::dataset::TelemetryRow;
    use burn::backend::{Autodiff, NdArray};
    use chrono::{Duration, NaiveDate};
    use rand_distr::StandardNormal;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn wave_table(n: usize) -> TrainingTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let rows = (0..n)
            .map(|i| {
                let phase = i as f64 / 8.0;
                let features = FeatureVector::from_metrics(
                    45.0 + 10.0 * phase.sin(),
                    60.0 + 5.0 * phase.cos(),
                    20.0 + 2.0 * phase.sin(),
                    0.4 + 0.1 * phase.cos(),
                    500.0 - 20.0 * phase.sin(),
                    0.018 + 0.002 * phase.cos(),
                );
                TelemetryRow::new(features, start + Duration::minutes(5 * i as i64), false, "normal")
            })
            .collect();
        TrainingTable::new(rows)
    }

    fn tiny_trainer(epochs: usize) -> AutoencoderTrainer<TestBackend> {
        AutoencoderTrainer::new(
            AutoencoderConfig {
                hidden_size: 4,
                seq_len: 4,
                ..Default::default()
            },
            TrainingConfig {
                epochs,
                batch_size: 8,
                ..Default::default()
            },
            Default::default(),
        )
    }

    /// Slowly trending AR(1) series copied into every feature
    fn drifting_series(n: usize, seed: u64) -> Vec<FeatureVector> {
        let mut rng = StdRng::seed_from_u64(seed);
        let phi: f64 = 0.995;
        let sigma = 2.0 * (1.0 - phi * phi).sqrt();
        let mut ar = 0.0;
        (0..n)
            .map(|t| {
                let noise: f64 = rng.sample(StandardNormal);
                ar = phi * ar + sigma * noise;
                let value = 50.0 + 20.0 * t as f64 / n as f64 + ar;
                FeatureVector::new([value; NUM_FEATURES])
            })
            .collect()
    }

    fn relative_gap(a: f64, b: f64) -> f64 {
        (a - b).abs() / a.abs().max(b.abs())
    }

    #[test]
    fn test_build_sequences_stride_one() {
        let rows: Vec<FeatureVector> = (0..10)
            .map(|i| FeatureVector::new([i as f64; NUM_FEATURES]))
            .collect();
        let seqs = build_sequences(&rows, 4);

        assert_eq!(seqs.len(), 7);
        for (start, seq) in seqs.iter().enumerate() {
            assert_eq!(seq.len(), 4);
            assert_eq!(seq[0].values[0], start as f64);
            assert_eq!(seq[3].values[0], (start + 3) as f64);
        }
        assert!(build_sequences(&rows[..3], 4).is_empty());
    }

    #[test]
    fn test_shuffle_split_partitions() {
        let items: Vec<usize> = (0..100).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let (train, val) = shuffle_split(items, 0.15, &mut rng).unwrap();

        assert_eq!(train.len(), 85);
        assert_eq!(val.len(), 15);

        let mut all: Vec<usize> = train.iter().chain(val.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
        // Shuffled, not a chronological cut
        assert_ne!(train, (0..85).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_split_keeps_both_sides() {
        let mut rng = StdRng::seed_from_u64(1);
        let (train, val) = shuffle_split(vec![1, 2], 0.15, &mut rng).unwrap();
        assert_eq!(train.len(), 1);
        assert_eq!(val.len(), 1);
        assert!(shuffle_split(vec![1], 0.15, &mut rng).is_err());
    }

    #[test]
    fn test_shuffled_split_matches_distribution() {
        let series = drifting_series(5000, 7);
        let seqs = build_sequences(&series, 30);

        let mut rng = StdRng::seed_from_u64(42);
        let (train, val) = shuffle_split(seqs.clone(), 0.15, &mut rng).unwrap();
        let shuffled_train = partition_summary(&train);
        let shuffled_val = partition_summary(&val);

        let cut = (seqs.len() as f64 * 0.85).floor() as usize;
        let chrono_train = partition_summary(&seqs[..cut]);
        let chrono_val = partition_summary(&seqs[cut..]);

        let shuffled_mean_gap = relative_gap(shuffled_train.mean, shuffled_val.mean);
        let shuffled_std_gap = relative_gap(shuffled_train.std, shuffled_val.std);
        let chrono_mean_gap = relative_gap(chrono_train.mean, chrono_val.mean);

        assert!(shuffled_mean_gap < 0.05, "shuffled mean gap {}", shuffled_mean_gap);
        assert!(shuffled_std_gap < 0.05, "shuffled std gap {}", shuffled_std_gap);
        assert!(chrono_mean_gap > 0.05, "chronological mean gap {}", chrono_mean_gap);
        assert!(chrono_mean_gap > 3.0 * shuffled_mean_gap);
    }

    #[test]
    fn test_calibrate_threshold() {
        let errors = [0.1, 0.2, 0.3, 0.4];
        let calibration = calibrate_threshold(&errors, 2.5);
        let mu = 0.25;
        let std = (0.0125f64).sqrt();

        assert!((calibration.error_mean - mu).abs() < 1e-12);
        assert!((calibration.error_std - std).abs() < 1e-12);
        assert!((calibration.threshold - (mu + 2.5 * std)).abs() < 1e-12);
        assert_eq!(calibration.samples, 4);
    }

    #[test]
    fn test_cosine_annealing_schedule() {
        let lr0 = cosine_annealing_lr(1e-3, 1e-5, 0, 80);
        let mid = cosine_annealing_lr(1e-3, 1e-5, 40, 80);
        let last = cosine_annealing_lr(1e-3, 1e-5, 79, 80);

        assert!((lr0 - 1e-3).abs() < 1e-15);
        assert!((mid - (1e-3 + 1e-5) / 2.0).abs() < 1e-12);
        assert!(last > 1e-5 && last < 2e-5);

        let mut prev = f64::MAX;
        for epoch in 0..80 {
            let lr = cosine_annealing_lr(1e-3, 1e-5, epoch, 80);
            assert!(lr <= prev);
            prev = lr;
        }
    }

    fn large_error_grads(
        model: &LstmAutoencoder<TestBackend>,
        device: &<TestBackend as Backend>::Device,
    ) -> GradientsParams {
        let far: Vec<FeatureVector> = (0..4)
            .map(|t| FeatureVector::new([40.0 + t as f64; NUM_FEATURES]))
            .collect();
        let input = sequences_to_tensor::<TestBackend>(&[&far, &far], 4, device);
        let loss = MseLoss::new().forward(model.forward(input.clone()), input, Reduction::Mean);
        GradientsParams::from_grads(loss.backward(), model)
    }

    #[test]
    fn test_optimizer_config() {
        let config = serde_json::to_value(optimizer_config()).unwrap();
        assert!((config["epsilon"].as_f64().unwrap() - 1e-8).abs() < 1e-12);
        // Per-tensor clipping would bypass the joint norm cap
        assert!(config["grad_clipping"].is_null());
    }

    #[test]
    fn test_clip_grad_norm_caps_joint_norm() {
        let device = Default::default();
        let model = AutoencoderConfig {
            hidden_size: 4,
            seq_len: 4,
            dropout: 0.0,
            ..Default::default()
        }
        .init::<TestBackend>(&device);
        let mut grads = large_error_grads(&model, &device);

        let before = clip_grad_norm(&model, &mut grads, 1.0);
        assert!(before > 1.0, "expected large gradients, got {}", before);

        let after = clip_grad_norm(&model, &mut grads, f32::INFINITY);
        assert!(after <= 1.0 + 1e-4, "joint norm after clipping = {}", after);
        assert!(after > 0.99);
    }

    #[test]
    fn test_clip_grad_norm_below_cap_is_noop() {
        let device = Default::default();
        let model = AutoencoderConfig {
            hidden_size: 4,
            seq_len: 4,
            dropout: 0.0,
            ..Default::default()
        }
        .init::<TestBackend>(&device);
        let mut grads = large_error_grads(&model, &device);

        let before = clip_grad_norm(&model, &mut grads, f32::INFINITY);
        let after = clip_grad_norm(&model, &mut grads, f32::INFINITY);
        assert_eq!(before, after);
    }

    #[test]
    fn test_training_batches_drop_last() {
        let order: Vec<usize> = (0..20).collect();
        let batches = training_batches(&order, 8);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 8));

        let small: Vec<usize> = (0..5).collect();
        assert_eq!(training_batches(&small, 8), vec![&small[..]]);
    }

    #[test]
    fn test_rejects_missing_normal_rows() {
        let mut table = wave_table(40);
        let anomalous: Vec<TelemetryRow> = table
            .rows()
            .iter()
            .cloned()
            .map(|mut r| {
                r.is_anomaly = true;
                r
            })
            .collect();
        table = TrainingTable::new(anomalous);

        let err = tiny_trainer(1).train(&table).unwrap_err();
        assert!(matches!(err, NetPulseError::MissingTrainingData(_)));

        let err = tiny_trainer(1).train(&wave_table(4)).unwrap_err();
        assert!(matches!(err, NetPulseError::MissingTrainingData(_)));
    }

    #[test]
    fn test_rejects_bad_input_size() {
        let trainer = AutoencoderTrainer::<TestBackend>::new(
            AutoencoderConfig {
                input_size: 5,
                ..Default::default()
            },
            TrainingConfig::default(),
            Default::default(),
        );
        let err = trainer.train(&wave_table(100)).unwrap_err();
        assert!(matches!(
            err,
            NetPulseError::InputDimension { expected: 6, got: 5 }
        ));
    }

    #[test]
    fn test_training_selects_best_epoch_and_calibrates() {
        let trained = tiny_trainer(4).train(&wave_table(80)).unwrap();
        let report = &trained.report;

        assert_eq!(report.epochs.len(), 4);
        assert_eq!(report.normal_rows, 80);
        assert_eq!(report.train.sequences + report.validation.sequences, 77);

        let min_val = report
            .epochs
            .iter()
            .map(|e| e.val_loss)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(report.best_val_loss, min_val);
        assert_eq!(report.epochs[report.best_epoch - 1].val_loss, min_val);

        assert_eq!(report.validation_errors.len(), report.validation.sequences);
        let (mu, std) = mean_std(&report.validation_errors);
        assert!((trained.threshold - (mu + 2.5 * std)).abs() < 1e-9);
        assert!(trained.threshold.is_finite() && trained.threshold > 0.0);
        assert!(trained.scaler.is_fitted());
    }

    #[test]
    fn test_training_is_reproducible() {
        let a = tiny_trainer(2).train(&wave_table(60)).unwrap();
        let b = tiny_trainer(2).train(&wave_table(60)).unwrap();
        assert_eq!(a.report.train, b.report.train);
        assert_eq!(a.report.validation, b.report.validation);
    }
}
