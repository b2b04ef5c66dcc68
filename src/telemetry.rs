//! Synthetic network telemetry
//!
//! AR(1) autoregressive generators for the six metrics. Each value depends
//! on the previous one, so the series is smooth and temporally correlated
//! the way real node metrics are. Used to produce training tables and to
//! drive the live stream when no real collector is attached.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::ml::dataset::{TelemetryRow, TrainingTable};
use crate::ml::features::{Feature, FeatureVector, NUM_FEATURES};

/// Probability that a live sample carries an injected anomaly
pub const DEFAULT_ANOMALY_PROBABILITY: f64 = 0.08;

/// Number of simulated nodes the live stream rotates through
pub const NODE_COUNT: u64 = 6;

/// Injected anomaly patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    CpuSpike,
    MemoryLeak,
    LatencySurge,
    PacketStorm,
    BandwidthDrop,
    ErrorFlood,
}

impl AnomalyKind {
    pub const ALL: [AnomalyKind; 6] = [
        AnomalyKind::CpuSpike,
        AnomalyKind::MemoryLeak,
        AnomalyKind::LatencySurge,
        AnomalyKind::PacketStorm,
        AnomalyKind::BandwidthDrop,
        AnomalyKind::ErrorFlood,
    ];

    /// Label for ground truth
    pub fn label(&self) -> &'static str {
        match self {
            AnomalyKind::CpuSpike => "cpu_spike",
            AnomalyKind::MemoryLeak => "memory_leak",
            AnomalyKind::LatencySurge => "latency_surge",
            AnomalyKind::PacketStorm => "packet_storm",
            AnomalyKind::BandwidthDrop => "bandwidth_drop",
            AnomalyKind::ErrorFlood => "error_flood",
        }
    }

    /// Affected feature and the (mean, std) its value is drawn from
    pub fn target(&self) -> (Feature, f64, f64) {
        match self {
            AnomalyKind::CpuSpike => (Feature::CpuUsage, 85.0, 8.0),
            AnomalyKind::MemoryLeak => (Feature::MemoryUsage, 88.0, 5.0),
            AnomalyKind::LatencySurge => (Feature::LatencyMs, 180.0, 40.0),
            AnomalyKind::PacketStorm => (Feature::PacketLossPct, 18.0, 6.0),
            AnomalyKind::BandwidthDrop => (Feature::BandwidthMbps, 40.0, 20.0),
            AnomalyKind::ErrorFlood => (Feature::ErrorRate, 0.45, 0.1),
        }
    }

    /// Overwrite the affected feature with a draw from the anomaly distribution
    pub fn inject<R: Rng + ?Sized>(&self, vector: &mut FeatureVector, rng: &mut R) {
        let (feature, mean, std) = self.target();
        let noise: f64 = rng.sample(StandardNormal);
        vector.set(feature, (mean + std * noise).max(0.0));
    }

    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

/// One live telemetry point with its ground truth
///
/// `injected`, `anomaly_type` and `severity` describe what the generator did;
/// they are reported alongside verdicts but never used for scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSample {
    pub features: FeatureVector,
    pub timestamp: DateTime<Utc>,
    pub node_id: String,
    pub injected: bool,
    pub anomaly_type: String,
    pub severity: f64,
}

impl LiveSample {
    /// A normal sample for `node_id` stamped now
    pub fn normal(features: FeatureVector, node_id: impl Into<String>) -> Self {
        Self {
            features,
            timestamp: Utc::now(),
            node_id: node_id.into(),
            injected: false,
            anomaly_type: "normal".to_string(),
            severity: 0.0,
        }
    }
}

/// Produces the next live telemetry sample
pub trait TelemetrySource: Send {
    /// Next sample; `force_anomaly` injects an anomaly unconditionally
    fn next_sample(&mut self, force_anomaly: bool) -> LiveSample;

    /// Next sample guaranteed free of injected anomalies
    fn next_normal_sample(&mut self) -> LiveSample {
        self.next_sample(false)
    }
}

/// Mean-reverting live generator with a slow daily cycle
#[derive(Debug, Clone)]
pub struct SyntheticTelemetry {
    rng: StdRng,
    state: FeatureVector,
    tick: u64,
    anomaly_probability: f64,
}

impl SyntheticTelemetry {
    const PHI: f64 = 0.95;

    /// Generator with a fixed seed, for reproducible streams
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    /// Generator seeded from the OS
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            state: FeatureVector::from_metrics(45.0, 60.0, 20.0, 0.4, 500.0, 0.018),
            tick: 0,
            anomaly_probability: DEFAULT_ANOMALY_PROBABILITY,
        }
    }

    /// Set the chance of a random injected anomaly per sample
    pub fn with_anomaly_probability(mut self, probability: f64) -> Self {
        self.anomaly_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    fn noise(&mut self, std: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        z * std
    }

    /// Advance the AR(1) state by one step
    fn step(&mut self) -> FeatureVector {
        let phi = Self::PHI;
        let cycle = 8.0 * (2.0 * std::f64::consts::PI * self.tick as f64 / 1440.0).sin();
        let [cpu, mem, lat, pkt, bw, err] = self.state.values;

        let cpu = (cpu * phi + 45.0 * (1.0 - phi) + cycle * (1.0 - phi) + self.noise(1.2))
            .clamp(5.0, 95.0);
        let mem = (mem * phi + 60.0 * (1.0 - phi) + self.noise(0.8)).clamp(15.0, 95.0);
        let lat = (lat * phi + 20.0 * (1.0 - phi) + 0.05 * (cpu - 45.0) + self.noise(0.8))
            .clamp(1.0, 100.0);
        let pkt = (pkt * 0.90 + 0.4 * 0.10 + self.noise(0.04)).clamp(0.0, 5.0);
        let bw = (bw * phi + 500.0 * (1.0 - phi) - 0.3 * (cpu - 45.0) + self.noise(8.0))
            .clamp(50.0, 1000.0);
        let err = (err * 0.88 + 0.018 * 0.12 + self.noise(0.001)).clamp(0.0, 0.3);

        self.state = FeatureVector::from_metrics(cpu, mem, lat, pkt, bw, err);
        self.state
    }

    fn emit(&mut self, inject: bool) -> LiveSample {
        let node_id = format!("NODE-{:02}", self.tick % NODE_COUNT + 1);
        let mut features = self.step();
        self.tick += 1;

        let mut sample = LiveSample::normal(features, node_id);
        if inject {
            let kind = AnomalyKind::random(&mut self.rng);
            kind.inject(&mut features, &mut self.rng);
            sample.features = features;
            sample.injected = true;
            sample.anomaly_type = kind.label().to_string();
            sample.severity = severity(&features);
        }
        sample
    }
}

impl TelemetrySource for SyntheticTelemetry {
    fn next_sample(&mut self, force_anomaly: bool) -> LiveSample {
        let inject = force_anomaly || self.rng.random::<f64>() < self.anomaly_probability;
        self.emit(inject)
    }

    fn next_normal_sample(&mut self) -> LiveSample {
        self.emit(false)
    }
}

/// Deviation from typical operating values, 0-100 (1 decimal)
///
/// Mean over features of `min(|z| / 5, 1)`.
pub fn severity(vector: &FeatureVector) -> f64 {
    const TYPICAL: [(f64, f64); NUM_FEATURES] = [
        (45.0, 10.0),
        (60.0, 8.0),
        (20.0, 5.0),
        (0.4, 0.3),
        (500.0, 80.0),
        (0.018, 0.01),
    ];
    let total: f64 = vector
        .iter()
        .zip(TYPICAL.iter())
        .map(|(v, (mu, sigma))| ((v - mu).abs() / sigma / 5.0).min(1.0))
        .sum();
    (total / NUM_FEATURES as f64 * 1000.0).round() / 10.0
}

/// Zero-mean AR(1) series with stationary standard deviation `sigma`
fn ar1(rng: &mut StdRng, n: usize, sigma: f64, phi: f64) -> Vec<f64> {
    let innovation = sigma * (1.0 - phi * phi).sqrt();
    let mut series = Vec::with_capacity(n);
    let mut x = 0.0;
    for t in 0..n {
        if t > 0 {
            let z: f64 = rng.sample(StandardNormal);
            x = phi * x + innovation * z;
        }
        series.push(x);
    }
    series
}

/// Smooth, cross-correlated normal traffic
///
/// CPU follows a business-hours cycle (period 288 steps) plus AR(1) noise;
/// memory and latency track CPU, bandwidth moves against it, and packet
/// loss drives the error rate.
pub fn generate_normal_series(n: usize, seed: u64) -> Vec<FeatureVector> {
    let mut rng = StdRng::seed_from_u64(seed);

    let cpu_noise = ar1(&mut rng, n, 3.0, 0.97);
    let mem_drift = ar1(&mut rng, n, 1.5, 0.99);
    let lat_noise = ar1(&mut rng, n, 1.5, 0.90);
    let pkt_base = ar1(&mut rng, n, 0.08, 0.85);
    let bw_noise = ar1(&mut rng, n, 15.0, 0.96);
    let err_noise = ar1(&mut rng, n, 0.003, 0.88);

    (0..n)
        .map(|t| {
            let cycle = 10.0 * (2.0 * std::f64::consts::PI * t as f64 / 288.0).sin();
            let cpu_base = cpu_noise[t] + cycle;
            FeatureVector::from_metrics(
                (45.0 + cpu_base).clamp(5.0, 95.0),
                (60.0 + mem_drift[t] + 0.15 * cpu_base).clamp(15.0, 95.0),
                (18.0 + 0.12 * cpu_base + lat_noise[t]).clamp(1.0, 150.0),
                (0.4 + pkt_base[t]).clamp(0.0, 5.0),
                (500.0 - 0.5 * cpu_base + bw_noise[t]).clamp(50.0, 1000.0),
                (0.018 + 0.005 * pkt_base[t] + err_noise[t]).clamp(0.0, 0.5),
            )
        })
        .collect()
}

fn table_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Labelled training table: normal rows then injected anomaly rows
///
/// Rows are five minutes apart; anomaly rows start 40 days after the normal
/// block and are drawn on their own normal background.
pub fn generate_training_table(n_normal: usize, n_anomaly: usize, seed: u64) -> TrainingTable {
    let base = table_epoch();
    let mut table = TrainingTable::default();

    for (i, features) in generate_normal_series(n_normal, seed).into_iter().enumerate() {
        table.push(TelemetryRow::new(
            features,
            base + Duration::minutes(5 * i as i64),
            false,
            "normal",
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    let background = generate_normal_series(n_anomaly, seed.wrapping_add(57));
    let anomaly_start = base + Duration::days(40);
    for (i, mut features) in background.into_iter().enumerate() {
        let kind = AnomalyKind::random(&mut rng);
        kind.inject(&mut features, &mut rng);
        table.push(TelemetryRow::new(
            features,
            anomaly_start + Duration::minutes(5 * i as i64),
            true,
            kind.label(),
        ));
    }

    table
}
