//! Telemetry feature definitions
//!
//! The six network health metrics the autoencoder models, in the order the
//! model, scaler and training table all agree on.

use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};

/// Standard feature names, in model input order
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "cpu_usage",
    "memory_usage",
    "latency_ms",
    "packet_loss_pct",
    "bandwidth_mbps",
    "error_rate",
];

/// Number of features per telemetry sample
pub const NUM_FEATURES: usize = 6;

/// A single telemetry metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    CpuUsage,
    MemoryUsage,
    LatencyMs,
    PacketLossPct,
    BandwidthMbps,
    ErrorRate,
}

impl Feature {
    /// All features in model input order
    pub const ALL: [Feature; NUM_FEATURES] = [
        Feature::CpuUsage,
        Feature::MemoryUsage,
        Feature::LatencyMs,
        Feature::PacketLossPct,
        Feature::BandwidthMbps,
        Feature::ErrorRate,
    ];

    /// Column index in a feature vector
    pub fn index(self) -> usize {
        match self {
            Feature::CpuUsage => 0,
            Feature::MemoryUsage => 1,
            Feature::LatencyMs => 2,
            Feature::PacketLossPct => 3,
            Feature::BandwidthMbps => 4,
            Feature::ErrorRate => 5,
        }
    }

    /// Column name used in tables and payloads
    pub fn name(self) -> &'static str {
        FEATURE_NAMES[self.index()]
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One timestep of raw (or standardized) telemetry
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: [f64; NUM_FEATURES],
}

impl FeatureVector {
    pub fn new(values: [f64; NUM_FEATURES]) -> Self {
        Self { values }
    }

    /// Build from named metrics
    pub fn from_metrics(
        cpu_usage: f64,
        memory_usage: f64,
        latency_ms: f64,
        packet_loss_pct: f64,
        bandwidth_mbps: f64,
        error_rate: f64,
    ) -> Self {
        Self::new([
            cpu_usage,
            memory_usage,
            latency_ms,
            packet_loss_pct,
            bandwidth_mbps,
            error_rate,
        ])
    }

    #[inline]
    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    #[inline]
    pub fn set(&mut self, feature: Feature, value: f64) {
        self.values[feature.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }

    pub fn cpu_usage(&self) -> f64 {
        self.get(Feature::CpuUsage)
    }

    pub fn latency_ms(&self) -> f64 {
        self.get(Feature::LatencyMs)
    }

    pub fn packet_loss_pct(&self) -> f64 {
        self.get(Feature::PacketLossPct)
    }
}

impl Index<Feature> for FeatureVector {
    type Output = f64;

    fn index(&self, feature: Feature) -> &f64 {
        &self.values[feature.index()]
    }
}

impl From<[f64; NUM_FEATURES]> for FeatureVector {
    fn from(values: [f64; NUM_FEATURES]) -> Self {
        Self::new(values)
    }
}

/// Ordered window of feature vectors, oldest first
pub type Sequence = Vec<FeatureVector>;
