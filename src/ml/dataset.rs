//! Historical telemetry tables
//!
//! One row per timestep with the six feature columns, a timestamp, a ground
//! truth anomaly flag and an anomaly type label. Only normal rows are used to
//! fit the scaler and train the autoencoder.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use super::features::FeatureVector;
use crate::error::{NetPulseError, Result};

/// A single labelled telemetry row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRow {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub latency_ms: f64,
    pub packet_loss_pct: f64,
    pub bandwidth_mbps: f64,
    pub error_rate: f64,
    pub timestamp: NaiveDateTime,
    #[serde(serialize_with = "write_flag", deserialize_with = "read_flag")]
    pub is_anomaly: bool,
    pub anomaly_type: String,
}

impl TelemetryRow {
    pub fn new(
        features: FeatureVector,
        timestamp: NaiveDateTime,
        is_anomaly: bool,
        anomaly_type: impl Into<String>,
    ) -> Self {
        let [cpu_usage, memory_usage, latency_ms, packet_loss_pct, bandwidth_mbps, error_rate] =
            features.values;
        Self {
            cpu_usage,
            memory_usage,
            latency_ms,
            packet_loss_pct,
            bandwidth_mbps,
            error_rate,
            timestamp,
            is_anomaly,
            anomaly_type: anomaly_type.into(),
        }
    }

    pub fn features(&self) -> FeatureVector {
        FeatureVector::from_metrics(
            self.cpu_usage,
            self.memory_usage,
            self.latency_ms,
            self.packet_loss_pct,
            self.bandwidth_mbps,
            self.error_rate,
        )
    }
}

fn write_flag<S: Serializer>(flag: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*flag))
}

fn read_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid anomaly flag '{}'",
            other
        ))),
    }
}

/// Training table loaded from or written to CSV
#[derive(Debug, Clone, Default)]
pub struct TrainingTable {
    rows: Vec<TelemetryRow>,
}

impl TrainingTable {
    pub fn new(rows: Vec<TelemetryRow>) -> Self {
        Self { rows }
    }

    /// Load a CSV table with a header row
    pub fn load_csv(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(NetPulseError::MissingTrainingData(format!(
                "{} does not exist",
                path.display()
            )));
        }

        let file = File::open(path)?;
        let mut reader = csv::Reader::from_reader(BufReader::new(file));
        let mut rows = Vec::new();
        for (line, record) in reader.deserialize::<TelemetryRow>().enumerate() {
            let row = record.map_err(|e| {
                NetPulseError::MalformedTable(format!("row {}: {}", line + 1, e))
            })?;
            rows.push(row);
        }

        debug!("Loaded {} rows from {:?}", rows.len(), path);
        Ok(Self { rows })
    }

    /// Write the table as CSV with a header row
    pub fn save_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(BufWriter::new(file));
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn rows(&self) -> &[TelemetryRow] {
        &self.rows
    }

    pub fn push(&mut self, row: TelemetryRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Feature vectors of normal rows, in table order
    pub fn normal_vectors(&self) -> Vec<FeatureVector> {
        self.rows
            .iter()
            .filter(|r| !r.is_anomaly)
            .map(TelemetryRow::features)
            .collect()
    }

    pub fn anomaly_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_anomaly).count()
    }
}
