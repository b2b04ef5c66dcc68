//! Anomaly history and stream statistics
//!
//! Bounded record of flagged samples (oldest evicted first) plus running
//! point and anomaly counters. Records are immutable once appended.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NetPulseError, Result};
use crate::ml::detector::Prediction;
use crate::telemetry::LiveSample;

/// Default number of anomaly records kept
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// One flagged sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    /// Anomaly count at the time it was flagged
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub node_id: String,
    pub anomaly_type: String,
    pub anomaly_score: f64,
    pub reconstruction_error: f64,
    pub cpu_usage: f64,
    pub latency_ms: f64,
    pub packet_loss_pct: f64,
}

impl AnomalyRecord {
    pub fn new(id: u64, sample: &LiveSample, prediction: &Prediction) -> Self {
        Self {
            id,
            timestamp: sample.timestamp,
            node_id: sample.node_id.clone(),
            anomaly_type: sample.anomaly_type.clone(),
            anomaly_score: round_to(prediction.anomaly_score, 1),
            reconstruction_error: round_to(prediction.reconstruction_error, 6),
            cpu_usage: round_to(sample.features.cpu_usage(), 1),
            latency_ms: round_to(sample.features.latency_ms(), 1),
            packet_loss_pct: round_to(sample.features.packet_loss_pct(), 2),
        }
    }
}

/// Monotonic stream counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_points: u64,
    pub total_anomalies: u64,
}

impl SessionStats {
    /// Percentage of points flagged, 2 decimals
    pub fn anomaly_rate(&self) -> f64 {
        let rate = self.total_anomalies as f64 / self.total_points.max(1) as f64 * 100.0;
        round_to(rate, 2)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_points: self.total_points,
            total_anomalies: self.total_anomalies,
            anomaly_rate: self.anomaly_rate(),
        }
    }
}

/// Stats as reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_points: u64,
    pub total_anomalies: u64,
    pub anomaly_rate: f64,
}

/// Bounded anomaly history with its counters
#[derive(Debug, Clone)]
pub struct AnomalyJournal {
    records: VecDeque<AnomalyRecord>,
    capacity: usize,
    stats: SessionStats,
}

impl AnomalyJournal {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            stats: SessionStats::default(),
        }
    }

    /// Count one scored point, appending a record when it was flagged
    pub fn record(
        &mut self,
        sample: &LiveSample,
        prediction: &Prediction,
    ) -> (Option<AnomalyRecord>, StatsSnapshot) {
        self.stats.total_points += 1;

        let entry = if prediction.is_anomaly {
            self.stats.total_anomalies += 1;
            let record = AnomalyRecord::new(self.stats.total_anomalies, sample, prediction);
            if self.records.len() == self.capacity {
                self.records.pop_front();
            }
            self.records.push_back(record.clone());
            Some(record)
        } else {
            None
        };

        (entry, self.stats.snapshot())
    }

    /// Up to `limit` records, newest first
    pub fn recent(&self, limit: usize) -> Vec<AnomalyRecord> {
        self.records.iter().rev().take(limit).cloned().collect()
    }

    /// Records currently retained
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Retained history as CSV, oldest first; `None` when empty
    pub fn export_csv(&self) -> Result<Option<String>> {
        if self.records.is_empty() {
            return Ok(None);
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in &self.records {
            writer.serialize(record)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| NetPulseError::Io(e.into_error()))?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| NetPulseError::Serialization(e.to_string()))
    }
}

impl Default for AnomalyJournal {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
