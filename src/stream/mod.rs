//! Streaming Scoring Pipeline
//!
//! Pushes live samples through a sequence window into the detector, keeps
//! the anomaly history and counters, and builds the per-tick payload sent to
//! clients.
//!
//! # Example
//! ```ignore
//! let scorer = Arc::new(StreamScorer::new(Some(detector), StreamConfig::default(), factory));
//! scorer.warm_up();
//!
//! let mut session = scorer.open_session();
//! let payload = session.tick()?;
//! println!("{}", serde_json::to_string(&payload)?);
//! ```

pub mod journal;
pub mod scorer;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use journal::{
    round_to, AnomalyJournal, AnomalyRecord, SessionStats, StatsSnapshot,
    DEFAULT_HISTORY_CAPACITY,
};
pub use scorer::{ScoringState, SourceFactory, StreamPayload, StreamScorer, StreamSession};

/// Which sessions share a sequence window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowScope {
    /// One window and telemetry source advanced jointly by every session
    #[default]
    Shared,
    /// Each session owns its window and telemetry source
    PerSession,
}

impl fmt::Display for WindowScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowScope::Shared => f.write_str("shared"),
            WindowScope::PerSession => f.write_str("per_session"),
        }
    }
}

/// Streaming configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Delay between ticks of a session, in milliseconds
    pub interval_ms: u64,
    /// Anomaly records retained for queries
    pub history_capacity: usize,
    pub window_scope: WindowScope,
    /// Prime windows with normal samples so scoring starts on the first tick
    pub warm_start: bool,
    /// Chance of a random injected anomaly in the synthetic source
    pub anomaly_probability: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            window_scope: WindowScope::Shared,
            warm_start: true,
            anomaly_probability: crate::telemetry::DEFAULT_ANOMALY_PROBABILITY,
        }
    }
}
