//! Stream scorer and sessions
//!
//! One `StreamScorer` is shared by every connected session. Depending on the
//! [`WindowScope`] a session either advances the process-wide window and
//! telemetry source or owns private ones. History and stats are always
//! process-wide.
//!
//! Lock order is context -> detector -> journal. A tick holds the context
//! lock through prediction and journaling, so samples enter the window and
//! the history in the same order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use burn::tensor::backend::Backend;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::journal::{round_to, AnomalyJournal, AnomalyRecord, StatsSnapshot};
use super::{StreamConfig, WindowScope};
use crate::error::Result;
use crate::ml::autoencoder::ModelShape;
use crate::ml::detector::{Detector, Prediction};
use crate::ml::window::SequenceWindow;
use crate::telemetry::{LiveSample, TelemetrySource};

/// Builds a telemetry source for a new scoring context
pub type SourceFactory = Arc<dyn Fn() -> Box<dyn TelemetrySource> + Send + Sync>;

/// Whether the window is full enough to score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringState {
    Warming,
    Scoring,
}

/// Message emitted for every tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamPayload {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub latency_ms: f64,
    pub packet_loss_pct: f64,
    pub bandwidth_mbps: f64,
    pub error_rate: f64,
    pub timestamp: DateTime<Utc>,
    pub node_id: String,
    /// Ground truth from the source, not used for scoring
    pub injected: bool,
    pub anomaly_type: String,
    pub severity: f64,
    pub state: ScoringState,
    pub is_anomaly: bool,
    pub anomaly_score: f64,
    pub reconstruction_error: f64,
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_entry: Option<AnomalyRecord>,
    pub stats: StatsSnapshot,
}

impl StreamPayload {
    fn new(
        sample: LiveSample,
        state: ScoringState,
        prediction: Prediction,
        log_entry: Option<AnomalyRecord>,
        stats: StatsSnapshot,
    ) -> Self {
        let [cpu_usage, memory_usage, latency_ms, packet_loss_pct, bandwidth_mbps, error_rate] =
            sample.features.values;
        Self {
            cpu_usage,
            memory_usage,
            latency_ms,
            packet_loss_pct,
            bandwidth_mbps,
            error_rate,
            timestamp: sample.timestamp,
            node_id: sample.node_id,
            injected: sample.injected,
            anomaly_type: sample.anomaly_type,
            severity: sample.severity,
            state,
            is_anomaly: prediction.is_anomaly,
            anomaly_score: round_to(prediction.anomaly_score, 1),
            reconstruction_error: prediction.reconstruction_error,
            threshold: prediction.threshold,
            log_entry,
            stats,
        }
    }
}

fn neutral() -> Prediction {
    Prediction {
        reconstruction_error: 0.0,
        threshold: 0.0,
        is_anomaly: false,
        anomaly_score: 0.0,
    }
}

/// A window and the source that feeds it
struct ScoringContext {
    window: SequenceWindow,
    source: Box<dyn TelemetrySource>,
}

impl ScoringContext {
    fn warm(&mut self) -> usize {
        let needed = self.window.capacity().saturating_sub(self.window.len());
        for _ in 0..needed {
            let sample = self.source.next_normal_sample();
            self.window.push(sample.features);
        }
        needed
    }
}

/// Process-wide scoring state
pub struct StreamScorer<B: Backend> {
    detector: Option<Mutex<Detector<B>>>,
    threshold: Option<f64>,
    shape: Option<ModelShape>,
    seq_len: usize,
    config: StreamConfig,
    shared: Mutex<ScoringContext>,
    journal: Mutex<AnomalyJournal>,
    source_factory: SourceFactory,
    sessions: AtomicUsize,
}

impl<B: Backend> StreamScorer<B> {
    /// Create a scorer; without a detector every verdict is neutral
    ///
    /// `seq_len` sizes the windows when no detector is loaded.
    pub fn new(
        detector: Option<Detector<B>>,
        seq_len: usize,
        config: StreamConfig,
        source_factory: SourceFactory,
    ) -> Self {
        let threshold = detector.as_ref().map(Detector::threshold);
        let shape = detector.as_ref().map(Detector::shape);
        let seq_len = detector.as_ref().map(Detector::seq_len).unwrap_or(seq_len);
        if detector.is_none() {
            warn!("No detector loaded, streaming with neutral verdicts");
        }

        let shared = ScoringContext {
            window: SequenceWindow::new(seq_len),
            source: source_factory(),
        };

        Self {
            detector: detector.map(Mutex::new),
            threshold,
            shape,
            seq_len,
            journal: Mutex::new(AnomalyJournal::new(config.history_capacity)),
            config,
            shared: Mutex::new(shared),
            source_factory,
            sessions: AtomicUsize::new(0),
        }
    }

    /// Fill the shared window with normal samples
    pub fn warm_up(&self) -> usize {
        let pushed = self.shared.lock().warm();
        debug!("Warmed shared window with {} samples", pushed);
        pushed
    }

    /// Register a session; dropping the handle unregisters it
    pub fn open_session(self: &Arc<Self>) -> StreamSession<B> {
        let local = match self.config.window_scope {
            WindowScope::Shared => None,
            WindowScope::PerSession => {
                let mut context = self.new_context();
                if self.config.warm_start {
                    context.warm();
                }
                Some(context)
            }
        };
        let active = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Session opened | Total: {}", active);

        StreamSession {
            scorer: Arc::clone(self),
            local,
        }
    }

    fn new_context(&self) -> ScoringContext {
        ScoringContext {
            window: SequenceWindow::new(self.seq_len),
            source: (self.source_factory)(),
        }
    }

    /// Score an externally supplied sample against the shared window
    pub fn ingest(&self, sample: LiveSample) -> Result<StreamPayload> {
        let mut shared = self.shared.lock();
        self.score_into(&mut shared.window, sample)
    }

    fn advance(&self, context: &mut ScoringContext) -> Result<StreamPayload> {
        let sample = context.source.next_sample(false);
        self.score_into(&mut context.window, sample)
    }

    fn score_into(&self, window: &mut SequenceWindow, sample: LiveSample) -> Result<StreamPayload> {
        window.push(sample.features);

        let (state, prediction) = match window.ready_sequence() {
            None => (ScoringState::Warming, neutral()),
            Some(sequence) => match &self.detector {
                Some(detector) => (ScoringState::Scoring, detector.lock().predict(&sequence)?),
                None => (ScoringState::Scoring, neutral()),
            },
        };

        let (log_entry, stats) = self.journal.lock().record(&sample, &prediction);
        if let Some(entry) = &log_entry {
            debug!(
                "Anomaly #{} on {} score={:.1} error={:.6}",
                entry.id, entry.node_id, entry.anomaly_score, entry.reconstruction_error
            );
        }

        Ok(StreamPayload::new(sample, state, prediction, log_entry, stats))
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.journal.lock().stats()
    }

    /// Up to `limit` anomaly records, newest first, and the retained total
    pub fn recent_anomalies(&self, limit: usize) -> (Vec<AnomalyRecord>, usize) {
        let journal = self.journal.lock();
        (journal.recent(limit), journal.len())
    }

    pub fn export_csv(&self) -> Result<Option<String>> {
        self.journal.lock().export_csv()
    }

    pub fn connected_sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub fn model_loaded(&self) -> bool {
        self.detector.is_some()
    }

    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn shape(&self) -> Option<ModelShape> {
        self.shape
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn window_scope(&self) -> WindowScope {
        self.config.window_scope
    }
}

/// A connected consumer of the stream
pub struct StreamSession<B: Backend> {
    scorer: Arc<StreamScorer<B>>,
    local: Option<ScoringContext>,
}

impl<B: Backend> StreamSession<B> {
    /// Produce, score and journal one sample
    pub fn tick(&mut self) -> Result<StreamPayload> {
        match self.local.as_mut() {
            Some(context) => self.scorer.advance(context),
            None => {
                let mut shared = self.scorer.shared.lock();
                self.scorer.advance(&mut shared)
            }
        }
    }
}

impl<B: Backend> Drop for StreamSession<B> {
    fn drop(&mut self) {
        let remaining = self.scorer.sessions.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!("Session closed | Total: {}", remaining);
    }
}
