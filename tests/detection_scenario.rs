//! End-to-end detection: generate a table, train, persist, reload and score.

use std::sync::Arc;

use netpulse::ml::{
    AutoencoderConfig, AutoencoderTrainer, Detector, FeatureVector, ModelStore, Sequence,
    TrainingConfig, NUM_FEATURES,
};
use netpulse::stream::{ScoringState, SourceFactory, StreamConfig, StreamScorer, WindowScope};
use netpulse::telemetry::{generate_training_table, LiveSample, SyntheticTelemetry, TelemetrySource};
use netpulse::{InferenceBackend, TrainingBackend};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tempfile::TempDir;

const SEQ_LEN: usize = 30;

fn model_config() -> AutoencoderConfig {
    AutoencoderConfig {
        hidden_size: 16,
        seq_len: SEQ_LEN,
        ..Default::default()
    }
}

fn train() -> (Detector<InferenceBackend>, Vec<FeatureVector>, TempDir) {
    let table = generate_training_table(600, 30, 42);
    let normal = table.normal_vectors();

    let trainer = AutoencoderTrainer::<TrainingBackend>::new(
        model_config(),
        TrainingConfig {
            epochs: 5,
            batch_size: 32,
            ..Default::default()
        },
        Default::default(),
    );
    let trained = trainer.train(&table).expect("training succeeds");
    assert!(trained.threshold.is_finite() && trained.threshold > 0.0);

    let temp = TempDir::new().unwrap();
    let store = ModelStore::with_path(temp.path());
    store.save_trained(&trained).unwrap();

    let detector = store
        .load_detector::<InferenceBackend>(&model_config(), &Default::default())
        .unwrap();
    (detector, normal, temp)
}

fn feature_means(rows: &[FeatureVector]) -> [f64; NUM_FEATURES] {
    let mut means = [0.0; NUM_FEATURES];
    for row in rows {
        for (m, v) in means.iter_mut().zip(row.iter()) {
            *m += v / rows.len() as f64;
        }
    }
    means
}

/// Typical operating point with small jitter, optionally with pinned CPU
fn window(means: [f64; NUM_FEATURES], cpu: Option<f64>, seed: u64) -> Sequence {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..SEQ_LEN)
        .map(|_| {
            let mut values = means;
            for v in values.iter_mut() {
                let z: f64 = rng.sample(StandardNormal);
                *v += *v * 0.005 * z;
            }
            if let Some(cpu) = cpu {
                let z: f64 = rng.sample(StandardNormal);
                values[0] = cpu + z;
            }
            FeatureVector::new(values)
        })
        .collect()
}

#[test]
fn normal_and_cpu_spike_windows() {
    let (detector, normal, _temp) = train();
    let means = feature_means(&normal);

    let calm = detector.predict(&window(means, None, 1)).unwrap();
    let spike = detector.predict(&window(means, Some(90.0), 2)).unwrap();

    assert!(!calm.is_anomaly, "calm window flagged: {:?}", calm);
    assert!(spike.is_anomaly, "cpu spike missed: {:?}", spike);
    assert!(spike.anomaly_score > calm.anomaly_score);
    assert!(spike.reconstruction_error > calm.reconstruction_error);
    assert!((0.0..=100.0).contains(&spike.anomaly_score));

    // Reloaded detector is deterministic
    let again = detector.predict(&window(means, Some(90.0), 2)).unwrap();
    assert_eq!(spike, again);
}

#[test]
fn stream_flags_sustained_spike() {
    let (detector, normal, _temp) = train();
    let means = feature_means(&normal);

    let factory: SourceFactory =
        Arc::new(|| Box::new(SyntheticTelemetry::seeded(5)) as Box<dyn TelemetrySource>);
    let scorer = Arc::new(StreamScorer::new(
        Some(detector),
        SEQ_LEN,
        StreamConfig {
            window_scope: WindowScope::Shared,
            warm_start: false,
            ..Default::default()
        },
        factory,
    ));

    let mut last = None;
    for vector in window(means, None, 3) {
        last = Some(scorer.ingest(LiveSample::normal(vector, "NODE-01")).unwrap());
    }
    let last = last.unwrap();
    assert_eq!(last.state, ScoringState::Scoring);
    assert!(!last.is_anomaly);

    // Replace the whole window with a CPU spike
    let mut flagged = 0;
    for vector in window(means, Some(90.0), 4) {
        let payload = scorer.ingest(LiveSample::normal(vector, "NODE-02")).unwrap();
        if payload.is_anomaly {
            flagged += 1;
            assert!(payload.log_entry.is_some());
        }
    }
    assert!(flagged > 0);

    let stats = scorer.stats();
    assert_eq!(stats.total_points, 2 * SEQ_LEN as u64);
    assert_eq!(stats.total_anomalies, flagged);

    let (recent, total) = scorer.recent_anomalies(10);
    assert_eq!(total as u64, flagged);
    assert_eq!(recent[0].node_id, "NODE-02");
    assert_eq!(recent[0].id, flagged);
}
