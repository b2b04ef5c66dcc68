use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use netpulse::config::Config;
use netpulse::ml::{AutoencoderTrainer, ModelStore, TrainingTable};
use netpulse::server::{self, AppState};
use netpulse::stream::{SourceFactory, StreamScorer, WindowScope};
use netpulse::telemetry::{generate_training_table, SyntheticTelemetry, TelemetrySource};
use netpulse::{InferenceBackend, TrainingBackend};

#[derive(Parser)]
#[command(name = "netpulse")]
#[command(author, version, about = "LSTM autoencoder anomaly detection for network telemetry")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a synthetic training table
    Generate {
        /// Output CSV path (default: paths.training_data)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of normal rows
        #[arg(long, default_value = "5000")]
        normal: usize,

        /// Number of injected anomaly rows
        #[arg(long, default_value = "300")]
        anomalies: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Train the autoencoder and calibrate its threshold
    Train {
        /// Training CSV (default: paths.training_data)
        #[arg(short = 'i', long)]
        data: Option<PathBuf>,

        /// Override the configured number of epochs
        #[arg(short, long)]
        epochs: Option<usize>,
    },

    /// Serve the live scoring stream and REST API
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,

        /// Give each client its own window and telemetry source
        #[arg(long)]
        per_session: bool,
    },

    /// Show the stored model summary
    Info,

    /// Generate default configuration file
    GenConfig {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn run_command(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    match cli.command {
        Commands::Generate {
            output,
            normal,
            anomalies,
            seed,
        } => cmd_generate(config, output, normal, anomalies, seed),
        Commands::Train { data, epochs } => cmd_train(config, data, epochs).await,
        Commands::Serve { port, per_session } => cmd_serve(config, port, per_session).await,
        Commands::Info => cmd_info(config),
        Commands::GenConfig { output } => cmd_gen_config(output),
    }
}

fn cmd_generate(
    config: Config,
    output: Option<PathBuf>,
    normal: usize,
    anomalies: usize,
    seed: u64,
) -> Result<()> {
    let path = output.unwrap_or(config.paths.training_data);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let table = generate_training_table(normal, anomalies, seed);
    table
        .save_csv(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "Generated {} samples ({} normal + {} anomaly) -> {}",
        table.len(),
        normal,
        anomalies,
        path.display()
    );
    Ok(())
}

async fn cmd_train(config: Config, data: Option<PathBuf>, epochs: Option<usize>) -> Result<()> {
    let path = data.unwrap_or_else(|| config.paths.training_data.clone());
    let table = TrainingTable::load_csv(&path)
        .with_context(|| format!("Failed to load training data from {}", path.display()))?;
    info!(
        "Loaded {} rows ({} anomalous) from {}",
        table.len(),
        table.anomaly_count(),
        path.display()
    );

    let mut training = config.training.clone();
    if let Some(epochs) = epochs {
        training.epochs = epochs;
    }
    let model_config = config.model.clone();

    // Training is CPU bound; keep it off the async workers
    let trained = tokio::task::spawn_blocking(move || {
        AutoencoderTrainer::<TrainingBackend>::new(model_config, training, Default::default())
            .train(&table)
    })
    .await
    .context("Training task panicked")??;

    let store = ModelStore::with_path(&config.paths.data_dir);
    let metadata = store
        .save_trained(&trained)
        .with_context(|| format!("Failed to save model to {}", store.data_dir().display()))?;

    println!("{}", "Training complete".green().bold());
    println!("Best epoch:      {}", metadata.best_epoch);
    println!("Best val loss:   {:.6}", metadata.best_val_loss);
    println!("Error mean/std:  {:.6} / {:.6}", metadata.error_mean, metadata.error_std);
    println!("Threshold:       {:.6}", metadata.threshold);
    println!("Saved to:        {}", store.data_dir().display());
    Ok(())
}

async fn cmd_serve(mut config: Config, port: Option<u16>, per_session: bool) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if per_session {
        config.stream.window_scope = WindowScope::PerSession;
    }

    let store = ModelStore::with_path(&config.paths.data_dir);
    let device = Default::default();
    let detector = match store.load_detector::<InferenceBackend>(&config.model, &device) {
        Ok(detector) => {
            info!("Anomaly detector ready (threshold {:.6})", detector.threshold());
            Some(detector)
        }
        Err(e) => {
            warn!("Model not available ({}), run `netpulse train` first", e);
            None
        }
    };

    let probability = config.stream.anomaly_probability;
    let factory: SourceFactory = Arc::new(move || {
        Box::new(SyntheticTelemetry::from_entropy().with_anomaly_probability(probability))
            as Box<dyn TelemetrySource>
    });

    let scorer = Arc::new(StreamScorer::new(
        detector,
        config.model.seq_len,
        config.stream.clone(),
        factory,
    ));
    if config.stream.warm_start && config.stream.window_scope == WindowScope::Shared {
        scorer.warm_up();
    }
    info!(
        "Streaming every {}ms, window scope {}",
        config.stream.interval_ms,
        scorer.window_scope()
    );

    let state = Arc::new(AppState::new(
        scorer,
        config.model.clone(),
        config.training.threshold_sigma,
    ));
    server::serve(state, &config.server).await
}

fn cmd_info(config: Config) -> Result<()> {
    let store = ModelStore::with_path(&config.paths.data_dir);

    match store.load_metadata()? {
        Some(metadata) => {
            println!("{}", "Model: TRAINED".green().bold());
            println!("Saved at:        {}", metadata.saved_at.format("%Y-%m-%d %H:%M:%S"));
            println!("Shape:           {}", metadata.shape);
            println!("Dropout:         {}", metadata.dropout);
            println!("Threshold:       {:.6}", metadata.threshold);
            println!(
                "Best epoch:      {} of {} (val loss {:.6})",
                metadata.best_epoch, metadata.epochs, metadata.best_val_loss
            );
            println!(
                "Sequences:       {} train / {} validation from {} normal rows",
                metadata.train_sequences, metadata.validation_sequences, metadata.normal_rows
            );
        }
        None => {
            println!("{}", "Model: NOT TRAINED".yellow().bold());
            println!("No metadata in {}", store.data_dir().display());
        }
    }

    if !store.has_model() {
        println!("{}", "Checkpoint or scaler missing".dimmed());
    }
    Ok(())
}

fn cmd_gen_config(output: Option<PathBuf>) -> Result<()> {
    let config = Config::default();

    match output {
        Some(path) => {
            config
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Configuration written to {}", path.display());
        }
        None => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
