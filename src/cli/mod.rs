//! Exoplanet Classifier CLI Module
//!
//! Command-line interface for training, inspecting and querying the model bundle.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::ExoError;
use crate::inference::{InferenceService, PredictionResult};
use crate::schema::RawFeatures;
use crate::server::ServerConfig;
use crate::training::{
    check_min_records, CancellationToken, TrainingConfig, TrainingDataset, TrainingService, TrainingSource,
};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "exoplanet-classifier")]
#[command(author = "Exoplanet Classifier Team")]
#[command(version)]
#[command(about = "Classify exoplanet candidates with a gradient-boosted model", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server
    Serve {
        /// Server host
        #[arg(long)]
        host: Option<String>,

        /// Server port
        #[arg(short, long)]
        port: Option<u16>,

        /// Model bundle path
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Train a new model from a labelled CSV file
    Train {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Overwrite an existing model (not supported)
        #[arg(long)]
        force: bool,

        /// Training configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Model bundle path
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Show whether a model exists and training is allowed
    Status {
        /// Model bundle path
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Show metadata of the trained model
    Info {
        /// Model bundle path
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Classify candidates from a JSON file (one object or a list)
    Predict {
        /// Input JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Model bundle path
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}

fn resolve_model_path(model: Option<PathBuf>) -> PathBuf {
    model.unwrap_or_else(|| ServerConfig::default().model_path)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_serve(host: Option<String>, port: Option<u16>, model: Option<PathBuf>) -> anyhow::Result<()> {
    use crate::server::run_server;

    let mut config = ServerConfig::default();
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }
    if let Some(model) = model {
        config = config.with_model_path(model);
    }

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Exoplanet Classifier".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("API    ", &format!("http://{}:{}/api/v1", config.host, config.port)));
    line_box(&kv("Health ", &format!("http://{}:{}/api/v1/health", config.host, config.port)));
    line_box(&kv("Model  ", &config.model_path.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(config, TrainingConfig::default()).await
}

pub fn cmd_train(
    data_path: &Path,
    force: bool,
    config_path: Option<&Path>,
    model: Option<PathBuf>,
) -> anyhow::Result<()> {
    section("Train");

    let config = match config_path {
        Some(path) => TrainingConfig::load(path)?,
        None => TrainingConfig::default(),
    };
    let model_path = resolve_model_path(model);
    let service = TrainingService::new(&model_path, config);

    // Refuse before reading any data
    service.ensure_can_train(force)?;

    step_run(&format!("Loading {}", data_path.display()));
    let config = service.config();
    let dataset = TrainingDataset::from_csv_path(data_path, &config.feature_schema, &config.label_mapping)?;
    check_min_records(dataset.n_samples())?;
    step_done(&format!("{} records", dataset.n_samples()));

    step_run("Training LightGBM");
    let start = Instant::now();
    let outcome = service.train(TrainingSource::Dataset(dataset), force, &CancellationToken::new())?;
    step_done(&format!("{:?}", start.elapsed()));

    let report = &outcome.report;
    step_ok(&format!("Model saved → {}", report.model_path));

    println!();
    println!("  {:<18} {}", muted("Accuracy"), format!("{:.4}", report.metrics.accuracy).white().bold());
    println!("  {:<18} {}", muted("Train samples"), report.training_samples.to_string().white());
    println!("  {:<18} {}", muted("Test samples"), report.test_samples.to_string().white());
    println!("  {:<18} {}", muted("Features"), report.num_features.to_string().white());
    println!("  {:<18} {}", muted("Time"), format!("{:.3}s", report.training_duration_seconds).white());
    println!();
    for line in report.metrics.format_report(&report.label_mapping).lines() {
        println!("  {}", line);
    }
    println!();

    Ok(())
}

pub fn cmd_status(model: Option<PathBuf>) -> anyhow::Result<()> {
    section("Status");

    let model_path = resolve_model_path(model);
    let status = TrainingService::new(&model_path, TrainingConfig::default()).status();

    let exists = if status.model_exists { ok("yes") } else { muted("no") };
    println!("  {:<18} {}", muted("Model path"), status.model_path.white());
    println!("  {:<18} {}", muted("Model exists"), exists);
    println!("  {:<18} {}", muted("Can train"), status.can_train.to_string().white());
    println!("  {:<18} {}", muted("Message"), status.message);
    println!();

    Ok(())
}

pub fn cmd_info(model: Option<PathBuf>) -> anyhow::Result<()> {
    section("Model Info");

    let service = InferenceService::new(resolve_model_path(model));
    service.load()?;
    let info = service.model_info()?;

    println!("  {:<18} {}", muted("Type"), info.model_type.white().bold());
    println!("  {:<18} {}", muted("Version"), info.model_version.white());
    println!("  {:<18} {}", muted("Bundle format"), info.bundle_format_version.to_string().white());
    println!("  {:<18} {}", muted("Trained at"), info.trained_at.to_rfc3339().white());
    println!("  {:<18} {}", muted("Path"), info.model_path.white());
    println!("  {:<18} {}", muted("Labels"), info.labels.join(", ").white());
    println!("  {:<18} {}", muted("Features"), info.num_features.to_string().white());
    for name in &info.features {
        println!("    {} {}", dim("·"), name);
    }
    println!();

    Ok(())
}

/// Parse the predict input: a single feature object or a list of them
fn read_candidates(path: &Path) -> anyhow::Result<Vec<RawFeatures>> {
    let text = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    let candidates = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)?,
        serde_json::Value::Object(map) => vec![map],
        _ => anyhow::bail!("Input must be a JSON object or a list of objects"),
    };
    Ok(candidates)
}

fn print_prediction(index: usize, result: &PredictionResult) {
    println!(
        "  {} {:<16} {} {}",
        dim(&format!("#{:<3}", index)),
        result.prediction.white().bold(),
        format!("{:.4}", result.max_probability).white(),
        muted(&format!("({:?})", result.confidence).to_lowercase()),
    );
    for (label, p) in &result.probabilities {
        println!("        {:<16} {:.4}", muted(label), p);
    }
}

pub fn cmd_predict(input: &Path, model: Option<PathBuf>) -> anyhow::Result<()> {
    section("Predict");

    let service = InferenceService::new(resolve_model_path(model));
    step_run("Loading model");
    service.load()?;
    step_done("");

    let candidates = read_candidates(input)?;
    let results = service.predict_batch(&candidates)?;

    println!();
    let mut failed = 0usize;
    for (index, result) in results.iter().enumerate() {
        match result {
            Ok(prediction) => print_prediction(index, prediction),
            Err(e) => {
                failed += 1;
                print_failure(index, e);
            }
        }
    }
    println!();
    println!(
        "  {:<18} {}",
        muted("Processed"),
        format!("{} ({} failed)", results.len(), failed).white()
    );
    println!();

    Ok(())
}

fn print_failure(index: usize, error: &ExoError) {
    println!("  {} {}", dim(&format!("#{:<3}", index)), error.to_string().red());
}
