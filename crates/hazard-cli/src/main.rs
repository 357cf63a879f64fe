use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use hazard_core::classes::ClassRole;
use hazard_core::decode::Calibration;
use hazard_core::preprocess::{load_image, preprocess};
use hazard_core::{
    FrameOutcome, HazardError, HazardObject, HazardSession, HouseholdDangerIndex, ImageTensor, ObjectClass,
    PipelineConfig, RawTensor, ReplayBackend, SafetyRecommendation,
};

#[derive(Debug, Parser)]
#[command(name = "hazscan", version, about = "Household hazard assessment from detector output")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the config and print the effective model contract.
    Doctor,
    /// Print the class table with calibration and categorical labels.
    Classes,
    /// Run recorded tensors (one JSON file per frame) through the pipeline in order.
    Assess {
        #[arg(required = true)]
        tensors: Vec<String>,
        #[arg(long)]
        room: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Replay a multi-frame recording on a capture timer, dropping ticks while busy.
    Replay {
        recording: String,
        /// Image fed to the backend; replayed tensors ignore its pixels.
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        interval_ms: Option<u64>,
        #[arg(long)]
        frames: Option<usize>,
        /// Restart the recording when it runs out.
        #[arg(long = "loop")]
        looping: bool,
        #[arg(long)]
        timeout_ms: Option<u64>,
        #[arg(long)]
        room: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct Config {
    pipeline: PipelineConfig,
    runtime: RuntimeCfg,
}

#[derive(Debug, serde::Deserialize)]
#[serde(default)]
struct RuntimeCfg {
    /// One class name per line; overrides pipeline.model.class_names.
    labels_path: Option<String>,
    interval_ms: u64,
    frame_timeout_ms: u64,
    room: Option<String>,
}

impl Default for RuntimeCfg {
    fn default() -> Self {
        Self { labels_path: None, interval_ms: 500, frame_timeout_ms: 2000, room: None }
    }
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    let mut cfg: Config = toml::from_str(&s).context("parse config toml")?;
    if let Some(labels) = &cfg.runtime.labels_path {
        cfg.pipeline.model.class_names = load_labels(labels)?;
    }
    Ok(cfg)
}

fn load_labels(path: &str) -> Result<Vec<String>> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read labels {}", path))?;
    let names: Vec<String> = s.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect();
    anyhow::ensure!(!names.is_empty(), "labels file {} is empty", path);
    Ok(names)
}

fn load_tensor(path: &str) -> Result<RawTensor> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read tensor {}", path))?;
    serde_json::from_str(&s).with_context(|| format!("parse tensor {}", path))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Classes => classes(&cfg),
        Command::Assess { tensors, room, json } => assess(&cfg, &tensors, room.or(cfg.runtime.room.clone()), json)?,
        Command::Replay { recording, image, interval_ms, frames, looping, timeout_ms, room, json } => {
            let opts = ReplayOpts {
                recording,
                image,
                interval: Duration::from_millis(interval_ms.unwrap_or(cfg.runtime.interval_ms).max(1)),
                frames,
                looping,
                timeout: Duration::from_millis(timeout_ms.unwrap_or(cfg.runtime.frame_timeout_ms)),
                room: room.or(cfg.runtime.room.clone()),
                json,
            };
            replay(cfg, opts).await?
        }
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    cfg.pipeline.validate().context("pipeline config")?;

    let model = &cfg.pipeline.model;
    let unknown: Vec<&str> = model
        .class_names
        .iter()
        .filter(|n| ObjectClass::from_label(n).is_none())
        .map(|n| n.as_str())
        .collect();
    if !unknown.is_empty() {
        warn!("doctor: {} label(s) not in the class table, defaults apply: {:?}", unknown.len(), unknown);
    }
    anyhow::ensure!(
        cfg.runtime.frame_timeout_ms >= cfg.runtime.interval_ms,
        "runtime.frame_timeout_ms should be >= runtime.interval_ms"
    );

    println!("tensor shape: {:?}", model.tensor_shape());
    println!("input: {}x{} RGB", model.input_width, model.input_height);
    info!("doctor: OK");
    Ok(())
}

fn classes(cfg: &Config) {
    let cal = Calibration::from_config(&cfg.pipeline.decode);
    println!("{:>3}  {:<20} {:<8} {:>5} {:>5}  labels", "idx", "name", "role", "mult", "min");
    for (i, name) in cfg.pipeline.model.class_names.iter().enumerate() {
        let class = ObjectClass::from_label(name);
        let role = match class.map(|c| c.role()) {
            Some(ClassRole::Hazard) => "hazard",
            Some(ClassRole::Edge) => "edge",
            Some(ClassRole::Surface(_)) => "surface",
            None => "unknown",
        };
        let labels = hazard_core::classify::categorical_labels(class)
            .iter()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let blocked = if cal.is_blocked(name) { " [blocked]" } else { "" };
        println!(
            "{:>3}  {:<20} {:<8} {:>5.2} {:>5.2}  {}{}",
            i, name, role, cal.multiplier(name), cal.threshold(name), labels, blocked
        );
    }
}

#[derive(Serialize)]
struct Report<'a> {
    room: Option<&'a str>,
    hdi: f32,
    severity: &'static str,
    interpretation: &'static str,
    hazards: &'a [HazardObject],
    recommendations: Vec<SafetyRecommendation>,
}

fn print_report(idx: &HouseholdDangerIndex, json: bool) -> Result<()> {
    let report = Report {
        room: idx.room_name.as_deref(),
        hdi: idx.calculate_hdi(),
        severity: idx.severity().as_str(),
        interpretation: idx.interpretation(),
        hazards: &idx.hazards,
        recommendations: idx.generate_recommendations(),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report).context("serialize report")?);
        return Ok(());
    }

    println!(
        "HDI {:.2} ({}) room={}",
        report.hdi,
        report.interpretation,
        report.room.unwrap_or("-")
    );
    for h in report.hazards {
        let labels = h.hazard_labels().iter().map(|l| l.as_str()).collect::<Vec<_>>().join(",");
        println!(
            "  {} {:<18} {:.2} {:<16} conf={:.2} edge={} [{}]",
            h.id, h.object_name, h.risk_score(), h.risk_level().as_str(), h.confidence, h.is_near_edge, labels
        );
    }
    for r in &report.recommendations {
        println!("  [{:?}] {}: {}", r.priority, r.category, r.message);
    }
    Ok(())
}

fn assess(cfg: &Config, tensors: &[String], room: Option<String>, json: bool) -> Result<()> {
    let session = HazardSession::new(cfg.pipeline.clone()).context("create session")?;
    let mut current: Vec<HazardObject> = Vec::new();

    for path in tensors {
        let tensor = load_tensor(path)?;
        current = match session.process_tensor(&tensor) {
            Ok(FrameOutcome::Processed(h)) => h,
            Ok(FrameOutcome::Skipped) => continue,
            Err(e) => {
                warn!("assess: frame {} failed, treating as no detections: {}", path, e);
                Vec::new()
            }
        };
        info!("assess: {} -> {} hazard(s)", path, current.len());
    }

    print_report(&session.assess(current, room.as_deref()), json)
}

struct ReplayOpts {
    recording: String,
    image: Option<String>,
    interval: Duration,
    frames: Option<usize>,
    looping: bool,
    timeout: Duration,
    room: Option<String>,
    json: bool,
}

enum FrameResult {
    Done(Result<FrameOutcome, HazardError>),
    TimedOut,
    Panicked(String),
}

async fn replay(cfg: Config, opts: ReplayOpts) -> Result<()> {
    let backend = ReplayBackend::load(&opts.recording)?.looping(opts.looping);
    let frames = opts.frames.unwrap_or(backend.len());
    let (w, h) = (cfg.pipeline.model.input_width, cfg.pipeline.model.input_height);

    let input = Arc::new(match &opts.image {
        Some(p) => preprocess(&load_image(p)?, w, h),
        None => ImageTensor::blank(w, h),
    });
    let session = Arc::new(
        HazardSession::new(cfg.pipeline)
            .context("create session")?
            .with_backend(Box::new(backend)),
    );

    let (tx, mut rx) = mpsc::channel::<(usize, FrameResult)>(8);
    let mut ticker = tokio::time::interval(opts.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut current: Vec<HazardObject> = Vec::new();
    let (mut spawned, mut received, mut skipped) = (0usize, 0usize, 0usize);

    while received < frames {
        tokio::select! {
            _ = ticker.tick(), if spawned < frames => {
                let tick = spawned;
                spawned += 1;
                if session.is_busy() {
                    // the session would skip it anyway; avoid a blocking task
                    skipped += 1;
                    received += 1;
                    warn!("replay: tick {} dropped, frame in flight", tick);
                    continue;
                }
                let (session, input, tx) = (session.clone(), input.clone(), tx.clone());
                let timeout = opts.timeout;
                tokio::spawn(async move {
                    let job = tokio::task::spawn_blocking(move || session.detect_hazards(&input));
                    let res = match tokio::time::timeout(timeout, job).await {
                        Ok(Ok(r)) => FrameResult::Done(r),
                        Ok(Err(e)) => FrameResult::Panicked(e.to_string()),
                        Err(_) => FrameResult::TimedOut,
                    };
                    let _ = tx.send((tick, res)).await;
                });
            }
            Some((tick, res)) = rx.recv() => {
                received += 1;
                match res {
                    FrameResult::Done(Ok(FrameOutcome::Processed(h))) => {
                        info!("replay: tick {} -> {} hazard(s)", tick, h.len());
                        current = h;
                    }
                    FrameResult::Done(Ok(FrameOutcome::Skipped)) => skipped += 1,
                    FrameResult::Done(Err(e)) => {
                        warn!("replay: tick {} failed, treating as no detections: {}", tick, e);
                        current.clear();
                    }
                    FrameResult::TimedOut => warn!("replay: tick {} timed out after {:?}", tick, opts.timeout),
                    FrameResult::Panicked(e) => warn!("replay: tick {} pipeline task failed: {}", tick, e),
                }
            }
        }
    }

    info!("replay: frames={} skipped={}", frames, skipped);
    print_report(&session.assess(current, opts.room.as_deref()), opts.json)
}
