// src/main.rs - Headless driver: JSON-lines pose events on stdin, one frame report per line on stdout
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use posture_sentinel::{
    DetectionFrame, EngineConfig, LogNotifier, NotificationPermission, OperatingMode, PostureEngine, SystemClock,
    TokioScheduler,
};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputEvent {
    Frame { poses: Vec<DetectionFrame> },
    Capture,
    Clear,
    Mode { mode: OperatingMode },
    Guide { dx: f64, dy: f64, scale: f64 },
    Sliders { horizontal: i32, vertical: i32, size: i32 },
}

#[derive(Parser, Debug)]
#[command(name = "posture-sentinel")]
#[command(about = "Posture monitor over JSON-lines pose detections on stdin", long_about = None)]
struct Args {
    /// Engine config (JSON); defaults to the platform config dir when present
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Classifier mode (snapshot, auto)
    #[arg(long, default_value = "snapshot")]
    mode: OperatingMode,

    /// Run with notification permission denied
    #[arg(long, default_value_t = false)]
    no_notify: bool,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    if let Some(path) = path {
        return EngineConfig::load(path).with_context(|| format!("loading config {}", path.display()));
    }
    match EngineConfig::default_path() {
        Some(path) if path.exists() => {
            EngineConfig::load(&path).with_context(|| format!("loading config {}", path.display()))
        }
        _ => Ok(EngineConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the reports, so logs go to stderr
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let permission = if args.no_notify {
        NotificationPermission::Denied
    } else {
        NotificationPermission::Granted
    };
    let notifier = Arc::new(LogNotifier::new(permission, config.follow_up_delay()));
    let scheduler = Box::new(TokioScheduler::new(Handle::current()));
    let mut engine = PostureEngine::new(config, Arc::new(SystemClock), scheduler, notifier)?;
    engine.set_mode(args.mode);
    info!("Posture monitoring started in {} mode", engine.mode());

    let (tx, mut rx) = mpsc::channel::<InputEvent>(64);
    let reader = tokio::spawn(read_events(tx));

    while let Some(event) = rx.recv().await {
        handle_event(&mut engine, event)?;
    }

    reader.await??;
    info!("Input closed, shutting down");
    Ok(())
}

async fn read_events(tx: mpsc::Sender<InputEvent>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<InputEvent>(line) {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("Skipping malformed input line: {}", e),
        }
    }
    Ok(())
}

fn handle_event(engine: &mut PostureEngine, event: InputEvent) -> anyhow::Result<()> {
    match event {
        InputEvent::Frame { poses } => {
            let report = engine.on_frame(poses);
            debug!("{}", report.status);
            println!("{}", serde_json::to_string(&report)?);
        }
        InputEvent::Capture => match engine.capture_latest() {
            Ok(session) => info!("Monitoring session {} started", session),
            Err(e) => warn!("Capture failed: {}", e),
        },
        InputEvent::Clear => engine.cancel_monitoring(),
        InputEvent::Mode { mode } => engine.set_mode(mode),
        InputEvent::Guide { dx, dy, scale } => engine.set_guide_transform(dx, dy, scale),
        InputEvent::Sliders {
            horizontal,
            vertical,
            size,
        } => engine.set_guide_sliders(horizontal, vertical, size),
    }
    Ok(())
}
