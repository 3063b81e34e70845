// crates/pointplay-cli/src/main.rs
//
// `pointplay`: drives the player from a line script on stdin.
//
// Wires a SyntheticTransport and an InferenceWorker (luma stand-in model)
// into an Orchestrator running on its own thread, prints every PlayerNotice
// as it arrives, and forwards script lines through a PlayerHandle.

mod script;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::unbounded;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pointplay_core::config::PlayerConfig;
use pointplay_core::helpers::time::{format_progress, format_time};
use pointplay_media::{
    DepthEstimator, InferenceWorker, LumaDepthEstimator, Orchestrator, PlayerHandle, PlayerNotice,
    SyntheticTransport,
};

use crate::script::{parse_line, Line, HELP};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "pointplay", about = "Video to point-cloud player driven from stdin")]
struct Args {
    /// JSON player config; missing fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Load this source before reading the script.
    #[arg(long)]
    source: Option<String>,

    /// Override `sample_hz`.
    #[arg(long)]
    sample_hz: Option<f64>,

    /// Override `target_width`.
    #[arg(long)]
    target_width: Option<u32>,

    /// Publish colors before the first depth result.
    #[arg(long)]
    early_colors: bool,

    /// Synthetic video size and length.
    #[arg(long, default_value_t = 640)]
    width: u32,
    #[arg(long, default_value_t = 360)]
    height: u32,
    #[arg(long, default_value_t = 30.0)]
    duration: f64,

    /// Artificial per-frame model latency.
    #[arg(long, default_value_t = 60)]
    latency_ms: u64,

    /// Debug-level logging (RUST_LOG still wins when set).
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = load_config(&args)?;
    info!(
        "[pointplay] sampling at {} Hz, target width {}",
        config.sample_hz, config.target_width,
    );

    let (notice_tx, notice_rx) = unbounded::<PlayerNotice>();

    let backends: Vec<Box<dyn DepthEstimator>> = vec![Box::new(
        LumaDepthEstimator::new("luma").with_latency(Duration::from_millis(args.latency_ms)),
    )];
    let worker = InferenceWorker::spawn(backends, Some(notice_tx.clone()));
    if worker.wait_ready(Duration::from_secs(10)).is_none() {
        warn!("[pointplay] no depth backend ready; frames will fail");
    }

    let transport = SyntheticTransport::new(
        args.width,
        args.height,
        args.duration,
        config.time_update_period(),
    );
    let orchestrator = Orchestrator::new(config, Box::new(transport), Box::new(worker), notice_tx);
    let handle       = orchestrator.handle();

    let runner = thread::Builder::new()
        .name("pointplay-orchestrator".into())
        .spawn(move || orchestrator.run())
        .context("spawn orchestrator thread")?;

    // Ends when the last notice sender (inside the orchestrator) is dropped.
    let printer = thread::Builder::new()
        .name("pointplay-notices".into())
        .spawn(move || {
            for notice in notice_rx {
                println!("{}", describe(&notice));
            }
        })
        .context("spawn notice thread")?;

    if let Some(source) = &args.source {
        handle.setup_video(source.clone());
    }

    let outcome = drive(&handle);

    handle.shutdown();
    if runner.join().is_err() {
        warn!("[pointplay] orchestrator thread panicked");
    }
    let _ = printer.join();
    outcome
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter  = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn load_config(args: &Args) -> Result<PlayerConfig> {
    let mut config = match &args.config {
        Some(path) => PlayerConfig::load(path)?,
        None       => PlayerConfig::default(),
    };
    if let Some(hz) = args.sample_hz {
        config.sample_hz = hz;
    }
    if let Some(w) = args.target_width {
        config.target_width = w;
    }
    if args.early_colors {
        config.early_colors = true;
    }
    config.validate()?;
    Ok(config)
}

/// Read script lines until EOF or `quit`.
fn drive(handle: &PlayerHandle) -> Result<()> {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("read stdin")?;
        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(Line::Player(cmd))) => handle.command(cmd),
            Ok(Some(Line::Status)) => {
                let snap = handle.snapshot();
                println!(
                    "{:<16} {}  points={}{}",
                    snap.state.label(),
                    format_progress(snap.current_time, snap.duration),
                    snap.buffers.point_count(),
                    if snap.inference_busy { "  (inference busy)" } else { "" },
                );
            }
            Ok(Some(Line::Wait(pause))) => thread::sleep(pause),
            Ok(Some(Line::Help)) => println!("{HELP}"),
            Ok(Some(Line::Quit)) => break,
            Err(e) => eprintln!("{e}"),
        }
    }
    Ok(())
}

fn describe(notice: &PlayerNotice) -> String {
    match notice {
        PlayerNotice::BackendReady { backend } => format!("backend ready: {backend}"),
        PlayerNotice::SessionStarted { session, source } => format!("session {session}: {source}"),
        PlayerNotice::SessionReleased { session } => format!("session {session} released"),
        PlayerNotice::FramePublished { request, points, frame_time, .. } => {
            format!("frame #{request} @ {}: {points} points", format_time(*frame_time))
        }
        PlayerNotice::InferenceFailed { request, msg } => format!("frame #{request} failed: {msg}"),
        PlayerNotice::TransportError { msg } => format!("transport error: {msg}"),
    }
}
