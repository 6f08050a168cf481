//! # Reel Player
//!
//! Headless driver for reel-core: probes a file or plays it through the
//! sync driver with a simulated audio device, then prints a JSON report.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use reel_core::mp4_demux::Mp4Demuxer;
use reel_core::output::AudioOutputStats;
use reel_core::session::SessionStats;
use reel_core::{
    AudioOutput, PixelConverter, PlaybackSession, ReelConfig, RgbaVideoSink, SimulatedAudioOutput,
    SyncDriver, SyncStats, VideoSink,
};

struct PlayerOptions {
    input: PathBuf,
    config: Option<PathBuf>,
    probe: bool,
    tick_ms: u64,
    seek: Option<f64>,
    max_secs: Option<f64>,
    compact: bool,
    realtime: bool,
}

#[derive(Serialize)]
struct PlaybackReport {
    file: String,
    duration: f64,
    position: f64,
    finished: bool,
    last_frame: (u32, u32),
    last_frame_timestamp: f64,
    sync: SyncStats,
    session: SessionStats,
    audio_output: AudioOutputStats,
}

fn usage() -> String {
    "usage: reel <file.mp4> [--config FILE] [--probe] [--tick-ms N] [--seek SECS] \
     [--max-secs SECS] [--compact] [--realtime]"
        .to_string()
}

fn parse_args(args: &[String]) -> Result<PlayerOptions> {
    let mut input: Option<PathBuf> = None;
    let mut options = PlayerOptions {
        input: PathBuf::new(),
        config: None,
        probe: false,
        tick_ms: 16,
        seek: None,
        max_secs: None,
        compact: false,
        realtime: false,
    };

    let value = |i: usize, flag: &str| -> Result<String> {
        args.get(i + 1)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Missing value for {}", flag))
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                options.config = Some(PathBuf::from(value(i, "--config")?));
                i += 2;
            }
            "--probe" => {
                options.probe = true;
                i += 1;
            }
            "--tick-ms" => {
                let v = value(i, "--tick-ms")?;
                options.tick_ms = v
                    .parse::<u64>()
                    .map_err(|e| anyhow::anyhow!("Invalid tick {}: {}", v, e))?;
                if options.tick_ms == 0 {
                    return Err(anyhow::anyhow!("--tick-ms must be positive"));
                }
                i += 2;
            }
            "--seek" => {
                let v = value(i, "--seek")?;
                options.seek = Some(
                    v.parse::<f64>()
                        .map_err(|e| anyhow::anyhow!("Invalid seek target {}: {}", v, e))?,
                );
                i += 2;
            }
            "--max-secs" => {
                let v = value(i, "--max-secs")?;
                options.max_secs = Some(
                    v.parse::<f64>()
                        .map_err(|e| anyhow::anyhow!("Invalid limit {}: {}", v, e))?,
                );
                i += 2;
            }
            "--compact" => {
                options.compact = true;
                i += 1;
            }
            "--realtime" => {
                options.realtime = true;
                i += 1;
            }
            "--help" | "-h" => return Err(anyhow::anyhow!(usage())),
            other if other.starts_with('-') => {
                return Err(anyhow::anyhow!("Unknown option {}\n{}", other, usage()));
            }
            other => {
                input = Some(PathBuf::from(other));
                i += 1;
            }
        }
    }

    options.input = input.ok_or_else(|| anyhow::anyhow!(usage()))?;
    Ok(options)
}

fn load_config(options: &PlayerOptions) -> Result<ReelConfig> {
    let mut config = match &options.config {
        Some(path) => ReelConfig::from_json_file(path)
            .with_context(|| format!("Failed to read config {:?}", path))?,
        None => ReelConfig::default(),
    };
    if options.compact {
        config.require_compact_frames = true;
    }
    Ok(config)
}

fn probe(options: &PlayerOptions) -> Result<()> {
    let demuxer = Mp4Demuxer::open(&options.input)
        .with_context(|| format!("Failed to open {:?}", options.input))?;
    println!("{}", serde_json::to_string_pretty(&demuxer.file_info())?);
    Ok(())
}

/// Load the input, apply the initial seek and start the clock.
fn start<A: AudioOutput, V: VideoSink>(
    driver: &mut SyncDriver<A, V>,
    options: &PlayerOptions,
) -> Result<()> {
    if !driver.load(&options.input) {
        return Err(anyhow::anyhow!(
            "Failed to load {:?}: {}",
            options.input,
            driver.session().last_message()
        ));
    }
    if let Some(t) = options.seek {
        if !driver.seek(t) {
            return Err(anyhow::anyhow!(
                "Seek to {}s failed: {}",
                t,
                driver.session().last_message()
            ));
        }
    }
    if !driver.play() {
        return Err(anyhow::anyhow!(
            "Failed to start playback: {}",
            driver.session().last_message()
        ));
    }
    Ok(())
}

fn play(options: &PlayerOptions) -> Result<()> {
    let config = load_config(options)?;
    let session = PlaybackSession::software(config);
    let mut driver = SyncDriver::new(
        session,
        SimulatedAudioOutput::new(),
        RgbaVideoSink::new(PixelConverter::default()),
    );

    start(&mut driver, options)?;

    let limit = options
        .max_secs
        .unwrap_or(driver.duration() + 5.0)
        .max(0.0);
    let started_at = driver.current_time();
    while driver.is_active() && driver.current_time() - started_at < limit {
        driver.update(options.tick_ms);
        if options.realtime {
            std::thread::sleep(Duration::from_millis(options.tick_ms));
        }
    }

    let sink = driver.video_sink();
    let report = PlaybackReport {
        file: options.input.display().to_string(),
        duration: driver.duration(),
        position: driver.current_time(),
        finished: driver.is_finished(),
        last_frame: sink.dimensions(),
        last_frame_timestamp: sink.timestamp(),
        sync: driver.stats(),
        session: driver.session().stats(),
        audio_output: driver.audio_output().stats(),
    };
    tracing::info!(
        "Playback done: {} frames shown, {} dropped, finished={}",
        report.sync.video_frames_presented,
        report.sync.video_frames_dropped,
        report.finished
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("reel=info".parse()?)
                .add_directive("reel_core=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let options = parse_args(&args)?;

    tracing::info!("Reel v{}", reel_core::VERSION);

    if options.probe {
        probe(&options)
    } else {
        play(&options)
    }
}
