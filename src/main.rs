use see_music::bundle_io;
use see_music::clock::{AnimationClock, ClockCommand, PlaybackClock, SteppedClock};
use see_music::config::EngineConfig;
use see_music::console_display::ConsoleDisplay;
use see_music::engine::VisualizationEngine;
use see_music::error::{EngineError, Result};
use see_music::keyboard::KeyboardLayout;
use see_music::synth;
use see_music::timeline::{self, DEFAULT_EXPORT_LIMIT};
use see_music::types::*;

use clap::{Parser, ValueEnum};
use crossbeam_channel::{bounded, Sender};
use log::{error, info, warn};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Advanced,
    Simple,
}

#[derive(Parser)]
#[command(name = "see-music")]
#[command(about = "Audio-synchronized piano visualization")]
struct Cli {
    /// Feature bundle JSON produced by the analysis backend
    #[arg(long)]
    bundle: Option<PathBuf>,

    /// WAV file whose samples drive waveform mode
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Use the synthetic demo bundle (default when no --bundle is given)
    #[arg(long)]
    demo: bool,

    /// Length of the demo bundle in seconds
    #[arg(long, default_value_t = 30.0)]
    demo_secs: f64,

    /// Visualization mode: falling_notes, spectrum, waveform, piano_roll
    #[arg(long)]
    mode: Option<String>,

    /// Color scheme: rainbow, frequency_based, mood_based
    #[arg(long)]
    scheme: Option<String>,

    /// Built-in tuning preset
    #[arg(long, value_enum, default_value_t = Preset::Advanced)]
    preset: Preset,

    /// Engine config JSON (overrides the preset)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective engine config to this path
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Animation clock rate (ticks/s)
    #[arg(long)]
    fps: Option<u32>,

    /// Maximum number of live notes
    #[arg(long)]
    cap: Option<usize>,

    /// Seed for ambient note placement
    #[arg(long)]
    seed: Option<u64>,

    /// Write the beat-note timeline to this JSON file and exit
    #[arg(long)]
    export: Option<PathBuf>,

    /// Number of beats included in the timeline export
    #[arg(long, default_value_t = DEFAULT_EXPORT_LIMIT)]
    export_limit: usize,

    /// Step playback time by one tick per tick instead of following the
    /// wall clock, as fast as possible
    #[arg(long)]
    offline: bool,

    /// Disable the terminal renderer
    #[arg(long)]
    no_display: bool,

    /// Terminal refresh rate (Hz)
    #[arg(long, default_value_t = 15)]
    display_hz: u32,
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    if let Some(path) = &cli.save_config {
        config.save(path)?;
    }

    let mut bundle = match (&cli.bundle, cli.demo) {
        (Some(path), false) => bundle_io::load_bundle(path)?,
        (Some(_), true) => {
            warn!("--demo given together with --bundle; using the demo bundle");
            synth::demo_bundle(cli.demo_secs, 120.0, 22050)
        }
        (None, _) => synth::demo_bundle(cli.demo_secs, 120.0, 22050),
    };
    if let Some(path) = &cli.wav {
        bundle_io::attach_wav(&mut bundle, path)?;
    }

    info!("═══════════════════════════════════════════════");
    info!("  SEE MUSIC v{}", env!("CARGO_PKG_VERSION"));
    info!("  Track: {}", bundle);
    info!("  Mode: {}  Scheme: {}", config.mode, config.scheme);
    info!("  Clock: {} ticks/s{}", config.tick_hz, if cli.offline { " (offline)" } else { "" });
    info!("═══════════════════════════════════════════════");

    // ─── Batch export ───────────────────────────────────────────────
    if let Some(path) = &cli.export {
        let export = timeline::export(&bundle, config.scheme, cli.export_limit);
        return bundle_io::save_export(&export, path);
    }

    let (control_tx, control_rx) = bounded::<ClockCommand>(64);
    let mut draw_txs: Vec<Sender<DrawList>> = Vec::new();
    let mut handles = Vec::new();

    // ─── Terminal renderer ──────────────────────────────────────────
    if !cli.no_display {
        let (tx, rx) = bounded::<DrawList>(4);
        draw_txs.push(tx);
        let (tick_hz, hz) = (config.tick_hz, cli.display_hz);
        handles.push(thread::Builder::new().name("display".into()).spawn(move || {
            ConsoleDisplay::new(rx, KeyboardLayout::new(), tick_hz, hz).run();
        })?);
    }

    // ─── Console controls ───────────────────────────────────────────
    // Not joined: a blocking stdin read would hold the process open.
    let controls_tx = control_tx.clone();
    thread::Builder::new().name("controls".into()).spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match line.parse::<ClockCommand>() {
                Ok(cmd) => {
                    let quit = cmd == ClockCommand::Shutdown;
                    if controls_tx.send(cmd).is_err() || quit {
                        break;
                    }
                }
                Err(e) => warn!("{}", e),
            }
        }
    })?;

    // ─── Animation clock ────────────────────────────────────────────
    let step = config.tick_interval().as_secs_f64();
    let offline = cli.offline;
    let engine = VisualizationEngine::new(Arc::new(bundle), config);
    let clock_handle = thread::Builder::new().name("clock".into()).spawn(move || {
        if offline {
            AnimationClock::new(engine, SteppedClock::new(step), control_rx, draw_txs)
                .unpaced()
                .run()
        } else {
            AnimationClock::new(engine, PlaybackClock::new(), control_rx, draw_txs).run()
        }
    })?;

    // A full queue only delays the start
    let _ = control_tx.send(ClockCommand::Play);

    let Ok((engine, stats)) = clock_handle.join() else {
        error!("Clock thread panicked");
        std::process::exit(1);
    };
    drop(control_tx);
    for h in handles {
        let _ = h.join();
    }

    info!(
        "Done: {} ticks, {} notes spawned, {} draw-lists dropped",
        stats.ticks,
        engine.population().total_spawned(),
        stats.dropped
    );
    Ok(())
}

/// Preset or config file, then CLI overrides.
fn resolve_config(cli: &Cli) -> Result<EngineConfig> {
    let preset = match cli.preset {
        Preset::Advanced => EngineConfig::advanced(),
        Preset::Simple => EngineConfig::simple(),
    };
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path).unwrap_or_else(|| {
            warn!("No usable config at {:?}, using the preset", path);
            preset
        }),
        None => preset,
    };

    if let Some(mode) = &cli.mode {
        config.mode = mode.parse()?;
    }
    if let Some(scheme) = &cli.scheme {
        config.scheme = scheme.parse()?;
    }
    if let Some(fps) = cli.fps {
        if fps == 0 {
            return Err(EngineError::InvalidConfiguration {
                field: "fps",
                value: fps.to_string(),
            });
        }
        config.tick_hz = fps;
    }
    if let Some(cap) = cli.cap {
        config.note_cap = cap;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    Ok(config)
}
