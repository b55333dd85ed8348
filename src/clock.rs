use crate::engine::VisualizationEngine;
use crate::error::{EngineError, Result};
use crate::types::*;
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use log::{debug, info, warn};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

// ─── Playback position sources ──────────────────────────────────────────────

/// Where "current time" comes from. Stands in for the audio player's
/// position query: advances while playing, frozen while paused, back to
/// zero on stop.
pub trait PlaybackSource: Send {
    fn position_secs(&mut self) -> f64;
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
}

/// Wall-clock playback position.
pub struct PlaybackClock {
    /// Set while playing
    started: Option<Instant>,
    /// Time accumulated before the current play segment
    elapsed: Duration,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            started: None,
            elapsed: Duration::ZERO,
        }
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSource for PlaybackClock {
    fn position_secs(&mut self) -> f64 {
        let running = self.started.map_or(Duration::ZERO, |s| s.elapsed());
        (self.elapsed + running).as_secs_f64()
    }

    fn play(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        if let Some(s) = self.started.take() {
            self.elapsed += s.elapsed();
        }
    }

    fn stop(&mut self) {
        self.started = None;
        self.elapsed = Duration::ZERO;
    }
}

/// Deterministic position that advances a fixed step per read while
/// playing. Used for offline rendering and tests.
pub struct SteppedClock {
    step: f64,
    position: f64,
    playing: bool,
}

impl SteppedClock {
    pub fn new(step_secs: f64) -> Self {
        Self {
            step: step_secs,
            position: 0.0,
            playing: false,
        }
    }
}

impl PlaybackSource for SteppedClock {
    fn position_secs(&mut self) -> f64 {
        let t = self.position;
        if self.playing {
            self.position += self.step;
        }
        t
    }

    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn stop(&mut self) {
        self.playing = false;
        self.position = 0.0;
    }
}

// ─── Animation clock ────────────────────────────────────────────────────────

/// Configuration writes and transport commands delivered to the clock
/// thread. Applied at the start of the next tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ClockCommand {
    Play,
    Pause,
    Toggle,
    Stop,
    SetMode(VisualizationMode),
    SetScheme(ColorScheme),
    Shutdown,
}

/// Console command syntax: `play`, `pause`, `toggle` (or a bare space),
/// `stop`, `quit`, `mode <name>`, `scheme <name>`.
impl FromStr for ClockCommand {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let mut words = s.split_whitespace();
        let cmd = match (words.next(), words.next()) {
            (None, _) | (Some("toggle" | "p"), None) => ClockCommand::Toggle,
            (Some("play"), None) => ClockCommand::Play,
            (Some("pause"), None) => ClockCommand::Pause,
            (Some("stop" | "s"), None) => ClockCommand::Stop,
            (Some("quit" | "q"), None) => ClockCommand::Shutdown,
            (Some("mode" | "m"), Some(name)) => ClockCommand::SetMode(name.parse()?),
            (Some("scheme" | "c"), Some(name)) => ClockCommand::SetScheme(name.parse()?),
            _ => {
                return Err(EngineError::InvalidConfiguration {
                    field: "command",
                    value: s.trim().to_string(),
                })
            }
        };
        Ok(cmd)
    }
}

/// Fires the engine at a fixed nominal rate, reading the playback position
/// once per tick and fanning the draw-list out to every renderer.
///
/// Draw-lists are offered with `try_send`: a renderer that falls behind
/// loses frames instead of stalling the tick.
pub struct AnimationClock<S: PlaybackSource> {
    engine: VisualizationEngine,
    source: S,
    control_rx: Receiver<ClockCommand>,
    draw_txs: Vec<Sender<DrawList>>,
    interval: Duration,
    paced: bool,
    stop_at_end: bool,
}

/// Counters reported when the clock loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockStats {
    pub ticks: u64,
    pub delivered: u64,
    pub dropped: u64,
}

impl<S: PlaybackSource> AnimationClock<S> {
    pub fn new(
        engine: VisualizationEngine,
        source: S,
        control_rx: Receiver<ClockCommand>,
        draw_txs: Vec<Sender<DrawList>>,
    ) -> Self {
        let interval = engine.config().tick_interval();
        Self {
            engine,
            source,
            control_rx,
            draw_txs,
            interval,
            paced: true,
            stop_at_end: true,
        }
    }

    /// Tick as fast as possible instead of at the nominal rate.
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Keep ticking past the end of the bundle (until Shutdown).
    pub fn run_past_end(mut self) -> Self {
        self.stop_at_end = false;
        self
    }

    /// Run until Shutdown, end of playback, or every renderer hangs up.
    /// Blocks the calling thread and hands the engine back on exit.
    pub fn run(mut self) -> (VisualizationEngine, ClockStats) {
        info!(
            "Animation clock running at {:.1} ticks/s{}",
            1.0 / self.interval.as_secs_f64(),
            if self.paced { "" } else { " (unpaced)" }
        );
        let mut stats = ClockStats::default();
        let mut next_tick = Instant::now();
        let had_renderers = !self.draw_txs.is_empty();

        'run: loop {
            let mut control_open = true;
            loop {
                match self.control_rx.try_recv() {
                    Ok(ClockCommand::Shutdown) => break 'run,
                    Ok(cmd) => self.apply(cmd),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        control_open = false;
                        break;
                    }
                }
            }
            if !control_open && self.engine.state() != PlaybackState::Playing {
                info!("Control channel closed while idle");
                break 'run;
            }

            if self.engine.state() == PlaybackState::Playing {
                let t = self.source.position_secs();
                if self.stop_at_end && t >= self.engine.bundle().duration_seconds {
                    info!("Reached end of audio at {:.2}s", t);
                    self.apply(ClockCommand::Stop);
                    break 'run;
                }
                if let Some(list) = self.engine.tick(t) {
                    stats.ticks += 1;
                    self.fan_out(list, &mut stats);
                    if had_renderers && self.draw_txs.is_empty() {
                        info!("All renderers disconnected");
                        break 'run;
                    }
                }
            } else if !self.paced {
                // Nothing drives an unpaced, idle clock but commands.
                match self.control_rx.recv() {
                    Ok(ClockCommand::Shutdown) | Err(_) => break 'run,
                    Ok(cmd) => self.apply(cmd),
                }
                continue;
            }

            if self.paced {
                next_tick += self.interval;
                let now = Instant::now();
                if next_tick > now {
                    thread::sleep(next_tick - now);
                } else {
                    // Fell behind (slow renderer or suspended process): resync.
                    next_tick = now;
                }
            }
        }

        info!(
            "Animation clock stopped: {} ticks, {} draw-lists delivered, {} dropped",
            stats.ticks, stats.delivered, stats.dropped
        );
        (self.engine, stats)
    }

    fn apply(&mut self, cmd: ClockCommand) {
        debug!("Clock command: {:?}", cmd);
        match cmd {
            ClockCommand::Play => {
                self.source.play();
                self.engine.play();
            }
            ClockCommand::Pause => {
                self.source.pause();
                self.engine.pause();
            }
            ClockCommand::Toggle => {
                if self.engine.state() == PlaybackState::Playing {
                    self.apply(ClockCommand::Pause);
                } else {
                    self.apply(ClockCommand::Play);
                }
            }
            ClockCommand::Stop => {
                self.source.stop();
                self.engine.stop();
            }
            ClockCommand::SetMode(mode) => self.engine.set_mode(mode),
            ClockCommand::SetScheme(scheme) => self.engine.set_scheme(scheme),
            ClockCommand::Shutdown => {}
        }
    }

    fn fan_out(&mut self, list: DrawList, stats: &mut ClockStats) {
        let mut i = 0;
        while i < self.draw_txs.len() {
            match self.draw_txs[i].try_send(list.clone()) {
                Ok(()) => {
                    stats.delivered += 1;
                    i += 1;
                }
                Err(TrySendError::Full(_)) => {
                    stats.dropped += 1;
                    if stats.dropped % 100 == 1 {
                        warn!("Renderer falling behind: {} draw-lists dropped", stats.dropped);
                    }
                    i += 1;
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.draw_txs.swap_remove(i);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stepped_clock_transport() {
        let mut c = SteppedClock::new(0.5);
        assert_eq!(c.position_secs(), 0.0);
        assert_eq!(c.position_secs(), 0.0);
        c.play();
        assert_eq!(c.position_secs(), 0.0);
        assert_eq!(c.position_secs(), 0.5);
        c.pause();
        assert_eq!(c.position_secs(), 1.0);
        assert_eq!(c.position_secs(), 1.0);
        c.stop();
        assert_eq!(c.position_secs(), 0.0);
    }

    #[test]
    fn test_parse_console_commands() {
        assert_eq!("".parse::<ClockCommand>().unwrap(), ClockCommand::Toggle);
        assert_eq!(" stop\n".parse::<ClockCommand>().unwrap(), ClockCommand::Stop);
        assert_eq!(
            "mode piano-roll".parse::<ClockCommand>().unwrap(),
            ClockCommand::SetMode(VisualizationMode::PianoRoll)
        );
        assert_eq!(
            "c mood_based".parse::<ClockCommand>().unwrap(),
            ClockCommand::SetScheme(ColorScheme::MoodBased)
        );
        assert!("mode disco".parse::<ClockCommand>().is_err());
        assert!("stop now".parse::<ClockCommand>().is_err());
        assert!("mode".parse::<ClockCommand>().is_err());
    }

    #[test]
    fn test_playback_clock_freezes_when_paused() {
        let mut c = PlaybackClock::new();
        assert_eq!(c.position_secs(), 0.0);
        c.play();
        thread::sleep(Duration::from_millis(20));
        c.pause();
        let frozen = c.position_secs();
        assert!(frozen >= 0.019, "frozen={}", frozen);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(c.position_secs(), frozen);
        c.stop();
        assert_eq!(c.position_secs(), 0.0);
    }
}
