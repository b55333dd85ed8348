use crate::config::EngineConfig;
use crate::error::Result;
use crate::keyboard::KeyboardLayout;
use crate::population::NotePopulation;
use crate::render::{strategy_for, Frame, RenderStrategy};
use crate::types::*;
use log::{debug, info};
use std::sync::Arc;

/// The visualization engine: owns the live note population and the active
/// render strategy, and turns one playback position into one draw-list per
/// tick.
///
/// The feature bundle is shared read-only with whoever produced it. Mode and
/// scheme writes take effect on the next tick. There is no interior
/// locking; the engine is driven from a single tick handler.
///
/// # Playback states
///
/// * **Playing**: `tick()` runs the active strategy and returns a draw-list.
/// * **Paused**: `tick()` returns `None`; notes neither move nor cull.
/// * **Stopped**: like paused, and the population has been fully reset so
///   the next `play()` starts from an empty screen.
pub struct VisualizationEngine {
    bundle: Arc<AudioFeatureBundle>,
    config: EngineConfig,
    keyboard: KeyboardLayout,
    population: NotePopulation,
    strategy: Box<dyn RenderStrategy>,
    scheme: ColorScheme,
    state: PlaybackState,
    tick: u64,
}

impl VisualizationEngine {
    pub fn new(bundle: Arc<AudioFeatureBundle>, config: EngineConfig) -> Self {
        info!(
            "Engine ready: mode={} scheme={} cap={} ambient every {} ticks",
            config.mode, config.scheme, config.note_cap, config.ambient_every_n_ticks
        );
        Self {
            population: NotePopulation::new(&config),
            strategy: strategy_for(config.mode, &config),
            scheme: config.scheme,
            keyboard: KeyboardLayout::new(),
            bundle,
            config,
            state: PlaybackState::Stopped,
            tick: 0,
        }
    }

    pub fn bundle(&self) -> &AudioFeatureBundle {
        &self.bundle
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Static background geometry for the renderer.
    pub fn keyboard(&self) -> &KeyboardLayout {
        &self.keyboard
    }

    pub fn population(&self) -> &NotePopulation {
        &self.population
    }

    pub fn mode(&self) -> VisualizationMode {
        self.strategy.mode()
    }

    pub fn scheme(&self) -> ColorScheme {
        self.scheme
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Ticks rendered since the last stop.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    // ─── Configuration ──────────────────────────────────────────────────

    /// Switch render strategy. Any change clears the population so no
    /// notes from the previous mode survive into the next.
    pub fn set_mode(&mut self, mode: VisualizationMode) {
        if mode == self.mode() {
            return;
        }
        info!("Visualization mode: {} → {}", self.mode(), mode);
        self.population.clear();
        self.strategy = strategy_for(mode, &self.config);
    }

    /// Parse and apply a mode name. Unknown names leave the mode unchanged.
    pub fn set_mode_named(&mut self, name: &str) -> Result<()> {
        let mode = name.parse()?;
        self.set_mode(mode);
        Ok(())
    }

    pub fn set_scheme(&mut self, scheme: ColorScheme) {
        if scheme != self.scheme {
            info!("Color scheme: {} → {}", self.scheme, scheme);
            self.scheme = scheme;
        }
    }

    /// Parse and apply a scheme name. Unknown names leave the scheme unchanged.
    pub fn set_scheme_named(&mut self, name: &str) -> Result<()> {
        let scheme = name.parse()?;
        self.set_scheme(scheme);
        Ok(())
    }

    // ─── Playback ───────────────────────────────────────────────────────

    pub fn play(&mut self) {
        if self.state != PlaybackState::Playing {
            info!("Playback started at tick {}", self.tick);
            self.state = PlaybackState::Playing;
        }
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            info!("Playback paused at tick {} ({} live notes)", self.tick, self.population.len());
            self.state = PlaybackState::Paused;
        }
    }

    pub fn toggle(&mut self) {
        match self.state {
            PlaybackState::Playing => self.pause(),
            _ => self.play(),
        }
    }

    /// Stop playback and reset all visual state.
    pub fn stop(&mut self) {
        info!("Playback stopped after {} ticks", self.tick);
        self.state = PlaybackState::Stopped;
        self.population.reset();
        self.tick = 0;
    }

    // ─── Tick ───────────────────────────────────────────────────────────

    /// Run one animation tick at playback time `current_time`. Returns
    /// `None` unless playing. Missing or partial feature data degrades the
    /// draw-list; it never fails the tick.
    pub fn tick(&mut self, current_time: f64) -> Option<DrawList> {
        if self.state != PlaybackState::Playing {
            return None;
        }
        let frame = Frame {
            tick: self.tick,
            time: current_time,
            bundle: &self.bundle,
            scheme: self.scheme,
        };
        let shapes = self.strategy.render(&frame, &mut self.population);
        let list = DrawList {
            tick: self.tick,
            time: current_time,
            mode: self.strategy.mode(),
            shapes,
        };

        self.tick += 1;
        if self.tick % 300 == 0 {
            debug!(
                "Engine: {} ticks, t={:.2}s, {} live notes, {} spawned",
                self.tick,
                current_time,
                self.population.len(),
                self.population.total_spawned()
            );
        }
        Some(list)
    }
}
