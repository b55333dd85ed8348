//! Engine tuning (cadences, caps, thresholds) with JSON persistence.
//!
//! Every constant the visuals depend on lives here so a preset file can
//! change them without a rebuild. CLI flags override file values.

use crate::types::{ColorScheme, VisualizationMode};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Nominal animation clock rate
    pub tick_hz: u32,
    /// Hard cap on live notes; oldest are evicted first
    pub note_cap: usize,
    /// Spawn one ambient note every N ticks (0 disables)
    pub ambient_every_n_ticks: u64,
    /// Max distance between playback time and a beat for a beat spawn
    pub beat_window_secs: f64,
    /// Spawn notes on detected beats in falling-notes mode
    pub beat_notes: bool,
    pub waveform_window_secs: f64,
    /// Chroma intensity a bin must exceed to appear in piano-roll mode
    pub piano_roll_threshold: f32,
    /// Seed for ambient note placement
    pub seed: u64,
    pub mode: VisualizationMode,
    pub scheme: ColorScheme,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_hz: 30,
            note_cap: 100,
            ambient_every_n_ticks: 15,
            beat_window_secs: 0.1,
            beat_notes: true,
            waveform_window_secs: 0.1,
            piano_roll_threshold: 0.1,
            seed: 0x5EE_6D51C,
            mode: VisualizationMode::FallingNotes,
            scheme: ColorScheme::Rainbow,
        }
    }
}

impl EngineConfig {
    /// Full-featured falling notes at 30 ticks/s.
    pub fn advanced() -> Self {
        Self::default()
    }

    /// The lightweight variant: 20 ticks/s, an ambient note every 10th tick,
    /// at most 50 live notes, no beat-triggered notes.
    pub fn simple() -> Self {
        Self {
            tick_hz: 20,
            note_cap: 50,
            ambient_every_n_ticks: 10,
            beat_notes: false,
            ..Self::default()
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_hz.max(1) as f64)
    }

    /// Load from a JSON file. Returns None if file is absent or malformed.
    pub fn load(path: &Path) -> Option<Self> {
        let data = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&data) {
            Ok(c) => {
                info!("Loaded engine config from {:?}", path);
                Some(c)
            }
            Err(e) => {
                warn!("Failed to parse engine config {:?}: {}", path, e);
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        std::fs::write(path, json)?;
        info!("Engine config saved to {:?}", path);
        Ok(())
    }
}
