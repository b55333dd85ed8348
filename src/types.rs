use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Constants ──────────────────────────────────────────────────────────────

/// Width of the key-space: piano keys 0..87.
pub const KEY_COUNT: usize = 88;
/// Vertical position where new notes appear.
pub const SPAWN_Y: f32 = 100.0;
/// Top edge of the keyboard; notes at or below it are culled.
pub const KEYBOARD_Y: f32 = 20.0;
pub const PITCH_CLASSES: usize = 12;
/// Key-space distance between adjacent pitch classes when chroma bins are
/// laid across the keyboard.
pub const KEYS_PER_PITCH_CLASS: f32 = 7.0;
pub const DEFAULT_HOP_SIZE: u32 = 512;

// ─── Colors & geometry ──────────────────────────────────────────────────────

/// Linear RGB, each channel 0.0–1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const CYAN: Rgb = Rgb::new(0.0, 1.0, 1.0);

    /// 8-bit channels, as shipped to web clients and terminals.
    pub fn to_u8(self) -> [u8; 3] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0) as u8;
        [q(self.r), q(self.g), q(self.b)]
    }
}

/// A point in key-space (x: 0–88, y: 0–100).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

// ─── Notes ──────────────────────────────────────────────────────────────────

/// Why a note exists. Serializes as "beat" / "ambient".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// Spawned because playback is close to a detected beat
    Beat,
    /// Spawned on a fixed tick cadence for continuous activity
    Ambient,
}

/// A falling visual object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualNote {
    /// Key-space position, 0.0–88.0
    pub x: f32,
    /// Vertical position: 100 = spawn, 20 = keyboard surface
    pub y: f32,
    pub color: Rgb,
    pub size: f32,
    /// Units moved down per tick
    pub fall_speed: f32,
    pub kind: NoteKind,
    /// Playback time (seconds) at which the note was spawned
    pub time: f64,
}

impl VisualNote {
    pub fn reached_keyboard(&self) -> bool {
        self.y <= KEYBOARD_Y
    }
}

// ─── Configuration enums ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorScheme {
    #[default]
    Rainbow,
    FrequencyBased,
    MoodBased,
}

impl ColorScheme {
    pub const ALL: [ColorScheme; 3] = [
        ColorScheme::Rainbow,
        ColorScheme::FrequencyBased,
        ColorScheme::MoodBased,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ColorScheme::Rainbow => "rainbow",
            ColorScheme::FrequencyBased => "frequency_based",
            ColorScheme::MoodBased => "mood_based",
        }
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorScheme {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let norm = s.trim().to_ascii_lowercase().replace('-', "_");
        ColorScheme::ALL
            .into_iter()
            .find(|c| c.name() == norm)
            .ok_or_else(|| EngineError::InvalidConfiguration {
                field: "color scheme",
                value: s.to_string(),
            })
    }
}

/// Rendering strategy selector. Switching clears the live population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationMode {
    #[default]
    FallingNotes,
    Spectrum,
    Waveform,
    PianoRoll,
}

impl VisualizationMode {
    pub const ALL: [VisualizationMode; 4] = [
        VisualizationMode::FallingNotes,
        VisualizationMode::Spectrum,
        VisualizationMode::Waveform,
        VisualizationMode::PianoRoll,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VisualizationMode::FallingNotes => "falling_notes",
            VisualizationMode::Spectrum => "spectrum",
            VisualizationMode::Waveform => "waveform",
            VisualizationMode::PianoRoll => "piano_roll",
        }
    }
}

impl fmt::Display for VisualizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VisualizationMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let norm = s.trim().to_ascii_lowercase().replace('-', "_");
        VisualizationMode::ALL
            .into_iter()
            .find(|m| m.name() == norm)
            .ok_or_else(|| EngineError::InvalidConfiguration {
                field: "visualization mode",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

// ─── Audio features ─────────────────────────────────────────────────────────

fn default_hop_size() -> u32 {
    DEFAULT_HOP_SIZE
}

/// Precomputed analysis of one audio file. Produced once by the analysis
/// backend before the tick loop starts; read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFeatureBundle {
    pub duration_seconds: f64,
    pub tempo_bpm: f64,
    pub sample_rate: u32,
    /// Beat times in seconds, non-decreasing
    pub beat_timestamps: Vec<f64>,
    /// Pitch-class energy, `[12][T]`
    #[serde(default)]
    pub chromagram: Vec<Vec<f32>>,
    /// Cepstral coefficients, `[C][T]`
    #[serde(default)]
    pub mfcc: Vec<Vec<f32>>,
    /// Samples per analysis frame
    #[serde(default = "default_hop_size")]
    pub hop_size: u32,
    /// Detected key label, e.g. "C major"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Mono raw samples, -1.0 to 1.0. Usually attached from a WAV file
    /// rather than shipped inside the JSON.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<f32>,
}

impl AudioFeatureBundle {
    /// Reject bundles whose shape would make every lookup meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(EngineError::InvalidBundle("sample_rate is 0".into()));
        }
        if self.hop_size == 0 {
            return Err(EngineError::InvalidBundle("hop_size is 0".into()));
        }
        if let Some(i) = self
            .beat_timestamps
            .windows(2)
            .position(|w| !(w[1] >= w[0]))
        {
            return Err(EngineError::InvalidBundle(format!(
                "beat_timestamps decrease at index {}",
                i + 1
            )));
        }
        if !self.chromagram.is_empty() && self.chromagram.len() != PITCH_CLASSES {
            return Err(EngineError::InvalidBundle(format!(
                "chromagram has {} rows, expected {}",
                self.chromagram.len(),
                PITCH_CLASSES
            )));
        }
        Ok(())
    }

    /// Analysis frame containing time `t`: `floor(t * sample_rate / hop_size)`.
    /// Times before 0 map to frame 0.
    pub fn frame_index(&self, t: f64) -> usize {
        let hop = self.hop_size.max(1) as f64;
        (t.max(0.0) * self.sample_rate as f64 / hop).floor() as usize
    }

    /// Number of complete chroma frames (shortest row wins).
    pub fn chroma_frames(&self) -> usize {
        if self.chromagram.len() < PITCH_CLASSES {
            return 0;
        }
        self.chromagram.iter().map(Vec::len).min().unwrap_or(0)
    }

    pub fn mfcc_frames(&self) -> usize {
        self.mfcc.first().map_or(0, Vec::len)
    }

    /// The 12-bin chroma vector of the frame containing `t`.
    pub fn chroma_at(&self, t: f64) -> Result<[f32; PITCH_CLASSES]> {
        let frames = self.chroma_frames();
        if frames == 0 {
            return Err(EngineError::EmptyBundle("chroma"));
        }
        let index = self.frame_index(t);
        if index >= frames {
            return Err(EngineError::MappingOutOfRange { index, frames });
        }
        let mut chroma = [0.0f32; PITCH_CLASSES];
        for (bin, row) in chroma.iter_mut().zip(&self.chromagram) {
            *bin = row[index];
        }
        Ok(chroma)
    }

    /// First MFCC coefficient of the frame containing `t`.
    pub fn mfcc0_at(&self, t: f64) -> Result<f32> {
        let row = self
            .mfcc
            .first()
            .filter(|r| !r.is_empty())
            .ok_or(EngineError::EmptyBundle("MFCC"))?;
        let index = self.frame_index(t);
        row.get(index)
            .copied()
            .ok_or(EngineError::MappingOutOfRange {
                index,
                frames: row.len(),
            })
    }

    /// Up to `window_secs` of raw samples starting at `t`. Truncated at the
    /// end of the buffer; empty once `t` is past the end.
    pub fn sample_window(&self, t: f64, window_secs: f64) -> Result<&[f32]> {
        if self.samples.is_empty() {
            return Err(EngineError::EmptyBundle("samples"));
        }
        let sr = self.sample_rate as f64;
        let start = (t.max(0.0) * sr) as usize;
        let len = (window_secs.max(0.0) * sr) as usize;
        if start >= self.samples.len() {
            return Ok(&[]);
        }
        let end = start.saturating_add(len).min(self.samples.len());
        Ok(&self.samples[start..end])
    }
}

impl fmt::Display for AudioFeatureBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "duration {:.2}s  tempo {:.1} BPM  key {}  beats {}  frames {}",
            self.duration_seconds,
            self.tempo_bpm,
            self.key.as_deref().unwrap_or("?"),
            self.beat_timestamps.len(),
            self.chroma_frames(),
        )
    }
}

// ─── Draw output ────────────────────────────────────────────────────────────

/// One drawable primitive. Coordinates are key-space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    /// Filled star polygon (beat notes)
    Star {
        center: Point,
        vertices: Vec<Point>,
        color: Rgb,
        alpha: f32,
    },
    /// Filled circle (ambient notes)
    Circle {
        center: Point,
        radius: f32,
        color: Rgb,
        alpha: f32,
    },
    /// Axis-aligned filled rectangle anchored at its bottom-left corner
    Rect {
        origin: Point,
        width: f32,
        height: f32,
        color: Rgb,
        alpha: f32,
    },
    Polyline {
        points: Vec<Point>,
        color: Rgb,
        width: f32,
        alpha: f32,
    },
}

impl Shape {
    pub fn color(&self) -> Rgb {
        match self {
            Shape::Star { color, .. }
            | Shape::Circle { color, .. }
            | Shape::Rect { color, .. }
            | Shape::Polyline { color, .. } => *color,
        }
    }
}

/// Everything the external renderer paints for one tick, on top of the
/// static keyboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawList {
    pub tick: u64,
    /// Playback time the list was computed for
    pub time: f64,
    pub mode: VisualizationMode,
    pub shapes: Vec<Shape>,
}

impl DrawList {
    pub fn empty(tick: u64, time: f64, mode: VisualizationMode) -> Self {
        Self {
            tick,
            time,
            mode,
            shapes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}
