//! Batch adapter: precompute the beat-note timeline of a whole bundle so a
//! remote client can replay it against its own clock.
//!
//! Notes are derived with the rule the live engine uses ([`beat_note_at`]
//! at each beat's own timestamp), so a replayed timeline and a live run
//! agree on position, size, speed and color for every beat.

use crate::beat_sync::beat_note_at;
use crate::keyboard::KeyboardLayout;
use crate::types::*;
use log::info;
use serde::{Deserialize, Serialize};

/// Default number of beats exported per timeline.
pub const DEFAULT_EXPORT_LIMIT: usize = 50;

/// One note as shipped to a replay client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineNote {
    pub x: f32,
    pub y: f32,
    pub color: [u8; 3],
    pub size: f32,
    pub speed: f32,
    /// Playback time (seconds) at which the note appears
    pub time: f64,
    #[serde(rename = "type")]
    pub kind: NoteKind,
}

impl From<&VisualNote> for TimelineNote {
    fn from(n: &VisualNote) -> Self {
        Self {
            x: n.x,
            y: n.y,
            color: n.color.to_u8(),
            size: n.size,
            speed: n.fall_speed,
            time: n.time,
            kind: n.kind,
        }
    }
}

/// Everything a client needs to render without an engine of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizationExport {
    pub piano_keys: KeyboardLayout,
    pub notes: Vec<TimelineNote>,
    /// The chromagram, `[12][T]`, for client-side spectrum bars
    pub spectrum_data: Vec<Vec<f32>>,
    pub tempo: f64,
    pub duration: f64,
    pub hop_size: u32,
    pub sample_rate: u32,
}

/// Beat notes for the first `limit` beats. Beats whose chroma frame is
/// missing are skipped, not counted.
pub fn beat_timeline(
    bundle: &AudioFeatureBundle,
    scheme: ColorScheme,
    limit: usize,
) -> Vec<TimelineNote> {
    bundle
        .beat_timestamps
        .iter()
        .take(limit)
        .filter_map(|&t| beat_note_at(t, bundle, scheme))
        .map(|n| TimelineNote::from(&n))
        .collect()
}

pub fn export(bundle: &AudioFeatureBundle, scheme: ColorScheme, limit: usize) -> VisualizationExport {
    let notes = beat_timeline(bundle, scheme, limit);
    info!(
        "Exported timeline: {} notes from {} beats ({} scheme)",
        notes.len(),
        bundle.beat_timestamps.len().min(limit),
        scheme
    );
    VisualizationExport {
        piano_keys: KeyboardLayout::new(),
        notes,
        spectrum_data: bundle.chromagram.clone(),
        tempo: bundle.tempo_bpm,
        duration: bundle.duration_seconds,
        hop_size: bundle.hop_size,
        sample_rate: bundle.sample_rate,
    }
}

/// Client-side replay of a timeline: hands out each note once, when the
/// local clock reaches its time.
pub struct TimelineReplay {
    notes: Vec<TimelineNote>,
    cursor: usize,
}

impl TimelineReplay {
    pub fn new(mut notes: Vec<TimelineNote>) -> Self {
        notes.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { notes, cursor: 0 }
    }

    /// Notes whose time is at or before `now` that have not been handed out.
    /// A clock that moves backwards rewinds the replay.
    pub fn due(&mut self, now: f64) -> &[TimelineNote] {
        let end = self.notes.partition_point(|n| n.time <= now);
        if end < self.cursor {
            self.cursor = end;
            return &[];
        }
        let start = self.cursor;
        self.cursor = end;
        &self.notes[start..end]
    }

    pub fn remaining(&self) -> usize {
        self.notes.len() - self.cursor
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}
