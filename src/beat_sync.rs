use crate::color::ColorMapper;
use crate::types::*;
use log::trace;

/// Fixed geometry of beat-triggered notes.
pub const BEAT_NOTE_SIZE: f32 = 1.0;
pub const BEAT_NOTE_FALL_SPEED: f32 = 2.5;

/// Decides, tick by tick, whether playback is close enough to a detected
/// beat to spawn a beat note, and builds that note from the chroma frame.
///
/// The window has to be wider than one tick (~33 ms at 30 Hz) or beats
/// falling between ticks would be missed. Within the window only the tick
/// nearest the beat qualifies: a tick more than half a tick interval ahead
/// of the beat defers to the next one. Callers that must spawn once per
/// beat track the beat index returned by [`BeatSynchronizer::beat_in_window`].
#[derive(Debug, Clone, Copy)]
pub struct BeatSynchronizer {
    window_secs: f64,
    /// How far ahead of a beat a tick may fire and still be the nearest one
    lead_secs: f64,
}

impl BeatSynchronizer {
    pub fn new(window_secs: f64, tick_interval_secs: f64) -> Self {
        Self {
            window_secs,
            lead_secs: (tick_interval_secs / 2.0).min(window_secs),
        }
    }

    pub fn window_secs(&self) -> f64 {
        self.window_secs
    }

    /// Index of the nearest beat if it lies strictly within the window and
    /// no later tick would land closer to it.
    pub fn beat_in_window(&self, beats: &[f64], current_time: f64) -> Option<usize> {
        let (idx, dist) = nearest_beat(beats, current_time)?;
        let early = beats[idx] - current_time > self.lead_secs;
        (dist < self.window_secs && !early).then_some(idx)
    }

    /// Spawn a beat note if `current_time` is the tick nearest a beat and
    /// the chroma frame at that beat exists. The note is built at the beat
    /// timestamp, exactly as the timeline export builds it.
    pub fn maybe_spawn_beat_note(
        &self,
        current_time: f64,
        bundle: &AudioFeatureBundle,
        scheme: ColorScheme,
    ) -> Option<VisualNote> {
        let beat = self.beat_in_window(&bundle.beat_timestamps, current_time)?;
        beat_note_at(bundle.beat_timestamps[beat], bundle, scheme)
    }
}

/// Nearest beat to `t` and its distance. Ties resolve to the earlier beat.
/// `beats` must be non-decreasing.
pub fn nearest_beat(beats: &[f64], t: f64) -> Option<(usize, f64)> {
    if beats.is_empty() {
        return None;
    }
    let after = beats.partition_point(|&b| b < t);
    let mut best: Option<(usize, f64)> = None;
    for idx in [after.checked_sub(1), Some(after)].into_iter().flatten() {
        if let Some(&b) = beats.get(idx) {
            let dist = (b - t).abs();
            // strict < keeps the earlier candidate on ties
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((idx, dist));
            }
        }
    }
    best
}

/// Index of the strongest chroma bin. First maximum wins.
pub fn dominant_pitch_class(chroma: &[f32; PITCH_CLASSES]) -> usize {
    let mut best = 0;
    for (i, &v) in chroma.iter().enumerate() {
        if v > chroma[best] {
            best = i;
        }
    }
    best
}

/// The beat note for a beat at time `t`, independent of the beat window.
/// Shared by the live synchronizer and the timeline export so both derive
/// identical notes. `None` when the chroma frame is missing.
pub fn beat_note_at(t: f64, bundle: &AudioFeatureBundle, scheme: ColorScheme) -> Option<VisualNote> {
    let chroma = match bundle.chroma_at(t) {
        Ok(c) => c,
        Err(e) => {
            trace!("beat note skipped at t={:.3}: {}", t, e);
            return None;
        }
    };
    let pitch_class = dominant_pitch_class(&chroma);
    Some(VisualNote {
        x: pitch_class as f32 * KEYS_PER_PITCH_CLASS,
        y: SPAWN_Y,
        color: ColorMapper::new(bundle).map_color(pitch_class, t, scheme),
        size: BEAT_NOTE_SIZE,
        fall_speed: BEAT_NOTE_FALL_SPEED,
        kind: NoteKind::Beat,
        time: t,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1000 Hz / 100 hop = 10 frames/s; chroma peaks at bin 3 for the
    /// frames around t=0.5 and at bin 9 elsewhere.
    fn bundle() -> AudioFeatureBundle {
        let frames = 12;
        let mut chroma = vec![vec![0.1f32; frames]; 12];
        for f in 0..frames {
            let peak = if (4..=6).contains(&f) { 3 } else { 9 };
            chroma[peak][f] = 0.9;
        }
        AudioFeatureBundle {
            duration_seconds: 1.2,
            tempo_bpm: 120.0,
            sample_rate: 1000,
            beat_timestamps: vec![0.0, 0.5, 1.0],
            chromagram: chroma,
            mfcc: vec![],
            hop_size: 100,
            key: None,
            samples: vec![],
        }
    }

    #[test]
    fn test_nearest_beat_basic() {
        let beats = [0.0, 0.5, 1.0];
        assert_eq!(nearest_beat(&beats, 0.48).unwrap().0, 1);
        assert_eq!(nearest_beat(&beats, 0.9).unwrap().0, 2);
        assert_eq!(nearest_beat(&beats, -3.0).unwrap().0, 0);
        assert_eq!(nearest_beat(&beats, 7.0).unwrap().0, 2);
        assert!(nearest_beat(&[], 1.0).is_none());
    }

    #[test]
    fn test_nearest_beat_tie_prefers_earlier() {
        let beats = [0.0, 1.0];
        assert_eq!(nearest_beat(&beats, 0.5).unwrap().0, 0);
        let dup = [0.25, 0.25, 0.75];
        assert_eq!(nearest_beat(&dup, 0.25).unwrap().0, 0);
    }

    #[test]
    fn test_spawn_at_beat_uses_dominant_pitch_class() {
        let b = bundle();
        let sync = BeatSynchronizer::new(0.1, 1.0 / 30.0);
        let note = sync
            .maybe_spawn_beat_note(0.51, &b, ColorScheme::Rainbow)
            .expect("beat note near 0.5");
        assert_eq!(note.x, 21.0);
        assert_eq!(note.size, 1.0);
        assert_eq!(note.fall_speed, 2.5);
        assert_eq!(note.y, SPAWN_Y);
        assert_eq!(note.kind, NoteKind::Beat);
    }

    #[test]
    fn test_no_spawn_outside_window() {
        let b = bundle();
        let sync = BeatSynchronizer::new(0.1, 1.0 / 30.0);
        assert!(sync.maybe_spawn_beat_note(0.25, &b, ColorScheme::Rainbow).is_none());
        assert!(sync.maybe_spawn_beat_note(0.65, &b, ColorScheme::Rainbow).is_none());
    }

    #[test]
    fn test_early_tick_defers_to_the_one_nearest_the_beat() {
        let b = bundle();
        let sync = BeatSynchronizer::new(0.1, 1.0 / 30.0);
        // inside the window, but the tick at 0.5 is closer
        assert!(sync.beat_in_window(&b.beat_timestamps, 14.0 / 30.0).is_none());
        assert_eq!(sync.beat_in_window(&b.beat_timestamps, 15.0 / 30.0), Some(1));
        // a late tick still qualifies
        assert_eq!(sync.beat_in_window(&b.beat_timestamps, 0.55), Some(1));
    }

    #[test]
    fn test_note_uses_chroma_at_the_beat() {
        let b = bundle();
        // tick a hair before the beat still reads the frame at 0.5
        let note = BeatSynchronizer::new(0.1, 1.0 / 30.0)
            .maybe_spawn_beat_note(0.49, &b, ColorScheme::Rainbow)
            .unwrap();
        assert_eq!(note.x, 21.0);
        assert_eq!(note.time, 0.5);
    }

    #[test]
    fn test_no_spawn_past_last_frame() {
        // beat at 1.5 s but only 12 frames (1.2 s) of chroma
        let mut b = bundle();
        b.beat_timestamps.push(1.5);
        let sync = BeatSynchronizer::new(0.1, 1.0 / 30.0);
        assert!(sync.maybe_spawn_beat_note(1.5, &b, ColorScheme::Rainbow).is_none());
    }

    #[test]
    fn test_no_spawn_without_beats() {
        let mut b = bundle();
        b.beat_timestamps.clear();
        let sync = BeatSynchronizer::new(0.1, 1.0 / 30.0);
        assert!(sync.maybe_spawn_beat_note(0.5, &b, ColorScheme::Rainbow).is_none());
    }

    #[test]
    fn test_dominant_pitch_class_first_max() {
        let mut c = [0.0f32; 12];
        c[4] = 0.7;
        c[8] = 0.7;
        assert_eq!(dominant_pitch_class(&c), 4);
        assert_eq!(dominant_pitch_class(&[0.0; 12]), 0);
    }
}
