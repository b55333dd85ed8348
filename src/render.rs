//! Render-mode strategies.
//!
//! Each [`VisualizationMode`] has one strategy that turns the current
//! playback time, the feature bundle and (for falling notes only) the live
//! population into a draw-list. Strategies hold configuration but no
//! mutable state of their own; anything that must persist between ticks
//! lives in [`NotePopulation`].

use crate::beat_sync::{beat_note_at, BeatSynchronizer};
use crate::color::ColorMapper;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::population::NotePopulation;
use crate::types::*;
use log::{trace, warn};

const BAR_WIDTH: f32 = 0.6;
const SPECTRUM_HEIGHT_SCALE: f32 = 80.0;
const SPECTRUM_ALPHA: f32 = 0.8;
const ROLL_BASE_Y: f32 = 25.0;
const ROLL_SCALE: f32 = 70.0;
const ROLL_SEGMENT_HEIGHT: f32 = 2.0;
const WAVE_CENTER_Y: f32 = 60.0;
const WAVE_SCALE: f32 = 20.0;
const WAVE_LINE_WIDTH: f32 = 2.0;
const WAVE_ALPHA: f32 = 0.8;

/// Per-tick inputs shared by every strategy.
#[derive(Clone, Copy)]
pub struct Frame<'a> {
    pub tick: u64,
    pub time: f64,
    pub bundle: &'a AudioFeatureBundle,
    pub scheme: ColorScheme,
}

impl Frame<'_> {
    fn colors(&self) -> ColorMapper<'_> {
        ColorMapper::new(self.bundle)
    }
}

pub trait RenderStrategy: Send {
    fn mode(&self) -> VisualizationMode;

    /// Compute this tick's shapes. Strategies other than falling notes
    /// must leave `population` untouched.
    fn render(&self, frame: &Frame<'_>, population: &mut NotePopulation) -> Vec<Shape>;
}

/// Build the strategy for `mode`.
pub fn strategy_for(mode: VisualizationMode, config: &EngineConfig) -> Box<dyn RenderStrategy> {
    match mode {
        VisualizationMode::FallingNotes => Box::new(FallingNotes {
            sync: BeatSynchronizer::new(
                config.beat_window_secs,
                config.tick_interval().as_secs_f64(),
            ),
            beat_notes: config.beat_notes,
        }),
        VisualizationMode::Spectrum => Box::new(Spectrum),
        VisualizationMode::Waveform => Box::new(Waveform {
            window_secs: config.waveform_window_secs,
        }),
        VisualizationMode::PianoRoll => Box::new(PianoRoll {
            threshold: config.piano_roll_threshold,
        }),
    }
}

fn log_skip(mode: VisualizationMode, frame: &Frame<'_>, e: &EngineError) {
    if e.is_recoverable() {
        trace!("{} skipped tick {} (t={:.3}): {}", mode, frame.tick, frame.time, e);
    } else {
        warn!("{} failed tick {} (t={:.3}): {}", mode, frame.tick, frame.time, e);
    }
}

// ─── Falling notes ──────────────────────────────────────────────────────────

/// Beat notes + ambient notes falling onto the keyboard.
pub struct FallingNotes {
    sync: BeatSynchronizer,
    beat_notes: bool,
}

impl RenderStrategy for FallingNotes {
    fn mode(&self) -> VisualizationMode {
        VisualizationMode::FallingNotes
    }

    fn render(&self, frame: &Frame<'_>, population: &mut NotePopulation) -> Vec<Shape> {
        if self.beat_notes {
            let beats = &frame.bundle.beat_timestamps;
            if let Some(beat) = self.sync.beat_in_window(beats, frame.time) {
                if population.last_beat() != Some(beat) {
                    if let Some(note) = beat_note_at(beats[beat], frame.bundle, frame.scheme) {
                        population.spawn_for_beat(beat, note);
                    }
                }
            }
        }

        population.spawn_ambient(frame.tick, frame.time, &frame.colors(), frame.scheme);
        population.advance();
        population.cull();
        population.draw_list().collect()
    }
}

// ─── Spectrum ───────────────────────────────────────────────────────────────

/// One vertical bar per chroma bin, standing on the keyboard.
pub struct Spectrum;

impl RenderStrategy for Spectrum {
    fn mode(&self) -> VisualizationMode {
        VisualizationMode::Spectrum
    }

    fn render(&self, frame: &Frame<'_>, _population: &mut NotePopulation) -> Vec<Shape> {
        let chroma = match frame.bundle.chroma_at(frame.time) {
            Ok(c) => c,
            Err(e) => {
                log_skip(self.mode(), frame, &e);
                return Vec::new();
            }
        };
        let colors = frame.colors();
        chroma
            .iter()
            .enumerate()
            .map(|(bin, &intensity)| Shape::Rect {
                origin: Point::new(bin as f32 * KEYS_PER_PITCH_CLASS - BAR_WIDTH / 2.0, KEYBOARD_Y),
                width: BAR_WIDTH,
                height: intensity * SPECTRUM_HEIGHT_SCALE,
                color: colors.map_color(bin, frame.time, frame.scheme),
                alpha: SPECTRUM_ALPHA,
            })
            .collect()
    }
}

// ─── Waveform ───────────────────────────────────────────────────────────────

/// A short window of raw samples as a polyline across the key-space.
pub struct Waveform {
    window_secs: f64,
}

impl RenderStrategy for Waveform {
    fn mode(&self) -> VisualizationMode {
        VisualizationMode::Waveform
    }

    fn render(&self, frame: &Frame<'_>, _population: &mut NotePopulation) -> Vec<Shape> {
        let window = match frame.bundle.sample_window(frame.time, self.window_secs) {
            Ok(w) if !w.is_empty() => w,
            Ok(_) => return Vec::new(),
            Err(e) => {
                log_skip(self.mode(), frame, &e);
                return Vec::new();
            }
        };
        let span = (window.len().max(2) - 1) as f32;
        let points = window
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                Point::new(
                    i as f32 / span * KEY_COUNT as f32,
                    WAVE_CENTER_Y + s * WAVE_SCALE,
                )
            })
            .collect();
        vec![Shape::Polyline {
            points,
            color: Rgb::CYAN,
            width: WAVE_LINE_WIDTH,
            alpha: WAVE_ALPHA,
        }]
    }
}

// ─── Piano roll ─────────────────────────────────────────────────────────────

/// Short horizontal segments whose height and opacity follow chroma
/// intensity. Bins at or below the threshold are omitted.
pub struct PianoRoll {
    threshold: f32,
}

impl RenderStrategy for PianoRoll {
    fn mode(&self) -> VisualizationMode {
        VisualizationMode::PianoRoll
    }

    fn render(&self, frame: &Frame<'_>, _population: &mut NotePopulation) -> Vec<Shape> {
        let chroma = match frame.bundle.chroma_at(frame.time) {
            Ok(c) => c,
            Err(e) => {
                log_skip(self.mode(), frame, &e);
                return Vec::new();
            }
        };
        let colors = frame.colors();
        chroma
            .iter()
            .enumerate()
            .filter(|(_, &intensity)| intensity > self.threshold)
            .map(|(bin, &intensity)| Shape::Rect {
                origin: Point::new(
                    bin as f32 * KEYS_PER_PITCH_CLASS - BAR_WIDTH / 2.0,
                    ROLL_BASE_Y + intensity * ROLL_SCALE,
                ),
                width: BAR_WIDTH,
                height: ROLL_SEGMENT_HEIGHT,
                color: colors.map_color(bin, frame.time, frame.scheme),
                alpha: intensity.clamp(0.0, 1.0),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 100 Hz / 10 hop = 10 frames/s, 10 frames. Chroma bin i = i/11 so
    /// bin 0 is silent and bin 11 is full scale.
    fn bundle() -> AudioFeatureBundle {
        AudioFeatureBundle {
            duration_seconds: 1.0,
            tempo_bpm: 120.0,
            sample_rate: 100,
            beat_timestamps: vec![0.5],
            chromagram: (0..12).map(|i| vec![i as f32 / 11.0; 10]).collect(),
            mfcc: vec![vec![0.0; 10]],
            hop_size: 10,
            key: None,
            samples: (0..100).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect(),
        }
    }

    fn frame(b: &AudioFeatureBundle, time: f64) -> Frame<'_> {
        Frame {
            tick: 1,
            time,
            bundle: b,
            scheme: ColorScheme::Rainbow,
        }
    }

    fn pop() -> NotePopulation {
        NotePopulation::new(&EngineConfig::default())
    }

    #[test]
    fn test_spectrum_bars() {
        let b = bundle();
        let s = strategy_for(VisualizationMode::Spectrum, &EngineConfig::default());
        let shapes = s.render(&frame(&b, 0.3), &mut pop());
        assert_eq!(shapes.len(), 12);
        match &shapes[11] {
            Shape::Rect { origin, height, .. } => {
                assert!((origin.x - (77.0 - 0.3)).abs() < 1e-4);
                assert_eq!(origin.y, KEYBOARD_Y);
                assert!((height - 80.0).abs() < 1e-4);
            }
            other => panic!("expected rect, got {:?}", other),
        }
    }

    #[test]
    fn test_spectrum_out_of_range_draws_nothing() {
        let b = bundle();
        let s = strategy_for(VisualizationMode::Spectrum, &EngineConfig::default());
        assert!(s.render(&frame(&b, 5.0), &mut pop()).is_empty());
    }

    #[test]
    fn test_piano_roll_omits_quiet_bins() {
        let b = bundle();
        let s = strategy_for(VisualizationMode::PianoRoll, &EngineConfig::default());
        let shapes = s.render(&frame(&b, 0.3), &mut pop());
        // bins 0 (0.0) and 1 (0.09) are at or under 0.1
        assert_eq!(shapes.len(), 10);
        match &shapes[9] {
            Shape::Rect { origin, alpha, height, .. } => {
                assert!((origin.y - 95.0).abs() < 1e-4);
                assert!((alpha - 1.0).abs() < 1e-6);
                assert_eq!(*height, 2.0);
            }
            other => panic!("expected rect, got {:?}", other),
        }
    }

    #[test]
    fn test_waveform_spans_keyspace() {
        let b = bundle();
        let s = strategy_for(VisualizationMode::Waveform, &EngineConfig::default());
        let shapes = s.render(&frame(&b, 0.0), &mut pop());
        assert_eq!(shapes.len(), 1);
        match &shapes[0] {
            Shape::Polyline { points, .. } => {
                assert_eq!(points.len(), 10);
                assert_eq!(points[0], Point::new(0.0, 70.0));
                assert!((points[9].x - 88.0).abs() < 1e-4);
                assert!((points[9].y - 50.0).abs() < 1e-4);
            }
            other => panic!("expected polyline, got {:?}", other),
        }
    }

    #[test]
    fn test_waveform_truncates_and_degrades() {
        let mut b = bundle();
        let s = strategy_for(VisualizationMode::Waveform, &EngineConfig::default());
        // 0.955 s: only 5 samples left in a 10-sample window
        match &s.render(&frame(&b, 0.955), &mut pop())[0] {
            Shape::Polyline { points, .. } => assert_eq!(points.len(), 5),
            other => panic!("expected polyline, got {:?}", other),
        }
        assert!(s.render(&frame(&b, 3.0), &mut pop()).is_empty());
        b.samples.clear();
        assert!(s.render(&frame(&b, 0.0), &mut pop()).is_empty());
    }

    #[test]
    fn test_non_note_modes_leave_population_alone() {
        let b = bundle();
        let mut p = pop();
        p.spawn(VisualNote {
            x: 1.0,
            y: 90.0,
            color: Rgb::CYAN,
            size: 0.5,
            fall_speed: 1.0,
            kind: NoteKind::Ambient,
            time: 0.0,
        });
        for mode in [VisualizationMode::Spectrum, VisualizationMode::Waveform, VisualizationMode::PianoRoll] {
            strategy_for(mode, &EngineConfig::default()).render(&frame(&b, 0.2), &mut p);
        }
        assert_eq!(p.len(), 1);
        assert_eq!(p.iter().next().unwrap().y, 90.0);
    }

    #[test]
    fn test_falling_notes_spawns_once_per_beat() {
        let b = bundle();
        let mut cfg = EngineConfig::default();
        cfg.ambient_every_n_ticks = 0;
        let s = strategy_for(VisualizationMode::FallingNotes, &cfg);
        let mut p = pop();
        for i in 0..6 {
            let f = Frame { tick: i, time: 0.45 + i as f64 * 0.02, ..frame(&b, 0.0) };
            s.render(&f, &mut p);
        }
        assert_eq!(p.total_spawned(), 1);
        let n = p.iter().next().unwrap();
        assert_eq!(n.kind, NoteKind::Beat);
        assert_eq!(n.x, 77.0);
    }
}
