use crate::color::midi_to_hz;
use crate::types::*;
use log::info;
use std::f32::consts::PI;

/// Pitch classes of the demo arpeggio, one per beat: C E G E.
const ARPEGGIO: [usize; 4] = [0, 4, 7, 4];
const MFCC_COEFFS: usize = 13;

/// A deterministic feature bundle for running without an analysis backend:
/// a plucked C-major arpeggio, one note per beat, with matching beat
/// grid, chromagram and MFCC.
///
/// The first MFCC coefficient sweeps -20 → +20 over the duration so the
/// mood scheme walks the full hue range.
pub fn demo_bundle(duration_secs: f64, tempo_bpm: f64, sample_rate: u32) -> AudioFeatureBundle {
    let hop = DEFAULT_HOP_SIZE as usize;
    let beat_period = 60.0 / tempo_bpm.max(1.0);
    let total = (duration_secs * sample_rate as f64) as usize;
    let sr = sample_rate as f32;

    let pitch_class_at = |t: f64| ARPEGGIO[(t / beat_period) as usize % ARPEGGIO.len()];

    let samples: Vec<f32> = (0..total)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let since_beat = (t % beat_period) as f32;
            let freq = midi_to_hz(60.0 + pitch_class_at(t) as f64) as f32;
            let envelope = (-since_beat * 4.0).exp();
            0.6 * envelope * (2.0 * PI * freq * i as f32 / sr).sin()
        })
        .collect();

    let beat_timestamps: Vec<f64> = (0..)
        .map(|i| i as f64 * beat_period)
        .take_while(|&t| t < duration_secs)
        .collect();

    let frames = total / hop + 1;
    let mut chromagram = vec![vec![0.05f32; frames]; PITCH_CLASSES];
    let mut mfcc = vec![vec![0.0f32; frames]; MFCC_COEFFS];
    for f in 0..frames {
        let t = (f * hop) as f64 / sample_rate as f64;
        let since_beat = (t % beat_period) as f32;
        let pc = pitch_class_at(t);
        chromagram[pc][f] = 0.3 + 0.7 * (-since_beat * 2.0).exp();
        chromagram[(pc + 7) % PITCH_CLASSES][f] = 0.35;

        let progress = f as f32 / frames.max(2).saturating_sub(1) as f32;
        mfcc[0][f] = -20.0 + 40.0 * progress;
        for (c, row) in mfcc.iter_mut().enumerate().skip(1) {
            row[f] = (progress * c as f32 * PI).sin() * 5.0 / c as f32;
        }
    }

    info!(
        "Synthesized demo bundle: {:.1}s at {} Hz, {:.0} BPM, {} beats, {} frames",
        duration_secs,
        sample_rate,
        tempo_bpm,
        beat_timestamps.len(),
        frames
    );

    AudioFeatureBundle {
        duration_seconds: duration_secs,
        tempo_bpm,
        sample_rate,
        beat_timestamps,
        chromagram,
        mfcc,
        hop_size: DEFAULT_HOP_SIZE,
        key: Some("C major".to_string()),
        samples,
    }
}
