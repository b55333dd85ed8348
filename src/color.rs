use crate::types::*;
use log::trace;

const SATURATION: f32 = 0.8;
const VALUE: f32 = 0.9;
/// Hue used by the mood scheme when no MFCC frame is available.
const NEUTRAL_HUE: f32 = 0.5;
/// MIDI note of piano key 0 (A0).
const MIDI_OFFSET: f64 = 21.0;
const LOWEST_HZ: f64 = 27.5;
const HIGHEST_HZ: f64 = 4186.0;

/// Maps key positions to colors under a [`ColorScheme`].
///
/// Rainbow and frequency schemes are pure functions of key and time. The
/// mood scheme additionally reads the first MFCC coefficient of the bundle,
/// so the mapper borrows it.
#[derive(Clone, Copy)]
pub struct ColorMapper<'a> {
    bundle: &'a AudioFeatureBundle,
}

impl<'a> ColorMapper<'a> {
    pub fn new(bundle: &'a AudioFeatureBundle) -> Self {
        Self { bundle }
    }

    /// `key_index` must already be clamped to 0..88.
    pub fn map_color(&self, key_index: usize, time: f64, scheme: ColorScheme) -> Rgb {
        debug_assert!(key_index < KEY_COUNT, "key index {} out of range", key_index);
        let hue = match scheme {
            ColorScheme::Rainbow => rainbow_hue(key_index, time),
            ColorScheme::FrequencyBased => frequency_hue(key_index),
            ColorScheme::MoodBased => self.mood_hue(time),
        };
        hsv_to_rgb(hue, SATURATION, VALUE)
    }

    fn mood_hue(&self, time: f64) -> f32 {
        match self.bundle.mfcc0_at(time) {
            Ok(v) => ((v + 20.0) / 40.0).clamp(0.0, 1.0),
            Err(e) => {
                trace!("mood hue fallback at t={:.3}: {}", time, e);
                NEUTRAL_HUE
            }
        }
    }
}

/// `(key/88 + time*0.1) mod 1`.
pub fn rainbow_hue(key_index: usize, time: f64) -> f32 {
    (key_index as f64 / KEY_COUNT as f64 + time * 0.1).rem_euclid(1.0) as f32
}

/// Position of the key's fundamental on a log-frequency axis from A0 to C8.
pub fn frequency_hue(key_index: usize) -> f32 {
    let freq = midi_to_hz(key_index as f64 + MIDI_OFFSET);
    let lo = LOWEST_HZ.log10();
    let hi = HIGHEST_HZ.log10();
    ((freq.log10() - lo) / (hi - lo)).clamp(0.0, 1.0) as f32
}

/// Convert MIDI note number (fractional) to Hz. A4 = MIDI 69 = 440 Hz.
pub fn midi_to_hz(midi: f64) -> f64 {
    440.0 * 2.0_f64.powf((midi - 69.0) / 12.0)
}

/// HSV (all 0–1) to RGB, six-sector conversion.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb {
    if s <= 0.0 {
        return Rgb::new(v, v, v);
    }
    let h6 = h.rem_euclid(1.0) * 6.0;
    let sector = (h6.floor() as u32) % 6;
    let f = h6 - h6.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match sector {
        0 => Rgb::new(v, t, p),
        1 => Rgb::new(q, v, p),
        2 => Rgb::new(p, v, t),
        3 => Rgb::new(p, q, v),
        4 => Rgb::new(t, p, v),
        _ => Rgb::new(v, p, q),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bundle_with_mfcc(values: Vec<f32>) -> AudioFeatureBundle {
        AudioFeatureBundle {
            duration_seconds: 10.0,
            tempo_bpm: 120.0,
            sample_rate: 512,
            beat_timestamps: vec![],
            chromagram: vec![],
            mfcc: if values.is_empty() { vec![] } else { vec![values] },
            hop_size: 512,
            key: None,
            samples: vec![],
        }
    }

    fn in_range(c: Rgb) -> bool {
        [c.r, c.g, c.b].iter().all(|v| (0.0..=1.0).contains(v))
    }

    fn close(a: Rgb, b: Rgb) -> bool {
        (a.r - b.r).abs() < 1e-4 && (a.g - b.g).abs() < 1e-4 && (a.b - b.b).abs() < 1e-4
    }

    #[test]
    fn test_hsv_primaries() {
        assert!(close(hsv_to_rgb(0.0, 1.0, 1.0), Rgb::new(1.0, 0.0, 0.0)));
        assert!(close(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0), Rgb::new(0.0, 1.0, 0.0)));
        assert!(close(hsv_to_rgb(2.0 / 3.0, 1.0, 1.0), Rgb::new(0.0, 0.0, 1.0)));
        assert!(close(hsv_to_rgb(0.5, 0.0, 0.4), Rgb::new(0.4, 0.4, 0.4)));
    }

    #[test]
    fn test_frequency_hue_endpoints() {
        // key 0 = A0 = 27.5 Hz, key 87 = C8 = 4186 Hz
        assert!(frequency_hue(0).abs() < 1e-4);
        assert!((frequency_hue(87) - 1.0).abs() < 1e-3);
        assert!(frequency_hue(40) > frequency_hue(39));
    }

    #[test]
    fn test_mood_hue_normalizes_first_coefficient() {
        // 512 Hz / 512 hop = one frame per second
        let b = bundle_with_mfcc(vec![-20.0, 0.0, 20.0, 100.0]);
        let mapper = ColorMapper::new(&b);
        assert!(close(mapper.map_color(5, 0.0, ColorScheme::MoodBased), hsv_to_rgb(0.0, 0.8, 0.9)));
        assert!(close(mapper.map_color(5, 1.5, ColorScheme::MoodBased), hsv_to_rgb(0.5, 0.8, 0.9)));
        // clamped
        assert!(close(mapper.map_color(5, 3.0, ColorScheme::MoodBased), hsv_to_rgb(1.0, 0.8, 0.9)));
    }

    #[test]
    fn test_mood_falls_back_to_neutral() {
        let neutral = hsv_to_rgb(NEUTRAL_HUE, 0.8, 0.9);
        let empty = bundle_with_mfcc(vec![]);
        assert!(close(ColorMapper::new(&empty).map_color(0, 0.0, ColorScheme::MoodBased), neutral));

        let short = bundle_with_mfcc(vec![20.0]);
        assert!(close(ColorMapper::new(&short).map_color(0, 9.0, ColorScheme::MoodBased), neutral));
    }

    #[test]
    fn test_midi_to_hz_reference() {
        assert!((midi_to_hz(69.0) - 440.0).abs() < 1e-9);
        assert!((midi_to_hz(21.0) - 27.5).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_channels_in_range(key in 0usize..88, time in 0.0f64..3600.0, mfcc in -200.0f32..200.0) {
            let b = bundle_with_mfcc(vec![mfcc; 8]);
            let mapper = ColorMapper::new(&b);
            for scheme in ColorScheme::ALL {
                prop_assert!(in_range(mapper.map_color(key, time, scheme)));
            }
        }

        #[test]
        fn prop_rainbow_hue_has_period_one(key in 0usize..88, time in 0.0f64..1000.0) {
            // +10 s adds exactly 1.0 to the hue argument
            let a = rainbow_hue(key, time);
            let b = rainbow_hue(key, time + 10.0);
            let d = (a - b).abs();
            prop_assert!(d < 1e-3 || (1.0 - d) < 1e-3, "a={} b={}", a, b);
        }
    }
}
