//! Loading feature bundles and raw audio, saving timeline exports.

use crate::error::Result;
use crate::timeline::VisualizationExport;
use crate::types::AudioFeatureBundle;
use hound::{SampleFormat, WavReader};
use log::{info, warn};
use std::fs;
use std::path::Path;

/// Read and validate a bundle produced by the analysis backend.
pub fn load_bundle(path: &Path) -> Result<AudioFeatureBundle> {
    let json = fs::read_to_string(path)?;
    let bundle: AudioFeatureBundle = serde_json::from_str(&json)?;
    bundle.validate()?;
    info!("Loaded bundle {:?}: {}", path.file_name().unwrap_or_default(), bundle);
    Ok(bundle)
}

pub fn save_bundle(bundle: &AudioFeatureBundle, path: &Path) -> Result<()> {
    fs::write(path, serde_json::to_string(bundle)?)?;
    Ok(())
}

/// Mono samples normalized to -1.0..1.0, plus the file's sample rate.
pub fn load_wav_samples(path: &Path) -> Result<(Vec<f32>, u32)> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    info!(
        "WAV: {:?}  {} Hz  {} ch  {:?}  {} bit",
        path.file_name().unwrap_or_default(),
        spec.sample_rate,
        channels,
        spec.sample_format,
        spec.bits_per_sample,
    );

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let mono = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };
    Ok((mono, spec.sample_rate))
}

/// Attach the samples of a WAV file to `bundle` for waveform rendering.
/// A sample-rate mismatch is reported but not fatal: waveform timing will
/// be off while every chroma/MFCC lookup stays correct.
pub fn attach_wav(bundle: &mut AudioFeatureBundle, path: &Path) -> Result<()> {
    let (samples, rate) = load_wav_samples(path)?;
    if rate != bundle.sample_rate {
        warn!(
            "WAV sample rate {} Hz differs from bundle's {} Hz; waveform will drift",
            rate, bundle.sample_rate
        );
    }
    info!(
        "Attached {} samples ({:.2}s) from {:?}",
        samples.len(),
        samples.len() as f64 / rate.max(1) as f64,
        path.file_name().unwrap_or_default()
    );
    bundle.samples = samples;
    Ok(())
}

pub fn save_export(export: &VisualizationExport, path: &Path) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(export)?)?;
    info!("Timeline export written to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use hound::{WavSpec, WavWriter};

    fn write_wav(path: &Path, channels: u16, frames: &[[i16; 2]]) {
        let spec = WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut w = WavWriter::create(path, spec).unwrap();
        for f in frames {
            for &s in f.iter().take(channels as usize) {
                w.write_sample(s).unwrap();
            }
        }
        w.finalize().unwrap();
    }

    #[test]
    fn test_wav_mixdown_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, &[[16384, 0], [-16384, -16384], [0, 0]]);
        let (mono, rate) = load_wav_samples(&path).unwrap();
        assert_eq!(rate, 8000);
        assert_eq!(mono.len(), 3);
        assert!((mono[0] - 0.25).abs() < 1e-4);
        assert!((mono[1] + 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_bundle_roundtrip_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        let bundle = crate::synth::demo_bundle(2.0, 120.0, 8000);
        save_bundle(&bundle, &path).unwrap();
        let loaded = load_bundle(&path).unwrap();
        assert_eq!(loaded.beat_timestamps, bundle.beat_timestamps);
        assert_eq!(loaded.chroma_frames(), bundle.chroma_frames());

        fs::write(&path, r#"{"duration_seconds":1,"tempo_bpm":1,"sample_rate":0,"beat_timestamps":[]}"#).unwrap();
        assert!(matches!(load_bundle(&path), Err(EngineError::InvalidBundle(_))));

        fs::write(&path, "nope").unwrap();
        assert!(matches!(load_bundle(&path), Err(EngineError::Json(_))));
    }

    #[test]
    fn test_attach_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, &[[100, 0]; 80]);
        let mut bundle = crate::synth::demo_bundle(1.0, 120.0, 8000);
        attach_wav(&mut bundle, &path).unwrap();
        assert_eq!(bundle.samples.len(), 80);
    }
}
