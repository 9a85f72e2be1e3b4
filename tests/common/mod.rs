#![allow(dead_code)]

use std::f64::consts::PI;
use std::path::Path;

use phonalyzer::types::AudioSignal;

pub const SAMPLE_RATE: u32 = 16_000;
pub const REFERENCE_F0: f64 = 120.0;

/// (centre Hz, gain, bandwidth Hz) of an open /a/-like vowel.
pub const VOWEL_FORMANTS: [(f64, f64, f64); 3] = [
    (700.0, 12.0, 90.0),
    (1220.0, 8.0, 110.0),
    (2600.0, 4.0, 170.0),
];
const HARMONIC_CEILING_HZ: f64 = 5_000.0;
const TARGET_RMS: f64 = 0.2;

fn envelope(frequency: f64) -> f64 {
    1.0 + VOWEL_FORMANTS
        .iter()
        .map(|&(centre, gain, bandwidth)| {
            let detune = (frequency - centre) / (bandwidth / 2.0);
            gain / (1.0 + detune * detune)
        })
        .sum::<f64>()
}

/// Steady harmonic vowel at `f0`, `len` samples long, RMS normalised.
pub fn vowel_samples(f0: f64, len: usize, sample_rate: u32) -> Vec<f32> {
    let rate = sample_rate as f64;
    let harmonics: Vec<(f64, f64)> = (1..)
        .map(|k| k as f64 * f0)
        .take_while(|&f| f < HARMONIC_CEILING_HZ.min(rate / 2.0))
        .enumerate()
        .map(|(i, f)| (f, envelope(f) / (i + 1) as f64))
        .collect();
    let raw: Vec<f64> = (0..len)
        .map(|n| {
            let t = n as f64 / rate;
            harmonics
                .iter()
                .map(|&(f, amplitude)| amplitude * (2.0 * PI * f * t).sin())
                .sum()
        })
        .collect();
    let rms = (raw.iter().map(|v| v * v).sum::<f64>() / raw.len().max(1) as f64).sqrt();
    let gain = if rms > 0.0 { TARGET_RMS / rms } else { 0.0 };
    raw.into_iter().map(|v| (v * gain) as f32).collect()
}

/// Adds uniform noise in `[-amplitude, amplitude]` from a fixed-seed xorshift.
pub fn with_noise(samples: &[f32], amplitude: f32, seed: u64) -> Vec<f32> {
    let mut state = seed.max(1);
    samples
        .iter()
        .map(|&s| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
            s + amplitude * (2.0 * unit as f32 - 1.0)
        })
        .collect()
}

pub fn vowel(f0: f64, len: usize) -> AudioSignal {
    AudioSignal::new(vowel_samples(f0, len, SAMPLE_RATE), SAMPLE_RATE).expect("valid vowel")
}

pub fn silence(len: usize) -> AudioSignal {
    AudioSignal::new(vec![0.0_f32; len], SAMPLE_RATE).expect("valid silence")
}

pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    for &sample in samples {
        let scaled = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(scaled).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}
