use anyhow::{ensure, Result};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Band-limited resampling of `samples` from `source_rate` to `target_rate`.
///
/// The whole clip is transformed once; spectrum bins above the lower of the two
/// Nyquist frequencies are dropped before the inverse transform, which doubles
/// as the anti-aliasing filter when downsampling.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    ensure!(source_rate > 0, "source sample rate must be positive");
    ensure!(target_rate > 0, "target sample rate must be positive");
    if samples.is_empty() || source_rate == target_rate {
        return Ok(samples.to_vec());
    }

    let in_len = samples.len();
    let out_len = ((in_len as u64 * target_rate as u64) / source_rate as u64).max(1) as usize;

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(in_len);
    let inverse = planner.plan_fft_inverse(out_len);

    let mut spectrum: Vec<Complex<f64>> = samples
        .iter()
        .map(|&s| Complex::new(s as f64, 0.0))
        .collect();
    forward.process(&mut spectrum);

    let mut output = vec![Complex::new(0.0, 0.0); out_len];
    output[0] = spectrum[0];
    let shared_bins = (in_len.min(out_len).saturating_sub(1)) / 2;
    for k in 1..=shared_bins {
        output[k] = spectrum[k];
        output[out_len - k] = spectrum[in_len - k];
    }
    inverse.process(&mut output);

    let scale = 1.0 / in_len as f64;
    Ok(output.iter().map(|c| (c.re * scale) as f32).collect())
}

#[cfg(test)]
mod tests {
    use super::resample;

    #[test]
    fn preserves_constant_signal_after_resample() {
        let input = vec![0.5; 480];
        let resampled = resample(&input, 48_000, 16_000).unwrap();
        assert_eq!(resampled.len(), 160);
        assert!(resampled.iter().all(|&sample| (sample - 0.5).abs() < 1e-5));
    }

    #[test]
    fn keeps_in_band_tone_frequency() {
        let source_rate = 16_000;
        let target_rate = 11_000;
        let tone = 440.0_f64;
        let input: Vec<f32> = (0..16_000)
            .map(|i| {
                (2.0 * std::f64::consts::PI * tone * i as f64 / source_rate as f64).sin() as f32
            })
            .collect();
        let output = resample(&input, source_rate, target_rate).unwrap();
        assert_eq!(output.len(), 11_000);
        for (i, sample) in output.iter().enumerate().skip(100).take(200) {
            let expected =
                (2.0 * std::f64::consts::PI * tone * i as f64 / target_rate as f64).sin();
            assert!((*sample as f64 - expected).abs() < 1e-3, "sample {i} drifted");
        }
    }

    #[test]
    fn rejects_zero_rates() {
        assert!(resample(&[0.1, 0.2], 0, 16_000).is_err());
        assert!(resample(&[0.1, 0.2], 16_000, 0).is_err());
    }
}
