use super::frames::{hann, FrameLayout};

/// Squared 20 µPa auditory threshold.
const REFERENCE_POWER: f64 = 4.0e-10;

/// Hann-weighted intensity in dB per frame, floored at 0 dB.
///
/// A signal shorter than one window yields a single frame over the whole clip.
pub(crate) fn intensity_contour(samples: &[f32], layout: &FrameLayout) -> Vec<f64> {
    if layout.count(samples.len()) == 0 {
        return vec![frame_intensity(samples, &hann(samples.len()))];
    }
    let weights = hann(layout.window);
    layout
        .frames(samples)
        .map(|frame| frame_intensity(frame, &weights))
        .collect()
}

/// Sample amplitude whose power sits at `db` on the intensity scale.
pub(crate) fn amplitude_at(db: f64) -> f64 {
    (REFERENCE_POWER * 10.0_f64.powf(db / 10.0)).sqrt()
}

fn frame_intensity(frame: &[f32], weights: &[f64]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let mean = frame.iter().map(|&s| s as f64).sum::<f64>() / frame.len() as f64;
    let (weighted, total) = frame
        .iter()
        .zip(weights)
        .fold((0.0, 0.0), |(acc, norm), (&sample, &w)| {
            let centered = sample as f64 - mean;
            (acc + w * centered * centered, norm + w)
        });
    if total <= 0.0 {
        return 0.0;
    }
    let power = weighted / total;
    10.0 * (power.max(REFERENCE_POWER) / REFERENCE_POWER).log10()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sine(amplitude: f64, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * 200.0 * i as f64 / 16_000.0;
                (amplitude * phase.sin()) as f32
            })
            .collect()
    }

    #[test]
    fn silence_sits_at_zero_db() {
        let layout = FrameLayout::new(16_000, 0.0427, 0.01);
        let contour = intensity_contour(&vec![0.0; 4_000], &layout);
        assert!(!contour.is_empty());
        assert!(contour.iter().all(|&db| db == 0.0));
    }

    #[test]
    fn halving_amplitude_drops_six_db() {
        let layout = FrameLayout::new(16_000, 0.0427, 0.01);
        let loud = intensity_contour(&sine(0.4, 8_000), &layout);
        let soft = intensity_contour(&sine(0.2, 8_000), &layout);
        assert_eq!(loud.len(), soft.len());
        for (l, s) in loud.iter().zip(&soft) {
            assert_abs_diff_eq!(l - s, 20.0 * 2.0_f64.log10(), epsilon = 1e-6);
        }
    }

    #[test]
    fn amplitude_threshold_matches_intensity_scale() {
        assert_abs_diff_eq!(amplitude_at(0.0), 2.0e-5, epsilon = 1e-12);
        // A full-scale DC-free square wave of amplitude a has power a^2.
        let db = 10.0 * (0.01 / REFERENCE_POWER).log10();
        assert_abs_diff_eq!(amplitude_at(db), 0.1, epsilon = 1e-9);
    }

    #[test]
    fn short_clip_produces_single_frame() {
        let layout = FrameLayout::new(16_000, 0.0427, 0.01);
        let contour = intensity_contour(&sine(0.3, 200), &layout);
        assert_eq!(contour.len(), 1);
        assert!(contour[0] > 60.0);
    }
}
