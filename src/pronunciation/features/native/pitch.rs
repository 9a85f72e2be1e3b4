use crate::config::ExtractionSettings;

use super::super::frames::FrameLayout;
use super::super::PitchFrame;

/// Frame-wise F0 by normalised autocorrelation.
pub(super) fn track_pitch(
    samples: &[f32],
    sample_rate: u32,
    settings: &ExtractionSettings,
) -> Vec<PitchFrame> {
    let layout = FrameLayout::new(
        sample_rate,
        settings.pitch_window_secs(),
        settings.time_step_secs,
    );
    let rate = sample_rate as f64;
    let min_lag = ((rate / settings.pitch_ceiling_hz).floor() as usize).max(2);
    let max_lag = ((rate / settings.pitch_floor_hz).ceil() as usize)
        .min(layout.window.saturating_sub(2));
    let global_peak = samples
        .iter()
        .fold(0.0_f64, |peak, &s| peak.max((s as f64).abs()));

    layout
        .frames(samples)
        .enumerate()
        .map(|(index, frame)| {
            let time = layout.center_secs(index);
            let unvoiced = PitchFrame {
                time,
                frequency: None,
                strength: 0.0,
            };
            if max_lag <= min_lag + 1 || global_peak == 0.0 {
                return unvoiced;
            }
            let mean = frame.iter().map(|&s| s as f64).sum::<f64>() / frame.len() as f64;
            let centered: Vec<f64> = frame.iter().map(|&s| s as f64 - mean).collect();
            let local_peak = centered.iter().fold(0.0_f64, |peak, s| peak.max(s.abs()));
            if local_peak < settings.silence_threshold * global_peak {
                return unvoiced;
            }
            let correlation = normalized_autocorrelation(&centered, min_lag - 1, max_lag + 1);
            let Some((lag, strength)) =
                pick_period(&correlation, min_lag, max_lag, settings.octave_tolerance)
            else {
                return unvoiced;
            };
            let frequency = rate / lag;
            let in_band =
                (settings.pitch_floor_hz..=settings.pitch_ceiling_hz).contains(&frequency);
            PitchFrame {
                time,
                frequency: (strength >= settings.voicing_threshold && in_band).then_some(frequency),
                strength,
            }
        })
        .collect()
}

/// `r[lag]` for `lo..=hi`, normalised by the energies of both overlapping parts.
fn normalized_autocorrelation(x: &[f64], lo: usize, hi: usize) -> Vec<f64> {
    let n = x.len();
    let mut energy = Vec::with_capacity(n + 1);
    energy.push(0.0);
    for &v in x {
        let last = energy[energy.len() - 1];
        energy.push(last + v * v);
    }
    let mut r = vec![0.0; hi + 1];
    for lag in lo..=hi.min(n.saturating_sub(1)) {
        let overlap = n - lag;
        let dot: f64 = x[..overlap].iter().zip(&x[lag..]).map(|(a, b)| a * b).sum();
        let denom = (energy[overlap] * (energy[n] - energy[lag])).sqrt();
        r[lag] = if denom > 0.0 { dot / denom } else { 0.0 };
    }
    r
}

/// Shortest-lag local maximum within `tolerance` of the best one, refined parabolically.
fn pick_period(r: &[f64], min_lag: usize, max_lag: usize, tolerance: f64) -> Option<(f64, f64)> {
    let best = r[min_lag..=max_lag]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    if best <= 0.0 {
        return None;
    }
    (min_lag..=max_lag)
        .find(|&lag| r[lag] >= r[lag - 1] && r[lag] >= r[lag + 1] && r[lag] >= best - tolerance)
        .map(|lag| refine(r, lag))
}

fn refine(r: &[f64], lag: usize) -> (f64, f64) {
    let (a, b, c) = (r[lag - 1], r[lag], r[lag + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() < 1e-12 {
        return (lag as f64, b.min(1.0));
    }
    let offset = (0.5 * (a - c) / denom).clamp(-0.5, 0.5);
    let peak = b - 0.25 * (a - c) * offset;
    (lag as f64 + offset, peak.min(1.0))
}
