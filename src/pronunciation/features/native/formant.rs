use std::f64::consts::PI;

use rustfft::num_complex::Complex64;

use crate::audio::resample::resample;
use crate::config::ExtractionSettings;
use crate::pronunciation::{ErrorKind, PronunciationError, Result};

use super::super::frames::{hamming, FrameLayout};
use super::super::FormantFrame;

/// Resonances closer than this to DC or to the analysis ceiling are discarded.
const EDGE_GUARD_HZ: f64 = 50.0;
const ROOT_ITERATIONS: usize = 120;
const ROOT_TOLERANCE: f64 = 1e-10;

/// Frame-wise vocal-tract resonances from the roots of an LPC polynomial.
///
/// The signal is resampled to twice the formant ceiling so the all-pole model
/// spends its poles below that ceiling. Every complex pole pair inside the band
/// counts as a formant candidate, however broad, so a wide F1 that merges with
/// neighbouring harmonics keeps its slot.
pub(super) fn track_formants(
    samples: &[f32],
    sample_rate: u32,
    settings: &ExtractionSettings,
) -> Result<Vec<FormantFrame>> {
    let target_rate = (2.0 * settings.max_formant_hz).round() as u32;
    let resampled = resample(samples, sample_rate, target_rate).map_err(|err| {
        PronunciationError::new(
            ErrorKind::FeatureExtractionFailure,
            format!("formant resampling failed: {err}"),
        )
    })?;
    let emphasized = pre_emphasize(&resampled, target_rate, settings.pre_emphasis_from_hz);

    let layout = FrameLayout::new(
        target_rate,
        settings.formant_window_secs,
        settings.time_step_secs,
    );
    let window = hamming(layout.window);
    let order = 2 * settings.formant_count;
    let resonances = Resonances {
        sample_rate: target_rate as f64,
        ceiling_hz: settings.max_formant_hz,
        max_formants: settings.formant_count,
    };

    let frames = layout
        .frames(&emphasized[..])
        .enumerate()
        .map(|(index, frame)| {
            let windowed: Vec<f64> = frame
                .iter()
                .zip(&window)
                .map(|(&s, &w)| s as f64 * w)
                .collect();
            let frequencies = lpc_coefficients(&windowed, order)
                .map(|a| resonances.frequencies(&a))
                .unwrap_or_default();
            FormantFrame {
                time: layout.center_secs(index),
                frequencies,
            }
        })
        .collect();
    Ok(frames)
}

/// First-order high-pass `y[n] = x[n] - a*x[n-1]` with `a = exp(-2*pi*from_hz/fs)`.
fn pre_emphasize(samples: &[f32], sample_rate: u32, from_hz: f64) -> Vec<f32> {
    let alpha = (-2.0 * PI * from_hz / sample_rate as f64).exp() as f32;
    let mut previous = 0.0_f32;
    samples
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let out = if i == 0 { s } else { s - alpha * previous };
            previous = s;
            out
        })
        .collect()
}

fn lpc_coefficients(frame: &[f64], order: usize) -> Option<Vec<f64>> {
    if frame.len() <= order {
        return None;
    }
    let r: Vec<f64> = (0..=order)
        .map(|lag| {
            frame[..frame.len() - lag]
                .iter()
                .zip(&frame[lag..])
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect();
    levinson_durbin(&r, order)
}

fn levinson_durbin(r: &[f64], order: usize) -> Option<Vec<f64>> {
    if r.len() < order + 1 || r[0] <= 0.0 {
        return None;
    }
    let mut a = vec![0.0; order + 1];
    a[0] = 1.0;
    let mut error = r[0];
    for i in 1..=order {
        let acc = r[i] + (1..i).map(|j| a[j] * r[i - j]).sum::<f64>();
        let k = -acc / error;
        let previous = a.clone();
        a[i] = k;
        for j in 1..i {
            a[j] = previous[j] + k * previous[i - j];
        }
        error *= 1.0 - k * k;
        if error <= 0.0 {
            return None;
        }
    }
    Some(a)
}

struct Resonances {
    sample_rate: f64,
    ceiling_hz: f64,
    max_formants: usize,
}

impl Resonances {
    /// Pole frequencies of `1/A(z)` in the upper half plane, ascending.
    fn frequencies(&self, a: &[f64]) -> Vec<f64> {
        let mut frequencies: Vec<f64> = polynomial_roots(a)
            .into_iter()
            .filter(|z| z.im > 0.0 && z.norm() < 1.0)
            .map(|z| z.arg() * self.sample_rate / (2.0 * PI))
            .filter(|&f| f > EDGE_GUARD_HZ && f < self.ceiling_hz - EDGE_GUARD_HZ)
            .collect();
        frequencies.sort_by(|a, b| a.total_cmp(b));
        frequencies.truncate(self.max_formants);
        frequencies
    }
}

/// Durand-Kerner iteration over `z^p + a[1] z^(p-1) + ... + a[p]`.
fn polynomial_roots(a: &[f64]) -> Vec<Complex64> {
    let degree = a.len().saturating_sub(1);
    if degree == 0 || a[0].abs() < 1e-12 {
        return Vec::new();
    }
    // Rotated start so no initial guess sits on the real axis.
    let mut roots: Vec<Complex64> = (0..degree)
        .map(|k| Complex64::from_polar(0.9, 2.0 * PI * k as f64 / degree as f64 + 0.4))
        .collect();

    for _ in 0..ROOT_ITERATIONS {
        let mut converged = true;
        for i in 0..degree {
            let denom = (0..degree)
                .filter(|&j| j != i)
                .fold(Complex64::new(a[0], 0.0), |acc, j| acc * (roots[i] - roots[j]));
            let delta = if denom.norm() < 1e-12 {
                Complex64::new(1e-6, 1e-6)
            } else {
                evaluate(a, roots[i]) / denom
            };
            if delta.norm() > ROOT_TOLERANCE {
                converged = false;
            }
            roots[i] -= delta;
        }
        if converged {
            break;
        }
    }
    roots
}

fn evaluate(a: &[f64], z: Complex64) -> Complex64 {
    a[1..]
        .iter()
        .fold(Complex64::new(a[0], 0.0), |acc, &c| acc * z + c)
}
