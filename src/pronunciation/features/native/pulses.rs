use super::super::{GlottalPulse, PitchFrame};

#[derive(Debug, Clone, Copy)]
struct Mark {
    /// Fractional sample index.
    position: f64,
    amplitude: f64,
}

/// Glottal pulse runs, one per stretch of consecutive voiced pitch frames.
///
/// Each pulse is the waveform maximum within 0.8..1.2 local periods of the
/// previous one.
pub(super) fn glottal_pulses(
    samples: &[f32],
    sample_rate: u32,
    pitch: &[PitchFrame],
    time_step: f64,
) -> Vec<Vec<GlottalPulse>> {
    let rate = sample_rate as f64;
    voiced_runs(pitch)
        .into_iter()
        .filter_map(|run| {
            let frames = &pitch[run.0..=run.1];
            let start_time = (frames[0].time - time_step / 2.0).max(0.0);
            let end_time = frames[frames.len() - 1].time + time_step / 2.0;
            let start = ((start_time * rate).round() as usize).min(samples.len());
            let end = ((end_time * rate).round() as usize).min(samples.len());
            let period_at = |position: f64| local_period(frames, position / rate, time_step) * rate;

            let first_end = (start + period_at(start as f64).ceil() as usize).min(end);
            let first = peak_in(samples, start, first_end)?;
            let mut marks = vec![first];
            let mut current = first;
            loop {
                let period = period_at(current.position);
                let lo = (current.position + 0.8 * period).ceil() as usize;
                let hi = (current.position + 1.2 * period).floor() as usize + 1;
                if hi > end {
                    break;
                }
                match peak_in(samples, lo, hi) {
                    Some(next) => {
                        marks.push(next);
                        current = next;
                    }
                    None => break,
                }
            }
            (marks.len() >= 2).then(|| {
                marks
                    .into_iter()
                    .map(|mark| GlottalPulse {
                        time: mark.position / rate,
                        amplitude: mark.amplitude,
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect()
}

/// Inclusive index ranges of consecutive voiced frames.
fn voiced_runs(pitch: &[PitchFrame]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut open: Option<usize> = None;
    for (index, frame) in pitch.iter().enumerate() {
        match (frame.frequency.is_some(), open) {
            (true, None) => open = Some(index),
            (false, Some(start)) => {
                runs.push((start, index - 1));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        runs.push((start, pitch.len() - 1));
    }
    runs
}

/// Local period in seconds from the nearest frame of a voiced run.
fn local_period(frames: &[PitchFrame], time: f64, time_step: f64) -> f64 {
    let offset = ((time - frames[0].time) / time_step).round();
    let index = offset.clamp(0.0, (frames.len() - 1) as f64) as usize;
    frames[index].frequency.map_or(0.01, |f| 1.0 / f)
}

fn peak_in(samples: &[f32], lo: usize, hi: usize) -> Option<Mark> {
    let hi = hi.min(samples.len());
    if lo >= hi {
        return None;
    }
    let (index, _) = samples[lo..hi]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    let index = lo + index;
    let b = samples[index] as f64;
    if index == 0 || index + 1 >= samples.len() {
        return Some(Mark {
            position: index as f64,
            amplitude: b.abs(),
        });
    }
    let (a, c) = (samples[index - 1] as f64, samples[index + 1] as f64);
    let denom = a - 2.0 * b + c;
    let offset = if denom.abs() < 1e-12 {
        0.0
    } else {
        (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
    };
    Some(Mark {
        position: index as f64 + offset,
        amplitude: (b - 0.25 * (a - c) * offset).abs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(f0: f64, count: usize) -> Vec<PitchFrame> {
        (0..count)
            .map(|i| PitchFrame {
                time: 0.02 + i as f64 * 0.01,
                frequency: Some(f0),
                strength: 0.95,
            })
            .collect()
    }

    #[test]
    fn pulses_follow_fundamental_period() {
        let rate = 16_000;
        let f0 = 125.0;
        let samples: Vec<f32> = (0..8_000)
            .map(|i| {
                (0.5 * (2.0 * std::f64::consts::PI * f0 * i as f64 / rate as f64).sin()) as f32
            })
            .collect();
        let runs = glottal_pulses(&samples, rate, &frames(f0, 40), 0.01);
        assert_eq!(runs.len(), 1);
        let pulses = &runs[0];
        assert!(pulses.len() > 30);
        for pair in pulses.windows(2) {
            let period = pair[1].time - pair[0].time;
            assert!((period - 0.008).abs() < 1e-4, "period {period}");
        }
        assert!(pulses.iter().all(|p| (p.amplitude - 0.5).abs() < 0.01));
    }

    #[test]
    fn unvoiced_frames_split_runs() {
        let mut pitch = frames(150.0, 6);
        pitch[2].frequency = None;
        pitch[3].frequency = None;
        assert_eq!(voiced_runs(&pitch), vec![(0, 1), (4, 5)]);
        assert!(voiced_runs(&[]).is_empty());
    }
}
