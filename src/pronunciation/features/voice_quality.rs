use super::GlottalPulse;

/// Harmonics-to-noise ratio in dB from a normalised autocorrelation peak.
pub(crate) fn harmonicity_db(strength: f64) -> f64 {
    let r = strength.clamp(1e-4, 0.9999);
    10.0 * (r / (1.0 - r)).log10()
}

/// Admissible glottal periods for perturbation measures.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PeriodLimits {
    pub shortest: f64,
    pub longest: f64,
    /// Largest ratio allowed between consecutive periods.
    pub max_factor: f64,
}

impl PeriodLimits {
    pub fn for_band(floor_hz: f64, ceiling_hz: f64) -> Self {
        Self {
            shortest: 1.0 / (ceiling_hz * 1.25),
            longest: 1.25 / floor_hz,
            max_factor: 1.3,
        }
    }

    fn admits(&self, period: f64) -> bool {
        (self.shortest..=self.longest).contains(&period)
    }

    fn comparable(&self, a: f64, b: f64) -> bool {
        a.max(b) / a.min(b) <= self.max_factor
    }
}

/// Mean absolute difference of consecutive periods over the mean period.
pub(crate) fn jitter_local(segments: &[Vec<GlottalPulse>], limits: &PeriodLimits) -> f64 {
    let mut period_sum = 0.0;
    let mut period_count = 0usize;
    let mut diff_sum = 0.0;
    let mut diff_count = 0usize;
    for segment in segments {
        let periods: Vec<Option<f64>> = segment
            .windows(2)
            .map(|pair| {
                let period = pair[1].time - pair[0].time;
                limits.admits(period).then_some(period)
            })
            .collect();
        for period in periods.iter().flatten() {
            period_sum += period;
            period_count += 1;
        }
        for pair in periods.windows(2) {
            if let [Some(a), Some(b)] = pair {
                if limits.comparable(*a, *b) {
                    diff_sum += (a - b).abs();
                    diff_count += 1;
                }
            }
        }
    }
    if diff_count == 0 || period_count == 0 {
        return 0.0;
    }
    (diff_sum / diff_count as f64) / (period_sum / period_count as f64)
}

/// Mean absolute difference of consecutive pulse amplitudes over the mean amplitude.
pub(crate) fn shimmer_local(segments: &[Vec<GlottalPulse>], limits: &PeriodLimits) -> f64 {
    let mut amplitude_sum = 0.0;
    let mut amplitude_count = 0usize;
    let mut diff_sum = 0.0;
    let mut diff_count = 0usize;
    for segment in segments {
        for pair in segment.windows(2) {
            if !limits.admits(pair[1].time - pair[0].time) {
                continue;
            }
            diff_sum += (pair[1].amplitude - pair[0].amplitude).abs();
            diff_count += 1;
            amplitude_sum += pair[0].amplitude + pair[1].amplitude;
            amplitude_count += 2;
        }
    }
    if diff_count == 0 || amplitude_sum <= 0.0 {
        return 0.0;
    }
    (diff_sum / diff_count as f64) / (amplitude_sum / amplitude_count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn pulses(periods: &[f64], amplitudes: &[f64]) -> Vec<GlottalPulse> {
        let mut time = 0.0;
        let mut out = vec![GlottalPulse {
            time,
            amplitude: amplitudes[0],
        }];
        for (period, &amplitude) in periods.iter().zip(&amplitudes[1..]) {
            time += period;
            out.push(GlottalPulse { time, amplitude });
        }
        out
    }

    #[test]
    fn steady_train_has_no_perturbation() {
        let limits = PeriodLimits::for_band(75.0, 300.0);
        let train = vec![pulses(&[0.008; 20], &[0.5; 21])];
        assert_abs_diff_eq!(jitter_local(&train, &limits), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(shimmer_local(&train, &limits), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn alternating_periods_produce_jitter() {
        let limits = PeriodLimits::for_band(75.0, 300.0);
        let train = vec![pulses(&[0.008, 0.0088, 0.008, 0.0088], &[0.5; 5])];
        let jitter = jitter_local(&train, &limits);
        assert_abs_diff_eq!(jitter, 0.0008 / 0.0084, epsilon = 1e-9);
    }

    #[test]
    fn implausible_periods_are_ignored() {
        let limits = PeriodLimits::for_band(75.0, 300.0);
        let train = vec![pulses(&[0.008, 0.05, 0.008], &[0.5, 0.5, 0.1, 0.5])];
        assert_abs_diff_eq!(jitter_local(&train, &limits), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn too_few_pulses_report_zero() {
        let limits = PeriodLimits::for_band(75.0, 300.0);
        assert_eq!(jitter_local(&[], &limits), 0.0);
        assert_eq!(shimmer_local(&[vec![]], &limits), 0.0);
    }

    #[test]
    fn harmonicity_is_clamped() {
        assert_abs_diff_eq!(harmonicity_db(0.5), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(harmonicity_db(1.0), 40.0, epsilon = 1e-3);
        assert!(harmonicity_db(-0.2) < -39.0);
    }
}
