use std::f64::consts::PI;

/// Fixed-size analysis frames advanced by a constant hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameLayout {
    pub window: usize,
    pub step: usize,
    pub sample_rate: u32,
}

impl FrameLayout {
    pub fn new(sample_rate: u32, window_secs: f64, step_secs: f64) -> Self {
        let rate = sample_rate as f64;
        Self {
            window: ((window_secs * rate).round() as usize).max(1),
            step: ((step_secs * rate).round() as usize).max(1),
            sample_rate,
        }
    }

    pub fn count(&self, len: usize) -> usize {
        if len < self.window {
            0
        } else {
            (len - self.window) / self.step + 1
        }
    }

    pub fn start(&self, index: usize) -> usize {
        index * self.step
    }

    /// Frame centre in seconds.
    pub fn center_secs(&self, index: usize) -> f64 {
        (self.start(index) as f64 + self.window as f64 / 2.0) / self.sample_rate as f64
    }

    pub fn frames<'a, T>(&self, samples: &'a [T]) -> impl Iterator<Item = &'a [T]> + 'a {
        samples.windows(self.window).step_by(self.step)
    }
}

pub(crate) fn hann(len: usize) -> Vec<f64> {
    if len < 2 {
        return vec![1.0; len];
    }
    let denom = (len - 1) as f64;
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos())
        .collect()
}

pub(crate) fn hamming(len: usize) -> Vec<f64> {
    if len < 2 {
        return vec![1.0; len];
    }
    let denom = (len - 1) as f64;
    (0..len)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / denom).cos())
        .collect()
}
