//! Core types shared by the decoding and analysis pipeline

use std::sync::Arc;
use std::time::Duration;

use crate::pronunciation::{ErrorKind, PronunciationError, Result};

/// Decoded mono audio (f32 samples in [-1.0, 1.0]).
///
/// Samples live behind an `Arc` so the signal can be handed to worker threads
/// without copying the buffer.
#[derive(Debug, Clone)]
pub struct AudioSignal {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl AudioSignal {
    pub fn new(samples: impl Into<Arc<[f32]>>, sample_rate: u32) -> Result<Self> {
        let samples = samples.into();
        if sample_rate == 0 {
            return Err(PronunciationError::new(
                ErrorKind::InvalidSignal,
                "sample rate must be positive",
            ));
        }
        if samples.is_empty() {
            return Err(PronunciationError::new(
                ErrorKind::AudioTooShort,
                "audio signal contains no samples",
            ));
        }
        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(PronunciationError::new(
                ErrorKind::InvalidSignal,
                format!("sample {index} is not a finite value"),
            ));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs())
    }

    /// Copy of the half-open sample range `[start, end)`, clamped to the buffer.
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        let end = end.min(self.samples.len());
        let start = start.min(end);
        Self::new(self.samples[start..end].to_vec(), self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::AudioSignal;
    use crate::pronunciation::ErrorKind;

    #[test]
    fn derives_duration_from_sample_count() {
        let signal = AudioSignal::new(vec![0.0; 8_000], 16_000).unwrap();
        assert!((signal.duration_secs() - 0.5).abs() < 1e-12);
        assert_eq!(signal.duration().as_millis(), 500);
    }

    #[test]
    fn rejects_zero_sample_rate_and_empty_buffers() {
        let err = AudioSignal::new(vec![0.1; 10], 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSignal);
        let err = AudioSignal::new(Vec::<f32>::new(), 16_000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AudioTooShort);
    }

    #[test]
    fn rejects_non_finite_samples() {
        let err = AudioSignal::new(vec![0.0, f32::NAN, 0.2], 16_000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSignal);
    }

    #[test]
    fn slice_clamps_to_buffer() {
        let signal = AudioSignal::new((0..100).map(|i| i as f32 / 100.0).collect::<Vec<_>>(), 100)
            .unwrap();
        let tail = signal.slice(90, 500).unwrap();
        assert_eq!(tail.len(), 10);
        assert!((tail.samples()[0] - 0.9).abs() < 1e-6);
    }
}
