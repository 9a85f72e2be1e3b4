//! Pure-Rust acoustic analysis: autocorrelation pitch, LPC formants and
//! waveform-matched glottal pulses.

mod formant;
mod pitch;
mod pulses;

use tracing::trace;

use crate::config::ExtractionSettings;
use crate::pronunciation::Result;
use crate::types::AudioSignal;

use super::{AcousticAnalysis, AcousticAnalysisProvider};

/// Default analysis backend, requires no external toolkit.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeAnalysisProvider;

impl NativeAnalysisProvider {
    pub fn new() -> Self {
        Self
    }
}

impl AcousticAnalysisProvider for NativeAnalysisProvider {
    fn name(&self) -> &'static str {
        "native"
    }

    fn analyze(
        &self,
        signal: &AudioSignal,
        settings: &ExtractionSettings,
    ) -> Result<AcousticAnalysis> {
        let samples = signal.samples();
        let rate = signal.sample_rate();
        let pitch = pitch::track_pitch(samples, rate, settings);
        let formants = formant::track_formants(samples, rate, settings)?;
        let pulses = pulses::glottal_pulses(samples, rate, &pitch, settings.time_step_secs);
        trace!(
            pitch_frames = pitch.len(),
            formant_frames = formants.len(),
            pulse_runs = pulses.len(),
            "native analysis complete"
        );
        Ok(AcousticAnalysis {
            pitch,
            formants,
            pulses,
        })
    }
}
