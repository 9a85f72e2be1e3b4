mod frames;
mod intensity;
pub mod native;
pub(crate) mod statistics;
mod voice_quality;

use std::fmt::Debug;
use std::sync::Arc;

use tracing::debug;

use crate::audio::resample;
use crate::config::ExtractionSettings;
use crate::pronunciation::{ErrorKind, PronunciationError, Result};
use crate::types::AudioSignal;

use frames::FrameLayout;
pub use native::NativeAnalysisProvider;
use voice_quality::PeriodLimits;

/// Acoustic-phonetic description of one utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    /// F0 in Hz, one value per voiced analysis frame.
    pub pitch_contour: Vec<f64>,
    pub pitch_mean: f64,
    pub pitch_std: f64,
    pub pitch_range: f64,
    pub f1_mean: f64,
    pub f2_mean: f64,
    pub f3_mean: f64,
    /// Intensity in dB (re 2e-5) per analysis frame.
    pub intensity_contour: Vec<f64>,
    pub intensity_mean: f64,
    pub intensity_std: f64,
    pub intensity_range: f64,
    /// Seconds.
    pub duration: f64,
    pub voiced_ratio: f64,
    pub hnr_mean: f64,
    pub jitter: f64,
    pub shimmer: f64,
}

impl FeatureSet {
    /// Describe the first structural problem that makes this set unusable for scoring.
    pub fn defect(&self) -> Option<String> {
        if self.pitch_contour.is_empty() {
            return Some("pitch contour is empty".to_string());
        }
        if self.intensity_contour.is_empty() {
            return Some("intensity contour is empty".to_string());
        }
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Some(format!("duration {} is not positive", self.duration));
        }
        let scalars = [
            ("pitch_mean", self.pitch_mean),
            ("pitch_std", self.pitch_std),
            ("pitch_range", self.pitch_range),
            ("f1_mean", self.f1_mean),
            ("f2_mean", self.f2_mean),
            ("f3_mean", self.f3_mean),
            ("intensity_mean", self.intensity_mean),
            ("intensity_std", self.intensity_std),
            ("intensity_range", self.intensity_range),
            ("voiced_ratio", self.voiced_ratio),
            ("hnr_mean", self.hnr_mean),
            ("jitter", self.jitter),
            ("shimmer", self.shimmer),
        ];
        if let Some((name, value)) = scalars.iter().find(|(_, value)| !value.is_finite()) {
            return Some(format!("{name} is not finite ({value})"));
        }
        if self.pitch_mean <= 0.0 {
            return Some("pitch_mean must be positive".to_string());
        }
        let contours_finite = self
            .pitch_contour
            .iter()
            .chain(self.intensity_contour.iter())
            .all(|v| v.is_finite());
        if !contours_finite {
            return Some("contour contains non-finite values".to_string());
        }
        None
    }
}

/// One pitch analysis frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchFrame {
    /// Frame centre in seconds.
    pub time: f64,
    /// `None` for unvoiced frames.
    pub frequency: Option<f64>,
    /// Normalised autocorrelation peak in [0, 1].
    pub strength: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormantFrame {
    pub time: f64,
    /// Resonance frequencies in ascending order (at most the configured formant count).
    pub frequencies: Vec<f64>,
}

/// Glottal closure estimate used for jitter and shimmer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlottalPulse {
    pub time: f64,
    pub amplitude: f64,
}

/// Raw tracks produced by an analysis backend.
#[derive(Debug, Clone, Default)]
pub struct AcousticAnalysis {
    pub pitch: Vec<PitchFrame>,
    pub formants: Vec<FormantFrame>,
    /// Pulse runs, one per continuous voiced stretch.
    pub pulses: Vec<Vec<GlottalPulse>>,
}

/// DSP backend boundary; scoring never depends on how these tracks are computed.
pub trait AcousticAnalysisProvider: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn analyze(&self, signal: &AudioSignal, settings: &ExtractionSettings)
        -> Result<AcousticAnalysis>;
}

/// Turns an `AudioSignal` into a `FeatureSet`.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    provider: Arc<dyn AcousticAnalysisProvider>,
    settings: ExtractionSettings,
}

impl FeatureExtractor {
    pub fn new(settings: ExtractionSettings) -> Self {
        Self::with_provider(settings, Arc::new(NativeAnalysisProvider::new()))
    }

    pub fn with_provider(
        settings: ExtractionSettings,
        provider: Arc<dyn AcousticAnalysisProvider>,
    ) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    pub fn extract(&self, signal: &AudioSignal) -> Result<FeatureSet> {
        self.ensure_long_enough(signal.duration_secs(), "input")?;
        self.ensure_short_enough(signal.duration_secs())?;
        let signal = self.to_analysis_rate(signal)?;

        let contour = self.intensity_of(&signal);
        let loudest = contour.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if loudest < self.settings.noise_floor_db {
            return Err(PronunciationError::new(
                ErrorKind::SilentAudio,
                format!(
                    "signal never rises above the {:.1} dB noise floor (peak {:.1} dB)",
                    self.settings.noise_floor_db, loudest
                ),
            ));
        }

        let (signal, contour) = self.trim_edges(signal, contour, loudest)?;
        self.ensure_long_enough(signal.duration_secs(), "trimmed")?;

        let analysis = self.provider.analyze(&signal, &self.settings)?;
        let features = reduce(&signal, contour, &analysis, &self.settings)?;
        debug!(
            provider = self.provider.name(),
            duration = features.duration,
            pitch_mean = features.pitch_mean,
            voiced_ratio = features.voiced_ratio,
            f1 = features.f1_mean,
            f2 = features.f2_mean,
            f3 = features.f3_mean,
            "extracted acoustic features"
        );
        Ok(features)
    }

    fn ensure_long_enough(&self, duration: f64, label: &str) -> Result<()> {
        if duration < self.settings.min_duration_secs {
            return Err(PronunciationError::new(
                ErrorKind::AudioTooShort,
                format!(
                    "{label} audio lasts {:.3}s, shorter than the {:.3}s analysis minimum",
                    duration, self.settings.min_duration_secs
                ),
            ));
        }
        Ok(())
    }

    fn ensure_short_enough(&self, duration: f64) -> Result<()> {
        if duration > self.settings.max_duration_secs {
            return Err(PronunciationError::new(
                ErrorKind::AudioTooLong,
                format!(
                    "input audio lasts {:.3}s, longer than the {:.3}s analysis maximum",
                    duration, self.settings.max_duration_secs
                ),
            ));
        }
        Ok(())
    }

    fn to_analysis_rate(&self, signal: &AudioSignal) -> Result<AudioSignal> {
        if signal.sample_rate() == self.settings.analysis_rate {
            return Ok(signal.clone());
        }
        let samples = resample::resample(
            signal.samples(),
            signal.sample_rate(),
            self.settings.analysis_rate,
        )
        .map_err(|err| {
            PronunciationError::new(ErrorKind::FeatureExtractionFailure, err.to_string())
        })?;
        AudioSignal::new(samples, self.settings.analysis_rate)
    }

    fn intensity_layout(&self) -> FrameLayout {
        FrameLayout::new(
            self.settings.analysis_rate,
            self.settings.intensity_window_secs(),
            self.settings.time_step_secs,
        )
    }

    fn intensity_of(&self, signal: &AudioSignal) -> Vec<f64> {
        intensity::intensity_contour(signal.samples(), &self.intensity_layout())
    }

    /// Cut leading and trailing audio far below the loudest frame.
    ///
    /// The frame contour decides whether an edge is quiet; the cut itself
    /// lands on the first (or last) sample above the threshold, so no frame of
    /// the recomputed contour straddles the removed silence.
    fn trim_edges(
        &self,
        signal: AudioSignal,
        contour: Vec<f64>,
        loudest: f64,
    ) -> Result<(AudioSignal, Vec<f64>)> {
        let Some(top_db) = self.settings.trim_top_db else {
            return Ok((signal, contour));
        };
        let threshold = loudest - top_db;
        let first = contour.iter().position(|&db| db >= threshold);
        let last = contour.iter().rposition(|&db| db >= threshold);
        let (Some(first), Some(last)) = (first, last) else {
            return Ok((signal, contour));
        };

        let layout = self.intensity_layout();
        let samples = signal.samples();
        let floor = intensity::amplitude_at(threshold);
        let total: f64 = samples.iter().map(|&s| s as f64).sum();
        let offset = total / samples.len().max(1) as f64;
        let audible = |s: &f32| (*s as f64 - offset).abs() >= floor;

        // The frame just outside a quiet edge cannot be fully voiced, so the
        // onset and offset lie within one frame of the loud run.
        let start = if first == 0 {
            0
        } else {
            let from = layout.start(first - 1);
            let to = (layout.start(first) + layout.window).min(samples.len());
            samples[from..to]
                .iter()
                .position(&audible)
                .map_or(layout.start(first), |i| from + i)
        };
        let end = if last + 1 == contour.len() {
            samples.len()
        } else {
            let from = layout.start(last);
            let to = (layout.start(last + 1) + layout.window).min(samples.len());
            samples[from..to]
                .iter()
                .rposition(&audible)
                .map_or(layout.start(last) + layout.window, |i| from + i + 1)
        };
        if start == 0 && end >= samples.len() {
            return Ok((signal, contour));
        }
        debug!(
            start_secs = start as f64 / signal.sample_rate() as f64,
            end_secs = end as f64 / signal.sample_rate() as f64,
            "trimmed quiet edges"
        );
        let trimmed = signal.slice(start, end)?;
        let contour = self.intensity_of(&trimmed);
        Ok((trimmed, contour))
    }
}

fn reduce(
    signal: &AudioSignal,
    intensity_contour: Vec<f64>,
    analysis: &AcousticAnalysis,
    settings: &ExtractionSettings,
) -> Result<FeatureSet> {
    let voiced: Vec<&PitchFrame> = analysis
        .pitch
        .iter()
        .filter(|frame| frame.frequency.is_some())
        .collect();
    if voiced.is_empty() {
        return Err(extraction_failure(
            "no voiced frames detected across the signal",
        ));
    }

    let pitch_contour: Vec<f64> = voiced.iter().filter_map(|frame| frame.frequency).collect();
    let pitch_mean = statistics::mean(&pitch_contour).unwrap_or_default();
    if !(settings.pitch_floor_hz..=settings.pitch_ceiling_hz).contains(&pitch_mean) {
        return Err(extraction_failure(format!(
            "mean pitch {pitch_mean:.1} Hz falls outside the {}-{} Hz band",
            settings.pitch_floor_hz, settings.pitch_ceiling_hz
        )));
    }
    let harmonicity: Vec<f64> = voiced
        .iter()
        .map(|frame| voice_quality::harmonicity_db(frame.strength))
        .collect();

    let [f1_mean, f2_mean, f3_mean] = formant_means(&analysis.formants, &analysis.pitch)?;

    let limits = PeriodLimits::for_band(settings.pitch_floor_hz, settings.pitch_ceiling_hz);
    let features = FeatureSet {
        pitch_mean,
        pitch_std: statistics::std_dev(&pitch_contour).unwrap_or_default(),
        pitch_range: statistics::range(&pitch_contour).unwrap_or_default(),
        f1_mean,
        f2_mean,
        f3_mean,
        intensity_mean: statistics::mean(&intensity_contour).unwrap_or_default(),
        intensity_std: statistics::std_dev(&intensity_contour).unwrap_or_default(),
        intensity_range: statistics::range(&intensity_contour).unwrap_or_default(),
        duration: signal.duration_secs(),
        voiced_ratio: voiced.len() as f64 / analysis.pitch.len() as f64,
        hnr_mean: statistics::mean(&harmonicity).unwrap_or_default(),
        jitter: voice_quality::jitter_local(&analysis.pulses, &limits),
        shimmer: voice_quality::shimmer_local(&analysis.pulses, &limits),
        pitch_contour,
        intensity_contour,
    };
    match features.defect() {
        Some(defect) => Err(extraction_failure(format!(
            "numerical instability in analysis: {defect}"
        ))),
        None => Ok(features),
    }
}

/// Mean F1-F3 over formant frames that fall on voiced pitch frames.
fn formant_means(formants: &[FormantFrame], pitch: &[PitchFrame]) -> Result<[f64; 3]> {
    let mut tracks: [Vec<f64>; 3] = Default::default();
    for frame in formants {
        if !is_voiced_at(pitch, frame.time) {
            continue;
        }
        for (track, &frequency) in tracks.iter_mut().zip(frame.frequencies.iter()) {
            track.push(frequency);
        }
    }
    let mut means = [0.0; 3];
    for (index, track) in tracks.iter().enumerate() {
        means[index] = statistics::mean(track).ok_or_else(|| {
            extraction_failure(format!("could not resolve F{} in any voiced frame", index + 1))
        })?;
    }
    Ok(means)
}

fn is_voiced_at(pitch: &[PitchFrame], time: f64) -> bool {
    let after = pitch.partition_point(|frame| frame.time < time);
    let candidates = [after.checked_sub(1), (after < pitch.len()).then_some(after)];
    candidates
        .into_iter()
        .flatten()
        .map(|index| &pitch[index])
        .min_by(|a, b| (a.time - time).abs().total_cmp(&(b.time - time).abs()))
        .is_some_and(|frame| frame.frequency.is_some())
}

fn extraction_failure(message: impl Into<String>) -> PronunciationError {
    PronunciationError::new(ErrorKind::FeatureExtractionFailure, message)
}
