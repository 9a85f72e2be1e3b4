//! Scoring configuration: weights, tolerances, extraction parameters and presets.
//!
//! A `ScoringConfig` is an immutable value handed to the engine at
//! construction. Several configurations (per-difficulty calibrations, say) can
//! live side by side in one process.

use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::pronunciation::{Category, ErrorKind, PronunciationError, Result};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Category weights for the overall score. Always sums to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWeights", into = "RawWeights")]
pub struct CategoryWeights {
    pitch: f64,
    formant: f64,
    intensity: f64,
    duration: f64,
    voice_quality: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawWeights {
    pitch: f64,
    formant: f64,
    intensity: f64,
    duration: f64,
    voice_quality: f64,
}

impl CategoryWeights {
    pub fn new(
        pitch: f64,
        formant: f64,
        intensity: f64,
        duration: f64,
        voice_quality: f64,
    ) -> Result<Self> {
        let weights = Self {
            pitch,
            formant,
            intensity,
            duration,
            voice_quality,
        };
        for category in Category::ALL {
            let weight = weights.get(category);
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid(format!(
                    "{category} weight must be a non-negative number, got {weight}"
                )));
            }
        }
        let sum = weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(invalid(format!(
                "category weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(weights)
    }

    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Pitch => self.pitch,
            Category::Formant => self.formant,
            Category::Intensity => self.intensity,
            Category::Duration => self.duration,
            Category::VoiceQuality => self.voice_quality,
        }
    }

    pub fn sum(&self) -> f64 {
        Category::ALL.iter().map(|&c| self.get(c)).sum()
    }
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            pitch: 0.20,
            formant: 0.35,
            intensity: 0.15,
            duration: 0.15,
            voice_quality: 0.15,
        }
    }
}

impl TryFrom<RawWeights> for CategoryWeights {
    type Error = PronunciationError;

    fn try_from(raw: RawWeights) -> Result<Self> {
        CategoryWeights::new(
            raw.pitch,
            raw.formant,
            raw.intensity,
            raw.duration,
            raw.voice_quality,
        )
    }
}

impl From<CategoryWeights> for RawWeights {
    fn from(weights: CategoryWeights) -> Self {
        Self {
            pitch: weights.pitch,
            formant: weights.formant,
            intensity: weights.intensity,
            duration: weights.duration,
            voice_quality: weights.voice_quality,
        }
    }
}

/// How pitch contours are normalised before alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitchNormalization {
    /// Semitones on an absolute scale; register differences are penalised.
    Absolute,
    /// Semitones relative to each contour's median; only the melody shape counts.
    Speaker,
}

/// Parameters of the acoustic analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Rate every signal is resampled to before analysis.
    pub analysis_rate: u32,
    pub pitch_floor_hz: f64,
    pub pitch_ceiling_hz: f64,
    pub time_step_secs: f64,
    pub voicing_threshold: f64,
    pub silence_threshold: f64,
    pub octave_tolerance: f64,
    pub max_formant_hz: f64,
    pub formant_count: usize,
    pub formant_window_secs: f64,
    pub pre_emphasis_from_hz: f64,
    pub min_duration_secs: f64,
    /// Longer clips are rejected before any analysis runs.
    pub max_duration_secs: f64,
    pub noise_floor_db: f64,
    /// Leading/trailing audio this far below the loudest frame is trimmed.
    /// `None` disables trimming.
    pub trim_top_db: Option<f64>,
    pub timeout_ms: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            analysis_rate: 16_000,
            pitch_floor_hz: 75.0,
            pitch_ceiling_hz: 300.0,
            time_step_secs: 0.01,
            voicing_threshold: 0.45,
            silence_threshold: 0.03,
            octave_tolerance: 0.05,
            max_formant_hz: 5_500.0,
            formant_count: 5,
            formant_window_secs: 0.025,
            pre_emphasis_from_hz: 50.0,
            min_duration_secs: 0.1,
            max_duration_secs: 5.0,
            noise_floor_db: 35.0,
            trim_top_db: Some(40.0),
            timeout_ms: 30_000,
        }
    }
}

impl ExtractionSettings {
    /// Window long enough to hold three periods of the lowest admissible pitch.
    pub fn pitch_window_secs(&self) -> f64 {
        3.0 / self.pitch_floor_hz
    }

    pub fn intensity_window_secs(&self) -> f64 {
        3.2 / self.pitch_floor_hz
    }

    fn validate(&self) -> Result<()> {
        ensure_config(self.analysis_rate > 0, "analysis_rate must be positive")?;
        ensure_positive(self.pitch_floor_hz, "pitch_floor_hz")?;
        ensure_config(
            self.pitch_ceiling_hz > self.pitch_floor_hz,
            "pitch_ceiling_hz must exceed pitch_floor_hz",
        )?;
        ensure_config(
            self.pitch_ceiling_hz < self.analysis_rate as f64 / 2.0,
            "pitch_ceiling_hz must stay below the analysis Nyquist frequency",
        )?;
        ensure_positive(self.time_step_secs, "time_step_secs")?;
        ensure_unit(self.voicing_threshold, "voicing_threshold")?;
        ensure_unit(self.silence_threshold, "silence_threshold")?;
        ensure_unit(self.octave_tolerance, "octave_tolerance")?;
        ensure_positive(self.max_formant_hz, "max_formant_hz")?;
        ensure_config(
            self.formant_count >= 3,
            "formant_count must be at least 3 to resolve F1-F3",
        )?;
        ensure_positive(self.formant_window_secs, "formant_window_secs")?;
        ensure_config(
            self.pre_emphasis_from_hz >= 0.0,
            "pre_emphasis_from_hz must not be negative",
        )?;
        ensure_config(
            self.min_duration_secs >= self.pitch_window_secs(),
            "min_duration_secs must cover at least one pitch analysis window",
        )?;
        ensure_config(
            self.max_duration_secs.is_finite() && self.max_duration_secs > self.min_duration_secs,
            "max_duration_secs must exceed min_duration_secs",
        )?;
        ensure_config(self.noise_floor_db.is_finite(), "noise_floor_db must be finite")?;
        if let Some(top_db) = self.trim_top_db {
            ensure_positive(top_db, "trim_top_db")?;
        }
        ensure_config(self.timeout_ms > 0, "timeout_ms must be positive")
    }
}

/// Tolerance bands used by the comparator and the feedback rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    pub formant_hz: f64,
    pub intensity_db: f64,
    pub duration_ratio: f64,
    pub hnr_db: f64,
    pub jitter: f64,
    pub shimmer: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            formant_hz: 150.0,
            intensity_db: 3.0,
            duration_ratio: 0.2,
            hnr_db: 5.0,
            jitter: 0.01,
            shimmer: 0.0381,
        }
    }
}

impl Tolerances {
    fn validate(&self) -> Result<()> {
        ensure_positive(self.formant_hz, "formant_hz tolerance")?;
        ensure_positive(self.intensity_db, "intensity_db tolerance")?;
        ensure_positive(self.duration_ratio, "duration_ratio tolerance")?;
        ensure_positive(self.hnr_db, "hnr_db tolerance")?;
        ensure_positive(self.jitter, "jitter threshold")?;
        ensure_positive(self.shimmer, "shimmer threshold")
    }
}

/// Thresholds of the diagnostic rule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackSettings {
    /// Rules of a category only fire while its score is below this gate.
    pub score_gate: f64,
    pub max_messages: usize,
    pub pitch_mean_ratio: f64,
    pub flat_range_ratio: f64,
    pub wide_range_ratio: f64,
    pub min_pitch_range_hz: f64,
    pub f1_shift_hz: f64,
    pub f2_shift_hz: f64,
    pub generic_vowel_score: f64,
    pub generic_intonation_score: f64,
    pub loudness_db: f64,
    pub flat_stress_ratio: f64,
    pub wide_stress_ratio: f64,
    pub breathy_hnr_db: f64,
    pub unsteady_jitter: f64,
    pub unsteady_shimmer: f64,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            score_gate: 80.0,
            max_messages: 3,
            pitch_mean_ratio: 0.3,
            flat_range_ratio: 0.5,
            wide_range_ratio: 1.5,
            min_pitch_range_hz: 10.0,
            f1_shift_hz: 150.0,
            f2_shift_hz: 200.0,
            generic_vowel_score: 50.0,
            generic_intonation_score: 50.0,
            loudness_db: 5.0,
            flat_stress_ratio: 0.6,
            wide_stress_ratio: 1.4,
            breathy_hnr_db: 10.0,
            unsteady_jitter: 0.02,
            unsteady_shimmer: 0.05,
        }
    }
}

impl FeedbackSettings {
    fn validate(&self) -> Result<()> {
        ensure_config(
            (0.0..=100.0).contains(&self.score_gate),
            "score_gate must lie in [0, 100]",
        )?;
        ensure_config(self.max_messages > 0, "max_messages must be positive")?;
        ensure_positive(self.pitch_mean_ratio, "pitch_mean_ratio")?;
        ensure_positive(self.f1_shift_hz, "f1_shift_hz")?;
        ensure_positive(self.f2_shift_hz, "f2_shift_hz")?;
        ensure_positive(self.loudness_db, "loudness_db")
    }
}

/// Classification thresholds for attempt-to-attempt score changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendSettings {
    pub improvement_delta: f64,
    pub decline_delta: f64,
    /// A category counts as a decline reason when it drops by more than this.
    pub category_decline_delta: f64,
}

impl Default for TrendSettings {
    fn default() -> Self {
        Self {
            improvement_delta: 3.0,
            decline_delta: 3.0,
            category_decline_delta: 5.0,
        }
    }
}

impl TrendSettings {
    fn validate(&self) -> Result<()> {
        ensure_positive(self.improvement_delta, "improvement_delta")?;
        ensure_positive(self.decline_delta, "decline_delta")?;
        ensure_positive(self.category_decline_delta, "category_decline_delta")
    }
}

/// Immutable configuration injected into the comparison engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: CategoryWeights,
    pub tolerances: Tolerances,
    pub pitch_normalization: PitchNormalization,
    /// Score points lost per semitone of DTW pitch distance.
    pub pitch_scale: f64,
    /// Score points lost per unit of DTW distance between z-scored intensity contours.
    pub intensity_contour_scale: f64,
    pub extraction: ExtractionSettings,
    pub feedback: FeedbackSettings,
    pub trend: TrendSettings,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: CategoryWeights::default(),
            tolerances: Tolerances::default(),
            pitch_normalization: PitchNormalization::Absolute,
            pitch_scale: 8.0,
            intensity_contour_scale: 25.0,
            extraction: ExtractionSettings::default(),
            feedback: FeedbackSettings::default(),
            trend: TrendSettings::default(),
        }
    }
}

impl ScoringConfig {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        let base = Self::default();
        match difficulty {
            Difficulty::Standard => base,
            Difficulty::Beginner => Self {
                tolerances: Tolerances {
                    formant_hz: 200.0,
                    intensity_db: 4.5,
                    duration_ratio: 0.3,
                    ..base.tolerances.clone()
                },
                pitch_normalization: PitchNormalization::Speaker,
                pitch_scale: 6.0,
                extraction: ExtractionSettings {
                    max_duration_secs: 8.0,
                    ..base.extraction.clone()
                },
                ..base
            },
            Difficulty::Strict => Self {
                tolerances: Tolerances {
                    formant_hz: 100.0,
                    intensity_db: 2.0,
                    duration_ratio: 0.1,
                    ..base.tolerances.clone()
                },
                pitch_scale: 12.0,
                ..base
            },
        }
    }

    /// Check every numeric invariant the engine relies on.
    pub fn validate(&self) -> Result<()> {
        let sum = self.weights.sum();
        ensure_config(
            (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE,
            "category weights must sum to 1.0",
        )?;
        ensure_positive(self.pitch_scale, "pitch_scale")?;
        ensure_positive(self.intensity_contour_scale, "intensity_contour_scale")?;
        self.tolerances.validate()?;
        self.extraction.validate()?;
        self.feedback.validate()?;
        self.trend.validate()
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let config: ScoringConfig =
            serde_json::from_str(raw).context("failed to parse scoring config JSON")?;
        config
            .validate()
            .context("scoring config failed validation")?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scoring config at {:?}", path))?;
        Self::from_json_str(&raw).with_context(|| format!("invalid scoring config {:?}", path))
    }
}

/// Calibration presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    #[default]
    Standard,
    Strict,
}

impl FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "standard" => Ok(Difficulty::Standard),
            "strict" => Ok(Difficulty::Strict),
            other => Err(anyhow!(
                "unknown difficulty '{other}' (expected beginner, standard or strict)"
            )),
        }
    }
}

fn invalid(message: impl Into<String>) -> PronunciationError {
    PronunciationError::new(ErrorKind::InvalidConfig, message)
}

fn ensure_config(condition: bool, message: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(invalid(message))
    }
}

fn ensure_positive(value: f64, label: &str) -> Result<()> {
    ensure_config(
        value.is_finite() && value > 0.0,
        &format!("{label} must be a positive number"),
    )
}

fn ensure_unit(value: f64, label: &str) -> Result<()> {
    ensure_config(
        (0.0..=1.0).contains(&value),
        &format!("{label} must lie in [0, 1]"),
    )
}
