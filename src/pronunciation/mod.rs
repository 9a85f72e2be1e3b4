pub mod alignment;
pub mod cli;
pub mod features;
pub mod feedback;
pub mod metrics;
pub mod orchestrator;
pub mod report;
pub mod sources;
pub mod trend;

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use features::FeatureSet;
pub use orchestrator::{analyze_trend, analyze_trend_with, compare, ComparisonOrchestrator};
pub use report::{ComparisonReport, ScoreBand};
pub use trend::{AttemptRecord, TrendDirection, TrendReport};

/// Convenient alias for results returned by pronunciation modules.
pub type Result<T> = std::result::Result<T, PronunciationError>;

/// Failure categories surfaced to callers; each one maps to a distinct retry/skip path in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AudioTooShort,
    AudioTooLong,
    SilentAudio,
    FeatureExtractionFailure,
    EmptySequence,
    MissingReference,
    InsufficientHistory,
    InvalidSignal,
    InvalidConfig,
    InvalidReport,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::AudioTooShort => "audio_too_short",
            ErrorKind::AudioTooLong => "audio_too_long",
            ErrorKind::SilentAudio => "silent_audio",
            ErrorKind::FeatureExtractionFailure => "feature_extraction_failure",
            ErrorKind::EmptySequence => "empty_sequence",
            ErrorKind::MissingReference => "missing_reference",
            ErrorKind::InsufficientHistory => "insufficient_history",
            ErrorKind::InvalidSignal => "invalid_signal",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::InvalidReport => "invalid_report",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed error for the comparison engine.
#[derive(Debug, Clone)]
pub struct PronunciationError {
    kind: ErrorKind,
    message: Arc<str>,
}

impl PronunciationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Arc::from(message.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for PronunciationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl Error for PronunciationError {}

/// Scored feature family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Pitch,
    Formant,
    Intensity,
    Duration,
    VoiceQuality,
}

impl Category {
    /// Canonical ordering used for sub-scores, reports and rule tables.
    pub const ALL: [Category; 5] = [
        Category::Pitch,
        Category::Formant,
        Category::Intensity,
        Category::Duration,
        Category::VoiceQuality,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Pitch => "pitch",
            Category::Formant => "formant",
            Category::Intensity => "intensity",
            Category::Duration => "duration",
            Category::VoiceQuality => "voice_quality",
        }
    }

    fn position(self) -> usize {
        match self {
            Category::Pitch => 0,
            Category::Formant => 1,
            Category::Intensity => 2,
            Category::Duration => 3,
            Category::VoiceQuality => 4,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp a score into [0, 100]; NaN collapses to the lower bound.
pub(crate) fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubScore {
    category: Category,
    value: f64,
    deviation: f64,
}

impl SubScore {
    pub fn new(category: Category, value: f64, deviation: f64) -> Self {
        Self {
            category,
            value: clamp_score(value),
            deviation,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Score in [0, 100].
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Raw deviation metric the score was derived from (units depend on the category).
    pub fn deviation(&self) -> f64 {
        self.deviation
    }
}

/// The feature sets a result was computed from.
#[derive(Debug, Clone)]
pub struct ComparedFeatures {
    pub reference: Arc<FeatureSet>,
    pub attempt: Arc<FeatureSet>,
}

/// Outcome of one reference/attempt comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "ComparisonReport", try_from = "ComparisonReport")]
pub struct ComparisonResult {
    overall_score: f64,
    sub_scores: Vec<SubScore>,
    feedback: Vec<String>,
    strengths: Vec<String>,
    features: Option<ComparedFeatures>,
}

impl ComparisonResult {
    /// Assemble a result from per-category scores; exactly one score per category is required.
    pub fn from_parts(
        overall_score: f64,
        sub_scores: impl IntoIterator<Item = SubScore>,
        feedback: Vec<String>,
    ) -> Result<Self> {
        let mut slots: [Option<SubScore>; 5] = [None; 5];
        for score in sub_scores {
            let slot = &mut slots[score.category.position()];
            if slot.is_some() {
                return Err(PronunciationError::new(
                    ErrorKind::InvalidReport,
                    format!("duplicate {} sub-score", score.category),
                ));
            }
            *slot = Some(score);
        }
        let mut ordered = Vec::with_capacity(slots.len());
        for (slot, category) in slots.into_iter().zip(Category::ALL) {
            let score = slot.ok_or_else(|| {
                PronunciationError::new(
                    ErrorKind::InvalidReport,
                    format!("missing {category} sub-score"),
                )
            })?;
            ordered.push(score);
        }
        Ok(Self {
            overall_score: clamp_score(overall_score),
            sub_scores: ordered,
            feedback,
            strengths: Vec::new(),
            features: None,
        })
    }

    pub(crate) fn with_features(mut self, features: ComparedFeatures) -> Self {
        self.features = Some(features);
        self
    }

    /// Same result with the given feedback lines attached.
    pub fn with_feedback(mut self, feedback: Vec<String>) -> Self {
        self.feedback = feedback;
        self
    }

    /// Same result with the given praise lines attached.
    pub fn with_strengths(mut self, strengths: Vec<String>) -> Self {
        self.strengths = strengths;
        self
    }

    pub fn overall_score(&self) -> f64 {
        self.overall_score
    }

    /// Sub-scores in `Category::ALL` order.
    pub fn sub_scores(&self) -> &[SubScore] {
        &self.sub_scores
    }

    pub fn sub_score(&self, category: Category) -> &SubScore {
        &self.sub_scores[category.position()]
    }

    pub fn score(&self, category: Category) -> f64 {
        self.sub_score(category).value()
    }

    pub fn feedback(&self) -> &[String] {
        &self.feedback
    }

    /// Categories the attempt did well on, in category order.
    pub fn strengths(&self) -> &[String] {
        &self.strengths
    }

    pub fn features(&self) -> Option<&ComparedFeatures> {
        self.features.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_scores(value: f64) -> Vec<SubScore> {
        Category::ALL
            .iter()
            .map(|&category| SubScore::new(category, value, 0.0))
            .collect()
    }

    #[test]
    fn sub_scores_are_clamped() {
        assert_eq!(SubScore::new(Category::Pitch, 140.0, 0.0).value(), 100.0);
        assert_eq!(SubScore::new(Category::Pitch, -3.0, 0.0).value(), 0.0);
        assert_eq!(SubScore::new(Category::Pitch, f64::NAN, 0.0).value(), 0.0);
    }

    #[test]
    fn from_parts_orders_scores_by_category() {
        let mut scores = full_scores(50.0);
        scores.reverse();
        let result = ComparisonResult::from_parts(50.0, scores, Vec::new()).unwrap();
        let categories: Vec<Category> = result.sub_scores().iter().map(|s| s.category()).collect();
        assert_eq!(categories, Category::ALL.to_vec());
    }

    #[test]
    fn from_parts_requires_every_category() {
        let mut scores = full_scores(50.0);
        scores.pop();
        let err = ComparisonResult::from_parts(50.0, scores, Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidReport);
        assert!(err.message().contains("voice_quality"), "{}", err.message());
    }

    #[test]
    fn from_parts_rejects_duplicate_categories() {
        let mut scores = full_scores(50.0);
        scores.push(SubScore::new(Category::Formant, 90.0, 0.0));
        let err = ComparisonResult::from_parts(50.0, scores, Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidReport);
        assert!(err.message().contains("duplicate formant"), "{}", err.message());
    }

    #[test]
    fn error_display_includes_kind() {
        let err = PronunciationError::new(ErrorKind::SilentAudio, "attempt is silent");
        assert_eq!(err.to_string(), "silent_audio: attempt is silent");
    }
}
