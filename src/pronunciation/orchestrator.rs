use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::config::ScoringConfig;
use crate::pronunciation::features::{AcousticAnalysisProvider, FeatureExtractor};
use crate::pronunciation::feedback::FeedbackGenerator;
use crate::pronunciation::metrics::FeatureComparator;
use crate::pronunciation::sources::ReferenceAudioProvider;
use crate::pronunciation::trend::{AttemptRecord, AttemptTrendAnalyzer, TrendReport};
use crate::pronunciation::{ComparisonResult, ErrorKind, FeatureSet, PronunciationError, Result};
use crate::types::AudioSignal;

/// Runs extraction, scoring and feedback for one reference/attempt pair.
#[derive(Debug, Clone)]
pub struct ComparisonOrchestrator {
    config: ScoringConfig,
    extractor: FeatureExtractor,
    comparator: FeatureComparator,
    feedback: FeedbackGenerator,
    trend: AttemptTrendAnalyzer,
}

impl ComparisonOrchestrator {
    pub fn new(config: ScoringConfig) -> Result<Self> {
        config.validate()?;
        let extractor = FeatureExtractor::new(config.extraction.clone());
        Ok(Self::assemble(config, extractor))
    }

    /// Same pipeline with a different DSP backend.
    pub fn with_provider(
        config: ScoringConfig,
        provider: Arc<dyn AcousticAnalysisProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let extractor = FeatureExtractor::with_provider(config.extraction.clone(), provider);
        Ok(Self::assemble(config, extractor))
    }

    fn assemble(config: ScoringConfig, extractor: FeatureExtractor) -> Self {
        Self {
            comparator: FeatureComparator::new(config.clone()),
            feedback: FeedbackGenerator::new(config.clone()),
            trend: AttemptTrendAnalyzer::new(config.trend.clone()),
            extractor,
            config,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn compare(
        &self,
        reference: &AudioSignal,
        attempt: &AudioSignal,
    ) -> Result<ComparisonResult> {
        let started = Instant::now();
        let reference_features = self
            .extract_bounded(reference, "reference")
            .map_err(|err| prefixed(err, "reference audio"))?;
        let attempt_features = self
            .extract_bounded(attempt, "attempt")
            .map_err(|err| prefixed(err, "attempt audio"))?;
        let scored = self.comparator.compare(reference_features, attempt_features)?;
        let feedback = self.feedback.generate(&scored)?;
        let strengths = self.feedback.strengths(&scored);
        let result = scored.with_feedback(feedback).with_strengths(strengths);
        info!(
            overall = result.overall_score(),
            feedback = result.feedback().len(),
            strengths = result.strengths().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "comparison complete"
        );
        Ok(result)
    }

    /// Resolve the reference recording for `word`, then compare.
    pub fn compare_word(
        &self,
        references: &dyn ReferenceAudioProvider,
        word: &str,
        attempt: &AudioSignal,
    ) -> Result<ComparisonResult> {
        let reference = references.get(word)?.ok_or_else(|| {
            warn!(word, "no reference audio available");
            PronunciationError::new(
                ErrorKind::MissingReference,
                format!("no reference recording for '{word}'"),
            )
        })?;
        self.compare(&reference, attempt)
    }

    pub fn analyze_trend(&self, history: &[AttemptRecord]) -> Result<TrendReport> {
        self.trend.analyze(history)
    }

    /// Extract on a worker thread, giving up after the configured timeout.
    ///
    /// A timed-out worker is detached and finishes on its own.
    fn extract_bounded(&self, signal: &AudioSignal, role: &str) -> Result<Arc<FeatureSet>> {
        let extractor = self.extractor.clone();
        let signal = signal.clone();
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("extract-{role}"))
            .spawn(move || {
                let _ = tx.send(extractor.extract(&signal));
            })
            .map_err(|err| {
                error!(error = %err, role, "failed to spawn extraction thread");
                PronunciationError::new(ErrorKind::FeatureExtractionFailure, err.to_string())
            })?;

        let timeout_ms = self.config.extraction.timeout_ms;
        match rx.recv_timeout(Duration::from_millis(timeout_ms)) {
            Ok(outcome) => outcome.map(Arc::new),
            Err(RecvTimeoutError::Timeout) => {
                warn!(role, timeout_ms, "feature extraction timed out");
                Err(PronunciationError::new(
                    ErrorKind::FeatureExtractionFailure,
                    format!("extraction did not finish within {timeout_ms} ms"),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!(role, "extraction worker stopped without a result");
                Err(PronunciationError::new(
                    ErrorKind::FeatureExtractionFailure,
                    "extraction worker panicked",
                ))
            }
        }
    }
}

fn prefixed(err: PronunciationError, context: &str) -> PronunciationError {
    PronunciationError::new(err.kind(), format!("{context}: {}", err.message()))
}

/// One-shot comparison with an explicit configuration.
pub fn compare(
    reference: &AudioSignal,
    attempt: &AudioSignal,
    config: &ScoringConfig,
) -> Result<ComparisonResult> {
    ComparisonOrchestrator::new(config.clone())?.compare(reference, attempt)
}

/// Trend report with the default thresholds.
pub fn analyze_trend(history: &[AttemptRecord]) -> Result<TrendReport> {
    AttemptTrendAnalyzer::default().analyze(history)
}

pub fn analyze_trend_with(
    history: &[AttemptRecord],
    config: &ScoringConfig,
) -> Result<TrendReport> {
    config.validate()?;
    AttemptTrendAnalyzer::new(config.trend.clone()).analyze(history)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn rejects_invalid_config_up_front() {
        let mut config = ScoringConfig::default();
        config.pitch_scale = -1.0;
        let err = ComparisonOrchestrator::new(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn unknown_word_is_missing_reference() {
        let orchestrator = ComparisonOrchestrator::new(ScoringConfig::default()).unwrap();
        let attempt = AudioSignal::new(vec![0.1_f32; 16_000], 16_000).unwrap();
        let references: HashMap<String, AudioSignal> = HashMap::new();
        let err = orchestrator
            .compare_word(&references, "bonjour", &attempt)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingReference);
    }

    #[test]
    fn reference_errors_name_their_source() {
        let orchestrator = ComparisonOrchestrator::new(ScoringConfig::default()).unwrap();
        let short = AudioSignal::new(vec![0.1_f32; 800], 16_000).unwrap();
        let long = AudioSignal::new(vec![0.1_f32; 16_000], 16_000).unwrap();
        let err = orchestrator.compare(&short, &long).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AudioTooShort);
        assert!(err.message().starts_with("reference audio"));
    }
}
