use std::sync::Arc;

use tracing::debug;

use crate::config::{PitchNormalization, ScoringConfig};
use crate::pronunciation::alignment::SequenceAligner;
use crate::pronunciation::features::statistics;
use crate::pronunciation::{
    clamp_score, Category, ComparedFeatures, ComparisonResult, ErrorKind, FeatureSet,
    PronunciationError, Result, SubScore,
};

/// Semitone contours are measured against this fixed frequency in absolute mode.
const SEMITONE_REFERENCE_HZ: f64 = 100.0;
const INTENSITY_MEAN_SHARE: f64 = 0.4;
const INTENSITY_RANGE_SHARE: f64 = 0.2;
const INTENSITY_CONTOUR_SHARE: f64 = 0.4;
/// Points lost per HNR tolerance step.
const HNR_PENALTY: f64 = 25.0;
/// Points lost per threshold of jitter/shimmer excess.
const PERTURBATION_PENALTY: f64 = 50.0;

/// Scores an attempt's features against a reference.
#[derive(Debug, Clone)]
pub struct FeatureComparator {
    config: ScoringConfig,
    aligner: SequenceAligner,
}

impl FeatureComparator {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            aligner: SequenceAligner::new(),
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Five sub-scores and their weighted total; feedback is left empty.
    pub fn compare(
        &self,
        reference: Arc<FeatureSet>,
        attempt: Arc<FeatureSet>,
    ) -> Result<ComparisonResult> {
        if let Some(defect) = reference.defect() {
            return Err(PronunciationError::new(
                ErrorKind::MissingReference,
                format!("reference features are unusable: {defect}"),
            ));
        }
        if let Some(defect) = attempt.defect() {
            return Err(PronunciationError::new(
                ErrorKind::FeatureExtractionFailure,
                format!("attempt features are unusable: {defect}"),
            ));
        }

        let scores = [
            self.pitch_score(&reference, &attempt)?,
            self.formant_score(&reference, &attempt),
            self.intensity_score(&reference, &attempt)?,
            self.duration_score(&reference, &attempt),
            self.voice_quality_score(&reference, &attempt),
        ];
        let overall = scores
            .iter()
            .map(|score| self.config.weights.get(score.category()) * score.value())
            .sum::<f64>();
        debug!(
            overall,
            pitch = scores[0].value(),
            formant = scores[1].value(),
            intensity = scores[2].value(),
            duration = scores[3].value(),
            voice_quality = scores[4].value(),
            "scored attempt"
        );
        Ok(ComparisonResult::from_parts(clamp_score(overall), scores, Vec::new())?
            .with_features(ComparedFeatures { reference, attempt }))
    }

    fn pitch_score(&self, reference: &FeatureSet, attempt: &FeatureSet) -> Result<SubScore> {
        let normalization = self.config.pitch_normalization;
        let reference_st = semitones(&reference.pitch_contour, normalization);
        let attempt_st = semitones(&attempt.pitch_contour, normalization);
        let distance = self.aligner.distance(&reference_st, &attempt_st)?;
        Ok(SubScore::new(
            Category::Pitch,
            100.0 - distance * self.config.pitch_scale,
            distance,
        ))
    }

    fn formant_score(&self, reference: &FeatureSet, attempt: &FeatureSet) -> SubScore {
        let difference = [
            (reference.f1_mean, attempt.f1_mean),
            (reference.f2_mean, attempt.f2_mean),
            (reference.f3_mean, attempt.f3_mean),
        ]
        .iter()
        .map(|(r, a)| (r - a).abs())
        .sum::<f64>()
            / 3.0;
        SubScore::new(
            Category::Formant,
            linear_falloff(difference, self.config.tolerances.formant_hz),
            difference,
        )
    }

    fn intensity_score(&self, reference: &FeatureSet, attempt: &FeatureSet) -> Result<SubScore> {
        let tolerance = self.config.tolerances.intensity_db;
        let mean_gap = (reference.intensity_mean - attempt.intensity_mean).abs();
        let range_gap = (reference.intensity_range - attempt.intensity_range).abs();
        let contour_distance = self.aligner.distance(
            &statistics::standardize(&reference.intensity_contour),
            &statistics::standardize(&attempt.intensity_contour),
        )?;
        let contour_term =
            clamp_score(100.0 - contour_distance * self.config.intensity_contour_scale);
        let value = INTENSITY_MEAN_SHARE * linear_falloff(mean_gap, tolerance)
            + INTENSITY_RANGE_SHARE * linear_falloff(range_gap, tolerance)
            + INTENSITY_CONTOUR_SHARE * contour_term;
        Ok(SubScore::new(Category::Intensity, value, mean_gap))
    }

    fn duration_score(&self, reference: &FeatureSet, attempt: &FeatureSet) -> SubScore {
        let tolerance = self.config.tolerances.duration_ratio;
        let deviation = (attempt.duration / reference.duration - 1.0).abs();
        let value = if deviation <= tolerance {
            100.0
        } else {
            100.0 * (1.0 - (deviation - tolerance) / tolerance)
        };
        SubScore::new(Category::Duration, value, deviation)
    }

    fn voice_quality_score(&self, reference: &FeatureSet, attempt: &FeatureSet) -> SubScore {
        let tolerances = &self.config.tolerances;
        let hnr_gap = (reference.hnr_mean - attempt.hnr_mean).abs();
        let hnr_term = clamp_score(100.0 - hnr_gap / tolerances.hnr_db * HNR_PENALTY);
        let jitter_term = perturbation_term(reference.jitter, attempt.jitter, tolerances.jitter);
        let shimmer_term =
            perturbation_term(reference.shimmer, attempt.shimmer, tolerances.shimmer);
        SubScore::new(
            Category::VoiceQuality,
            (hnr_term + jitter_term + shimmer_term) / 3.0,
            hnr_gap,
        )
    }
}

/// 100 at zero difference, 0 at twice the tolerance.
fn linear_falloff(difference: f64, tolerance: f64) -> f64 {
    clamp_score(100.0 * (1.0 - difference / (2.0 * tolerance)))
}

fn perturbation_term(reference: f64, attempt: f64, threshold: f64) -> f64 {
    if attempt < threshold {
        return 100.0;
    }
    let excess = attempt - reference.max(threshold);
    clamp_score(100.0 - excess / threshold * PERTURBATION_PENALTY)
}

fn semitones(contour: &[f64], normalization: PitchNormalization) -> Vec<f64> {
    let absolute: Vec<f64> = contour
        .iter()
        .map(|f| 12.0 * (f / SEMITONE_REFERENCE_HZ).log2())
        .collect();
    match normalization {
        PitchNormalization::Absolute => absolute,
        PitchNormalization::Speaker => {
            let median = statistics::median(&absolute).unwrap_or_default();
            absolute.into_iter().map(|st| st - median).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn features() -> FeatureSet {
        FeatureSet {
            pitch_contour: vec![120.0, 125.0, 130.0, 128.0, 122.0],
            pitch_mean: 125.0,
            pitch_std: 3.7,
            pitch_range: 10.0,
            f1_mean: 700.0,
            f2_mean: 1220.0,
            f3_mean: 2600.0,
            intensity_contour: vec![60.0, 66.0, 70.0, 68.0, 61.0],
            intensity_mean: 65.0,
            intensity_std: 3.9,
            intensity_range: 10.0,
            duration: 1.0,
            voiced_ratio: 0.9,
            hnr_mean: 18.0,
            jitter: 0.005,
            shimmer: 0.02,
        }
    }

    fn compare(reference: FeatureSet, attempt: FeatureSet) -> ComparisonResult {
        FeatureComparator::new(ScoringConfig::default())
            .compare(Arc::new(reference), Arc::new(attempt))
            .unwrap()
    }

    #[test]
    fn identical_features_score_perfectly() {
        let result = compare(features(), features());
        assert_abs_diff_eq!(result.overall_score(), 100.0, epsilon = 1e-9);
        for score in result.sub_scores() {
            assert_abs_diff_eq!(score.value(), 100.0, epsilon = 1e-9);
        }
        assert!(result.feedback().is_empty());
        assert!(result.features().is_some());
    }

    #[test]
    fn formant_score_falls_linearly() {
        let mut attempt = features();
        attempt.f1_mean += 150.0;
        attempt.f2_mean += 150.0;
        attempt.f3_mean += 150.0;
        let result = compare(features(), attempt);
        assert_abs_diff_eq!(result.score(Category::Formant), 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.sub_score(Category::Formant).deviation(), 150.0, epsilon = 1e-9);
    }

    #[test]
    fn duration_tolerance_band() {
        let mut attempt = features();
        attempt.duration = 1.15;
        assert_eq!(compare(features(), attempt.clone()).score(Category::Duration), 100.0);
        attempt.duration = 0.7;
        assert_abs_diff_eq!(
            compare(features(), attempt.clone()).score(Category::Duration),
            50.0,
            epsilon = 1e-9
        );
        attempt.duration = 1.5;
        assert_eq!(compare(features(), attempt).score(Category::Duration), 0.0);
    }

    #[test]
    fn octave_shift_costs_pitch_points() {
        let mut attempt = features();
        attempt.pitch_contour = attempt.pitch_contour.iter().map(|f| f * 2.0).collect();
        attempt.pitch_mean *= 2.0;
        let result = compare(features(), attempt);
        assert_abs_diff_eq!(result.sub_score(Category::Pitch).deviation(), 12.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.score(Category::Pitch), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn speaker_normalization_forgives_register() {
        let mut attempt = features();
        attempt.pitch_contour = attempt.pitch_contour.iter().map(|f| f * 2.0).collect();
        let config = ScoringConfig {
            pitch_normalization: PitchNormalization::Speaker,
            ..ScoringConfig::default()
        };
        let result = FeatureComparator::new(config)
            .compare(Arc::new(features()), Arc::new(attempt))
            .unwrap();
        assert_abs_diff_eq!(result.score(Category::Pitch), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn perturbation_only_penalised_above_threshold() {
        assert_eq!(perturbation_term(0.004, 0.009, 0.01), 100.0);
        assert_abs_diff_eq!(perturbation_term(0.004, 0.02, 0.01), 50.0, epsilon = 1e-9);
        assert_eq!(perturbation_term(0.03, 0.03, 0.01), 100.0);
    }

    #[test]
    fn unusable_reference_is_missing() {
        let mut reference = features();
        reference.pitch_contour.clear();
        let err = FeatureComparator::new(ScoringConfig::default())
            .compare(Arc::new(reference), Arc::new(features()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingReference);
    }

    #[test]
    fn unusable_attempt_fails_extraction() {
        let mut attempt = features();
        attempt.hnr_mean = f64::NAN;
        let err = FeatureComparator::new(ScoringConfig::default())
            .compare(Arc::new(features()), Arc::new(attempt))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FeatureExtractionFailure);
    }
}
