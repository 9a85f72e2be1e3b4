//! Serialized shape of a comparison result, the contract consumed by the UI layer.

use serde::{Deserialize, Serialize};

use super::{Category, ComparisonResult, ErrorKind, PronunciationError, SubScore};

/// Coarse classification of an overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ScoreBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            ScoreBand::Excellent
        } else if score >= 60.0 {
            ScoreBand::Good
        } else if score >= 40.0 {
            ScoreBand::Fair
        } else {
            ScoreBand::Poor
        }
    }

    pub fn summary(self) -> &'static str {
        match self {
            ScoreBand::Excellent => {
                "Excellent! Your pronunciation is very close to the reference."
            }
            ScoreBand::Good => "Good job! Your pronunciation is quite similar. Keep practicing.",
            ScoreBand::Fair => "Not bad! Listen to the reference again and keep practicing.",
            ScoreBand::Poor => "Keep trying! Listen carefully to the reference and try again.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScoreMap {
    pub pitch: f64,
    pub formant: f64,
    pub intensity: f64,
    pub duration: f64,
    pub voice_quality: f64,
}

impl SubScoreMap {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Pitch => self.pitch,
            Category::Formant => self.formant,
            Category::Intensity => self.intensity,
            Category::Duration => self.duration,
            Category::VoiceQuality => self.voice_quality,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub overall_score: f64,
    pub sub_scores: SubScoreMap,
    pub feedback: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band: Option<ScoreBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl From<ComparisonResult> for ComparisonReport {
    fn from(result: ComparisonResult) -> Self {
        let band = ScoreBand::from_score(result.overall_score());
        Self {
            overall_score: result.overall_score(),
            sub_scores: SubScoreMap {
                pitch: result.score(Category::Pitch),
                formant: result.score(Category::Formant),
                intensity: result.score(Category::Intensity),
                duration: result.score(Category::Duration),
                voice_quality: result.score(Category::VoiceQuality),
            },
            feedback: result.feedback,
            strengths: result.strengths,
            band: Some(band),
            summary: Some(band.summary().to_string()),
        }
    }
}

impl TryFrom<ComparisonReport> for ComparisonResult {
    type Error = PronunciationError;

    /// Scores outside [0, 100] are rejected rather than clamped.
    fn try_from(report: ComparisonReport) -> Result<Self, Self::Error> {
        ensure_in_range("overall", report.overall_score)?;
        for category in Category::ALL {
            ensure_in_range(category.as_str(), report.sub_scores.get(category))?;
        }
        let scores = Category::ALL
            .iter()
            .map(|&category| SubScore::new(category, report.sub_scores.get(category), 0.0));
        Ok(
            ComparisonResult::from_parts(report.overall_score, scores, report.feedback)?
                .with_strengths(report.strengths),
        )
    }
}

fn ensure_in_range(label: &str, score: f64) -> Result<(), PronunciationError> {
    if (0.0..=100.0).contains(&score) {
        Ok(())
    } else {
        Err(PronunciationError::new(
            ErrorKind::InvalidReport,
            format!("{label} score {score} lies outside [0, 100]"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_result() -> ComparisonResult {
        let scores = [
            SubScore::new(Category::Pitch, 62.5, 4.7),
            SubScore::new(Category::Formant, 90.0, 30.0),
            SubScore::new(Category::Intensity, 88.0, 1.0),
            SubScore::new(Category::Duration, 100.0, 0.05),
            SubScore::new(Category::VoiceQuality, 75.0, 3.0),
        ];
        ComparisonResult::from_parts(84.35, scores, vec!["Pitch too low overall".to_string()])
            .unwrap()
            .with_strengths(vec!["Good timing and pace".to_string()])
    }

    #[test]
    fn serializes_stable_contract_shape() {
        let value = serde_json::to_value(sample_result()).unwrap();
        assert_eq!(value["overall_score"], json!(84.35));
        assert_eq!(value["sub_scores"]["pitch"], json!(62.5));
        assert_eq!(value["sub_scores"]["voice_quality"], json!(75.0));
        assert_eq!(value["feedback"], json!(["Pitch too low overall"]));
        assert_eq!(value["strengths"], json!(["Good timing and pace"]));
        assert_eq!(value["band"], json!("excellent"));
        assert!(value.get("features").is_none());
    }

    #[test]
    fn deserializes_without_derived_fields() {
        let raw = json!({
            "overall_score": 55.0,
            "sub_scores": {
                "pitch": 40, "formant": 60, "intensity": 70, "duration": 50, "voice_quality": 45
            },
            "feedback": []
        });
        let result: ComparisonResult = serde_json::from_value(raw).unwrap();
        assert_eq!(result.overall_score(), 55.0);
        assert_eq!(result.score(Category::Duration), 50.0);
        assert!(result.strengths().is_empty());
        assert!(result.features().is_none());
    }

    #[test]
    fn strengths_survive_a_round_trip() {
        let json = serde_json::to_string(&sample_result()).unwrap();
        let parsed: ComparisonResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.strengths(), ["Good timing and pace"]);
    }

    #[test]
    fn out_of_range_scores_are_rejected() {
        let report = ComparisonReport::from(sample_result());
        let mut inflated = report.clone();
        inflated.sub_scores.formant = 150.0;
        let err = ComparisonResult::try_from(inflated).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidReport);
        assert!(err.message().contains("formant score 150"), "{}", err.message());

        let mut negative = report;
        negative.overall_score = -1.0;
        assert_eq!(
            ComparisonResult::try_from(negative).unwrap_err().kind(),
            ErrorKind::InvalidReport
        );

        let raw = json!({
            "overall_score": 55.0,
            "sub_scores": {
                "pitch": 40, "formant": 600, "intensity": 70, "duration": 50, "voice_quality": 45
            },
            "feedback": []
        });
        assert!(serde_json::from_value::<ComparisonResult>(raw).is_err());
    }

    #[test]
    fn bands_follow_score_thresholds() {
        assert_eq!(ScoreBand::from_score(80.0), ScoreBand::Excellent);
        assert_eq!(ScoreBand::from_score(79.9), ScoreBand::Good);
        assert_eq!(ScoreBand::from_score(40.0), ScoreBand::Fair);
        assert_eq!(ScoreBand::from_score(12.0), ScoreBand::Poor);
    }
}
