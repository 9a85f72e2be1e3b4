use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TrendSettings;
use crate::pronunciation::{Category, ComparisonResult, ErrorKind, PronunciationError, Result};

/// One scored attempt in a practice history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub index: usize,
    pub result: ComparisonResult,
    pub timestamp: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn new(index: usize, result: ComparisonResult) -> Self {
        Self::at(index, result, Utc::now())
    }

    pub fn at(index: usize, result: ComparisonResult, timestamp: DateTime<Utc>) -> Self {
        Self {
            index,
            result,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improved,
    Stable,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryDelta {
    pub category: Category,
    pub delta: f64,
}

/// Change between two consecutive attempts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptTransition {
    pub from_index: usize,
    pub to_index: usize,
    pub overall_delta: f64,
    pub category_deltas: Vec<CategoryDelta>,
    pub direction: TrendDirection,
    /// Category that fell the most, set only for declining transitions.
    pub primary_regression: Option<Category>,
    /// Every category that fell past the per-category threshold, declining transitions only.
    pub declined_categories: Vec<Category>,
    pub decline_reasons: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub transitions: Vec<AttemptTransition>,
    /// Classification of the most recent transition.
    pub direction: TrendDirection,
    pub primary_regression: Option<Category>,
    pub decline_reasons: Vec<String>,
    pub message: String,
    /// First to last attempt.
    pub net_overall_delta: f64,
    pub net_category_deltas: Vec<CategoryDelta>,
}

impl TrendReport {
    pub fn latest(&self) -> Option<&AttemptTransition> {
        self.transitions.last()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttemptTrendAnalyzer {
    settings: TrendSettings,
}

impl AttemptTrendAnalyzer {
    pub fn new(settings: TrendSettings) -> Self {
        Self { settings }
    }

    /// Walks the history in the order given.
    pub fn analyze(&self, history: &[AttemptRecord]) -> Result<TrendReport> {
        let (Some(first), Some(last)) = (history.first(), history.last()) else {
            return Err(insufficient(history.len()));
        };
        if history.len() < 2 {
            return Err(insufficient(history.len()));
        }

        let transitions: Vec<AttemptTransition> = history
            .windows(2)
            .map(|pair| self.transition(&pair[0], &pair[1]))
            .collect();
        let latest = &transitions[transitions.len() - 1];
        let report = TrendReport {
            direction: latest.direction,
            primary_regression: latest.primary_regression,
            decline_reasons: latest.decline_reasons.clone(),
            message: latest.message.clone(),
            net_overall_delta: last.result.overall_score() - first.result.overall_score(),
            net_category_deltas: category_deltas(&first.result, &last.result),
            transitions,
        };
        debug!(
            attempts = history.len(),
            direction = ?report.direction,
            net = report.net_overall_delta,
            "analyzed attempt trend"
        );
        Ok(report)
    }

    fn transition(&self, from: &AttemptRecord, to: &AttemptRecord) -> AttemptTransition {
        let overall_delta = to.result.overall_score() - from.result.overall_score();
        let category_deltas = category_deltas(&from.result, &to.result);
        let direction = if overall_delta >= self.settings.improvement_delta {
            TrendDirection::Improved
        } else if overall_delta <= -self.settings.decline_delta {
            TrendDirection::Declined
        } else {
            TrendDirection::Stable
        };
        let (primary_regression, declined_categories) = match direction {
            TrendDirection::Declined => (
                category_deltas
                    .iter()
                    .filter(|d| d.delta < 0.0)
                    .min_by(|a, b| a.delta.total_cmp(&b.delta))
                    .map(|d| d.category),
                category_deltas
                    .iter()
                    .filter(|d| d.delta < -self.settings.category_decline_delta)
                    .map(|d| d.category)
                    .collect(),
            ),
            _ => (None, Vec::new()),
        };
        let decline_reasons = declined_categories
            .iter()
            .map(|&category| {
                format!("Your {} changed from the previous attempt", learner_name(category))
            })
            .collect();
        AttemptTransition {
            from_index: from.index,
            to_index: to.index,
            overall_delta,
            category_deltas,
            direction,
            primary_regression,
            declined_categories,
            decline_reasons,
            message: trend_message(direction, overall_delta),
        }
    }
}

fn category_deltas(from: &ComparisonResult, to: &ComparisonResult) -> Vec<CategoryDelta> {
    Category::ALL
        .iter()
        .map(|&category| CategoryDelta {
            category,
            delta: to.score(category) - from.score(category),
        })
        .collect()
}

fn trend_message(direction: TrendDirection, delta: f64) -> String {
    match direction {
        TrendDirection::Improved => format!("Great! You improved by {delta:.1} points!"),
        TrendDirection::Declined => format!("Your score dropped by {:.1} points", delta.abs()),
        TrendDirection::Stable => format!("Similar to last time ({delta:+.1} points)"),
    }
}

/// How a category is named to the learner.
fn learner_name(category: Category) -> &'static str {
    match category {
        Category::Pitch => "intonation",
        Category::Formant => "vowel pronunciation",
        Category::Intensity => "stress patterns",
        Category::Duration => "timing",
        Category::VoiceQuality => "voice clarity",
    }
}

fn insufficient(count: usize) -> PronunciationError {
    PronunciationError::new(
        ErrorKind::InsufficientHistory,
        format!("trend analysis needs at least two attempts, got {count}"),
    )
}
