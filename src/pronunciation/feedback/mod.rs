mod rules;

use tracing::debug;

use crate::config::ScoringConfig;
use crate::pronunciation::{Category, ComparisonResult, ErrorKind, PronunciationError, Result};

use rules::{RuleContext, RULES};

/// Turns sub-score deviations into a short list of actionable hints.
#[derive(Debug, Clone)]
pub struct FeedbackGenerator {
    config: ScoringConfig,
}

impl FeedbackGenerator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Messages ordered by how many weighted points each explains, most first.
    pub fn generate(&self, result: &ComparisonResult) -> Result<Vec<String>> {
        let features = result.features().ok_or_else(|| {
            PronunciationError::new(
                ErrorKind::MissingReference,
                "result carries no feature sets to explain",
            )
        })?;
        let settings = &self.config.feedback;
        let ctx = RuleContext {
            reference: &features.reference,
            attempt: &features.attempt,
            result,
            settings,
            tolerances: &self.config.tolerances,
        };

        let mut eligible: Vec<(f64, &rules::FeedbackRule)> = RULES
            .iter()
            .filter(|rule| result.score(rule.category) < settings.score_gate)
            .filter(|rule| (rule.applies)(&ctx))
            .map(|rule| {
                let lost = 100.0 - result.score(rule.category);
                (self.config.weights.get(rule.category) * lost * rule.share, rule)
            })
            .collect();
        eligible.sort_by(|a, b| b.0.total_cmp(&a.0));

        let selected: Vec<&str> = eligible
            .iter()
            .take(settings.max_messages)
            .map(|(_, rule)| rule.id)
            .collect();
        debug!(eligible = eligible.len(), ?selected, "selected feedback rules");

        Ok(eligible
            .iter()
            .take(settings.max_messages)
            .map(|(_, rule)| (rule.message)(&ctx))
            .collect())
    }

    /// One praise line per category at or above the gate, in category order.
    pub fn strengths(&self, result: &ComparisonResult) -> Vec<String> {
        Category::ALL
            .into_iter()
            .filter(|&category| result.score(category) >= self.config.feedback.score_gate)
            .map(|category| rules::strength(category).to_string())
            .collect()
    }
}
