//! Declarative feedback table. Order matters only as a tie-break.

use crate::config::{FeedbackSettings, Tolerances};
use crate::pronunciation::{Category, ComparisonResult, FeatureSet};

/// Everything a rule may inspect.
pub(crate) struct RuleContext<'a> {
    pub reference: &'a FeatureSet,
    pub attempt: &'a FeatureSet,
    pub result: &'a ComparisonResult,
    pub settings: &'a FeedbackSettings,
    pub tolerances: &'a Tolerances,
}

impl RuleContext<'_> {
    fn score(&self, category: Category) -> f64 {
        self.result.score(category)
    }

    fn pitch_shift(&self) -> f64 {
        (self.attempt.pitch_mean - self.reference.pitch_mean) / self.reference.pitch_mean
    }

    fn has_reference_melody(&self) -> bool {
        self.reference.pitch_range >= self.settings.min_pitch_range_hz
    }

    fn f1_shift(&self) -> f64 {
        self.attempt.f1_mean - self.reference.f1_mean
    }

    fn f2_shift(&self) -> f64 {
        self.attempt.f2_mean - self.reference.f2_mean
    }

    fn loudness_shift(&self) -> f64 {
        self.attempt.intensity_mean - self.reference.intensity_mean
    }

    fn duration_ratio(&self) -> f64 {
        self.attempt.duration / self.reference.duration
    }
}

/// Praise for a category that cleared the feedback gate.
pub(crate) fn strength(category: Category) -> &'static str {
    match category {
        Category::Pitch => "Excellent intonation",
        Category::Formant => "Excellent vowel pronunciation",
        Category::Intensity => "Good stress and emphasis",
        Category::Duration => "Good timing and pace",
        Category::VoiceQuality => "Clear voice quality",
    }
}

pub(crate) struct FeedbackRule {
    pub id: &'static str,
    pub category: Category,
    /// Fraction of the category's lost points this rule explains.
    pub share: f64,
    pub applies: fn(&RuleContext<'_>) -> bool,
    pub message: fn(&RuleContext<'_>) -> String,
}

pub(crate) const RULES: &[FeedbackRule] = &[
    FeedbackRule {
        id: "pitch_too_high",
        category: Category::Pitch,
        share: 0.6,
        applies: |ctx| ctx.pitch_shift() > ctx.settings.pitch_mean_ratio,
        message: |_| {
            "Pitch too high overall - try lowering your voice to match the reference".into()
        },
    },
    FeedbackRule {
        id: "pitch_too_low",
        category: Category::Pitch,
        share: 0.6,
        applies: |ctx| ctx.pitch_shift() < -ctx.settings.pitch_mean_ratio,
        message: |_| "Pitch too low overall - try raising your voice to match the reference".into(),
    },
    FeedbackRule {
        id: "intonation_flat",
        category: Category::Pitch,
        share: 0.4,
        applies: |ctx| {
            ctx.has_reference_melody()
                && ctx.attempt.pitch_range
                    < ctx.reference.pitch_range * ctx.settings.flat_range_ratio
        },
        message: |_| {
            "Intonation too flat - let your pitch rise and fall more, like the reference".into()
        },
    },
    FeedbackRule {
        id: "intonation_exaggerated",
        category: Category::Pitch,
        share: 0.4,
        applies: |ctx| {
            ctx.has_reference_melody()
                && ctx.attempt.pitch_range
                    > ctx.reference.pitch_range * ctx.settings.wide_range_ratio
        },
        message: |_| {
            "Intonation exaggerated - your pitch moves more than the reference does".into()
        },
    },
    FeedbackRule {
        id: "intonation_shape",
        category: Category::Pitch,
        share: 0.3,
        applies: |ctx| ctx.score(Category::Pitch) < ctx.settings.generic_intonation_score,
        message: |_| {
            "Intonation pattern differs - listen to where the pitch rises and falls \
             in the reference"
                .into()
        },
    },
    FeedbackRule {
        id: "vowel_too_open",
        category: Category::Formant,
        share: 0.5,
        applies: |ctx| ctx.f1_shift() > ctx.settings.f1_shift_hz,
        message: |_| "Vowel too open - close your mouth slightly".into(),
    },
    FeedbackRule {
        id: "vowel_too_closed",
        category: Category::Formant,
        share: 0.5,
        applies: |ctx| ctx.f1_shift() < -ctx.settings.f1_shift_hz,
        message: |_| "Vowel too closed - open your mouth a bit more".into(),
    },
    FeedbackRule {
        id: "tongue_too_forward",
        category: Category::Formant,
        share: 0.5,
        applies: |ctx| ctx.f2_shift() > ctx.settings.f2_shift_hz,
        message: |_| "Tongue too far forward - pull it back slightly".into(),
    },
    FeedbackRule {
        id: "tongue_too_back",
        category: Category::Formant,
        share: 0.5,
        applies: |ctx| ctx.f2_shift() < -ctx.settings.f2_shift_hz,
        message: |_| "Tongue too far back - move it forward slightly".into(),
    },
    FeedbackRule {
        id: "vowel_mismatch",
        category: Category::Formant,
        share: 0.3,
        applies: |ctx| {
            ctx.score(Category::Formant) < ctx.settings.generic_vowel_score
                && ctx.f1_shift().abs() <= ctx.settings.f1_shift_hz
                && ctx.f2_shift().abs() <= ctx.settings.f2_shift_hz
        },
        message: |_| {
            "Vowel quality differs from the reference - listen closely to the vowel sound".into()
        },
    },
    FeedbackRule {
        id: "too_quiet",
        category: Category::Intensity,
        share: 0.5,
        applies: |ctx| ctx.loudness_shift() < -ctx.settings.loudness_db,
        message: |_| "Speaking too quietly - project your voice more".into(),
    },
    FeedbackRule {
        id: "too_loud",
        category: Category::Intensity,
        share: 0.5,
        applies: |ctx| ctx.loudness_shift() > ctx.settings.loudness_db,
        message: |_| "Speaking too loudly - soften your voice a little".into(),
    },
    FeedbackRule {
        id: "stress_flat",
        category: Category::Intensity,
        share: 0.4,
        applies: |ctx| {
            ctx.attempt.intensity_range
                < ctx.reference.intensity_range * ctx.settings.flat_stress_ratio
        },
        message: |_| "Stress too flat - emphasise the stressed syllable more".into(),
    },
    FeedbackRule {
        id: "stress_exaggerated",
        category: Category::Intensity,
        share: 0.4,
        applies: |ctx| {
            ctx.attempt.intensity_range
                > ctx.reference.intensity_range * ctx.settings.wide_stress_ratio
        },
        message: |_| "Stress exaggerated - even out your emphasis".into(),
    },
    FeedbackRule {
        id: "too_fast",
        category: Category::Duration,
        share: 1.0,
        applies: |ctx| ctx.duration_ratio() < 1.0 - ctx.tolerances.duration_ratio,
        message: |ctx| {
            let percent = ((1.0 - ctx.duration_ratio()) * 100.0).round();
            format!(
                "Speaking too fast - you were about {percent:.0}% quicker than the reference. \
                 Slow down slightly."
            )
        },
    },
    FeedbackRule {
        id: "too_slow",
        category: Category::Duration,
        share: 1.0,
        applies: |ctx| ctx.duration_ratio() > 1.0 + ctx.tolerances.duration_ratio,
        message: |ctx| {
            let percent = ((ctx.duration_ratio() - 1.0) * 100.0).round();
            format!(
                "Speaking too slowly - you took about {percent:.0}% longer than the reference. \
                 Try a more natural pace."
            )
        },
    },
    FeedbackRule {
        id: "breathy_voice",
        category: Category::VoiceQuality,
        share: 0.4,
        applies: |ctx| {
            ctx.attempt.hnr_mean < ctx.settings.breathy_hnr_db
                && ctx.attempt.hnr_mean < ctx.reference.hnr_mean
        },
        message: |_| "Voice sounds breathy - use a clearer, fuller voice".into(),
    },
    FeedbackRule {
        id: "unsteady_pitch",
        category: Category::VoiceQuality,
        share: 0.3,
        applies: |ctx| ctx.attempt.jitter > ctx.settings.unsteady_jitter,
        message: |_| "Pitch is unsteady - try to hold your voice steady".into(),
    },
    FeedbackRule {
        id: "unsteady_volume",
        category: Category::VoiceQuality,
        share: 0.3,
        applies: |ctx| ctx.attempt.shimmer > ctx.settings.unsteady_shimmer,
        message: |_| "Volume is unsteady - keep your loudness even".into(),
    },
];
