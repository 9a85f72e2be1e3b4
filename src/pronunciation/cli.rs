use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use crate::audio::decoder;
use crate::config::{Difficulty, ScoringConfig};
use crate::pronunciation::sources::DirectoryReferenceProvider;
use crate::pronunciation::{
    AttemptRecord, Category, ComparisonOrchestrator, ComparisonReport, ComparisonResult,
};

#[derive(Parser, Debug)]
#[command(
    name = "phonalyzer",
    version,
    about = "Score a spoken attempt against a reference recording and explain the differences"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compare one attempt against a reference recording.
    Compare(CompareArgs),
    /// Summarise progress across a JSON history of attempts.
    Trend(TrendArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ReferenceArgs {
    /// Reference recording (WAV, FLAC, OGG, MP3, ...).
    #[arg(
        long,
        value_name = "FILE",
        conflicts_with_all = ["word", "reference_dir"],
        required_unless_present = "word"
    )]
    pub reference: Option<PathBuf>,
    /// Word whose reference is looked up in --reference-dir.
    #[arg(long, requires = "reference_dir")]
    pub word: Option<String>,
    /// Directory holding `<word>.<ext>` reference recordings.
    #[arg(long = "reference-dir", value_name = "DIR", requires = "word")]
    pub reference_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScoringArgs {
    /// JSON scoring configuration; missing fields take their defaults.
    #[arg(long, value_name = "FILE", conflicts_with = "difficulty")]
    pub config: Option<PathBuf>,
    /// Calibration preset: beginner, standard or strict.
    #[arg(long, value_name = "LEVEL")]
    pub difficulty: Option<Difficulty>,
}

impl ScoringArgs {
    pub fn resolve(&self) -> Result<ScoringConfig> {
        match (&self.config, self.difficulty) {
            (Some(path), _) => ScoringConfig::load(path),
            (None, Some(difficulty)) => Ok(ScoringConfig::for_difficulty(difficulty)),
            (None, None) => Ok(ScoringConfig::default()),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    #[command(flatten)]
    pub reference: ReferenceArgs,
    /// The learner's recording.
    #[arg(long, value_name = "FILE")]
    pub attempt: PathBuf,
    #[command(flatten)]
    pub scoring: ScoringArgs,
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct TrendArgs {
    /// JSON array of attempt records, oldest first.
    #[arg(long, value_name = "FILE")]
    pub history: PathBuf,
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Run a comparison and render it in the requested format.
pub fn run_compare(args: &CompareArgs) -> Result<String> {
    let config = args.scoring.resolve()?;
    let orchestrator =
        ComparisonOrchestrator::new(config).context("invalid scoring configuration")?;
    let attempt = decoder::decode_file(&args.attempt)?;

    let source = &args.reference;
    let result = match (&source.reference, &source.word, &source.reference_dir) {
        (Some(path), _, _) => {
            let reference = decoder::decode_file(path)?;
            orchestrator.compare(&reference, &attempt)
        }
        (None, Some(word), Some(dir)) => {
            let references = DirectoryReferenceProvider::new(dir);
            orchestrator.compare_word(&references, word, &attempt)
        }
        _ => anyhow::bail!("provide --reference FILE or --word WORD with --reference-dir DIR"),
    }
    .with_context(|| format!("comparison failed for {}", args.attempt.display()))?;

    info!(overall = result.overall_score(), "compare finished");
    match args.format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&result).context("failed to serialize comparison result")
        }
        OutputFormat::Text => Ok(render_text(&result)),
    }
}

/// Analyse a saved history and return the trend report as JSON.
pub fn run_trend(args: &TrendArgs) -> Result<String> {
    let config = match &args.config {
        Some(path) => ScoringConfig::load(path)?,
        None => ScoringConfig::default(),
    };
    let history = load_history(&args.history)?;
    let report = crate::pronunciation::analyze_trend_with(&history, &config)
        .with_context(|| format!("trend analysis failed for {}", args.history.display()))?;
    serde_json::to_string_pretty(&report).context("failed to serialize trend report")
}

pub fn load_history(path: &Path) -> Result<Vec<AttemptRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read attempt history at {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse attempt history {}", path.display()))
}

pub fn render_text(result: &ComparisonResult) -> String {
    let report = ComparisonReport::from(result.clone());
    let mut out = String::new();
    let band = report.band.map(|band| format!(" ({band:?})").to_lowercase()).unwrap_or_default();
    let _ = writeln!(out, "Overall score: {:.1}{band}", report.overall_score);
    if let Some(summary) = &report.summary {
        let _ = writeln!(out, "{summary}");
    }
    for category in Category::ALL {
        let _ = writeln!(
            out,
            "  {:<14}{:>6.1}",
            category.as_str(),
            report.sub_scores.get(category)
        );
    }
    if !report.strengths.is_empty() {
        let _ = writeln!(out, "Strengths:");
        for line in &report.strengths {
            let _ = writeln!(out, "  + {line}");
        }
    }
    if !report.feedback.is_empty() {
        let _ = writeln!(out, "Feedback:");
        for line in &report.feedback {
            let _ = writeln!(out, "  - {line}");
        }
    }
    out.trim_end().to_string()
}
