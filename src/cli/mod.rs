//! Command-line parsing for the CPI metrics tool.
//!
//! Argument parsing and command dispatch stay separate from the engine.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::{AiModel, ChangePeriod, SeasonalFilter};
use crate::narrative::PromptKind;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cpi", version, about = "CPI inflation metrics and contribution analysis")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Month-over-month and year-over-year changes with headline summaries.
    Metrics(MetricsArgs),
    /// Weighted contribution of child categories to a parent's change.
    Contrib(ContribArgs),
    /// Metrics plus contributions, with an AI-written commentary (needs CPI_AI_HOST).
    Analyze(AnalyzeArgs),
    /// Write levels, changes and contributions to CSV files.
    Export(ExportArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// FRED API (needs FRED_API_KEY).
    Fred,
    /// Long-format CSV file (`--csv`).
    Csv,
    /// Deterministic synthetic data.
    Sample,
}

/// Where data comes from and which slice of it to load.
#[derive(Debug, Args, Clone)]
pub struct SourceArgs {
    #[arg(long, value_enum, default_value_t = SourceKind::Sample)]
    pub source: SourceKind,

    /// CPI levels CSV (`category_id,date,value[,seasonally_adjusted]`).
    #[arg(long, value_name = "CSV", required_if_eq("source", "csv"))]
    pub csv: Option<PathBuf>,

    /// Weights CSV (`category_id,parent_id,weight`); defaults to the built-in table.
    #[arg(long, value_name = "CSV")]
    pub weights: Option<PathBuf>,

    /// First month to report (YYYY-MM or YYYY-MM-DD).
    #[arg(long, value_parser = parse_month, default_value = "2023-01")]
    pub start: NaiveDate,

    /// Last month to report (YYYY-MM or YYYY-MM-DD).
    #[arg(long, value_parser = parse_month, default_value = "2024-12")]
    pub end: NaiveDate,

    #[arg(long, value_enum, default_value_t = SeasonalFilter::Adjusted)]
    pub seasonal: SeasonalFilter,

    /// Categories to load (comma separated).
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "all_items,core,food,energy"
    )]
    pub categories: Vec<String>,

    /// Category groups to add (headline, core, food, energy, core_goods, core_services).
    #[arg(long, value_delimiter = ',')]
    pub groups: Vec<String>,

    /// Seed for `--source sample`.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Debug, Args, Clone)]
pub struct MetricsArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Print the per-month table for each series (last N months).
    #[arg(long, value_name = "N")]
    pub table: Option<usize>,

    /// Window for the average monthly change (months); defaults to settings.
    #[arg(long)]
    pub window: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct ContribArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Parent aggregate.
    #[arg(long, default_value = "all_items")]
    pub parent: String,

    /// Month to decompose; defaults to the latest month with data.
    #[arg(long, value_parser = parse_month)]
    pub date: Option<NaiveDate>,

    #[arg(long, value_enum, default_value_t = ChangePeriod::Year)]
    pub period: ChangePeriod,

    /// Reconciliation tolerance in percentage points; defaults to settings.
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Show every month from `--start` instead of a single date.
    #[arg(long)]
    pub history: bool,

    /// Aggregate whose own change is shown next to the breakdown.
    #[arg(long, default_value = "core")]
    pub reference: String,
}

#[derive(Debug, Args, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub contrib: ContribArgs,

    /// Model id; defaults to CPI_AI_MODEL or claude-3-5-sonnet.
    #[arg(long, value_enum)]
    pub model: Option<AiModel>,

    #[arg(long, value_enum, default_value_t = PromptKind::General)]
    pub prompt: PromptKind,

    /// Also request a short commentary per group (or per category without `--groups`).
    #[arg(long)]
    pub each: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub contrib: ContribArgs,

    /// Output directory for `points.csv`, `metrics.csv` and `contributions.csv`.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out: PathBuf,
}

/// Accept `YYYY-MM` as well as full dates.
pub fn parse_month(s: &str) -> Result<NaiveDate, String> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d"))
        .map(crate::domain::month_start)
        .map_err(|_| format!("invalid month '{s}' (expected YYYY-MM or YYYY-MM-DD)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_month_accepts_both_forms() {
        let june = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(parse_month("2024-06").unwrap(), june);
        assert_eq!(parse_month("2024-06-17").unwrap(), june);
        assert!(parse_month("June 2024").is_err());
    }

    #[test]
    fn contrib_defaults() {
        let cli = Cli::parse_from(["cpi", "contrib", "--history"]);
        let Command::Contrib(args) = cli.command else {
            panic!("expected contrib");
        };
        assert_eq!(args.parent, "all_items");
        assert_eq!(args.period, ChangePeriod::Year);
        assert!(args.history);
        assert_eq!(args.source.source, SourceKind::Sample);
        assert_eq!(args.source.categories.len(), 4);
        assert!(args.source.groups.is_empty());
        assert_eq!(args.reference, "core");
    }

    #[test]
    fn groups_and_each_flags() {
        let cli = Cli::parse_from(["cpi", "analyze", "--groups", "food,energy", "--each"]);
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.contrib.source.groups, ["food", "energy"]);
        assert!(args.each);
    }

    #[test]
    fn csv_source_requires_path() {
        assert!(Cli::try_parse_from(["cpi", "metrics", "--source", "csv"]).is_err());
        assert!(Cli::try_parse_from(["cpi", "metrics", "--source", "csv", "--csv", "cpi.csv"]).is_ok());
    }

    #[test]
    fn analyze_rejects_unknown_models() {
        assert!(Cli::try_parse_from(["cpi", "analyze", "--model", "gpt-x"]).is_err());
        let cli = Cli::parse_from(["cpi", "-v", "analyze", "--model", "mistral-large2", "--prompt", "policy"]);
        assert_eq!(cli.verbose, 1);
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.model, Some(AiModel::MistralLarge2));
        assert_eq!(args.prompt, PromptKind::Policy);
    }
}
