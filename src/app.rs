//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and loads settings
//! - sets up logging
//! - runs the load/compute pipeline
//! - prints reports and writes optional exports

use std::path::Path;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{AnalyzeArgs, Command, ContribArgs, ExportArgs, MetricsArgs, SourceArgs, SourceKind};
use crate::config::{Settings, category_label, resolve_groups};
use crate::data::SeriesRequest;
use crate::domain::{InflationSummary, SeasonalFilter};
use crate::error::AppError;
use crate::narrative::{
    NarrativeGenerator, OpenAiCompatibleClient, Subject, narrate_each, narrate_with, render_prompt,
};

use self::pipeline::{ContributionRequest, ContributionRun, ContributionTarget, LoadedData, SourceSpec};

pub mod pipeline;

/// Entry point for the `cpi` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    init_logging(cli.verbose);
    let settings = Settings::from_env()?;

    match cli.command {
        Command::Metrics(args) => handle_metrics(args, &settings),
        Command::Contrib(args) => handle_contrib(args, &settings),
        Command::Analyze(args) => handle_analyze(args, &settings),
        Command::Export(args) => handle_export(args, &settings),
    }
}

/// Logs go to stderr so stdout stays a clean report.
///
/// Priority: `RUST_LOG` > `-v` flags > default (warn).
fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });
    // A second init (e.g. in tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

fn handle_metrics(args: MetricsArgs, settings: &Settings) -> Result<(), AppError> {
    let window = args.window.unwrap_or(settings.average_window);
    let source = pipeline::open_source(&source_spec(&args.source), settings)?;
    let request = series_request(&args.source, selected_categories(&args.source)?);
    let data = pipeline::load(source.as_ref(), &request)?;
    let metrics = pipeline::compute_metrics(&data, window)?;

    println!(
        "{}",
        crate::report::format_run_summary(&metrics, &request, source.name(), window)
    );
    if let Some(n) = args.table {
        for m in &metrics {
            println!("{}", crate::report::format_metrics_table(m, Some(n)));
        }
    }
    Ok(())
}

fn handle_contrib(args: ContribArgs, settings: &Settings) -> Result<(), AppError> {
    let source = pipeline::open_source(&source_spec(&args.source), settings)?;
    let (data, run) = load_contributions(source.as_ref(), &args, &[], settings)?;

    println!("{}", contribution_block(&args, &run));
    info!(series = data.series.len(), "contribution run complete");
    Ok(())
}

fn handle_analyze(args: AnalyzeArgs, settings: &Settings) -> Result<(), AppError> {
    let contrib = &args.contrib;
    let selected = selected_categories(&contrib.source)?;
    let source = pipeline::open_source(&source_spec(&contrib.source), settings)?;
    let (data, run) = load_contributions(source.as_ref(), contrib, &selected, settings)?;
    let metrics = pipeline::compute_metrics(&data, settings.average_window)?;

    // Numeric output first; the narrative can only add to it.
    println!(
        "{}",
        crate::report::format_run_summary(&metrics, &data.request, source.name(), settings.average_window)
    );
    println!("{}", contribution_block(contrib, &run));

    let summaries: Vec<_> = metrics
        .iter()
        .filter(|m| selected.contains(&m.key.category_id))
        .filter_map(|m| m.summary.clone())
        .collect();
    let prompt = render_prompt(args.prompt, &summaries, run.latest());
    let model = args.model.unwrap_or(settings.ai.model);

    let client = OpenAiCompatibleClient::from_settings(&settings.ai);
    let generator = client.as_ref().map(|c| c as &dyn NarrativeGenerator);
    let narrative = narrate_with(generator, &prompt, model);
    println!("{}", crate::report::format_narrative(&narrative, model));

    if args.each {
        let subjects = subjects(&contrib.source, &summaries)?;
        let narratives = narrate_each(generator, &subjects, model);
        print!("{}", crate::report::format_subject_narratives(&narratives));
    }
    Ok(())
}

fn handle_export(args: ExportArgs, settings: &Settings) -> Result<(), AppError> {
    let contrib = &args.contrib;
    let selected = selected_categories(&contrib.source)?;
    let source = pipeline::open_source(&source_spec(&contrib.source), settings)?;
    let (data, run) = load_contributions(source.as_ref(), contrib, &selected, settings)?;
    let metrics = pipeline::compute_metrics(&data, settings.average_window)?;

    std::fs::create_dir_all(&args.out)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", args.out.display())))?;

    let points = data.points();
    let rows: Vec<_> = metrics.iter().flat_map(|m| m.table.iter().cloned()).collect();

    write_export(&args.out.join("points.csv"), |f| crate::io::write_points_csv(f, &points))?;
    write_export(&args.out.join("metrics.csv"), |f| crate::io::write_metrics_csv(f, &rows))?;
    write_export(&args.out.join("contributions.csv"), |f| {
        crate::io::write_contributions_csv(f, &run.reports, run.reference.as_ref())
    })?;

    println!(
        "Wrote {} points, {} metric rows and {} contribution reports to {}",
        points.len(),
        rows.len(),
        run.reports.len(),
        args.out.display()
    );
    if let Some(e) = &run.unavailable {
        print!(
            "{}",
            crate::report::format_contribution_unavailable(&contrib.parent, contrib.history, e)
        );
    }
    Ok(())
}

fn write_export<F>(path: &Path, write: F) -> Result<(), AppError>
where
    F: FnOnce(std::fs::File) -> Result<(), AppError>,
{
    crate::io::export_to_file(path, write)?;
    info!(path = %path.display(), "export written");
    Ok(())
}

/// Breakdown, history matrix, or a note on why neither can be shown.
fn contribution_block(args: &ContribArgs, run: &ContributionRun) -> String {
    if let Some(e) = &run.unavailable {
        return crate::report::format_contribution_unavailable(&args.parent, args.history, e);
    }
    if args.history {
        return crate::report::format_contribution_history(&run.reports, run.reference.as_ref());
    }
    run.reports
        .iter()
        .map(|r| crate::report::format_contribution(r, run.reference.as_ref()))
        .collect()
}

/// Load the parent, its children, the reference and `extra` categories, then decompose.
fn load_contributions(
    source: &dyn crate::data::TimeSeriesSource,
    args: &ContribArgs,
    extra: &[String],
    settings: &Settings,
) -> Result<(LoadedData, ContributionRun), AppError> {
    let weights = pipeline::open_weights(args.source.weights.as_ref())?.weights(&args.parent)?;
    let reference = Some(args.reference.trim()).filter(|r| !r.is_empty() && *r != args.parent);

    let mut categories = pipeline::contribution_categories(&args.parent, &weights, reference);
    categories.extend(extra.iter().cloned());
    let request = series_request(&args.source, categories);
    let data = pipeline::load(source, &request)?;

    let target = if args.history {
        ContributionTarget::History {
            min_periods: settings.min_contribution_periods,
        }
    } else {
        ContributionTarget::At(args.date)
    };
    let req = ContributionRequest {
        parent: args.parent.clone(),
        // Contributions need one variant; `both` decomposes the adjusted one.
        seasonally_adjusted: args.source.seasonal != SeasonalFilter::Unadjusted,
        period: args.period,
        tolerance: args.tolerance.unwrap_or(settings.tolerance),
        target,
        reference: reference.map(str::to_string),
    };
    let run = pipeline::compute_contributions(&data, &weights, &req)?;
    Ok((data, run))
}

/// `--categories` plus every member of `--groups`.
fn selected_categories(args: &SourceArgs) -> Result<Vec<String>, AppError> {
    let mut ids = args.categories.clone();
    for g in resolve_groups(&args.groups)? {
        ids.extend(g.members.iter().map(|m| m.to_string()));
    }
    ids.sort();
    ids.dedup();
    Ok(ids)
}

/// Commentary subjects: each selected group, or each category when no group is given.
fn subjects(args: &SourceArgs, summaries: &[InflationSummary]) -> Result<Vec<Subject>, AppError> {
    let of = |ids: &[&str]| -> Vec<InflationSummary> {
        summaries
            .iter()
            .filter(|s| ids.iter().any(|id| *id == s.category_id))
            .cloned()
            .collect()
    };
    if args.groups.is_empty() {
        return Ok(args
            .categories
            .iter()
            .map(|id| Subject {
                name: category_label(id).to_string(),
                summaries: of(&[id.as_str()]),
            })
            .collect());
    }
    Ok(resolve_groups(&args.groups)?
        .into_iter()
        .map(|g| Subject {
            name: g.label.to_string(),
            summaries: of(g.members),
        })
        .collect())
}

fn source_spec(args: &SourceArgs) -> SourceSpec {
    match (args.source, &args.csv) {
        (SourceKind::Fred, _) => SourceSpec::Fred,
        (SourceKind::Csv, Some(path)) => SourceSpec::Csv(path.clone()),
        // clap requires `--csv` with `--source csv`.
        (SourceKind::Csv, None) | (SourceKind::Sample, _) => SourceSpec::Sample { seed: args.seed },
    }
}

fn series_request(args: &SourceArgs, categories: Vec<String>) -> SeriesRequest {
    SeriesRequest::new(categories, args.start, args.end, args.seasonal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::data::SampleSource;

    fn contrib_args(argv: &[&str]) -> ContribArgs {
        let mut full = vec!["cpi", "contrib"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Command::Contrib(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn contributions_load_children_alongside_extra_categories() {
        let args = contrib_args(&["--start", "2024-01", "--end", "2024-06"]);
        let (data, run) = load_contributions(
            &SampleSource::new(11),
            &args,
            &["shelter".to_string()],
            &Settings::default(),
        )
        .unwrap();
        assert!(data.get("shelter", true).is_some());
        assert!(data.get("energy", true).is_some());
        assert!(data.get("core", true).is_some());
        assert_eq!(run.reports.len(), 1);
        assert_eq!(run.reports[0].contributions.len(), 4);
        assert_eq!(run.reference.as_ref().unwrap().category_id, "core");
    }

    #[test]
    fn unadjusted_filter_decomposes_unadjusted_series() {
        let args = contrib_args(&["--seasonal", "unadjusted", "--start", "2024-01", "--end", "2024-06"]);
        let (data, run) = load_contributions(&SampleSource::new(11), &args, &[], &Settings::default()).unwrap();
        assert!(data.get("all_items", true).is_none());
        assert_eq!(run.reports[0].date, chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[test]
    fn short_history_prints_a_note_instead_of_failing() {
        let args = contrib_args(&["--history", "--start", "2024-07", "--end", "2024-12"]);
        let (_, run) = load_contributions(&SampleSource::new(11), &args, &[], &Settings::default()).unwrap();
        assert_eq!(
            contribution_block(&args, &run),
            "Contribution history for All items unavailable: need 12 periods, have 6.\n"
        );
    }

    #[test]
    fn groups_expand_into_member_categories() {
        let args = contrib_args(&["--categories", "all_items", "--groups", "food,core_goods"]);
        let ids = selected_categories(&args.source).unwrap();
        assert_eq!(
            ids,
            ["all_items", "core_goods", "food", "food_at_home", "food_away", "new_vehicles", "used_vehicles"]
        );
        let bad = contrib_args(&["--groups", "tobacco"]);
        assert_eq!(selected_categories(&bad.source).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn subjects_follow_groups_or_categories() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let summary = |id: &str| InflationSummary {
            category_id: id.into(),
            seasonally_adjusted: true,
            latest_date: date,
            current_level: 300.0,
            monthly_change: None,
            yearly_change: None,
            quarterly_change: None,
            volatility: None,
        };
        let summaries = vec![summary("food"), summary("food_away"), summary("energy")];

        let by_group = subjects(&contrib_args(&["--groups", "food"]).source, &summaries).unwrap();
        assert_eq!(by_group.len(), 1);
        assert_eq!(by_group[0].name, "Food");
        assert_eq!(by_group[0].summaries.len(), 2);

        let by_category = subjects(&contrib_args(&["--categories", "energy,shelter"]).source, &summaries).unwrap();
        assert_eq!(by_category[0].name, "Energy");
        assert_eq!(by_category[0].summaries.len(), 1);
        assert!(by_category[1].summaries.is_empty());
    }

    #[test]
    fn source_spec_follows_flags() {
        let args = contrib_args(&["--source", "csv", "--csv", "levels.csv"]);
        assert!(matches!(source_spec(&args.source), SourceSpec::Csv(p) if p.ends_with("levels.csv")));
        let args = contrib_args(&["--seed", "5"]);
        assert!(matches!(source_spec(&args.source), SourceSpec::Sample { seed: 5 }));
    }
}
