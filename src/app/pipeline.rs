//! Shared load-and-compute workflow used by every subcommand.
//!
//! source -> partition -> per-series metrics (parallel) -> contributions
//!
//! Subcommands then only decide what to print or write.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::{Settings, child_categories};
use crate::data::{
    CachedSource, FredClient, SampleSource, SeriesKey, SeriesRequest, TimeSeriesSource, WeightSource, WeightTable,
    partition_series,
};
use crate::domain::{
    CategoryWeight, ChangePeriod, ContributionReport, InflationSummary, MetricRow, ReferenceRate,
    TimeSeriesPoint,
};
use crate::error::{AppError, MetricsError};
use crate::io::{CsvSource, load_weights};
use crate::metrics::{
    compute_average_change, compute_change_series, compute_contribution, compute_metric_table, contribution_history,
    ensure_history_span, summarize_series,
};

/// Months loaded before the requested start so year-over-year changes exist there.
pub const HISTORY_MONTHS: u32 = 12;

/// Where to load levels from.
#[derive(Debug, Clone)]
pub enum SourceSpec {
    Fred,
    Csv(PathBuf),
    Sample { seed: u64 },
}

/// Build the configured source; network and file sources sit behind the TTL cache.
pub fn open_source(spec: &SourceSpec, settings: &Settings) -> Result<Box<dyn TimeSeriesSource>, AppError> {
    let source: Box<dyn TimeSeriesSource> = match spec {
        SourceSpec::Fred => Box::new(CachedSource::new(FredClient::from_settings(settings)?, settings.cache_ttl)),
        SourceSpec::Csv(path) => Box::new(CachedSource::new(CsvSource::new(path), settings.cache_ttl)),
        SourceSpec::Sample { seed } => Box::new(SampleSource::new(*seed)),
    };
    Ok(source)
}

pub fn open_weights(path: Option<&PathBuf>) -> Result<Box<dyn WeightSource>, AppError> {
    Ok(match path {
        Some(p) => Box::new(load_weights(p)?),
        None => Box::new(WeightTable::builtin()),
    })
}

/// Loaded series, split per (category, seasonal flag).
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub request: SeriesRequest,
    pub series: BTreeMap<SeriesKey, Vec<TimeSeriesPoint>>,
}

impl LoadedData {
    pub fn get(&self, category_id: &str, seasonally_adjusted: bool) -> Option<&[TimeSeriesPoint]> {
        self.series
            .get(&SeriesKey {
                category_id: category_id.to_string(),
                seasonally_adjusted,
            })
            .map(Vec::as_slice)
    }

    pub fn points(&self) -> Vec<TimeSeriesPoint> {
        self.series.values().flatten().cloned().collect()
    }
}

/// Load `request` plus `HISTORY_MONTHS` of lookback and partition it.
pub fn load(source: &dyn TimeSeriesSource, request: &SeriesRequest) -> Result<LoadedData, AppError> {
    if request.end < request.start {
        return Err(AppError::new(2, "End date is before start date."));
    }
    let rows = source.load(&request.with_history(HISTORY_MONTHS))?;
    let series = partition_series(rows)?;

    for id in &request.categories {
        if !series.keys().any(|k| &k.category_id == id) {
            warn!(category = %id, source = source.name(), "no rows loaded for category");
        }
    }
    info!(source = source.name(), series = series.len(), "loaded CPI data");

    Ok(LoadedData {
        request: request.clone(),
        series,
    })
}

/// Everything shown for one series.
#[derive(Debug, Clone)]
pub struct CategoryMetrics {
    pub key: SeriesKey,
    /// Rows from the requested start onward.
    pub table: Vec<MetricRow>,
    pub summary: Option<InflationSummary>,
    /// Average month-over-month change over the configured window.
    pub average_mom: Result<f64, MetricsError>,
}

/// Per-series change tables and summaries, computed in parallel.
pub fn compute_metrics(data: &LoadedData, window: usize) -> Result<Vec<CategoryMetrics>, AppError> {
    let start = data.request.start;
    let results: Result<Vec<CategoryMetrics>, MetricsError> = data
        .series
        .par_iter()
        .filter(|(key, _)| data.request.categories.contains(&key.category_id))
        .map(|(key, points)| category_metrics(key, points, start, window))
        .collect();
    Ok(results?)
}

fn category_metrics(
    key: &SeriesKey,
    points: &[TimeSeriesPoint],
    start: NaiveDate,
    window: usize,
) -> Result<CategoryMetrics, MetricsError> {
    let table = compute_metric_table(points)?
        .into_iter()
        .filter(|r| r.date >= start)
        .collect();
    let summary = summarize_series(points)?;
    let mom = compute_change_series(points, ChangePeriod::Month)?;
    let average_mom = match compute_average_change(&mom, window) {
        Err(MetricsError::MalformedSeries(msg)) => return Err(MetricsError::MalformedSeries(msg)),
        other => other,
    };

    Ok(CategoryMetrics {
        key: key.clone(),
        table,
        summary,
        average_mom,
    })
}

/// What contribution output to produce.
#[derive(Debug, Clone, Copy)]
pub enum ContributionTarget {
    /// A single month; `None` means the latest month the parent has data for.
    At(Option<NaiveDate>),
    /// Every month from the requested start, requiring `min_periods` of them.
    History { min_periods: usize },
}

#[derive(Debug, Clone)]
pub struct ContributionRequest {
    pub parent: String,
    pub seasonally_adjusted: bool,
    pub period: ChangePeriod,
    pub tolerance: f64,
    pub target: ContributionTarget,
    /// Aggregate whose own change is shown next to the breakdown (core CPI by default).
    pub reference: Option<String>,
}

/// Contribution reports plus what kept the breakdown from being shown.
#[derive(Debug, Clone, Default)]
pub struct ContributionRun {
    pub reports: Vec<ContributionReport>,
    /// Too little history or an undefined parent change; display degrades to a note.
    pub unavailable: Option<MetricsError>,
    pub reference: Option<ReferenceRate>,
}

impl ContributionRun {
    /// Latest report, when the breakdown is usable.
    pub fn latest(&self) -> Option<&ContributionReport> {
        if self.unavailable.is_some() {
            return None;
        }
        self.reports.last()
    }
}

/// Categories a contribution run needs: the parent, its weighted children and the reference.
pub fn contribution_categories(
    parent: &str,
    weights: &HashMap<String, CategoryWeight>,
    reference: Option<&str>,
) -> Vec<String> {
    let mut ids: Vec<String> = weights.keys().cloned().collect();
    ids.extend(child_categories(parent).into_iter().map(str::to_string));
    ids.push(parent.to_string());
    ids.extend(reference.map(str::to_string));
    ids.sort();
    ids.dedup();
    ids
}

pub fn compute_contributions(
    data: &LoadedData,
    weights: &HashMap<String, CategoryWeight>,
    req: &ContributionRequest,
) -> Result<ContributionRun, AppError> {
    let parent = data
        .get(&req.parent, req.seasonally_adjusted)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::new(2, format!("No data loaded for parent category '{}'.", req.parent)))?;

    // Children without rows stay in with an empty series so they are flagged, not dropped.
    let mut child_ids: Vec<&str> = weights.keys().map(String::as_str).collect();
    child_ids.extend(child_categories(&req.parent));
    child_ids.retain(|id| *id != req.parent);
    let children: BTreeMap<String, Vec<TimeSeriesPoint>> = child_ids
        .into_iter()
        .map(|id| {
            let points = data.get(id, req.seasonally_adjusted).unwrap_or_default().to_vec();
            if points.is_empty() {
                warn!(parent = %req.parent, child = id, "child category has no data; flagged as rate unavailable");
            }
            (id.to_string(), points)
        })
        .collect();

    let outcome = match req.target {
        ContributionTarget::At(date) => {
            let date = match date {
                Some(d) => d,
                None => parent
                    .last()
                    .map(|p| p.date)
                    .ok_or_else(|| AppError::new(2, "Parent series is empty."))?,
            };
            compute_contribution(parent, &children, weights, date, req.period, req.tolerance)
                .map(|report| (vec![report], None))
        }
        ContributionTarget::History { min_periods } => contribution_history(
            parent,
            &children,
            weights,
            req.period,
            req.tolerance,
            Some(data.request.start),
        )
        .map(|history| {
            let short = ensure_history_span(&history, min_periods).err();
            (history, short)
        }),
    };

    let (reports, unavailable) = match outcome {
        Ok(pair) => pair,
        Err(e @ MetricsError::MalformedSeries(_)) => return Err(e.into()),
        Err(e) => (Vec::new(), Some(e)),
    };
    if let Some(e) = &unavailable {
        warn!(parent = %req.parent, error = %e, "contribution breakdown unavailable");
    }

    let reference = match req.reference.as_deref().filter(|id| *id != req.parent) {
        Some(id) => match data.get(id, req.seasonally_adjusted) {
            Some(points) => Some(ReferenceRate {
                category_id: id.to_string(),
                period: req.period,
                changes: compute_change_series(points, req.period)?,
            }),
            None => {
                warn!(reference = id, "reference category has no data");
                None
            }
        },
        None => None,
    };

    let warned = reports.iter().filter(|r| r.warning.is_some()).count();
    info!(parent = %req.parent, reports = reports.len(), warned, "computed contributions");
    Ok(ContributionRun {
        reports,
        unavailable,
        reference,
    })
}
