//! Shared domain types.
//!
//! These types are deliberately plain and serializable so they can be:
//!
//! - produced by any source (FRED, CSV, synthetic samples)
//! - passed through the pure metrics engine
//! - exported to CSV or rendered in terminal tables

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One CPI observation.
///
/// `(category_id, date, seasonally_adjusted)` is unique within a loaded data set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub category_id: String,
    /// Month of the observation (normalized to the first day of the month).
    pub date: NaiveDate,
    pub value: f64,
    pub seasonally_adjusted: bool,
}

impl TimeSeriesPoint {
    pub fn new(category_id: impl Into<String>, date: NaiveDate, value: f64, seasonally_adjusted: bool) -> Self {
        Self {
            category_id: category_id.into(),
            date: month_start(date),
            value,
            seasonally_adjusted,
        }
    }
}

/// A category's share of its parent aggregate's basket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeight {
    pub category_id: String,
    pub parent_id: Option<String>,
    /// Relative importance in `[0, 1]`.
    pub weight: f64,
}

/// Lookback used for a percentage change.
///
/// The lookback is positional: `Year` compares with the entry 12 places earlier in
/// the supplied sequence, not with the same calendar month a year ago.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChangePeriod {
    /// Month over month (lookback 1).
    #[value(name = "mom", alias = "month")]
    Month,
    /// Year over year (lookback 12).
    #[value(name = "yoy", alias = "year")]
    Year,
}

impl ChangePeriod {
    pub fn lag(self) -> usize {
        match self {
            ChangePeriod::Month => 1,
            ChangePeriod::Year => 12,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChangePeriod::Month => "MoM",
            ChangePeriod::Year => "YoY",
        }
    }
}

/// A percentage change that may be undefined.
///
/// Undefined states are kept distinct so callers can show *why* a value is missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "pct", rename_all = "snake_case")]
pub enum PctChange {
    Value(f64),
    /// The lookback falls before the start of the series.
    NoBase,
    /// The base value is zero.
    ZeroBase,
}

impl PctChange {
    /// Percentage change from `base` to `current`.
    pub fn between(base: f64, current: f64) -> Self {
        if base == 0.0 {
            PctChange::ZeroBase
        } else {
            PctChange::Value((current - base) / base * 100.0)
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            PctChange::Value(v) => Some(v),
            PctChange::NoBase | PctChange::ZeroBase => None,
        }
    }

    pub fn is_defined(self) -> bool {
        matches!(self, PctChange::Value(_))
    }
}

impl fmt::Display for PctChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PctChange::Value(v) => write!(f, "{v:+.2}%"),
            PctChange::NoBase => write!(f, "n/a"),
            PctChange::ZeroBase => write!(f, "undef"),
        }
    }
}

/// Percentage change for one category at one date, for one lookback period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub category_id: String,
    pub date: NaiveDate,
    pub period: ChangePeriod,
    pub change: PctChange,
}

impl MetricResult {
    /// Month-over-month change, when this result was computed with `ChangePeriod::Month`.
    pub fn mom_pct(&self) -> Option<f64> {
        match self.period {
            ChangePeriod::Month => self.change.value(),
            ChangePeriod::Year => None,
        }
    }

    /// Year-over-year change, when this result was computed with `ChangePeriod::Year`.
    pub fn yoy_pct(&self) -> Option<f64> {
        match self.period {
            ChangePeriod::Year => self.change.value(),
            ChangePeriod::Month => None,
        }
    }
}

/// Level plus both change periods for one date (table/export view).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub category_id: String,
    pub seasonally_adjusted: bool,
    pub date: NaiveDate,
    pub value: f64,
    pub mom_pct: PctChange,
    pub yoy_pct: PctChange,
}

/// One child's weighted share of its parent's change at a date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionResult {
    pub category_id: String,
    pub date: NaiveDate,
    pub contribution_pct: f64,
    pub weight: Option<f64>,
    /// The child's own change rate at `date`, when defined.
    pub child_pct: Option<f64>,
    /// No weight was supplied; contribution forced to zero.
    pub unweighted: bool,
    /// The child's own rate is undefined at `date`; contribution forced to zero.
    pub rate_unavailable: bool,
}

/// Non-fatal annotation: children do not add up to the parent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationWarning {
    pub parent_id: String,
    pub date: NaiveDate,
    pub parent_pct: f64,
    pub children_sum: f64,
    pub discrepancy: f64,
    pub tolerance: f64,
    pub unweighted: Vec<String>,
    pub rate_unavailable: Vec<String>,
}

impl fmt::Display for ReconciliationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "contributions to {} at {} sum to {:+.2}pp but the parent moved {:+.2}% (gap {:.2}pp > {:.2}pp)",
            self.parent_id,
            self.date.format("%Y-%m"),
            self.children_sum,
            self.parent_pct,
            self.discrepancy,
            self.tolerance
        )?;
        if !self.unweighted.is_empty() {
            write!(f, "; unweighted: {}", self.unweighted.join(", "))?;
        }
        if !self.rate_unavailable.is_empty() {
            write!(f, "; no rate: {}", self.rate_unavailable.join(", "))?;
        }
        Ok(())
    }
}

/// Output of a contribution computation for one parent at one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionReport {
    pub parent_id: String,
    pub date: NaiveDate,
    pub period: ChangePeriod,
    pub parent_pct: f64,
    pub children_sum: f64,
    pub contributions: Vec<ContributionResult>,
    pub warning: Option<ReconciliationWarning>,
}

/// Change series of an aggregate shown alongside a contribution breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceRate {
    pub category_id: String,
    pub period: ChangePeriod,
    pub changes: Vec<MetricResult>,
}

impl ReferenceRate {
    pub fn at(&self, date: NaiveDate) -> Option<f64> {
        self.changes
            .iter()
            .find(|r| r.date == date)
            .and_then(|r| r.change.value())
    }
}

/// Which seasonal-adjustment variant(s) to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalFilter {
    Adjusted,
    Unadjusted,
    Both,
}

impl SeasonalFilter {
    pub fn accepts(self, seasonally_adjusted: bool) -> bool {
        match self {
            SeasonalFilter::Adjusted => seasonally_adjusted,
            SeasonalFilter::Unadjusted => !seasonally_adjusted,
            SeasonalFilter::Both => true,
        }
    }

    /// Seasonal flags to request from a source, in display order.
    pub fn flags(self) -> &'static [bool] {
        match self {
            SeasonalFilter::Adjusted => &[true],
            SeasonalFilter::Unadjusted => &[false],
            SeasonalFilter::Both => &[true, false],
        }
    }
}

/// Models accepted by the narrative generation service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum AiModel {
    #[serde(rename = "llama3.1-70b")]
    #[value(name = "llama3.1-70b")]
    Llama31_70b,
    #[default]
    #[serde(rename = "claude-3-5-sonnet")]
    #[value(name = "claude-3-5-sonnet")]
    Claude35Sonnet,
    #[serde(rename = "mistral-large2")]
    #[value(name = "mistral-large2")]
    MistralLarge2,
}

impl AiModel {
    pub const ALL: [AiModel; 3] = [AiModel::Llama31_70b, AiModel::Claude35Sonnet, AiModel::MistralLarge2];

    pub fn as_str(self) -> &'static str {
        match self {
            AiModel::Llama31_70b => "llama3.1-70b",
            AiModel::Claude35Sonnet => "claude-3-5-sonnet",
            AiModel::MistralLarge2 => "mistral-large2",
        }
    }
}

impl fmt::Display for AiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        AiModel::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = AiModel::ALL.iter().map(|m| m.as_str()).collect();
                format!("unknown model '{wanted}' (expected one of: {})", known.join(", "))
            })
    }
}

/// Rough inflation regime from the year-over-year rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendStatus {
    High,
    Moderate,
    Low,
    Deflation,
}

impl TrendStatus {
    pub fn from_yearly_change(pct: f64) -> Self {
        if pct > 3.0 {
            TrendStatus::High
        } else if pct > 1.0 {
            TrendStatus::Moderate
        } else if pct > 0.0 {
            TrendStatus::Low
        } else {
            TrendStatus::Deflation
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TrendStatus::High => "high inflation",
            TrendStatus::Moderate => "moderate",
            TrendStatus::Low => "low",
            TrendStatus::Deflation => "deflation",
        }
    }
}

/// Latest-point headline metrics for one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InflationSummary {
    pub category_id: String,
    pub seasonally_adjusted: bool,
    pub latest_date: NaiveDate,
    pub current_level: f64,
    pub monthly_change: Option<f64>,
    pub yearly_change: Option<f64>,
    /// Mean of the last 3 levels against the mean of the 3 before them.
    pub quarterly_change: Option<f64>,
    /// Sample std dev of month-over-month changes, in percent.
    pub volatility: Option<f64>,
}

impl InflationSummary {
    pub fn trend(&self) -> Option<TrendStatus> {
        self.yearly_change.map(TrendStatus::from_yearly_change)
    }
}

/// Normalize a date to the first day of its month.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
