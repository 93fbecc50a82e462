//! Weighted contribution of child categories to a parent aggregate's change.
//!
//! Contributions use the linear approximation common in CPI reporting:
//!
//! ```text
//! contribution_i = weight_i * change_i
//! ```
//!
//! The sum over children is reconciled against the parent's own change. A gap
//! above the tolerance produces a `ReconciliationWarning` next to the numbers;
//! it never fails the computation.
//!
//! Children without a weight, or without a defined rate at the date, contribute
//! zero and are flagged. They stay in the reconciliation sum so that a missing
//! input shows up as a gap rather than disappearing.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::domain::{
    CategoryWeight, ChangePeriod, ContributionReport, ContributionResult, MetricResult, PctChange,
    ReconciliationWarning, TimeSeriesPoint,
};
use crate::error::MetricsError;
use crate::metrics::change::{compute_change_series, validate_series};

/// Default reconciliation tolerance, in percentage points.
pub const DEFAULT_TOLERANCE: f64 = 0.5;

/// Slack allowed on the sum of child weights before it counts as over 1.
const WEIGHT_SUM_SLACK: f64 = 1e-9;

/// Contribution of each child to the parent's change at `date`.
pub fn compute_contribution(
    parent: &[TimeSeriesPoint],
    children: &BTreeMap<String, Vec<TimeSeriesPoint>>,
    weights: &HashMap<String, CategoryWeight>,
    date: NaiveDate,
    period: ChangePeriod,
    tolerance: f64,
) -> Result<ContributionReport, MetricsError> {
    let prepared = Prepared::new(parent, children, weights, period, tolerance)?;
    prepared.report_at(weights, date, tolerance)
}

/// Contribution reports for every parent date with a defined change.
///
/// Dates before `start` are skipped, as are dates where the parent's own change is
/// undefined (the first `period.lag()` observations, zero bases).
pub fn contribution_history(
    parent: &[TimeSeriesPoint],
    children: &BTreeMap<String, Vec<TimeSeriesPoint>>,
    weights: &HashMap<String, CategoryWeight>,
    period: ChangePeriod,
    tolerance: f64,
    start: Option<NaiveDate>,
) -> Result<Vec<ContributionReport>, MetricsError> {
    let prepared = Prepared::new(parent, children, weights, period, tolerance)?;

    let dates: Vec<NaiveDate> = prepared
        .parent_changes
        .iter()
        .filter(|r| r.change.is_defined())
        .map(|r| r.date)
        .filter(|d| start.is_none_or(|s| *d >= s))
        .collect();

    let mut out = Vec::with_capacity(dates.len());
    for date in dates {
        out.push(prepared.report_at(weights, date, tolerance)?);
    }

    let warned = out.iter().filter(|r| r.warning.is_some()).count();
    debug!(
        parent = %prepared.parent_id,
        period = period.label(),
        n = out.len(),
        warned,
        "computed contribution history"
    );

    Ok(out)
}

/// Require a contribution history to span at least `min_periods` distinct dates.
pub fn ensure_history_span(history: &[ContributionReport], min_periods: usize) -> Result<(), MetricsError> {
    let mut dates: Vec<NaiveDate> = history.iter().map(|r| r.date).collect();
    dates.sort();
    dates.dedup();
    if dates.len() < min_periods {
        return Err(MetricsError::InsufficientData {
            required: min_periods,
            available: dates.len(),
        });
    }
    Ok(())
}

/// Validated inputs with change series precomputed once.
struct Prepared {
    parent_id: String,
    period: ChangePeriod,
    parent_changes: Vec<MetricResult>,
    child_changes: BTreeMap<String, Vec<MetricResult>>,
}

impl Prepared {
    fn new(
        parent: &[TimeSeriesPoint],
        children: &BTreeMap<String, Vec<TimeSeriesPoint>>,
        weights: &HashMap<String, CategoryWeight>,
        period: ChangePeriod,
        tolerance: f64,
    ) -> Result<Self, MetricsError> {
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(MetricsError::malformed(format!(
                "reconciliation tolerance must be a non-negative number, got {tolerance}"
            )));
        }

        validate_series(parent)?;
        let parent_id = parent
            .first()
            .map(|p| p.category_id.clone())
            .ok_or_else(|| MetricsError::malformed("parent series is empty"))?;

        check_weights(&parent_id, children, weights)?;

        let mut child_changes = BTreeMap::new();
        for (id, series) in children {
            if let Some(p) = series.iter().find(|p| &p.category_id != id) {
                return Err(MetricsError::malformed(format!(
                    "child series keyed '{id}' contains points for '{}'",
                    p.category_id
                )));
            }
            if id == &parent_id {
                return Err(MetricsError::malformed(format!(
                    "'{id}' cannot be a child of itself"
                )));
            }
            child_changes.insert(id.clone(), compute_change_series(series, period)?);
        }

        Ok(Self {
            parent_changes: compute_change_series(parent, period)?,
            parent_id,
            period,
            child_changes,
        })
    }

    fn report_at(
        &self,
        weights: &HashMap<String, CategoryWeight>,
        date: NaiveDate,
        tolerance: f64,
    ) -> Result<ContributionReport, MetricsError> {
        let parent_pct = self.parent_pct_at(date)?;

        let mut contributions = Vec::with_capacity(self.child_changes.len());
        for (id, changes) in &self.child_changes {
            let child_pct = changes
                .iter()
                .find(|r| r.date == date)
                .and_then(|r| r.change.value());
            let weight = weights.get(id).map(|w| w.weight);

            let contribution_pct = match (weight, child_pct) {
                (Some(w), Some(pct)) => w * pct,
                _ => 0.0,
            };

            contributions.push(ContributionResult {
                category_id: id.clone(),
                date,
                contribution_pct,
                weight,
                child_pct,
                unweighted: weight.is_none(),
                rate_unavailable: child_pct.is_none(),
            });
        }

        let children_sum: f64 = contributions.iter().map(|c| c.contribution_pct).sum();
        let discrepancy = (children_sum - parent_pct).abs();

        let warning = if discrepancy > tolerance {
            let warning = ReconciliationWarning {
                parent_id: self.parent_id.clone(),
                date,
                parent_pct,
                children_sum,
                discrepancy,
                tolerance,
                unweighted: flagged(&contributions, |c| c.unweighted),
                rate_unavailable: flagged(&contributions, |c| c.rate_unavailable),
            };
            warn!(%warning, "contribution reconciliation gap");
            Some(warning)
        } else {
            None
        };

        Ok(ContributionReport {
            parent_id: self.parent_id.clone(),
            date,
            period: self.period,
            parent_pct,
            children_sum,
            contributions,
            warning,
        })
    }

    fn parent_pct_at(&self, date: NaiveDate) -> Result<f64, MetricsError> {
        let undefined = || MetricsError::UndefinedBase {
            category_id: self.parent_id.clone(),
            date,
        };

        let (idx, entry) = self
            .parent_changes
            .iter()
            .enumerate()
            .find(|(_, r)| r.date == date)
            .ok_or_else(undefined)?;

        match entry.change {
            PctChange::Value(v) => Ok(v),
            PctChange::NoBase => Err(MetricsError::InsufficientData {
                required: self.period.lag() + 1,
                available: idx + 1,
            }),
            PctChange::ZeroBase => Err(undefined()),
        }
    }
}

fn check_weights(
    parent_id: &str,
    children: &BTreeMap<String, Vec<TimeSeriesPoint>>,
    weights: &HashMap<String, CategoryWeight>,
) -> Result<(), MetricsError> {
    let mut sum = 0.0;
    for id in children.keys() {
        let Some(w) = weights.get(id) else {
            continue;
        };
        if &w.category_id != id {
            return Err(MetricsError::malformed(format!(
                "weight keyed '{id}' belongs to '{}'",
                w.category_id
            )));
        }
        if !(w.weight.is_finite() && (0.0..=1.0).contains(&w.weight)) {
            return Err(MetricsError::malformed(format!(
                "weight for '{id}' must be within [0, 1], got {}",
                w.weight
            )));
        }
        if let Some(p) = &w.parent_id {
            if p != parent_id {
                return Err(MetricsError::malformed(format!(
                    "weight for '{id}' is relative to '{p}', not '{parent_id}'"
                )));
            }
        }
        sum += w.weight;
    }

    if sum > 1.0 + WEIGHT_SUM_SLACK {
        return Err(MetricsError::malformed(format!(
            "weights of children of '{parent_id}' sum to {sum:.4} (> 1)"
        )));
    }
    Ok(())
}

fn flagged(contributions: &[ContributionResult], pred: impl Fn(&ContributionResult) -> bool) -> Vec<String> {
    contributions
        .iter()
        .filter(|c| pred(c))
        .map(|c| c.category_id.clone())
        .collect()
}
