//! Headline metrics for the latest point of a series.

use crate::domain::{ChangePeriod, InflationSummary, TimeSeriesPoint};
use crate::error::MetricsError;
use crate::metrics::change::compute_change_series;

const QUARTER_POINTS: usize = 3;
const MIN_VOLATILITY_POINTS: usize = 12;

/// Summarize a single-category series.
///
/// Returns `Ok(None)` for an empty series. Metrics that need more history than the
/// series has are left as `None`.
pub fn summarize_series(points: &[TimeSeriesPoint]) -> Result<Option<InflationSummary>, MetricsError> {
    let mom = compute_change_series(points, ChangePeriod::Month)?;
    let yoy = compute_change_series(points, ChangePeriod::Year)?;

    let Some(latest) = points.last() else {
        return Ok(None);
    };

    let monthly_change = mom.last().and_then(|r| r.mom_pct());
    let yearly_change = yoy.last().and_then(|r| r.yoy_pct());

    let quarterly_change = if points.len() >= 2 * QUARTER_POINTS {
        let n = points.len();
        let recent = mean(points[n - QUARTER_POINTS..].iter().map(|p| p.value));
        let prior = mean(points[n - 2 * QUARTER_POINTS..n - QUARTER_POINTS].iter().map(|p| p.value));
        (prior != 0.0).then(|| (recent - prior) / prior * 100.0)
    } else {
        None
    };

    let volatility = if points.len() >= MIN_VOLATILITY_POINTS {
        let changes: Vec<f64> = mom.iter().filter_map(|r| r.mom_pct()).collect();
        sample_std(&changes)
    } else {
        None
    };

    Ok(Some(InflationSummary {
        category_id: latest.category_id.clone(),
        seasonally_adjusted: latest.seasonally_adjusted,
        latest_date: latest.date,
        current_level: latest.value,
        monthly_change,
        yearly_change,
        quarterly_change,
        volatility,
    }))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Sample standard deviation (n - 1 denominator).
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let m = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::change::tests::monthly;
    use chrono::NaiveDate;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
    }

    #[test]
    fn empty_series_has_no_summary() {
        assert_eq!(summarize_series(&[]).unwrap(), None);
    }

    #[test]
    fn short_series_leaves_long_metrics_empty() {
        let points = monthly("food", start(), &[100.0, 101.0, 102.0]);
        let s = summarize_series(&points).unwrap().unwrap();
        assert_eq!(s.current_level, 102.0);
        assert!(s.monthly_change.is_some());
        assert_eq!(s.yearly_change, None);
        assert_eq!(s.quarterly_change, None);
        assert_eq!(s.volatility, None);
        assert_eq!(s.trend(), None);
    }

    #[test]
    fn full_year_fills_every_metric() {
        let mut values = vec![100.0; 12];
        values.push(105.0);
        let points = monthly("all_items", start(), &values);
        let s = summarize_series(&points).unwrap().unwrap();

        assert!((s.yearly_change.unwrap() - 5.0).abs() < 1e-12);
        assert!((s.monthly_change.unwrap() - 5.0).abs() < 1e-12);
        // Last 3 mean = 101.666.., prior 3 mean = 100.
        let expected_q = (305.0 / 3.0 - 100.0) / 100.0 * 100.0;
        assert!((s.quarterly_change.unwrap() - expected_q).abs() < 1e-9);
        assert!(s.volatility.unwrap() > 0.0);
        assert_eq!(s.trend(), Some(crate::domain::TrendStatus::High));
        assert_eq!(s.latest_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn constant_series_has_zero_volatility() {
        let points = monthly("core", start(), &[250.0; 14]);
        let s = summarize_series(&points).unwrap().unwrap();
        assert!(s.volatility.unwrap().abs() < 1e-12);
        assert_eq!(s.yearly_change, Some(0.0));
    }
}
