//! Period-over-period percentage changes.
//!
//! For index `i` and lookback `k`:
//!
//! ```text
//! change[i] = (value[i] - value[i-k]) / value[i-k] * 100
//! ```
//!
//! The lookback is positional. A missing month in the input silently shifts the
//! calendar offset; callers must hand in gap-free monthly sequences.

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{ChangePeriod, MetricResult, MetricRow, PctChange, TimeSeriesPoint};
use crate::error::MetricsError;

/// Check that `points` is a single, strictly date-ordered series with finite values.
pub fn validate_series(points: &[TimeSeriesPoint]) -> Result<(), MetricsError> {
    let Some(first) = points.first() else {
        return Ok(());
    };

    for (idx, p) in points.iter().enumerate() {
        if p.category_id != first.category_id {
            return Err(MetricsError::malformed(format!(
                "series mixes categories '{}' and '{}'",
                first.category_id, p.category_id
            )));
        }
        if p.seasonally_adjusted != first.seasonally_adjusted {
            return Err(MetricsError::malformed(format!(
                "series '{}' mixes seasonally adjusted and unadjusted points",
                first.category_id
            )));
        }
        if !p.value.is_finite() {
            return Err(MetricsError::malformed(format!(
                "non-finite value for '{}' at {}",
                p.category_id, p.date
            )));
        }
        if idx > 0 {
            let prev = &points[idx - 1];
            if p.date == prev.date {
                return Err(MetricsError::malformed(format!(
                    "duplicate date {} in series '{}'",
                    p.date, p.category_id
                )));
            }
            if p.date < prev.date {
                return Err(MetricsError::malformed(format!(
                    "dates not increasing in series '{}': {} follows {}",
                    p.category_id, p.date, prev.date
                )));
            }
        }
    }

    Ok(())
}

/// Compute the percentage change series for one category.
///
/// The output is aligned with the input: `result[i]` describes `points[i]`.
/// Entries without enough history are `PctChange::NoBase`; entries whose base is
/// zero are `PctChange::ZeroBase`.
pub fn compute_change_series(
    points: &[TimeSeriesPoint],
    period: ChangePeriod,
) -> Result<Vec<MetricResult>, MetricsError> {
    validate_series(points)?;
    let lag = period.lag();

    let out: Vec<MetricResult> = points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let change = if i < lag {
                PctChange::NoBase
            } else {
                PctChange::between(points[i - lag].value, p.value)
            };
            MetricResult {
                category_id: p.category_id.clone(),
                date: p.date,
                period,
                change,
            }
        })
        .collect();

    if let Some(first) = points.first() {
        let zero_bases = out.iter().filter(|r| r.change == PctChange::ZeroBase).count();
        debug!(
            category = %first.category_id,
            period = period.label(),
            n = out.len(),
            zero_bases,
            "computed change series"
        );
    }

    Ok(out)
}

/// Change at a specific date; `None` when the series has no observation at `date`.
pub fn change_at(
    points: &[TimeSeriesPoint],
    date: NaiveDate,
    period: ChangePeriod,
) -> Result<Option<PctChange>, MetricsError> {
    let series = compute_change_series(points, period)?;
    Ok(series.into_iter().find(|r| r.date == date).map(|r| r.change))
}

/// Level plus MoM and YoY for every point, for tables and exports.
pub fn compute_metric_table(points: &[TimeSeriesPoint]) -> Result<Vec<MetricRow>, MetricsError> {
    let mom = compute_change_series(points, ChangePeriod::Month)?;
    let yoy = compute_change_series(points, ChangePeriod::Year)?;

    Ok(points
        .iter()
        .zip(mom.iter().zip(yoy.iter()))
        .map(|(p, (m, y))| MetricRow {
            category_id: p.category_id.clone(),
            seasonally_adjusted: p.seasonally_adjusted,
            date: p.date,
            value: p.value,
            mom_pct: m.change,
            yoy_pct: y.change,
        })
        .collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Months;

    pub(crate) fn monthly(category: &str, start: NaiveDate, values: &[f64]) -> Vec<TimeSeriesPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let date = start + Months::new(i as u32);
                TimeSeriesPoint::new(category, date, v, true)
            })
            .collect()
    }

    fn jan(year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, 1, 1).unwrap()
    }

    #[test]
    fn yoy_of_flat_year_then_jump_is_five_percent() {
        let mut values = vec![100.0; 12];
        values.push(105.0);
        let points = monthly("all_items", jan(2023), &values);

        let yoy = compute_change_series(&points, ChangePeriod::Year).unwrap();
        assert_eq!(yoy.len(), 13);
        assert!(yoy[..12].iter().all(|r| r.change == PctChange::NoBase));
        let last = yoy[12].yoy_pct().unwrap();
        assert!((last - 5.0).abs() < 1e-12, "expected 5.0, got {last}");
    }

    #[test]
    fn mom_first_entry_is_undefined() {
        let points = monthly("food", jan(2024), &[100.0, 102.0, 101.0]);
        let mom = compute_change_series(&points, ChangePeriod::Month).unwrap();
        assert_eq!(mom[0].change, PctChange::NoBase);
        assert!((mom[1].mom_pct().unwrap() - 2.0).abs() < 1e-12);
        let expected = (101.0 - 102.0) / 102.0 * 100.0;
        assert!((mom[2].mom_pct().unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn zero_base_is_surfaced_not_dropped() {
        let points = monthly("energy", jan(2024), &[0.0, 10.0, 12.0]);
        let mom = compute_change_series(&points, ChangePeriod::Month).unwrap();
        assert_eq!(mom.len(), 3);
        assert_eq!(mom[1].change, PctChange::ZeroBase);
        assert!(mom[2].change.is_defined());
    }

    #[test]
    fn empty_series_yields_empty_output() {
        let out = compute_change_series(&[], ChangePeriod::Year).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn rejects_duplicate_and_out_of_order_dates() {
        let mut points = monthly("food", jan(2024), &[100.0, 101.0, 102.0]);
        points[2].date = points[1].date;
        let err = compute_change_series(&points, ChangePeriod::Month).unwrap_err();
        assert!(matches!(err, MetricsError::MalformedSeries(ref m) if m.contains("duplicate")));

        let mut points = monthly("food", jan(2024), &[100.0, 101.0, 102.0]);
        points.swap(0, 2);
        let err = compute_change_series(&points, ChangePeriod::Month).unwrap_err();
        assert!(matches!(err, MetricsError::MalformedSeries(ref m) if m.contains("not increasing")));
    }

    #[test]
    fn rejects_mixed_categories_and_nan() {
        let mut points = monthly("food", jan(2024), &[100.0, 101.0]);
        points[1].category_id = "energy".to_string();
        assert!(validate_series(&points).is_err());

        let points = monthly("food", jan(2024), &[100.0, f64::NAN]);
        assert!(validate_series(&points).is_err());
    }

    #[test]
    fn gap_uses_positional_lookback() {
        // Feb is missing; the "MoM" for March compares against January.
        let points = vec![
            TimeSeriesPoint::new("food", jan(2024), 100.0, true),
            TimeSeriesPoint::new("food", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), 110.0, true),
        ];
        let mom = compute_change_series(&points, ChangePeriod::Month).unwrap();
        assert!((mom[1].mom_pct().unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn change_at_finds_date_or_none() {
        let points = monthly("food", jan(2024), &[100.0, 101.0]);
        let feb = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let c = change_at(&points, feb, ChangePeriod::Month).unwrap().unwrap();
        assert!((c.value().unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(change_at(&points, jan(2030), ChangePeriod::Month).unwrap(), None);
    }

    #[test]
    fn metric_table_zips_both_periods() {
        let values: Vec<f64> = (0..14).map(|i| 100.0 + i as f64).collect();
        let points = monthly("core", jan(2022), &values);
        let table = compute_metric_table(&points).unwrap();
        assert_eq!(table.len(), 14);
        assert!(table[0].mom_pct == PctChange::NoBase && table[0].yoy_pct == PctChange::NoBase);
        assert!(table[1].mom_pct.is_defined() && !table[1].yoy_pct.is_defined());
        assert!(table[12].yoy_pct.is_defined());
        let expected = (113.0 - 101.0) / 101.0 * 100.0;
        assert!((table[13].yoy_pct.value().unwrap() - expected).abs() < 1e-12);
    }
}
