//! Export raw levels, change tables and contribution breakdowns to CSV.
//!
//! Rows are flattened so the files open cleanly in spreadsheets: undefined
//! changes become empty cells plus a status column.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::{ContributionReport, MetricRow, PctChange, ReferenceRate, TimeSeriesPoint};
use crate::error::AppError;

#[derive(Debug, Serialize)]
struct MetricCsvRow<'a> {
    category_id: &'a str,
    seasonally_adjusted: bool,
    date: String,
    value: f64,
    mom_pct: Option<f64>,
    mom_status: &'static str,
    yoy_pct: Option<f64>,
    yoy_status: &'static str,
}

#[derive(Debug, Serialize)]
struct ContributionCsvRow<'a> {
    parent_id: &'a str,
    date: String,
    period: &'static str,
    parent_pct: f64,
    category_id: &'a str,
    weight: Option<f64>,
    child_pct: Option<f64>,
    contribution_pct: f64,
    unweighted: bool,
    rate_unavailable: bool,
    reconciled: bool,
    reference_id: Option<&'a str>,
    reference_pct: Option<f64>,
}

fn status(change: PctChange) -> &'static str {
    match change {
        PctChange::Value(_) => "ok",
        PctChange::NoBase => "no_base",
        PctChange::ZeroBase => "zero_base",
    }
}

pub fn write_points_csv<W: Write>(writer: W, points: &[TimeSeriesPoint]) -> Result<(), AppError> {
    let mut w = csv::Writer::from_writer(writer);
    for p in points {
        w.serialize(p).map_err(export_err)?;
    }
    w.flush().map_err(|e| export_err(e.into()))
}

pub fn write_metrics_csv<W: Write>(writer: W, rows: &[MetricRow]) -> Result<(), AppError> {
    let mut w = csv::Writer::from_writer(writer);
    for r in rows {
        w.serialize(MetricCsvRow {
            category_id: &r.category_id,
            seasonally_adjusted: r.seasonally_adjusted,
            date: r.date.to_string(),
            value: r.value,
            mom_pct: r.mom_pct.value(),
            mom_status: status(r.mom_pct),
            yoy_pct: r.yoy_pct.value(),
            yoy_status: status(r.yoy_pct),
        })
        .map_err(export_err)?;
    }
    w.flush().map_err(|e| export_err(e.into()))
}

/// One row per child per report; the reference rate repeats on each row of its date.
pub fn write_contributions_csv<W: Write>(
    writer: W,
    reports: &[ContributionReport],
    reference: Option<&ReferenceRate>,
) -> Result<(), AppError> {
    let mut w = csv::Writer::from_writer(writer);
    for report in reports {
        for c in &report.contributions {
            w.serialize(ContributionCsvRow {
                parent_id: &report.parent_id,
                date: report.date.to_string(),
                period: report.period.label(),
                parent_pct: report.parent_pct,
                category_id: &c.category_id,
                weight: c.weight,
                child_pct: c.child_pct,
                contribution_pct: c.contribution_pct,
                unweighted: c.unweighted,
                rate_unavailable: c.rate_unavailable,
                reconciled: report.warning.is_none(),
                reference_id: reference.map(|r| r.category_id.as_str()),
                reference_pct: reference.and_then(|r| r.at(report.date)),
            })
            .map_err(export_err)?;
        }
    }
    w.flush().map_err(|e| export_err(e.into()))
}

/// Create `path` and hand it to one of the writers above.
pub fn export_to_file<F>(path: &Path, write: F) -> Result<(), AppError>
where
    F: FnOnce(File) -> Result<(), AppError>,
{
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write(file)
}

fn export_err(e: csv::Error) -> AppError {
    AppError::new(2, format!("Failed to write export CSV: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::data::{SampleSource, SeriesRequest, TimeSeriesSource, partition_series};
    use crate::domain::{ChangePeriod, ContributionResult, MetricResult, SeasonalFilter};
    use crate::metrics::compute_metric_table;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn render<F: FnOnce(&mut Vec<u8>) -> Result<(), AppError>>(f: F) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn points_have_header_and_rows() {
        let points = vec![TimeSeriesPoint::new("food", d(2024, 1), 310.5, true)];
        let out = render(|b| write_points_csv(b, &points));
        assert_eq!(out, "category_id,date,value,seasonally_adjusted\nfood,2024-01-01,310.5,true\n");
    }

    #[test]
    fn undefined_changes_are_blank_with_status() {
        let rows = vec![MetricRow {
            category_id: "food".into(),
            seasonally_adjusted: true,
            date: d(2024, 1),
            value: 100.0,
            mom_pct: PctChange::Value(0.5),
            yoy_pct: PctChange::NoBase,
        }];
        let out = render(|b| write_metrics_csv(b, &rows));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines[0],
            "category_id,seasonally_adjusted,date,value,mom_pct,mom_status,yoy_pct,yoy_status"
        );
        assert_eq!(lines[1], "food,true,2024-01-01,100.0,0.5,ok,,no_base");
    }

    #[test]
    fn both_seasonal_variants_stay_distinguishable() {
        let source = SampleSource::new(7);
        let request = SeriesRequest::new(vec!["food".into()], d(2024, 1), d(2024, 2), SeasonalFilter::Both);
        let series = partition_series(source.load(&request).unwrap()).unwrap();
        let rows: Vec<MetricRow> = series
            .values()
            .flat_map(|points| compute_metric_table(points).unwrap())
            .collect();
        assert_eq!(rows.len(), 4);

        let out = render(|b| write_metrics_csv(b, &rows));
        let mut keys: Vec<String> = out
            .lines()
            .skip(1)
            .map(|l| l.split(',').take(3).collect::<Vec<_>>().join(","))
            .collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 4);
        assert!(keys.contains(&"food,false,2024-01-01".to_string()));
        assert!(keys.contains(&"food,true,2024-01-01".to_string()));
    }

    #[test]
    fn contributions_flatten_per_child() {
        let report = ContributionReport {
            parent_id: "all_items".into(),
            date: d(2024, 6),
            period: ChangePeriod::Year,
            parent_pct: 3.0,
            children_sum: 2.0,
            contributions: vec![
                ContributionResult {
                    category_id: "food".into(),
                    date: d(2024, 6),
                    contribution_pct: 2.0,
                    weight: Some(0.5),
                    child_pct: Some(4.0),
                    unweighted: false,
                    rate_unavailable: false,
                },
                ContributionResult {
                    category_id: "energy".into(),
                    date: d(2024, 6),
                    contribution_pct: 0.0,
                    weight: None,
                    child_pct: Some(1.0),
                    unweighted: true,
                    rate_unavailable: false,
                },
            ],
            warning: None,
        };
        let out = render(|b| write_contributions_csv(b, std::slice::from_ref(&report), None));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "all_items,2024-06-01,YoY,3.0,food,0.5,4.0,2.0,false,false,true,,");
        assert!(lines[2].contains("energy,,1.0,0.0,true"));

        let reference = ReferenceRate {
            category_id: "core".into(),
            period: ChangePeriod::Year,
            changes: vec![MetricResult {
                category_id: "core".into(),
                date: d(2024, 6),
                period: ChangePeriod::Year,
                change: PctChange::Value(3.25),
            }],
        };
        let out = render(|b| write_contributions_csv(b, &[report], Some(&reference)));
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].ends_with("reconciled,reference_id,reference_pct"));
        assert!(lines[1].ends_with("true,core,3.25"));
        assert!(lines[2].ends_with("core,3.25"));
    }
}
